use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::hub::types::SubscriptionMap;

/// Which store mutation a verified subscription request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    Subscribe,
    Unsubscribe,
}

/// Current time in unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persistent topic → subscriber → lease-expiry map, serialized as a
/// single JSON file. The whole map is loaded on every read and written
/// back on every mutation; leases are enforced lazily on both paths,
/// so an expired subscription is never visible even before it is
/// physically purged.
pub struct SubscriptionStore {
    path: PathBuf,
    // Held across every load-mutate-save sequence. Concurrent
    // subscribe requests would otherwise overwrite each other's
    // full-map writes.
    write_lock: Mutex<()>,
}

impl SubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Full-map read. A missing, unreadable or corrupt backing file
    /// degrades to an empty map; the hub then simply sees no
    /// subscribers.
    pub fn load(&self) -> SubscriptionMap {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No subscription file at {}", self.path.display());
                return SubscriptionMap::new();
            }
            Err(e) => {
                warn!(
                    "Failed to read subscription file {}: {}",
                    self.path.display(),
                    e
                );
                return SubscriptionMap::new();
            }
        };

        let mut map: SubscriptionMap = match serde_json::from_slice(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    "Subscription file {} is not valid JSON: {}",
                    self.path.display(),
                    e
                );
                return SubscriptionMap::new();
            }
        };

        evict(&mut map, unix_now());
        map
    }

    /// Atomic full-map write: evict expired leases, serialize to a
    /// temp file, rename over the old state.
    pub fn save(&self, map: &mut SubscriptionMap) -> Result<()> {
        evict(map, unix_now());

        let data = serde_json::to_vec_pretty(&map)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            "Saved {} topic(s) to {}",
            map.len(),
            self.path.display()
        );
        Ok(())
    }

    /// All live subscribers of a topic, post-eviction.
    pub fn subscribers_for(&self, topic: &str) -> Vec<String> {
        let map = self.load();
        map.get(topic)
            .map(|subs| subs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Serialized read-modify-write: inserts or refreshes a lease, or
    /// removes a subscription, and persists the result. The lock is
    /// held across the whole sequence so concurrent requests cannot
    /// lose each other's updates.
    pub async fn apply(
        &self,
        mode: SubscribeMode,
        topic: &str,
        callback: &str,
        lease_seconds: u64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load();

        match mode {
            SubscribeMode::Subscribe => {
                // Leases are client-supplied; an absurdly large one
                // pins the expiry to the end of time instead of
                // wrapping into the past.
                map.entry(topic.to_string())
                    .or_default()
                    .insert(callback.to_string(), unix_now().saturating_add(lease_seconds));
            }
            SubscribeMode::Unsubscribe => {
                if let Some(subs) = map.get_mut(topic) {
                    subs.remove(callback);
                }
            }
        }

        self.save(&mut map)
    }
}

/// Drops every subscription whose lease has run out; topics left with
/// no subscribers are dropped with them.
pub fn evict(map: &mut SubscriptionMap, now: u64) {
    for subs in map.values_mut() {
        subs.retain(|_, expiry| *expiry > now);
    }
    map.retain(|_, subs| !subs.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_store(tag: &str) -> SubscriptionStore {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "resynchub-store-{}-{}-{}.json",
            tag,
            std::process::id(),
            nanos
        ));
        SubscriptionStore::new(path)
    }

    #[test]
    fn eviction_is_total() {
        let now = unix_now();
        let mut map = SubscriptionMap::new();
        map.insert(
            "http://topic/a".to_string(),
            HashMap::from([
                ("http://cb/live".to_string(), now + 100),
                ("http://cb/expired".to_string(), now),
                ("http://cb/long-gone".to_string(), now - 500),
            ]),
        );
        map.insert(
            "http://topic/b".to_string(),
            HashMap::from([("http://cb/expired".to_string(), now - 1)]),
        );

        evict(&mut map, now);

        let subs = map.get("http://topic/a").unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.contains_key("http://cb/live"));
        // topic left empty disappears with its subscribers
        assert!(!map.contains_key("http://topic/b"));
    }

    #[tokio::test]
    async fn subscribe_persists_and_reloads() {
        let store = temp_store("subscribe");
        store
            .apply(SubscribeMode::Subscribe, "http://t", "http://cb", 3600)
            .await
            .unwrap();

        let map = store.load();
        let expiry = map["http://t"]["http://cb"];
        let expected = unix_now() + 3600;
        assert!(expiry >= expected - 2 && expiry <= expected + 2);

        assert_eq!(store.subscribers_for("http://t"), vec!["http://cb"]);
    }

    #[tokio::test]
    async fn huge_lease_saturates_instead_of_expiring() {
        let store = temp_store("huge-lease");
        store
            .apply(SubscribeMode::Subscribe, "http://t", "http://cb", u64::MAX)
            .await
            .unwrap();

        // the subscription must survive the save/load eviction passes
        assert_eq!(store.subscribers_for("http://t"), vec!["http://cb"]);
        assert_eq!(store.load()["http://t"]["http://cb"], u64::MAX);
    }

    #[tokio::test]
    async fn repeated_subscribe_refreshes_the_lease() {
        let store = temp_store("refresh");
        store
            .apply(SubscribeMode::Subscribe, "http://t", "http://cb", 100)
            .await
            .unwrap();
        store
            .apply(SubscribeMode::Subscribe, "http://t", "http://cb", 9000)
            .await
            .unwrap();

        let map = store.load();
        assert_eq!(map["http://t"].len(), 1);
        assert!(map["http://t"]["http://cb"] >= unix_now() + 8000);
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_entry() {
        let store = temp_store("unsubscribe");
        store
            .apply(SubscribeMode::Subscribe, "http://t", "http://cb", 3600)
            .await
            .unwrap();
        store
            .apply(SubscribeMode::Unsubscribe, "http://t", "http://cb", 0)
            .await
            .unwrap();

        assert!(store.subscribers_for("http://t").is_empty());
    }

    #[tokio::test]
    async fn expired_subscription_is_invisible_on_read() {
        let store = temp_store("expired");
        // Write an already-expired lease straight past the eviction in
        // save().
        let mut map = SubscriptionMap::new();
        map.insert(
            "http://t".to_string(),
            HashMap::from([("http://cb".to_string(), unix_now() - 10)]),
        );
        fs::write(&store.path, serde_json::to_vec(&map).unwrap()).unwrap();

        assert!(store.load().is_empty());
        assert!(store.subscribers_for("http://t").is_empty());
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let store = temp_store("corrupt");
        fs::write(&store.path, b"not json at all").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let store = temp_store("missing");
        assert!(store.load().is_empty());
    }
}
