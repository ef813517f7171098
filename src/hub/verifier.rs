use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use rand::distr::{Alphanumeric, SampleString};
use url::Url;

use crate::error::{HubError, Result};
use crate::hub::net::client::HttpSender;
use crate::hub::store::{SubscribeMode, SubscriptionStore};

/// Challenge length in characters. 32 alphanumerics are ~190 bits of
/// entropy, so collisions between concurrent verifications are
/// negligible.
const CHALLENGE_LEN: usize = 32;

/// A subscribe/unsubscribe request waiting on its challenge
/// round-trip. Held in working memory only: a hub restart drops it and
/// the client has to retry.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub mode: SubscribeMode,
    pub topic: String,
    pub callback: String,
    pub lease_seconds: u64,
    /// Echoed verbatim to the callback when the requester supplied
    /// one.
    pub verify_token: Option<String>,
}

/// Runs the challenge-response exchange that gates every store
/// mutation: the hub only believes a subscribe or unsubscribe request
/// once the callback endpoint has echoed a one-time challenge back.
pub struct Verifier {
    sender: Arc<HttpSender>,
    store: Arc<SubscriptionStore>,
    pending: DashMap<String, VerifyRequest>,
}

impl Verifier {
    pub fn new(sender: Arc<HttpSender>, store: Arc<SubscriptionStore>) -> Self {
        Self {
            sender,
            store,
            pending: DashMap::new(),
        }
    }

    /// One full verification attempt. The originating request blocks
    /// on the outcome; the pending entry is removed on every exit
    /// path.
    pub async fn verify(&self, request: VerifyRequest) -> Result<()> {
        let challenge = Alphanumeric.sample_string(&mut rand::rng(), CHALLENGE_LEN);
        let url = challenge_url(&challenge, &request)?;
        self.pending.insert(challenge.clone(), request);

        let outcome = self.exchange(&challenge, url).await;
        self.pending.remove(&challenge);
        outcome
    }

    /// Drives one challenge round-trip. The store commit reads the
    /// request back out of the pending map, so only a verification
    /// this hub actually issued can mutate a subscription.
    async fn exchange(&self, challenge: &str, url: Url) -> Result<()> {
        let response = self.sender.get(url.as_str()).await.map_err(|err| {
            warn!("Challenge request to {} failed: {}", url, err);
            HubError::VerificationFailed
        })?;

        let body = response.text().await.map_err(|err| {
            warn!("Reading challenge echo from {} failed: {}", url, err);
            HubError::VerificationFailed
        })?;

        if !body.contains(challenge) {
            warn!("Challenge echo from {} did not match", url);
            return Err(HubError::VerificationFailed);
        }

        let request = match self.pending.get(challenge) {
            Some(entry) => entry.value().clone(),
            None => {
                warn!("No pending verification behind the echo from {}", url);
                return Err(HubError::VerificationFailed);
            }
        };

        // Store I/O trouble is logged, not surfaced: the subscriber
        // did prove control of its callback.
        if let Err(err) = self
            .store
            .apply(
                request.mode,
                &request.topic,
                &request.callback,
                request.lease_seconds,
            )
            .await
        {
            warn!(
                "Failed to persist verified {:?} for {}: {}",
                request.mode, request.callback, err
            );
        }

        info!(
            "Verified {:?} of {} for topic {}",
            request.mode, request.callback, request.topic
        );
        Ok(())
    }

    /// Number of verifications currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Builds `callback?hub.mode=..&hub.topic=..&hub.challenge=..` with the
/// optional hub.verify_token appended last. An unparseable callback
/// fails the verification like any other error in the exchange.
fn challenge_url(challenge: &str, request: &VerifyRequest) -> Result<Url> {
    let mut url = Url::parse(&request.callback).map_err(|err| {
        warn!("Invalid hub.callback url {}: {}", request.callback, err);
        HubError::VerificationFailed
    })?;

    let mode = match request.mode {
        SubscribeMode::Subscribe => "subscribe",
        SubscribeMode::Unsubscribe => "unsubscribe",
    };

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("hub.mode", mode)
            .append_pair("hub.topic", &request.topic)
            .append_pair("hub.challenge", challenge);
        if let Some(token) = &request.verify_token {
            pairs.append_pair("hub.verify_token", token);
        }
    }

    Ok(url)
}
