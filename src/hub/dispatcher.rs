use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;

use crate::error::{HubError, Result};
use crate::hub::net::client::HttpSender;
use crate::hub::store::SubscriptionStore;

/// One outbound notification: the payload plus the headers that must
/// reach every subscriber unchanged.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub content_type: String,
    pub link_header: Option<String>,
    pub payload: Bytes,
}

/// Fans payloads out to the live subscribers of a topic and drives the
/// legacy PuSH fetch-then-fanout flow.
pub struct Dispatcher {
    sender: Arc<HttpSender>,
    store: Arc<SubscriptionStore>,
}

impl Dispatcher {
    pub fn new(sender: Arc<HttpSender>, store: Arc<SubscriptionStore>) -> Self {
        Self { sender, store }
    }

    /// Best-effort fan-out: every live subscriber gets its own
    /// outbound task, so one failing recipient never blocks or fails
    /// the others, and the caller never waits for acknowledgements.
    /// Returns the number of deliveries initiated.
    pub fn broadcast(&self, topic: &str, delivery: &Delivery) -> usize {
        let subscribers = self.store.subscribers_for(topic);
        if subscribers.is_empty() {
            debug!("No live subscribers for topic {}", topic);
            return 0;
        }

        info!(
            "Posting change notification to {} subscriber(s) of {} ({} byte payload)",
            subscribers.len(),
            topic,
            delivery.payload.len()
        );

        for subscriber in &subscribers {
            let sender = self.sender.clone();
            let delivery = delivery.clone();
            let subscriber = subscriber.clone();
            tokio::spawn(async move {
                match sender
                    .post(
                        &subscriber,
                        &delivery.content_type,
                        delivery.link_header.as_deref(),
                        delivery.payload,
                    )
                    .await
                {
                    Ok(response) => {
                        debug!("Delivered to {} ({})", subscriber, response.status())
                    }
                    Err(err) => warn!("Delivery to subscriber {} failed: {}", subscriber, err),
                }
            });
        }

        subscribers.len()
    }

    /// Legacy PuSH: the hub fetches the changed resource itself, then
    /// relays body and content-type to the feed's subscribers. The
    /// publisher's reply depends only on the fetch outcome; zero
    /// subscribers is still a success.
    pub async fn fetch_and_broadcast(&self, feed_url: &str) -> Result<usize> {
        let response = self.sender.get(feed_url).await.map_err(|err| {
            warn!("Fetch of {} failed: {}", feed_url, err);
            HubError::UpstreamFetch(feed_url.to_string())
        })?;

        if !response.status().is_success() {
            warn!("Fetch of {} answered {}", feed_url, response.status());
            return Err(HubError::UpstreamFetch(feed_url.to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/xml")
            .to_string();

        let payload = response
            .bytes()
            .await
            .map_err(|_| HubError::UpstreamFetch(feed_url.to_string()))?;

        Ok(self.broadcast(
            feed_url,
            &Delivery {
                content_type,
                link_header: None,
                payload,
            },
        ))
    }
}
