use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;

use crate::error::{HubError, Result};
use crate::hub::config::HubConfig;

/// Outbound HTTP sender shared by verification challenges, feed
/// fetches and subscriber delivery. At most `max_connections` requests
/// are in flight at once; each carries a per-request timeout and gets
/// a bounded retry on connection-level failures.
pub struct HttpSender {
    client: reqwest::Client,
    // Fixed worker budget for all outbound calls. Fan-out spawns one
    // task per subscriber, so the bound has to live here.
    limiter: Semaphore,
    retries: u32,
}

impl HttpSender {
    pub fn new(config: &HubConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(config.max_connections)
            .build()?;

        Ok(Self {
            client,
            limiter: Semaphore::new(config.max_connections.max(1)),
            retries: config.retries.max(1),
        })
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        self.execute(|| self.client.get(url)).await
    }

    /// POST a payload verbatim. Content-Length is derived from the
    /// body; the Link header is only present for ResourceSync
    /// deliveries.
    pub async fn post(
        &self,
        url: &str,
        content_type: &str,
        link_header: Option<&str>,
        body: Bytes,
    ) -> Result<reqwest::Response> {
        debug!("POST {} ({} bytes)", url, body.len());
        self.execute(|| {
            let mut request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, content_type)
                .body(body.clone());
            if let Some(link) = link_header {
                request = request.header("Link", link);
            }
            request
        })
        .await
    }

    /// Waits for a worker slot, then sends. Connection-level failures
    /// get a bounded number of fresh attempts; anything that produced
    /// a status code is returned as-is.
    async fn execute<F>(&self, make_request: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self
            .limiter
            .acquire()
            .await
            .expect("outbound request limiter closed");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match make_request().send().await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.retries && (err.is_connect() || err.is_timeout()) => {
                    warn!(
                        "Outbound request failed (attempt {}/{}): {}",
                        attempt, self.retries, err
                    );
                }
                Err(err) => return Err(HubError::Http(err)),
            }
        }
    }
}
