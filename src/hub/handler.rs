use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use log::{debug, info};
use url::form_urlencoded;

use crate::error::{HubError, Result};
use crate::hub::config::HubConfig;
use crate::hub::dispatcher::{Delivery, Dispatcher};
use crate::hub::store::SubscribeMode;
use crate::hub::verifier::{Verifier, VerifyRequest};
use crate::link;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Validates inbound requests, picks the delivery mode (legacy PuSH,
/// ResourceSync or subscription) and composes the verifier and
/// dispatcher. All protocol semantics live here; the HTTP binding only
/// adapts transport types.
pub struct HubHandler {
    config: Arc<HubConfig>,
    dispatcher: Dispatcher,
    verifier: Verifier,
}

impl HubHandler {
    pub fn new(config: Arc<HubConfig>, dispatcher: Dispatcher, verifier: Verifier) -> Self {
        Self {
            config,
            dispatcher,
            verifier,
        }
    }

    /// `/publish`: legacy PuSH or ResourceSync, selected on the
    /// content-type. Success is 204 with no body either way.
    pub async fn handle_publish(
        &self,
        method: &Method,
        content_type: Option<&str>,
        link_header: Option<&str>,
        body: Bytes,
    ) -> Result<()> {
        self.check_request(method, body.len())?;
        let media_type = required_media_type(content_type)?;

        if media_type == FORM_URLENCODED {
            self.handle_push_publish(body).await
        } else if self.accepts(&media_type) {
            self.handle_resourcesync_publish(&media_type, link_header, body)
        } else {
            Err(HubError::NotAcceptable)
        }
    }

    /// Legacy PuSH publish: the form names a feed url, the hub fetches
    /// it and relays the result. The publisher's reply is held until
    /// the fetch resolves.
    async fn handle_push_publish(&self, body: Bytes) -> Result<()> {
        let form = parse_form(&body);
        let (mode, feed_url) = match (form.get("hub.mode"), form.get("hub.url")) {
            (Some(mode), Some(url)) => (mode, url),
            _ => {
                return Err(HubError::BadRequest(
                    "Bad Request: hub.url and hub.mode required.".to_string(),
                ))
            }
        };

        if mode != "publish" {
            return Err(HubError::BadRequest("Unrecognised mode".to_string()));
        }

        let initiated = self.dispatcher.fetch_and_broadcast(feed_url).await?;
        debug!(
            "PuSH publish for {} initiated {} deliveries",
            feed_url, initiated
        );
        Ok(())
    }

    /// ResourceSync publish: the body is the payload, the Link header
    /// names the topic. Payload and Link header are relayed verbatim.
    fn handle_resourcesync_publish(
        &self,
        media_type: &str,
        link_header: Option<&str>,
        body: Bytes,
    ) -> Result<()> {
        if body.is_empty() {
            return Err(HubError::BadRequest(
                "Payload of size > 0 expected.".to_string(),
            ));
        }

        let link_header = link_header
            .filter(|header| !header.is_empty())
            .ok_or_else(|| {
                HubError::BadRequest("ResourceSync Link Headers required.".to_string())
            })?;

        let (topic, hub_url) = link::parse(link_header);
        if topic.is_empty() && hub_url.is_empty() {
            return Err(HubError::BadRequest(
                "ResourceSync Link header spec not met.".to_string(),
            ));
        }

        // Trust is checked before any store read or dispatch happens.
        let topic = topic.trim();
        if !self.config.trusted_topics.is_empty()
            && !self.config.trusted_topics.iter().any(|t| t == topic)
        {
            return Err(HubError::UntrustedTopic);
        }

        let initiated = self.dispatcher.broadcast(
            topic,
            &Delivery {
                content_type: media_type.to_string(),
                link_header: Some(link_header.to_string()),
                payload: body,
            },
        );
        debug!(
            "ResourceSync publish for {} initiated {} deliveries",
            topic, initiated
        );
        Ok(())
    }

    /// `/subscribe`: validates the form fields and blocks on the
    /// challenge-response verification before answering.
    pub async fn handle_subscribe(
        &self,
        method: &Method,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<()> {
        self.check_request(method, body.len())?;
        required_media_type(content_type)?;

        let form = parse_form(&body);
        let mode = required_field(&form, "hub.mode")?;
        let callback = required_field(&form, "hub.callback")?;
        let topic = required_field(&form, "hub.topic")?;
        let verify = required_field(&form, "hub.verify")?;

        let mode = match mode.as_str() {
            "subscribe" => SubscribeMode::Subscribe,
            "unsubscribe" => SubscribeMode::Unsubscribe,
            _ => {
                return Err(HubError::BadRequest(
                    "Bad request: Unrecognized mode".to_string(),
                ))
            }
        };

        // sync verification is part of the protocol surface but not
        // implemented; it is refused rather than silently downgraded.
        if verify != "async" {
            return Err(HubError::BadRequest(
                "Bad request: Unsupported verification mode".to_string(),
            ));
        }

        let lease_seconds = match form.get("hub.lease_seconds") {
            Some(raw) => raw.parse().map_err(|_| {
                HubError::BadRequest("Bad request: hub.lease_seconds must be a number".to_string())
            })?,
            None => self.config.default_lease_seconds,
        };

        self.verifier
            .verify(VerifyRequest {
                mode,
                topic,
                callback,
                lease_seconds,
                verify_token: form.get("hub.verify_token").cloned(),
            })
            .await?;

        info!("Subscription successful.");
        Ok(())
    }

    fn check_request(&self, method: &Method, body_len: usize) -> Result<()> {
        if method != Method::POST {
            return Err(HubError::MethodNotAllowed);
        }
        // The transport layer already refuses to buffer more than
        // this; the check here keeps the cap independent of any one
        // binding.
        if body_len > self.config.max_body_bytes {
            return Err(HubError::PayloadTooLarge(self.config.max_body_bytes));
        }
        Ok(())
    }

    fn accepts(&self, media_type: &str) -> bool {
        self.config.mimetypes.is_empty()
            || self
                .config
                .mimetypes
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(media_type))
    }
}

/// Lowercased media type with parameters like `; charset=utf-8`
/// stripped. Missing or empty content-type is a client error.
fn required_media_type(content_type: Option<&str>) -> Result<String> {
    match content_type {
        Some(value) if !value.trim().is_empty() => Ok(value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()),
        _ => Err(HubError::BadRequest(
            "Invalid Content-Type value in header.".to_string(),
        )),
    }
}

fn parse_form(body: &Bytes) -> HashMap<String, String> {
    form_urlencoded::parse(body).into_owned().collect()
}

fn required_field(form: &HashMap<String, String>, key: &str) -> Result<String> {
    form.get(key).filter(|value| !value.is_empty()).cloned().ok_or_else(|| {
        HubError::BadRequest(format!(
            "Bad request: Expected 'hub.mode', 'hub.callback', 'hub.topic', and 'hub.verify' ({} missing)",
            key
        ))
    })
}
