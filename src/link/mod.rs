//! RFC 5988 style Link header parsing and building.
//!
//! A ResourceSync change notification carries its topic metadata in a
//! Link header; the hub only cares about two relations: `rel="self"`
//! names the topic, `rel="hub"` names the hub endpoint.

use crate::error::{HubError, Result};

/// Extracts the topic (`rel="self"`) and hub (`rel="hub"`) URLs from a
/// Link header. Either URL is an empty string if its relation is
/// absent; malformed tokens are skipped, not fatal.
pub fn parse(header: &str) -> (String, String) {
    let mut topic = String::new();
    let mut hub_url = String::new();

    for token in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for part in token.split(';') {
            let part = part.trim();
            if part.len() >= 2 && part.starts_with('<') && part.ends_with('>') {
                url = Some(part[1..part.len() - 1].to_string());
            } else if let Some(value) = part.strip_prefix("rel=") {
                rel = Some(value.trim().trim_matches('"').to_string());
            }
        }

        match (url, rel.as_deref()) {
            (Some(u), Some("self")) => topic = u,
            (Some(u), Some("hub")) => hub_url = u,
            // unrelated relation or malformed token, skip
            _ => {}
        }
    }

    (topic, hub_url)
}

/// Renders `<topic>;rel="self", <hub>;rel="hub"`, omitting an absent
/// side. Both URLs missing is a caller configuration error, not
/// something a request can cause.
pub fn build(topic_url: &str, hub_url: &str) -> Result<String> {
    if topic_url.is_empty() && hub_url.is_empty() {
        return Err(HubError::Config(
            "link header requires a topic url or a hub url".to_string(),
        ));
    }

    let mut parts = Vec::with_capacity(2);
    if !topic_url.is_empty() {
        parts.push(format!("<{}>;rel=\"self\"", topic_url));
    }
    if !hub_url.is_empty() {
        parts.push(format!("<{}>;rel=\"hub\"", hub_url));
    }

    Ok(parts.join(", "))
}
