use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Hub configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Listen address, e.g. "127.0.0.1:8090".
    pub addr: String,
    /// Backing file for the persisted subscription map.
    pub subscribers_file: String,
    /// Content-types accepted for ResourceSync payloads. Empty means
    /// accept everything that is not form-urlencoded.
    #[serde(default = "default_mimetypes")]
    pub mimetypes: Vec<String>,
    /// Topics the hub relays for. Empty means any topic is allowed.
    #[serde(default)]
    pub trusted_topics: Vec<String>,
    /// Loaded for operators that want it on record, but not checked
    /// against incoming requests (there is no publisher identity on
    /// the wire to check it against).
    #[serde(default)]
    pub trusted_publishers: Vec<String>,
    /// Hard cap on inbound request bodies.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Timeout applied to every outbound call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on concurrently in-flight outbound requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Attempts per outbound call on connection-level failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Lease applied when a subscriber omits hub.lease_seconds
    /// (~31 days).
    #[serde(default = "default_lease_seconds")]
    pub default_lease_seconds: u64,
}

fn default_mimetypes() -> Vec<String> {
    vec!["application/xml".to_string()]
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> usize {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_lease_seconds() -> u64 {
    2_678_400
}

impl HubConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| HubError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HubError::Config(format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| HubError::Config(format!("Failed to write config file: {}", e)))
    }
}
