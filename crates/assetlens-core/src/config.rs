//! Configuration for the inventory cache service

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use assetlens_client::DEFAULT_IDENTITY;

use crate::error::CoreError;

/// Settings for connecting to NSoT and sizing the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Base URL of the NSoT API
    #[serde(default = "default_nsot")]
    pub nsot: String,
    /// Site new devices are created in
    #[serde(default = "default_site")]
    pub site: String,
    /// Metric tag carrying the IP address
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Maximum number of cached assets
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Seconds between change-feed polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Changes fetched per page
    #[serde(default = "default_change_page_size")]
    pub change_page_size: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Value of the `X-NSoT-Email` header
    #[serde(default = "default_identity")]
    pub identity: String,
}

fn default_nsot() -> String {
    "http://localhost:8990/api".to_string()
}

fn default_site() -> String {
    "app".to_string()
}

fn default_tag() -> String {
    "ip".to_string()
}

fn default_cache_size() -> usize {
    8192
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_change_page_size() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            nsot: default_nsot(),
            site: default_site(),
            tag: default_tag(),
            cache_size: default_cache_size(),
            poll_interval_secs: default_poll_interval_secs(),
            change_page_size: default_change_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            identity: default_identity(),
        }
    }
}

impl InventoryConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings the service cannot run with
    ///
    /// A cache size of zero is allowed and simply disables caching.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<(), CoreError> {
        Url::parse(&self.nsot)
            .map_err(|e| CoreError::ConfigError(format!("invalid nsot url {:?}: {e}", self.nsot)))?;

        if self.site.trim().is_empty() {
            return Err(CoreError::ConfigError("site must not be empty".to_string()));
        }
        if self.tag.trim().is_empty() {
            return Err(CoreError::ConfigError("tag must not be empty".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(CoreError::ConfigError(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.change_page_size == 0 {
            return Err(CoreError::ConfigError(
                "change_page_size must be positive".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::ConfigError(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InventoryConfig::default();
        assert_eq!(config.site, "app");
        assert_eq!(config.tag, "ip");
        assert_eq!(config.cache_size, 8192);
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.identity, "sensor@example.tld");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: InventoryConfig =
            serde_json::from_str(r#"{"site": "lab", "cache_size": 0}"#).unwrap();
        assert_eq!(config.site, "lab");
        assert_eq!(config.cache_size, 0);
        assert_eq!(config.change_page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = InventoryConfig {
            nsot: "localhost api".to_string(),
            ..InventoryConfig::default()
        };
        assert!(matches!(bad_url.validate(), Err(CoreError::ConfigError(_))));

        let no_site = InventoryConfig {
            site: "  ".to_string(),
            ..InventoryConfig::default()
        };
        assert!(no_site.validate().is_err());

        let no_interval = InventoryConfig {
            poll_interval_secs: 0,
            ..InventoryConfig::default()
        };
        assert!(no_interval.validate().is_err());
    }
}
