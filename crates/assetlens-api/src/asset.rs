//! Cached asset model

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::responses::{AttributeValue, Attributes, Device};

/// Attribute keys kept on an asset; everything else is dropped
pub const RECOGNIZED_ATTRIBUTES: [&str; 5] = ["name", "role", "vendor", "os_type", "ip_ver"];

/// Group assigned to devices created without one ("unassigned")
pub const UNASSIGNED_GROUP: &str = "未分配";

/// A network-attached device known to the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Remote-assigned identifier
    pub id: i64,
    /// Cache key
    pub ip_address: String,
    /// Recognized string attributes
    pub attributes: BTreeMap<String, String>,
    /// Owning groups, in remote order
    pub groups: Vec<String>,
    /// Free-form labels
    pub tags: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Build an asset from a remote attribute map
    ///
    /// Unrecognized keys and non-string values of recognized keys are dropped.
    pub fn from_attributes(id: i64, ip_address: impl Into<String>, attributes: &Attributes) -> Self {
        let recognized = RECOGNIZED_ATTRIBUTES
            .iter()
            .filter_map(|key| {
                attributes
                    .get(*key)
                    .and_then(AttributeValue::as_str)
                    .map(|value| ((*key).to_string(), value.to_string()))
            })
            .collect();

        let list = |key: &str| {
            attributes
                .get(key)
                .map(AttributeValue::to_list)
                .unwrap_or_default()
        };

        Self {
            id,
            ip_address: ip_address.into(),
            attributes: recognized,
            groups: list("group"),
            tags: list("tag").into_iter().collect(),
            created_at: timestamp(attributes, "createtime"),
            updated_at: timestamp(attributes, "updatetime"),
        }
    }

    /// Build an asset from a device returned by the remote service
    pub fn from_device(ip_address: impl Into<String>, device: &Device) -> Self {
        Self::from_attributes(device.id, ip_address, &device.attributes)
    }

    /// Get a recognized attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

fn timestamp(attributes: &Attributes, key: &str) -> Option<DateTime<Utc>> {
    attributes
        .get(key)
        .and_then(AttributeValue::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Caller-supplied attributes used when a device has to be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAttributes {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SeedAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a group (repeatable)
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Add a tag (repeatable)
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attributes restricted to the recognized keys
    pub fn recognized(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(key, _)| RECOGNIZED_ATTRIBUTES.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(json: &str) -> Attributes {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_unrecognized_keys_dropped() {
        let asset = Asset::from_attributes(
            7,
            "10.0.0.7",
            &attrs(r#"{"name": "sw1", "vendor": "acme", "rack": "r1", "ip_addr": "10.0.0.7"}"#),
        );

        assert_eq!(asset.id, 7);
        assert_eq!(asset.attribute("name"), Some("sw1"));
        assert_eq!(asset.attribute("vendor"), Some("acme"));
        assert_eq!(asset.attribute("rack"), None);
        assert_eq!(asset.attributes.len(), 2);
    }

    #[test]
    fn test_groups_keep_order_and_tags_dedupe() {
        let asset = Asset::from_attributes(
            1,
            "10.0.0.1",
            &attrs(r#"{"group": ["ops", "db", "ops-2"], "tag": ["b", "a", "b"]}"#),
        );

        assert_eq!(asset.groups, vec!["ops", "db", "ops-2"]);
        assert_eq!(asset.tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_timestamps_parsed() {
        let asset = Asset::from_attributes(
            1,
            "10.0.0.1",
            &attrs(r#"{"createtime": "2024-03-01T08:00:00+08:00", "updatetime": "garbage"}"#),
        );

        let created = asset.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(asset.updated_at.is_none());
    }

    #[test]
    fn test_seed_recognized_filter() {
        let seed = SeedAttributes::new()
            .with_attribute("name", "h1")
            .with_attribute("ip_ver", "4")
            .with_attribute("url", "http://x");

        let keys: Vec<_> = seed.recognized().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["ip_ver", "name"]);
    }
}
