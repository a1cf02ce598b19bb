//! Response types of the NSoT inventory API

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute value as stored by NSoT
///
/// Plain attributes carry a single string; `multi` attributes (such as `group`
/// and `tag`) carry a list. Anything else is kept verbatim so one odd value
/// does not fail the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
    Other(serde_json::Value),
}

impl AttributeValue {
    /// The value as a single string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Single(value) => Some(value),
            _ => None,
        }
    }

    /// The value as a list of strings
    ///
    /// A single string yields a one-element list.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            AttributeValue::Single(value) => vec![value.clone()],
            AttributeValue::Multi(values) => values.clone(),
            AttributeValue::Other(_) => Vec::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Single(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Single(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::Multi(values)
    }
}

/// Attribute map of a resource
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A site (`GET /sites/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A device (`GET /devices/query/`, `POST /devices/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// One page of the change feed (`GET /changes/`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePage {
    /// Total number of matching changes
    pub count: u64,
    /// Changes on this page, newest first
    #[serde(default)]
    pub results: Vec<ChangeRecord>,
    /// Link to the next (older) page, absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

impl ChangePage {
    /// Id of the first (newest) record on this page
    #[must_use]
    pub fn head_id(&self) -> Option<i64> {
        self.results.first().map(|record| record.id)
    }
}

/// A single change-feed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: i64,
    /// Resource type the change applies to (`Device`, `Network`, ...)
    #[serde(default)]
    pub resource_name: Option<String>,
    /// Change event (`Create`, `Update`, `Delete`)
    #[serde(default)]
    pub event: Option<String>,
    /// Snapshot of the changed resource
    #[serde(default)]
    pub resource: Option<ChangeResource>,
}

impl ChangeRecord {
    /// IP address of the changed device, if the snapshot carries one
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.resource
            .as_ref()
            .and_then(|resource| resource.attributes.get("ip_addr"))
            .and_then(AttributeValue::as_str)
    }

    /// Whether the change concerns a device
    ///
    /// Records without a resource name are assumed to come from a feed that is
    /// already filtered to devices.
    #[must_use]
    pub fn is_device(&self) -> bool {
        self.resource_name
            .as_deref()
            .is_none_or(|name| name == "Device")
    }
}

/// Resource snapshot embedded in a change record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeResource {
    #[serde(default)]
    pub attributes: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_page_decoding() {
        let body = r#"{
            "count": 2,
            "next": "http://nsot/api/changes/?limit=1&offset=1&resource_name=Device",
            "previous": null,
            "results": [
                {
                    "id": 12,
                    "event": "Update",
                    "resource_name": "Device",
                    "resource": {"attributes": {"ip_addr": "10.0.0.1", "group": ["ops"]}}
                }
            ]
        }"#;

        let page: ChangePage = serde_json::from_str(body).unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.head_id(), Some(12));
        assert!(page.next.is_some());
        assert_eq!(page.results[0].ip_address(), Some("10.0.0.1"));
        assert!(page.results[0].is_device());
    }

    #[test]
    fn test_change_record_without_ip() {
        let body = r#"{"id": 3, "resource_name": "Network", "resource": {"attributes": {}}}"#;
        let record: ChangeRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.ip_address(), None);
        assert!(!record.is_device());

        let bare: ChangeRecord = serde_json::from_str(r#"{"id": 4}"#).unwrap();
        assert_eq!(bare.ip_address(), None);
        assert!(bare.is_device());
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page: ChangePage =
            serde_json::from_str(r#"{"count": 0, "results": [], "next": null}"#).unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.head_id(), None);
    }

    #[test]
    fn test_attribute_value_shapes() {
        let attrs: Attributes =
            serde_json::from_str(r#"{"role": "core", "group": ["a", "b"], "rack": 7}"#).unwrap();
        assert_eq!(attrs["role"].as_str(), Some("core"));
        assert_eq!(attrs["group"].to_list(), vec!["a", "b"]);
        assert!(matches!(attrs["rack"], AttributeValue::Other(_)));
        assert!(attrs["rack"].to_list().is_empty());
    }

    #[test]
    fn test_missing_id_is_decode_error() {
        let result: Result<Site, _> = serde_json::from_str(r#"{"name": "app"}"#);
        assert!(result.is_err());
    }
}
