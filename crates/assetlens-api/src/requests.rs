//! Request types of the NSoT inventory API

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{SeedAttributes, UNASSIGNED_GROUP};
use crate::responses::{AttributeValue, Attributes};

/// Body of `POST /devices/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    pub hostname: String,
    pub site_id: i64,
    pub attributes: Attributes,
}

impl NewDevice {
    /// Build a creation request for `ip` from caller seed attributes
    ///
    /// Only recognized seed keys are sent. `ip_addr` and the create/update
    /// timestamps are always set; `group` falls back to [`UNASSIGNED_GROUP`].
    #[must_use]
    pub fn new(
        hostname: impl Into<String>,
        site_id: i64,
        ip: &str,
        seed: &SeedAttributes,
        now: DateTime<Utc>,
    ) -> Self {
        let mut attributes: Attributes = seed
            .recognized()
            .map(|(key, value)| (key.to_string(), AttributeValue::from(value)))
            .collect();

        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        attributes.insert("createtime".to_string(), stamp.clone().into());
        attributes.insert("updatetime".to_string(), stamp.into());
        attributes.insert("ip_addr".to_string(), ip.into());

        let groups = if seed.groups.is_empty() {
            vec![UNASSIGNED_GROUP.to_string()]
        } else {
            seed.groups.clone()
        };
        attributes.insert("group".to_string(), groups.into());

        if !seed.tags.is_empty() {
            attributes.insert("tag".to_string(), seed.tags.clone().into());
        }

        Self {
            hostname: hostname.into(),
            site_id,
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_defaults_group_and_sets_ip() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let seed = SeedAttributes::new()
            .with_attribute("name", "h1")
            .with_attribute("ip_ver", "4")
            .with_attribute("bogus", "x");

        let device = NewDevice::new("host-id", 3, "10.0.0.5", &seed, now);
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["hostname"], "host-id");
        assert_eq!(json["site_id"], 3);
        assert_eq!(json["attributes"]["ip_addr"], "10.0.0.5");
        assert_eq!(json["attributes"]["name"], "h1");
        assert_eq!(json["attributes"]["ip_ver"], "4");
        assert_eq!(json["attributes"]["group"], serde_json::json!([UNASSIGNED_GROUP]));
        assert_eq!(json["attributes"]["createtime"], "2024-05-01T12:00:00Z");
        assert!(json["attributes"].get("bogus").is_none());
        assert!(json["attributes"].get("tag").is_none());
    }

    #[test]
    fn test_seed_groups_and_tags_kept() {
        let seed = SeedAttributes::new().with_group("ops").with_tag("edge");
        let device = NewDevice::new("h", 1, "10.0.0.9", &seed, Utc::now());

        assert_eq!(device.attributes["group"].to_list(), vec!["ops"]);
        assert_eq!(device.attributes["tag"].to_list(), vec!["edge"]);
    }
}
