//! Metric enrichment
//!
//! Tags telemetry records with the groups of the asset owning their IP
//! address, emitting one record per group.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use assetlens_api::SeedAttributes;
use assetlens_core::InventoryService;

/// Tags copied from a record into the attributes of a newly created device
const SEED_TAGS: [&str; 2] = ["name", "ip_ver"];

/// Tags marking addresses that are never assets
const NON_ASSET_FLAGS: [&str; 2] = ["is_broadcast", "is_multicast"];

/// A telemetry record in Telegraf's JSON format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Metric {
    fn flag(&self, tag: &str) -> bool {
        self.tags.get(tag).is_some_and(|value| value == "true")
    }
}

/// Enriches metrics through an [`InventoryService`]
pub struct Processor {
    service: Arc<InventoryService>,
    tag: String,
}

impl Processor {
    /// Create a processor reading the IP address from `tag`
    pub fn new(service: Arc<InventoryService>, tag: impl Into<String>) -> Self {
        Self {
            service,
            tag: tag.into(),
        }
    }

    /// Enrich a batch of metrics
    pub async fn apply(&self, metrics: Vec<Metric>) -> Vec<Metric> {
        let mut out = Vec::with_capacity(metrics.len());
        for metric in metrics {
            out.extend(self.process(metric).await);
        }
        out
    }

    /// Enrich one metric, fanning it out to one copy per asset group
    ///
    /// Records without an IP tag, broadcast/multicast records and records
    /// whose asset cannot be resolved pass through unchanged.
    pub async fn process(&self, mut metric: Metric) -> Vec<Metric> {
        // url carries no information once the record is collected
        metric.tags.remove("url");

        let Some(ip) = metric.tags.get(&self.tag).cloned() else {
            return vec![metric];
        };

        if NON_ASSET_FLAGS.iter().any(|flag| metric.flag(flag)) {
            return vec![metric];
        }

        let seed = SEED_TAGS
            .iter()
            .filter_map(|key| metric.tags.get(*key).map(|value| (*key, value.clone())))
            .fold(SeedAttributes::new(), |seed, (key, value)| {
                seed.with_attribute(key, value)
            });

        let Some(asset) = self.service.resolve(&ip, &seed).await.into_asset() else {
            debug!(%ip, "passing metric through unenriched");
            return vec![metric];
        };

        asset
            .groups
            .iter()
            .map(|group| {
                let mut copy = metric.clone();
                copy.tags.insert("group".to_string(), group.clone());
                copy
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use assetlens_api::{Asset, ChangePage};
    use assetlens_client::{GatewayError, RemoteGateway};
    use assetlens_core::InventoryConfig;

    use super::*;

    struct StaticGateway {
        devices: HashMap<String, Vec<String>>,
        offline: bool,
        seeds: Mutex<Vec<SeedAttributes>>,
    }

    #[async_trait]
    impl RemoteGateway for StaticGateway {
        async fn resolve_site_id(&self, _site: &str) -> Result<i64, GatewayError> {
            Ok(1)
        }

        async fn query_by_ip(&self, ip: &str) -> Result<Asset, GatewayError> {
            if self.offline {
                return Err(GatewayError::Timeout);
            }
            let groups = self
                .devices
                .get(ip)
                .ok_or_else(|| GatewayError::AssetNotFound(ip.to_string()))?;
            Ok(Asset {
                id: 1,
                ip_address: ip.to_string(),
                attributes: BTreeMap::new(),
                groups: groups.clone(),
                tags: Default::default(),
                created_at: None,
                updated_at: None,
            })
        }

        async fn create_asset(
            &self,
            _site_id: i64,
            ip: &str,
            seed: &SeedAttributes,
        ) -> Result<Asset, GatewayError> {
            self.seeds.lock().unwrap().push(seed.clone());
            Ok(Asset {
                id: 2,
                ip_address: ip.to_string(),
                attributes: BTreeMap::new(),
                groups: vec![assetlens_api::UNASSIGNED_GROUP.to_string()],
                tags: Default::default(),
                created_at: None,
                updated_at: None,
            })
        }

        fn first_changes_url(&self, _limit: usize) -> Result<String, GatewayError> {
            Ok("changes".to_string())
        }

        async fn fetch_changes_page(&self, _url: &str) -> Result<ChangePage, GatewayError> {
            Ok(ChangePage {
                count: 0,
                results: Vec::new(),
                next: None,
            })
        }
    }

    async fn processor(offline: bool) -> (Processor, Arc<StaticGateway>) {
        let mut devices = HashMap::new();
        devices.insert(
            "10.0.0.1".to_string(),
            vec!["netops".to_string(), "dc1".to_string()],
        );
        devices.insert("10.0.0.2".to_string(), Vec::new());

        let gateway = Arc::new(StaticGateway {
            devices,
            offline,
            seeds: Mutex::new(Vec::new()),
        });
        let config = InventoryConfig {
            poll_interval_secs: 3600,
            ..InventoryConfig::default()
        };
        let service = InventoryService::connect(&config, gateway.clone())
            .await
            .unwrap();
        (Processor::new(Arc::new(service), "ip"), gateway)
    }

    fn metric(tags: &[(&str, &str)]) -> Metric {
        Metric {
            name: "netflow".to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            fields: Map::new(),
            timestamp: Some(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn test_fans_out_per_group() {
        let (processor, _) = processor(false).await;
        let out = processor
            .process(metric(&[("ip", "10.0.0.1"), ("url", "http://collector")]))
            .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].tags["group"], "netops");
        assert_eq!(out[1].tags["group"], "dc1");
        assert!(out.iter().all(|m| !m.tags.contains_key("url")));
        assert!(out.iter().all(|m| m.timestamp == Some(1_700_000_000)));
    }

    #[tokio::test]
    async fn test_asset_without_groups_emits_nothing() {
        let (processor, _) = processor(false).await;
        let out = processor.process(metric(&[("ip", "10.0.0.2")])).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_cases() {
        let (processor, gateway) = processor(false).await;

        let untagged = metric(&[("host", "probe1"), ("url", "x")]);
        let out = processor.process(untagged).await;
        assert_eq!(out, vec![metric(&[("host", "probe1")])]);

        let broadcast = metric(&[("ip", "10.255.255.255"), ("is_broadcast", "true")]);
        assert_eq!(processor.process(broadcast.clone()).await, vec![broadcast]);

        let multicast = metric(&[("ip", "224.0.0.1"), ("is_multicast", "true")]);
        assert_eq!(processor.process(multicast.clone()).await, vec![multicast]);

        assert!(gateway.seeds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_passes_through() {
        let (processor, _) = processor(true).await;
        let input = metric(&[("ip", "10.0.0.1")]);
        assert_eq!(processor.process(input.clone()).await, vec![input]);
    }

    #[tokio::test]
    async fn test_unknown_ip_created_with_seed_tags() {
        let (processor, gateway) = processor(false).await;
        let out = processor
            .process(metric(&[("ip", "10.0.0.9"), ("name", "h1"), ("ip_ver", "4"), ("port", "80")]))
            .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tags["group"], assetlens_api::UNASSIGNED_GROUP);

        let seeds = gateway.seeds.lock().unwrap();
        assert_eq!(
            seeds[0],
            SeedAttributes::new()
                .with_attribute("name", "h1")
                .with_attribute("ip_ver", "4")
        );
    }

    #[tokio::test]
    async fn test_apply_batch() {
        let (processor, _) = processor(false).await;
        let out = processor
            .apply(vec![
                metric(&[("ip", "10.0.0.1")]),
                metric(&[("host", "probe1")]),
            ])
            .await;
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_metric_json_roundtrip_shape() {
        let line = r#"{"name":"ping","tags":{"ip":"10.0.0.1"},"fields":{"rtt":1.5},"timestamp":1700000000}"#;
        let metric: Metric = serde_json::from_str(line).unwrap();
        assert_eq!(metric.tags["ip"], "10.0.0.1");
        assert_eq!(metric.fields["rtt"], 1.5);
        assert_eq!(serde_json::to_string(&metric).unwrap(), line);
    }
}
