//! HTTP gateway for the NSoT inventory API

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use assetlens_api::{Asset, ChangePage, Device, NewDevice, SeedAttributes, Site};

use crate::error::{GatewayError, Result};
use crate::gateway::RemoteGateway;

/// Header identifying the caller to NSoT
pub const IDENTITY_HEADER: &str = "X-NSoT-Email";

/// Identity sent when none is configured
pub const DEFAULT_IDENTITY: &str = "sensor@example.tld";

/// Per-request timeout used by [`HttpGateway::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hostname registered for a device created from `ip`
///
/// An IP address is not a legal NSoT hostname, so a name-based UUID in the
/// DNS namespace is used. The same IP always maps to the same hostname.
#[must_use]
pub fn host_identifier(ip: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_DNS, ip.as_bytes()).to_string()
}

/// reqwest-backed [`RemoteGateway`]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    identity: String,
}

impl HttpGateway {
    /// Create a gateway with the default timeout
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    ///
    /// # Example
    /// ```no_run
    /// use assetlens_client::HttpGateway;
    ///
    /// let gateway = HttpGateway::new("http://localhost:8990/api")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a gateway whose requests give up after `timeout`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a gateway with a custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // keep the API prefix when joining relative paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url,
            identity: DEFAULT_IDENTITY.to_string(),
        })
    }

    /// Override the identity header value
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Build a full URL from a path relative to the API root
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(GatewayError::Url)
    }

    /// Perform a GET request and deserialize the response
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(IDENTITY_HEADER, &self.identity)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Check the status and decode a JSON body
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, message });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn resolve_site_id(&self, site: &str) -> Result<i64> {
        let mut url = self.url("sites/")?;
        url.query_pairs_mut().append_pair("name", site);

        let sites: Vec<Site> = self.get(url).await?;
        let site_id = sites
            .first()
            .map(|s| s.id)
            .ok_or_else(|| GatewayError::SiteNotFound(site.to_string()))?;

        debug!(site_id, "resolved site");
        Ok(site_id)
    }

    #[instrument(skip(self))]
    async fn query_by_ip(&self, ip: &str) -> Result<Asset> {
        let mut url = self.url("devices/query/")?;
        url.query_pairs_mut()
            .append_pair("query", &format!("ip_addr={ip}"));

        let devices: Vec<Device> = self.get(url).await?;
        let device = devices
            .first()
            .ok_or_else(|| GatewayError::AssetNotFound(ip.to_string()))?;

        debug!(id = device.id, "device found");
        Ok(Asset::from_device(ip, device))
    }

    #[instrument(skip(self, seed))]
    async fn create_asset(&self, site_id: i64, ip: &str, seed: &SeedAttributes) -> Result<Asset> {
        let url = self.url("devices/")?;
        let body = NewDevice::new(host_identifier(ip), site_id, ip, seed, Utc::now());

        let response = self
            .client
            .post(url)
            .header(IDENTITY_HEADER, &self.identity)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let detail = response.text().await?;
            warn!(%detail, "device creation rejected");
            return Err(GatewayError::AssetCreateRejected(detail));
        }

        let device: Device = Self::decode(response).await?;
        debug!(id = device.id, "device created");
        Ok(Asset::from_device(ip, &device))
    }

    fn first_changes_url(&self, limit: usize) -> Result<String> {
        let mut url = self.url("changes/")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("resource_name", "Device");
        Ok(url.into())
    }

    #[instrument(skip(self))]
    async fn fetch_changes_page(&self, url: &str) -> Result<ChangePage> {
        let url = Url::parse(url)?;
        let page: ChangePage = self.get(url).await?;
        debug!(count = page.count, records = page.results.len(), "fetched change page");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        assert!(HttpGateway::new("http://localhost:8990/api").is_ok());
    }

    #[test]
    fn test_invalid_url() {
        assert!(HttpGateway::new("not a url").is_err());
    }

    #[test]
    fn test_url_keeps_api_prefix() {
        let gateway = HttpGateway::new("http://localhost:8990/api").unwrap();
        let url = gateway.url("sites/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8990/api/sites/");

        let gateway = HttpGateway::new("http://localhost:8990/api/").unwrap();
        let url = gateway.url("devices/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8990/api/devices/");
    }

    #[test]
    fn test_first_changes_url() {
        let gateway = HttpGateway::new("http://localhost:8990/api").unwrap();
        let url = gateway.first_changes_url(10).unwrap();
        assert_eq!(
            url,
            "http://localhost:8990/api/changes/?limit=10&resource_name=Device"
        );
    }

    #[test]
    fn test_host_identifier_is_stable() {
        let a = host_identifier("10.0.0.5");
        assert_eq!(a, host_identifier("10.0.0.5"));
        assert_ne!(a, host_identifier("10.0.0.6"));
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 3);
    }
}
