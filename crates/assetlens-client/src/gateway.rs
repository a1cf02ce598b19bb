//! Remote inventory gateway trait

use async_trait::async_trait;

use assetlens_api::{Asset, ChangePage, SeedAttributes};

use crate::error::Result;

/// Access to the inventory-of-record service
///
/// Each call is a single request/response; failures surface immediately.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Look up the id of the named site
    ///
    /// Fails with `SiteNotFound` when no site matches.
    async fn resolve_site_id(&self, site: &str) -> Result<i64>;

    /// Fetch the device carrying `ip`
    ///
    /// Fails with `AssetNotFound` when no device matches.
    async fn query_by_ip(&self, ip: &str) -> Result<Asset>;

    /// Create a device for `ip` in the given site
    ///
    /// Fails with `AssetCreateRejected` when the service refuses the payload.
    async fn create_asset(&self, site_id: i64, ip: &str, seed: &SeedAttributes) -> Result<Asset>;

    /// Link to the first (newest) page of device changes
    fn first_changes_url(&self, limit: usize) -> Result<String>;

    /// Fetch one page of the change feed
    async fn fetch_changes_page(&self, url: &str) -> Result<ChangePage>;
}
