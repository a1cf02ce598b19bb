//! `InventoryService`: cache-backed asset resolution
//!
//! Owns the gateway, the cache and the background change poller, and exposes
//! `resolve` to the metric processor.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use assetlens_api::{Asset, SeedAttributes};
use assetlens_client::{GatewayError, RemoteGateway};

use crate::cache::CacheStore;
use crate::config::InventoryConfig;
use crate::error::CoreError;
use crate::poller::{ChangePoller, PollOutcome, PollerHandle};

/// Outcome of resolving an IP address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Served from the local cache
    Cached(Arc<Asset>),
    /// Fetched from the inventory after a cache miss
    Fetched(Arc<Asset>),
    /// Created remotely because no device carried the IP
    Created(Arc<Asset>),
    /// Lookup failed; the record should pass through unenriched
    Unresolved,
}

impl Resolution {
    /// The resolved asset, if any
    #[must_use]
    pub fn asset(&self) -> Option<&Arc<Asset>> {
        match self {
            Resolution::Cached(asset) | Resolution::Fetched(asset) | Resolution::Created(asset) => {
                Some(asset)
            }
            Resolution::Unresolved => None,
        }
    }

    #[must_use]
    pub fn into_asset(self) -> Option<Arc<Asset>> {
        match self {
            Resolution::Cached(asset) | Resolution::Fetched(asset) | Resolution::Created(asset) => {
                Some(asset)
            }
            Resolution::Unresolved => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

/// Cache-backed asset resolver
pub struct InventoryService {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<CacheStore>,
    site_id: i64,
    poller: ChangePoller,
    poller_handle: Mutex<Option<PollerHandle>>,
}

impl InventoryService {
    /// Build a fully initialised service and start its change poller
    ///
    /// Resolves the configured site and primes the change-feed checkpoint
    /// before returning.
    ///
    /// # Errors
    /// Returns `SiteNotFound` if the site does not exist, `ConfigError` for
    /// invalid settings, or `Gateway` if the inventory cannot be reached.
    #[instrument(skip(config, gateway), fields(site = %config.site))]
    pub async fn connect(
        config: &InventoryConfig,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let site_id = gateway
            .resolve_site_id(&config.site)
            .await
            .map_err(CoreError::from_gateway)?;

        let cache = Arc::new(CacheStore::new(config.cache_size));
        let poller = ChangePoller::new(gateway.clone(), cache.clone(), config.change_page_size);
        poller.prime().await?;

        let handle = poller.clone().spawn(config.poll_interval());

        info!(site_id, capacity = config.cache_size, "inventory service ready");

        Ok(Self {
            gateway,
            cache,
            site_id,
            poller,
            poller_handle: Mutex::new(Some(handle)),
        })
    }

    /// Id of the site new devices are created in
    #[must_use]
    pub fn site_id(&self) -> i64 {
        self.site_id
    }

    /// The underlying cache
    #[must_use]
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Resolve an IP to its asset, creating the device remotely if needed
    ///
    /// Network calls run outside the cache lock. Failures other than a
    /// missing device are logged and reported as [`Resolution::Unresolved`].
    #[instrument(skip(self, seed))]
    pub async fn resolve(&self, ip: &str, seed: &SeedAttributes) -> Resolution {
        if let Some(asset) = self.cache.lookup(ip).await {
            debug!("cache hit");
            return Resolution::Cached(asset);
        }

        match self.gateway.query_by_ip(ip).await {
            Ok(asset) => return Resolution::Fetched(self.cache.get_or_insert(asset).await),
            Err(GatewayError::AssetNotFound(_)) => {
                debug!("asset not in inventory, creating");
            }
            Err(e) => {
                error!(error = %e, "asset lookup failed");
                return Resolution::Unresolved;
            }
        }

        match self.gateway.create_asset(self.site_id, ip, seed).await {
            Ok(asset) => {
                info!(id = asset.id, "asset created");
                Resolution::Created(self.cache.get_or_insert(asset).await)
            }
            Err(e) => {
                error!(error = %e, "asset creation failed");
                Resolution::Unresolved
            }
        }
    }

    /// Run a poll cycle immediately, outside the periodic schedule
    pub async fn poll_now(&self) -> PollOutcome {
        self.poller.poll_once().await
    }

    /// Stop the background poller; further calls are no-ops
    pub async fn shutdown(&self) {
        let handle = self.poller_handle.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                info!("inventory service stopped");
            }
            None => warn!("inventory service already stopped"),
        }
    }
}
