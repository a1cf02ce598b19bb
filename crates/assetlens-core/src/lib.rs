//! assetlens-core: Asset cache and change-feed invalidation
//!
//! Implements the bounded LRU `CacheStore`, the `ChangePoller` that walks the
//! NSoT change feed, and the `InventoryService` that ties them to a
//! `RemoteGateway`.

pub mod cache;
pub mod config;
pub mod error;
pub mod poller;
pub mod service;

pub use cache::{AssetLru, CacheStore, Invalidation};
pub use config::InventoryConfig;
pub use error::CoreError;
pub use poller::{ChangePoller, PollOutcome, PollerHandle};
pub use service::{InventoryService, Resolution};
