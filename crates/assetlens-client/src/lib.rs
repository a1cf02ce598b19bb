//! assetlens-client: NSoT inventory gateway
//!
//! Defines the [`RemoteGateway`] trait used by the cache service and the
//! reqwest-backed [`HttpGateway`] that talks to the inventory API.
//!
//! # Example
//!
//! ```no_run
//! use assetlens_client::{HttpGateway, RemoteGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new("http://localhost:8990/api")?;
//!
//! let site_id = gateway.resolve_site_id("app").await?;
//! let asset = gateway.query_by_ip("10.0.0.5").await?;
//! println!("site {site_id}: {:?}", asset.groups);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod http;

pub use error::{GatewayError, Result};
pub use gateway::RemoteGateway;
pub use http::{DEFAULT_IDENTITY, DEFAULT_TIMEOUT, HttpGateway, IDENTITY_HEADER, host_identifier};
