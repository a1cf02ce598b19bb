//! Core error types for assetlens-core

use thiserror::Error;

use assetlens_client::GatewayError;

/// Errors that can occur while building or running the inventory service
#[derive(Error, Debug)]
pub enum CoreError {
    /// The configured site does not exist remotely
    #[error("site not found: {0}")]
    SiteNotFound(String),

    /// Remote inventory call failed
    #[error("inventory gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// Lift a gateway error, keeping site resolution failures distinct
    #[must_use]
    pub fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::SiteNotFound(site) => CoreError::SiteNotFound(site),
            other => CoreError::Gateway(other),
        }
    }
}
