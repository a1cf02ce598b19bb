//! Error types for the inventory gateway

use thiserror::Error;

/// Errors that can occur when talking to the inventory service
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No site matches the configured name
    #[error("site not found: {0}")]
    SiteNotFound(String),

    /// No device carries this IP address
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// The service refused to create the device
    #[error("asset creation rejected: {0}")]
    AssetCreateRejected(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// Request timed out
    #[error("request timed out")]
    Timeout,

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Service returned an unexpected status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Http(err)
        }
    }
}

impl GatewayError {
    /// Network, decoding or unexpected-status failure
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Http(_)
                | GatewayError::Timeout
                | GatewayError::Json(_)
                | GatewayError::Url(_)
                | GatewayError::Api { .. }
        )
    }

    /// Failure that must abort service startup
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::SiteNotFound(_))
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
