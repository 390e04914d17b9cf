//! Error types for the network layer.

use thiserror::Error;

/// Errors raised while talking to the remote authority or serving commands.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No network path to the authority
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The authority did not answer in time
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    /// The request failed before a reply was received
    #[error("request failed: {0}")]
    Request(String),

    /// The authority answered with a non-success status
    #[error("server error: {0}")]
    Status(u16),

    /// The configured authority URL is unusable
    #[error("invalid authority URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The command endpoint could not bind its listener
    #[error("failed to bind command endpoint on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The gate controller is not consuming commands
    #[error("gate controller unavailable")]
    ControllerUnavailable,

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    pub fn invalid_base_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error means the link itself is gone.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportUnavailable)
    }
}

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
