//! Error types for digest resolution.

use reqwest::StatusCode;
use thiserror::Error;

/// Placeholder reported when a failed manifest response has no
/// `www-authenticate` header.
pub const NOT_PRESENT: &str = "not present";

/// Errors from a digest lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// DNS, connect, TLS or timeout failure on either round trip.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token endpoint answered with a non-200 status. Displays as the
    /// raw response body.
    #[error("{body}")]
    Auth { status: StatusCode, body: String },

    /// The manifest endpoint answered with a non-200 status.
    #[error("registry responded to head request to {url} with \"{status}\", auth: \"{www_authenticate}\"")]
    Manifest {
        url: String,
        status: StatusCode,
        www_authenticate: String,
    },

    /// The token response was not the expected JSON document.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller cancelled the lookup while a request was in flight.
    #[error("digest lookup cancelled")]
    Cancelled,

    /// The image reference is empty or cannot be parsed.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    /// A configured endpoint is not a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RegistryError {
    /// Returns true if the registry rejected our credentials or token.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            RegistryError::Auth { status, .. } | RegistryError::Manifest { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    /// Returns true if the lookup was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistryError::Cancelled)
    }
}
