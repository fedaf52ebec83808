//! # Error Handling
//!
//! Error types for signing, remote delegation and certificate rotation.
//! Certificate material problems (PEM/DER parsing, key-pair assembly) live in
//! [`TlsError`] and are wrapped by [`SignError::Tls`] when they cross into the
//! signing layer.

pub mod tls;

pub use tls::TlsError;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for signing operations.
pub type Result<T> = std::result::Result<T, SignError>;

/// Errors that can occur while issuing or rotating certificates.
#[derive(Error, Debug)]
pub enum SignError {
    /// Missing or invalid signing policy, profile or remote configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The sign request itself is unacceptable for the resolved profile.
    #[error("Invalid sign request: {reason}")]
    InvalidRequest { reason: String },

    /// Request could not be encoded, or a response could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network failure talking to a remote authority.
    #[error("HTTP request failed: {message}")]
    Http { message: String, status: Option<u16> },

    /// The remote authority answered but refused to sign.
    #[error("Remote authority error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The auth provider could not compute a token.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// A deferred signing continuation was retried past its deadline.
    #[error("asynchronous callback has expired (deadline {deadline})")]
    Expired { deadline: DateTime<Utc> },

    /// Key or certificate signing request generation failed.
    #[error("Certificate request error: {message}")]
    Csr { message: String },

    /// Certificate material could not be turned into a usable TLS identity.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SignError {
    /// Create a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }

    /// Create an HTTP error without a status code.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http { message: message.into(), status: None }
    }

    /// Create an HTTP error carrying the response status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Http { message: message.into(), status: Some(status) }
    }

    /// Create a remote authority error.
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote { code, message: message.into() }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    /// Create a CSR generation error.
    pub fn csr(message: impl Into<String>) -> Self {
        Self::Csr { message: message.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the failure is transient transport trouble a backend may choose
    /// to defer and retry (timeouts, rate limiting, 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status: Some(status), .. } => *status == 429 || *status >= 500,
            Self::Http { status: None, message } => {
                let message = message.to_lowercase();
                message.contains("timed out")
                    || message.contains("timeout")
                    || message.contains("connection refused")
                    || message.contains("connection reset")
                    || message.contains("connection closed")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SignError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::http_status(status.as_u16(), error.to_string()),
            None if error.is_timeout() => Self::http(format!("request timed out: {}", error)),
            None => Self::http(error.to_string()),
        }
    }
}
