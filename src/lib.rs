//! # certloom
//!
//! Certificate issuance and rotation for TLS identities.
//!
//! ## Architecture
//!
//! ```text
//! CertificateRequest → CsrGenerator → SignRequest → Signer (RemoteSigner, ...)
//!                                                      ↓ Signed::Pending → synchronous_sign
//!                                  CertificatePool ← Rotator ← certificate PEM
//!                                        ↓
//!                              rustls ServerConfig (cert_resolver)
//! ```
//!
//! ## Core Components
//!
//! - **Signer**: turns a CSR into a certificate under a named profile
//! - **RemoteSigner**: forwards requests to a remote authority over HTTP
//! - **Retry protocol**: deferred signatures with a deadline
//! - **Rotating pool**: keeps a TLS server supplied with unexpired chains
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use certloom::config::{SigningPolicy, SigningProfile};
//! use certloom::csr::CertificateRequest;
//! use certloom::signer::RemoteSigner;
//! use certloom::transport::rotating_server_config;
//!
//! #[tokio::main]
//! async fn main() -> certloom::Result<()> {
//!     let policy = SigningPolicy::new(SigningProfile::default().with_remote("ca.internal"));
//!     let signer = Arc::new(RemoteSigner::new(policy)?);
//!     let template = CertificateRequest::new("api", vec!["api.internal".to_string()]);
//!
//!     let (config, rotation) = rotating_server_config(None, signer, template).await?;
//!     let _acceptor = config;
//!     rotation.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod csr;
pub mod errors;
pub mod observability;
pub mod output;
pub mod secret;
pub mod signer;
pub mod transport;

// Re-export commonly used types and traits
pub use config::{SigningPolicy, SigningProfile};
pub use errors::{Result, SignError, TlsError};
pub use observability::init_logging;
pub use signer::{synchronous_sign, RetryError, SignRequest, Signed, Signer};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }
}
