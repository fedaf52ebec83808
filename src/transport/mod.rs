//! # Rotating TLS Identities
//!
//! A rustls [`ServerConfig`] whose certificate comes from a
//! [`CertificatePool`] that a background [`Rotator`] keeps supplied with
//! fresh chains from a [`Signer`].
//!
//! ```rust,ignore
//! let (config, handle) = rotating_server_config(None, signer, template).await?;
//! let acceptor = tokio_rustls::TlsAcceptor::from(config);
//! // ...
//! handle.shutdown().await;
//! ```

pub mod keypair;
pub mod pool;
pub mod rotation;

pub use keypair::{certified_key_from_pem, certified_key_from_pem_default, chain_expiry};
pub use pool::CertificatePool;
pub use rotation::{MaintenanceReport, RotationHandle, Rotator};

use std::sync::Arc;

use rustls::ServerConfig;
use tracing::info;

use crate::csr::CertificateRequest;
use crate::errors::{Result, TlsError};
use crate::signer::Signer;

/// Build a server configuration backed by a rotating certificate pool.
///
/// One chain is issued before returning, so the configuration is never handed
/// out empty; a failure there is returned. `base` keeps its settings except
/// for the certificate resolver. Without one, a default configuration on the
/// ring provider with no client authentication is used.
pub async fn rotating_server_config(
    base: Option<ServerConfig>,
    signer: Arc<dyn Signer>,
    request: CertificateRequest,
) -> Result<(Arc<ServerConfig>, RotationHandle)> {
    rotating_server_config_with(base, Rotator::new(signer, request)?).await
}

/// [`rotating_server_config`] with a caller-configured [`Rotator`].
pub async fn rotating_server_config_with(
    base: Option<ServerConfig>,
    rotator: Rotator,
) -> Result<(Arc<ServerConfig>, RotationHandle)> {
    rotator.renew().await?;

    let pool = Arc::clone(rotator.pool());
    let config = match base {
        Some(mut config) => {
            config.cert_resolver = pool;
            config
        }
        None => ServerConfig::builder_with_provider(Arc::clone(rotator.provider()))
            .with_safe_default_protocol_versions()
            .map_err(TlsError::from)?
            .with_no_client_auth()
            .with_cert_resolver(pool),
    };

    info!(
        interval_seconds = rotator.interval().as_secs(),
        chains = rotator.pool().len(),
        "Rotating TLS configuration ready"
    );
    Ok((Arc::new(config), rotator.spawn()))
}
