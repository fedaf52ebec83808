//! Background maintenance of a [`CertificatePool`].
//!
//! Every tick evicts chains that no longer parse or have expired, then asks
//! the signer for a fresh chain when none of the survivors outlives two
//! intervals. The interval is half the signer's default profile expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::keypair::{certified_key_from_pem, chain_expiry};
use super::pool::CertificatePool;
use crate::csr::{CertificateRequest, CsrGenerator, RcgenCsrGenerator};
use crate::errors::{Result, SignError};
use crate::signer::{synchronous_sign, SignRequest, Signer};

/// What one maintenance tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Chains dropped because a certificate in them failed to parse.
    pub evicted_unparsable: usize,
    /// Chains dropped because the leaf had expired.
    pub evicted_expired: usize,
    /// Chains left in place before any renewal.
    pub kept: usize,
    /// A new chain was signed and prepended.
    pub renewed: bool,
    /// Why a required renewal failed.
    pub renewal_error: Option<String>,
}

impl MaintenanceReport {
    pub fn evicted(&self) -> usize {
        self.evicted_unparsable + self.evicted_expired
    }
}

/// Keeps a pool stocked with chains issued by `signer` for `template`.
#[derive(Debug)]
pub struct Rotator {
    signer: Arc<dyn Signer>,
    template: CertificateRequest,
    pool: Arc<CertificatePool>,
    csr_generator: Arc<dyn CsrGenerator>,
    provider: Arc<CryptoProvider>,
    interval: Duration,
    interval_span: chrono::Duration,
}

impl Rotator {
    /// Fails if the signer's default expiry yields a zero interval.
    pub fn new(signer: Arc<dyn Signer>, template: CertificateRequest) -> Result<Self> {
        let interval = signer.policy().default.expiry / 2;
        if interval.is_zero() {
            return Err(SignError::config_error(
                "default profile expiry is too short for certificate rotation",
            ));
        }
        let interval_span = chrono::Duration::from_std(interval).map_err(|e| {
            SignError::config_error(format!("rotation interval out of range: {}", e))
        })?;

        Ok(Self {
            signer,
            template,
            pool: Arc::new(CertificatePool::new()),
            csr_generator: Arc::new(RcgenCsrGenerator),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            interval,
            interval_span,
        })
    }

    /// Maintain an existing pool instead of a fresh empty one.
    pub fn with_pool(mut self, pool: Arc<CertificatePool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_csr_generator(mut self, generator: Arc<dyn CsrGenerator>) -> Self {
        self.csr_generator = generator;
        self
    }

    /// Provider used to load renewed keys.
    pub fn with_provider(mut self, provider: Arc<CryptoProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn pool(&self) -> &Arc<CertificatePool> {
        &self.pool
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Generate a key and CSR, get it signed and prepend the resulting chain.
    ///
    /// Deferred signatures are retried until one interval from now.
    pub async fn renew(&self) -> Result<Arc<CertifiedKey>> {
        let generated = self.csr_generator.generate(&self.template)?;
        let request = SignRequest::new(self.template.hosts.clone(), generated.csr_pem);
        let deadline = Utc::now()
            .checked_add_signed(self.interval_span)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let cert_pem = synchronous_sign(self.signer.as_ref(), &request, deadline).await?;
        let chain = certified_key_from_pem(
            &cert_pem,
            generated.key_pem.expose_secret().as_bytes(),
            &self.provider,
        )?;
        let expires_at = chain_expiry(&chain.cert).ok();

        let chain = Arc::new(chain);
        self.pool.prepend(Arc::clone(&chain));
        info!(
            chains = self.pool.len(),
            expires_at = ?expires_at,
            "Installed renewed certificate chain"
        );
        Ok(chain)
    }

    /// Run one maintenance tick against the wall clock.
    pub async fn maintain(&self) -> MaintenanceReport {
        self.maintain_at(Utc::now()).await
    }

    /// Run one maintenance tick as of `now`.
    pub async fn maintain_at(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let span = crate::rotation_span!("maintain", now = %now);
        self.tick(now).instrument(span).await
    }

    async fn tick(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let snapshot = self.pool.snapshot();
        info!(chains = snapshot.len(), "Checking certificate chains");

        let horizon = self
            .interval_span
            .checked_mul(2)
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut report = MaintenanceReport::default();
        let mut doomed = Vec::new();
        let mut have_good_cert = false;

        for chain in snapshot.iter() {
            match chain_expiry(&chain.cert) {
                Err(e) => {
                    error!(error = %e, "Evicting certificate chain that failed to parse");
                    report.evicted_unparsable += 1;
                    doomed.push(Arc::clone(chain));
                }
                Ok(expires_at) if expires_at < now => {
                    info!(expires_at = %expires_at, "Evicting expired certificate chain");
                    report.evicted_expired += 1;
                    doomed.push(Arc::clone(chain));
                }
                Ok(expires_at) => {
                    if expires_at > horizon {
                        have_good_cert = true;
                    }
                    report.kept += 1;
                }
            }
        }

        self.pool.remove(&doomed);

        if have_good_cert {
            debug!(kept = report.kept, "Certificate pool healthy");
            return report;
        }

        match self.renew().await {
            Ok(_) => report.renewed = true,
            Err(e) => {
                error!(error = %e, "Failed to renew certificate chain");
                report.renewal_error = Some(e.to_string());
            }
        }
        report
    }

    /// Run ticks every interval on a background task until shut down.
    ///
    /// The first tick happens one interval from now.
    pub fn spawn(self) -> RotationHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let pool = Arc::clone(&self.pool);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let start = Instant::now().checked_add(interval).unwrap_or_else(Instant::now);
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_seconds = interval.as_secs(), "Certificate rotation started");
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        info!("Certificate rotation stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.maintain().await;
                        if report.renewal_error.is_some() {
                            warn!(
                                chains = self.pool.len(),
                                "Maintenance tick left the pool without a long-lived chain"
                            );
                        }
                    }
                }
            }
        });

        RotationHandle { token, task, pool }
    }
}

/// Owner of a running rotation task.
///
/// Dropping the handle without calling [`RotationHandle::shutdown`] leaves the
/// task running for the life of the runtime.
#[derive(Debug)]
pub struct RotationHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    pool: Arc<CertificatePool>,
}

impl RotationHandle {
    pub fn pool(&self) -> &Arc<CertificatePool> {
        &self.pool
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Certificate rotation task ended abnormally");
        }
    }
}
