//! Common test utilities for all integration tests.
//!
//! Provides an in-process certificate authority and local signers backed by
//! it, so rotation and handshake tests run without a remote authority.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::Context;
use async_trait::async_trait;
use certloom::config::{SigningPolicy, SigningProfile};
use certloom::signer::{Resume, RetryError, SignRequest, Signed, Signer};
use certloom::transport::certified_key_from_pem_default;
use certloom::{Result, SignError};
use chrono::Utc;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DnType,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{pem::PemObject, CertificateDer};
use rustls::sign::CertifiedKey;
use time::{Duration, OffsetDateTime};

/// Default profile expiry used by the local signers: a one hour rotation interval.
pub const TEST_EXPIRY: StdDuration = StdDuration::from_secs(2 * 60 * 60);

pub fn interval() -> Duration {
    Duration::seconds((TEST_EXPIRY.as_secs() / 2) as i64)
}

/// Self-signed CA that signs CSRs with a caller-chosen validity.
pub struct TestAuthority {
    cert_pem: String,
    key: KeyPair,
}

impl fmt::Debug for TestAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestAuthority").finish_non_exhaustive()
    }
}

impl TestAuthority {
    pub fn new() -> anyhow::Result<Self> {
        let key = KeyPair::generate().context("generate CA key")?;
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, "certloom test CA");
        params.distinguished_name.push(DnType::OrganizationName, "certloom");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).context("self-sign CA")?;
        Ok(Self { cert_pem: cert.pem(), key })
    }

    pub fn ca_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn ca_der(&self) -> anyhow::Result<CertificateDer<'static>> {
        CertificateDer::from_pem_slice(self.cert_pem.as_bytes()).context("parse CA PEM")
    }

    /// Sign `csr_pem`; the certificate expires `valid_for` from now (negative
    /// for an already expired certificate).
    pub fn sign_csr(&self, csr_pem: &str, valid_for: Duration) -> anyhow::Result<String> {
        let mut csr = CertificateSigningRequestParams::from_pem(csr_pem).context("parse CSR")?;
        let now = OffsetDateTime::now_utc();
        csr.params.not_before = now - Duration::days(2);
        csr.params.not_after = now + valid_for;
        csr.params.is_ca = IsCa::NoCa;
        csr.params.extended_key_usages =
            vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];

        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &self.key).context("load issuer")?;
        let cert = csr.signed_by(&issuer).context("sign CSR")?;
        Ok(cert.pem())
    }

    /// Issue a chain for `localhost` over a fresh key, ready for a pool.
    pub fn chain(&self, valid_for: Duration) -> anyhow::Result<Arc<CertifiedKey>> {
        let key = KeyPair::generate().context("generate leaf key")?;
        let mut params = CertificateParams::new(vec!["localhost".to_string()])
            .context("build leaf params")?;
        params.distinguished_name.push(DnType::CommonName, "localhost");
        let csr = params.serialize_request(&key).context("build CSR")?;
        let cert_pem = self.sign_csr(&csr.pem().context("encode CSR")?, valid_for)?;

        certified_key_from_pem_default(cert_pem.as_bytes(), key.serialize_pem().as_bytes())
            .context("assemble chain")
    }
}

fn test_policy() -> SigningPolicy {
    SigningPolicy::new(SigningProfile::default().with_expiry(TEST_EXPIRY))
}

/// Resumes a deferred signature by signing with the test authority.
#[derive(Debug)]
struct AuthorityBackend {
    authority: Arc<TestAuthority>,
    valid_for: Duration,
    resumes: Arc<AtomicUsize>,
}

#[async_trait]
impl Resume for AuthorityBackend {
    async fn resume(&self, pending: &RetryError) -> Result<Signed> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        let cert = self
            .authority
            .sign_csr(&pending.request().request, self.valid_for)
            .map_err(|e| SignError::internal(e.to_string()))?;
        Ok(Signed::Certificate(cert.into_bytes()))
    }
}

/// Signer that issues directly from a [`TestAuthority`] and counts calls.
#[derive(Debug)]
pub struct LocalSigner {
    authority: Arc<TestAuthority>,
    policy: SigningPolicy,
    valid_for: Mutex<Duration>,
    signs: AtomicUsize,
    resumes: Arc<AtomicUsize>,
    failing: AtomicBool,
    deferred: AtomicBool,
}

impl LocalSigner {
    /// Issues certificates valid for one day under a two hour default expiry.
    pub fn new(authority: Arc<TestAuthority>) -> Self {
        Self {
            authority,
            policy: test_policy(),
            valid_for: Mutex::new(Duration::days(1)),
            signs: AtomicUsize::new(0),
            resumes: Arc::new(AtomicUsize::new(0)),
            failing: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: SigningPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_valid_for(&self, valid_for: Duration) {
        *self.valid_for.lock().unwrap() = valid_for;
    }

    /// Make every sign call fail with a remote error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Answer every sign call with a pending continuation first.
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::SeqCst);
    }

    pub fn sign_count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn authority(&self) -> &Arc<TestAuthority> {
        &self.authority
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign(&self, request: &SignRequest) -> Result<Signed> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignError::remote(5000, "authority unavailable"));
        }

        let valid_for = *self.valid_for.lock().unwrap();
        if self.deferred.load(Ordering::SeqCst) {
            let backend = Arc::new(AuthorityBackend {
                authority: Arc::clone(&self.authority),
                valid_for,
                resumes: Arc::clone(&self.resumes),
            });
            let deadline = Utc::now() + chrono::Duration::minutes(1);
            return Ok(Signed::Pending(RetryError::new(backend, request.clone(), deadline)));
        }

        let cert = self
            .authority
            .sign_csr(&request.request, valid_for)
            .map_err(|e| SignError::internal(e.to_string()))?;
        Ok(Signed::Certificate(cert.into_bytes()))
    }

    fn policy(&self) -> &SigningPolicy {
        &self.policy
    }
}

/// Authority plus a signer over it, shared the way the crate expects.
pub fn local_signer() -> anyhow::Result<(Arc<TestAuthority>, Arc<LocalSigner>)> {
    let authority = Arc::new(TestAuthority::new()?);
    let signer = Arc::new(LocalSigner::new(Arc::clone(&authority)));
    Ok((authority, signer))
}
