//! Signer abstraction.
//!
//! A [`Signer`] turns a [`SignRequest`] (PEM CSR plus the hosts and profile
//! it should be issued under) into a signed certificate. Implementations may
//! sign locally with a CA key or delegate to a remote authority
//! ([`RemoteSigner`]). A backend that cannot finish immediately answers with
//! [`Signed::Pending`], carrying a [`RetryError`] continuation that callers
//! can drive to completion with [`synchronous_sign`].
//!
//! # Example
//!
//! ```rust,ignore
//! use certloom::config::{SigningPolicy, SigningProfile};
//! use certloom::signer::{synchronous_sign, RemoteSigner, SignRequest};
//!
//! let policy = SigningPolicy::new(SigningProfile::default().with_remote("ca.internal:8888"));
//! let signer = RemoteSigner::new(policy)?;
//!
//! let request = SignRequest::new(vec!["api.internal".into()], csr_pem);
//! let deadline = chrono::Utc::now() + chrono::Duration::minutes(5);
//! let cert_pem = synchronous_sign(&signer, &request, deadline).await?;
//! ```

pub mod client;
pub mod remote;
pub mod retry;

pub use client::{RemoteClient, SignResponse};
pub use remote::RemoteSigner;
pub use retry::{synchronous_sign, Resume, RetryError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SigningPolicy;
use crate::errors::Result;

/// One RDN set of a subject name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    #[serde(rename = "C", default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(rename = "ST", default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(rename = "L", default, skip_serializing_if = "String::is_empty")]
    pub locality: String,
    #[serde(rename = "O", default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    #[serde(rename = "OU", default, skip_serializing_if = "String::is_empty")]
    pub organizational_unit: String,
}

/// Subject fields that supersede the subject carried in the CSR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "CN", default)]
    pub common_name: String,
    #[serde(default)]
    pub names: Vec<Name>,
}

/// A request to sign a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    /// Hostnames (DNS names or IP addresses) the certificate is issued for.
    pub hosts: Vec<String>,
    /// PEM-encoded certificate signing request.
    #[serde(rename = "certificate_request")]
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// Signing profile name; empty selects the default profile.
    #[serde(default)]
    pub profile: String,
    /// Selects among multiple roots; empty selects the default root.
    #[serde(default)]
    pub label: String,
}

impl SignRequest {
    pub fn new(hosts: Vec<String>, request: impl Into<String>) -> Self {
        Self { hosts, request: request.into(), ..Default::default() }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Outcome of a sign call.
#[derive(Debug)]
pub enum Signed {
    /// Certificate bytes as produced by the signing authority (PEM in practice).
    Certificate(Vec<u8>),
    /// The backend deferred completion; retry the continuation before its deadline.
    Pending(RetryError),
}

impl Signed {
    /// The certificate, if signing already completed.
    pub fn certificate(&self) -> Option<&[u8]> {
        match self {
            Self::Certificate(cert) => Some(cert),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Capability that turns a certificate request into a signed certificate.
///
/// Implementations must be thread-safe; the rotation loop and TLS handshakes
/// share one signer across tasks.
#[async_trait]
pub trait Signer: Send + Sync + std::fmt::Debug {
    /// Sign the request under its resolved profile.
    ///
    /// # Errors
    ///
    /// - `SignError::Config` if no usable profile resolves
    /// - `SignError::InvalidRequest` if the request does not satisfy the profile
    /// - `SignError::Http` / `SignError::Remote` on delegation failures
    async fn sign(&self, request: &SignRequest) -> Result<Signed>;

    /// The signing policy this signer enforces.
    fn policy(&self) -> &SigningPolicy;
}
