//! Deferred signing and the synchronous retry driver.
//!
//! A backend that cannot complete a signature right away (external approval,
//! batched issuance, a transiently unavailable authority) answers
//! [`Signed::Pending`] with a [`RetryError`]. The continuation is plain state:
//! the original request, the attempt number, a deadline and the backend that
//! knows how to resume it. Retrying after the deadline fails with
//! [`SignError::Expired`] and never reaches the backend.
//!
//! [`synchronous_sign`] turns any signer into a blocking-style call by
//! retrying pending outcomes until a certificate, a terminal error, or the
//! deadline. No backoff is imposed between attempts; pacing belongs to the
//! backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{SignRequest, Signed, Signer};
use crate::errors::{Result, SignError};

/// Backend side of a deferred signature.
#[async_trait]
pub trait Resume: Send + Sync + fmt::Debug {
    /// Make one more attempt at the continuation. May return another
    /// [`Signed::Pending`] (typically built with [`RetryError::next`]).
    async fn resume(&self, pending: &RetryError) -> Result<Signed>;
}

/// A non-terminal signing outcome: resume before `deadline`.
#[derive(Clone)]
pub struct RetryError {
    request: SignRequest,
    attempt: u32,
    deadline: DateTime<Utc>,
    backend: Arc<dyn Resume>,
}

impl fmt::Debug for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryError")
            .field("profile", &self.request.profile)
            .field("hosts", &self.request.hosts)
            .field("attempt", &self.attempt)
            .field("deadline", &self.deadline)
            .field("backend", &self.backend)
            .finish()
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asynchronous callback expiring at {}", self.deadline)
    }
}

impl RetryError {
    /// First continuation for `request`.
    pub fn new(backend: Arc<dyn Resume>, request: SignRequest, deadline: DateTime<Utc>) -> Self {
        Self { request, attempt: 1, deadline, backend }
    }

    /// The continuation following this one, for chained deferrals.
    pub fn next(&self, deadline: DateTime<Utc>) -> Self {
        Self {
            request: self.request.clone(),
            attempt: self.attempt + 1,
            deadline,
            backend: Arc::clone(&self.backend),
        }
    }

    pub fn request(&self) -> &SignRequest {
        &self.request
    }

    /// 1-based attempt number this continuation will perform.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Tighten the deadline to `limit` if that is earlier.
    pub fn cap_deadline(mut self, limit: DateTime<Utc>) -> Self {
        self.deadline = self.deadline.min(limit);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Resume the deferred signature.
    pub async fn retry(&self) -> Result<Signed> {
        self.retry_at(Utc::now()).await
    }

    /// Resume the deferred signature as of `now`.
    pub async fn retry_at(&self, now: DateTime<Utc>) -> Result<Signed> {
        if self.is_expired_at(now) {
            warn!(
                attempt = self.attempt,
                deadline = %self.deadline,
                profile = %self.request.profile,
                "Deferred signature retried after its deadline"
            );
            return Err(SignError::Expired { deadline: self.deadline });
        }

        debug!(
            attempt = self.attempt,
            deadline = %self.deadline,
            profile = %self.request.profile,
            "Retrying deferred signature"
        );
        self.backend.resume(self).await
    }
}

/// Sign `request` and keep retrying deferred outcomes until a certificate or
/// an error comes back.
///
/// `deadline` bounds the whole call: each continuation's own deadline is
/// capped at it, so the call ends with [`SignError::Expired`] rather than
/// retrying past it.
pub async fn synchronous_sign<S>(
    signer: &S,
    request: &SignRequest,
    deadline: DateTime<Utc>,
) -> Result<Vec<u8>>
where
    S: Signer + ?Sized,
{
    let mut outcome = signer.sign(request).await?;
    loop {
        match outcome {
            Signed::Certificate(cert) => return Ok(cert),
            Signed::Pending(pending) => {
                outcome = pending.cap_deadline(deadline).retry().await?;
            }
        }
    }
}
