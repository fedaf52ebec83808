//! Shared list of certificate chains backing a TLS server.
//!
//! Handshakes read a snapshot; the rotation task publishes a new list for
//! every change. Readers never observe a partially updated list.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

type Chains = Arc<[Arc<CertifiedKey>]>;

/// Certificate chains ordered newest first.
pub struct CertificatePool {
    chains: RwLock<Chains>,
}

impl Default for CertificatePool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CertificatePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificatePool").field("chains", &self.len()).finish()
    }
}

impl CertificatePool {
    pub fn new() -> Self {
        Self { chains: RwLock::new(Arc::from(Vec::new())) }
    }

    /// Pool preloaded with `chains`, in the given order.
    pub fn with_chains(chains: Vec<Arc<CertifiedKey>>) -> Self {
        Self { chains: RwLock::new(Arc::from(chains)) }
    }

    /// The current list. Later changes do not affect a snapshot already taken.
    pub fn snapshot(&self) -> Chains {
        Arc::clone(&self.chains.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.chains.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install `chain` ahead of every existing chain.
    pub fn prepend(&self, chain: Arc<CertifiedKey>) {
        let mut guard = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(chain);
        next.extend(guard.iter().cloned());
        *guard = Arc::from(next);
    }

    /// Drop the given chains (matched by identity). Returns how many were removed.
    pub fn remove(&self, doomed: &[Arc<CertifiedKey>]) -> usize {
        if doomed.is_empty() {
            return 0;
        }

        let mut guard = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let next: Vec<_> = guard
            .iter()
            .filter(|chain| !doomed.iter().any(|d| Arc::ptr_eq(d, chain)))
            .cloned()
            .collect();
        let removed = guard.len() - next.len();
        *guard = Arc::from(next);
        removed
    }

    /// Replace the whole list.
    pub fn replace(&self, chains: Vec<Arc<CertifiedKey>>) {
        *self.chains.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(chains);
    }

    /// First chain, newest first, whose key can sign with one of `schemes`.
    pub fn select(&self, schemes: &[rustls::SignatureScheme]) -> Option<Arc<CertifiedKey>> {
        self.snapshot().iter().find(|chain| chain.key.choose_scheme(schemes).is_some()).cloned()
    }
}

impl ResolvesServerCert for CertificatePool {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let selected = self.select(client_hello.signature_schemes());
        if selected.is_none() {
            tracing::warn!(
                chains = self.len(),
                server_name = ?client_hello.server_name(),
                "No certificate chain matches the client's signature schemes"
            );
        }
        selected
    }
}
