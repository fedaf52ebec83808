//! PEM material to rustls identities, and chain expiry.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use x509_parser::prelude::*;

use crate::errors::TlsError;

/// Assemble a [`CertifiedKey`] from a PEM chain (leaf first) and a PEM key.
///
/// The key is loaded through `provider` and checked against the leaf's public
/// key.
pub fn certified_key_from_pem(
    cert_pem: &[u8],
    key_pem: &[u8],
    provider: &CryptoProvider,
) -> Result<CertifiedKey, TlsError> {
    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(cert_pem)
        .map(|result| {
            result.map_err(|err| TlsError::InvalidCertificatePem { source: anyhow!(err) })
        })
        .collect::<Result<_, _>>()?;

    if chain.is_empty() {
        return Err(TlsError::EmptyCertificateChain);
    }

    let key = PrivateKeyDer::from_pem_slice(key_pem)
        .map_err(|err| TlsError::InvalidPrivateKey { source: Some(anyhow!(err)) })?;

    CertifiedKey::from_der(chain, key, provider).map_err(|err| match err {
        rustls::Error::InconsistentKeys(_) => TlsError::CertificateKeyMismatch,
        other => TlsError::Rustls(other),
    })
}

/// [`certified_key_from_pem`] with the ring provider.
pub fn certified_key_from_pem_default(
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<Arc<CertifiedKey>, TlsError> {
    let provider = rustls::crypto::ring::default_provider();
    certified_key_from_pem(cert_pem, key_pem, &provider).map(Arc::new)
}

/// Leaf `NotAfter` of a chain.
///
/// Every certificate in the chain must parse; the first failure is reported
/// with its index.
pub fn chain_expiry(chain: &[CertificateDer<'_>]) -> Result<DateTime<Utc>, TlsError> {
    let mut leaf_not_after = None;
    for (index, der) in chain.iter().enumerate() {
        let (_, cert) = X509Certificate::from_der(der.as_ref()).map_err(|err| {
            TlsError::UnparsableCertificate { index, source: anyhow!(err.to_string()) }
        })?;
        if index == 0 {
            leaf_not_after = Some(cert.validity().not_after.timestamp());
        }
    }

    let not_after = leaf_not_after.ok_or(TlsError::EmptyCertificateChain)?;
    DateTime::<Utc>::from_timestamp(not_after, 0).ok_or(TlsError::InvalidValidity { not_after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn self_signed(not_after: (i32, u8, u8)) -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["svc.internal".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        let cert = params.self_signed(&key).unwrap();
        (cert.pem(), key.serialize_pem())
    }

    #[test]
    fn test_certified_key_from_pem() {
        let (cert, key) = self_signed((2040, 6, 1));

        let certified = certified_key_from_pem_default(cert.as_bytes(), key.as_bytes()).unwrap();

        assert_eq!(certified.cert.len(), 1);
        let expiry = chain_expiry(&certified.cert).unwrap();
        assert_eq!(expiry.to_rfc3339(), "2040-06-01T00:00:00+00:00");
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let (cert, _) = self_signed((2040, 6, 1));
        let (_, other_key) = self_signed((2040, 6, 1));

        let result = certified_key_from_pem_default(cert.as_bytes(), other_key.as_bytes());

        assert!(matches!(result, Err(TlsError::CertificateKeyMismatch)));
    }

    #[test]
    fn test_empty_and_garbage_input() {
        let (_, key) = self_signed((2040, 6, 1));
        assert!(matches!(
            certified_key_from_pem_default(b"", key.as_bytes()),
            Err(TlsError::EmptyCertificateChain)
        ));

        let (cert, _) = self_signed((2040, 6, 1));
        assert!(matches!(
            certified_key_from_pem_default(cert.as_bytes(), b"not a key"),
            Err(TlsError::InvalidPrivateKey { .. })
        ));
    }

    #[test]
    fn test_chain_expiry_reports_unparsable_index() {
        let (cert, _) = self_signed((2040, 6, 1));
        let leaf = CertificateDer::from_pem_slice(cert.as_bytes()).unwrap();
        let chain = vec![leaf, CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00])];

        let result = chain_expiry(&chain);

        assert!(matches!(result, Err(TlsError::UnparsableCertificate { index: 1, .. })));
        assert!(matches!(chain_expiry(&[]), Err(TlsError::EmptyCertificateChain)));
    }
}
