use thiserror::Error;

/// Certificate material failures surfaced while assembling or inspecting TLS chains.
#[derive(Debug, Error)]
pub enum TlsError {
    /// No certificates were found in the supplied PEM.
    #[error("certificate PEM does not contain any certificates")]
    EmptyCertificateChain,

    /// The certificate PEM contents were invalid or unreadable.
    #[error("certificate PEM is not valid: {source}")]
    InvalidCertificatePem {
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("private key PEM does not contain a supported private key")]
    InvalidPrivateKey {
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The supplied certificate and key do not match.
    #[error("certificate and private key do not match")]
    CertificateKeyMismatch,

    /// A DER certificate in a chain could not be parsed.
    #[error("certificate {index} in chain could not be parsed: {source}")]
    UnparsableCertificate {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A validity timestamp could not be represented.
    #[error("certificate validity {not_after} is out of range")]
    InvalidValidity { not_after: i64 },

    /// rustls rejected the assembled identity.
    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}
