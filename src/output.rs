//! JSON shape printed by command-line front ends after a successful signing.

use serde::{Deserialize, Serialize};

use crate::csr::GeneratedRequest;

/// `{"cert": ..., "key": ..., "csr": ...}` with absent fields omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateOutput {
    pub cert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr: Option<String>,
}

impl CertificateOutput {
    /// Output for a certificate signed from a caller-supplied CSR.
    pub fn signed(cert: &[u8]) -> Self {
        Self { cert: String::from_utf8_lossy(cert).into_owned(), ..Default::default() }
    }

    /// Output for a certificate issued over a freshly generated key.
    ///
    /// The private key is included in plain text; this is the one place it
    /// leaves [`crate::secret::SecretString`].
    pub fn generated(cert: &[u8], generated: &GeneratedRequest) -> Self {
        Self {
            cert: String::from_utf8_lossy(cert).into_owned(),
            key: Some(generated.key_pem.expose_secret().to_string()),
            csr: Some(generated.csr_pem.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretString;

    #[test]
    fn test_signed_omits_key_and_csr() {
        let json = CertificateOutput::signed(b"CERT").to_json().unwrap();
        assert_eq!(json, r#"{"cert":"CERT"}"#);
    }

    #[test]
    fn test_generated_includes_key_and_csr() {
        let generated =
            GeneratedRequest { csr_pem: "CSR".into(), key_pem: SecretString::new("KEY") };
        let output = CertificateOutput::generated(b"CERT", &generated);

        let value: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
        assert_eq!(value["cert"], "CERT");
        assert_eq!(value["key"], "KEY");
        assert_eq!(value["csr"], "CSR");
    }
}
