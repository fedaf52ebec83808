//! # Certificate Request Generation
//!
//! Turns a [`CertificateRequest`] template into a fresh private key and a PEM
//! CSR for it. The rotation loop calls this once per renewal so every chain
//! it installs has its own key.

use std::fmt;
use std::net::IpAddr;

use rcgen::{
    string::Ia5String, CertificateParams, DistinguishedName, DnType, DnValue, KeyPair, SanType,
    SignatureAlgorithm,
};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SignError};
use crate::secret::SecretString;
use crate::signer::Name;

/// Key algorithm and size for a generated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    /// `ecdsa` or `ed25519`.
    pub algo: String,
    /// Curve size in bits for ECDSA (256 or 384); ignored for Ed25519.
    #[serde(default)]
    pub size: u32,
}

impl Default for KeyRequest {
    fn default() -> Self {
        Self { algo: "ecdsa".to_string(), size: 256 }
    }
}

impl KeyRequest {
    fn signature_algorithm(&self) -> Result<&'static SignatureAlgorithm> {
        match (self.algo.to_lowercase().as_str(), self.size) {
            ("ecdsa", 0 | 256) => Ok(&rcgen::PKCS_ECDSA_P256_SHA256),
            ("ecdsa", 384) => Ok(&rcgen::PKCS_ECDSA_P384_SHA384),
            ("ecdsa", size) => {
                Err(SignError::csr(format!("unsupported ECDSA curve size {}", size)))
            }
            ("ed25519", _) => Ok(&rcgen::PKCS_ED25519),
            ("rsa", _) => Err(SignError::csr("RSA key generation is not supported")),
            (algo, _) => Err(SignError::csr(format!("unknown key algorithm '{}'", algo))),
        }
    }
}

/// Template from which renewal CSRs are generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    #[serde(rename = "CN", default)]
    pub cn: String,
    #[serde(default)]
    pub names: Vec<Name>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub key: KeyRequest,
}

impl CertificateRequest {
    pub fn new(cn: impl Into<String>, hosts: Vec<String>) -> Self {
        Self { cn: cn.into(), hosts, ..Default::default() }
    }

    pub fn with_key(mut self, key: KeyRequest) -> Self {
        self.key = key;
        self
    }

    pub fn with_name(mut self, name: Name) -> Self {
        self.names.push(name);
        self
    }
}

/// A generated key and the CSR over it.
#[derive(Debug, Clone)]
pub struct GeneratedRequest {
    pub csr_pem: String,
    pub key_pem: SecretString,
}

/// Capability that produces a new key and CSR from a template.
pub trait CsrGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, request: &CertificateRequest) -> Result<GeneratedRequest>;
}

/// [`CsrGenerator`] backed by rcgen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcgenCsrGenerator;

impl CsrGenerator for RcgenCsrGenerator {
    fn generate(&self, request: &CertificateRequest) -> Result<GeneratedRequest> {
        let algorithm = request.key.signature_algorithm()?;
        let key_pair = KeyPair::generate_for(algorithm)
            .map_err(|e| SignError::csr(format!("failed to generate key: {}", e)))?;

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(request);
        params.subject_alt_names =
            request.hosts.iter().map(String::as_str).map(subject_alt_name).collect::<Result<_>>()?;

        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| SignError::csr(format!("failed to build CSR: {}", e)))?;
        let csr_pem =
            csr.pem().map_err(|e| SignError::csr(format!("failed to encode CSR: {}", e)))?;

        Ok(GeneratedRequest { csr_pem, key_pem: SecretString::new(key_pair.serialize_pem()) })
    }
}

fn distinguished_name(request: &CertificateRequest) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    if !request.cn.is_empty() {
        dn.push(DnType::CommonName, DnValue::Utf8String(request.cn.clone()));
    }

    for name in &request.names {
        let fields = [
            (DnType::CountryName, &name.country),
            (DnType::StateOrProvinceName, &name.state),
            (DnType::LocalityName, &name.locality),
            (DnType::OrganizationName, &name.organization),
            (DnType::OrganizationalUnitName, &name.organizational_unit),
        ];
        for (ty, value) in fields {
            if !value.is_empty() {
                dn.push(ty, DnValue::Utf8String(value.clone()));
            }
        }
    }
    dn
}

fn subject_alt_name(host: &str) -> Result<SanType> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    Ia5String::try_from(host.to_string())
        .map(SanType::DnsName)
        .map_err(|e| SignError::csr(format!("invalid DNS name '{}': {}", host, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::CertificateSigningRequestParams;

    #[test]
    fn test_generates_csr_with_ip_and_dns_sans() {
        let template =
            CertificateRequest::new("api", vec!["api.internal".into(), "10.0.0.7".into()]);

        let generated = RcgenCsrGenerator.generate(&template).unwrap();

        assert!(generated.csr_pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(generated.key_pem.expose_secret().contains("PRIVATE KEY"));

        let parsed = CertificateSigningRequestParams::from_pem(&generated.csr_pem).unwrap();
        let sans = parsed.params.subject_alt_names;
        assert!(sans.contains(&SanType::IpAddress("10.0.0.7".parse().unwrap())));
        assert!(sans
            .iter()
            .any(|san| matches!(san, SanType::DnsName(name) if name.as_str() == "api.internal")));
    }

    #[test]
    fn test_each_generation_uses_fresh_key() {
        let template = CertificateRequest::new("api", vec!["api.internal".into()]);
        let first = RcgenCsrGenerator.generate(&template).unwrap();
        let second = RcgenCsrGenerator.generate(&template).unwrap();
        assert_ne!(first.key_pem.expose_secret(), second.key_pem.expose_secret());
    }

    #[test]
    fn test_key_algorithms() {
        for key in [
            KeyRequest { algo: "ecdsa".into(), size: 384 },
            KeyRequest { algo: "Ed25519".into(), size: 0 },
        ] {
            let template = CertificateRequest::new("api", vec![]).with_key(key);
            assert!(RcgenCsrGenerator.generate(&template).is_ok());
        }

        let rsa = CertificateRequest::new("api", vec![])
            .with_key(KeyRequest { algo: "rsa".into(), size: 2048 });
        assert!(matches!(RcgenCsrGenerator.generate(&rsa), Err(SignError::Csr { .. })));

        let odd_curve = CertificateRequest::new("api", vec![])
            .with_key(KeyRequest { algo: "ecdsa".into(), size: 521 });
        assert!(matches!(RcgenCsrGenerator.generate(&odd_curve), Err(SignError::Csr { .. })));
    }

    #[test]
    fn test_template_json_shape() {
        let template: CertificateRequest = serde_json::from_str(
            r#"{"CN":"api","hosts":["api.internal"],"key":{"algo":"ecdsa","size":256}}"#,
        )
        .unwrap();
        assert_eq!(template.cn, "api");
        assert_eq!(template.key, KeyRequest::default());
    }
}
