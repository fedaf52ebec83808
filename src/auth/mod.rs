//! Authentication of outgoing remote-signing calls.
//!
//! A profile may carry an [`AuthProvider`]. When it does, the remote signer
//! wraps the serialized sign request in an [`AuthenticatedRequest`] whose
//! token the provider computed over the request bytes, and posts it to the
//! authority's authenticated endpoint. The token scheme is opaque to the rest
//! of the crate.
//!
//! [`StandardAuthProvider`] is the shared-key scheme: HMAC-SHA256 over the
//! request followed by optional additional data.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::{Result, SignError};

type HmacSha256 = Hmac<Sha256>;

/// Capability producing a token that authenticates a request payload.
pub trait AuthProvider: Send + Sync + fmt::Debug {
    /// Compute the token for the given request bytes.
    fn token(&self, request: &[u8]) -> Result<Vec<u8>>;

    /// Check a received authenticated request.
    fn verify(&self, request: &AuthenticatedRequest) -> bool;
}

/// Envelope posted to an authority's authenticated sign endpoint.
///
/// Byte fields travel base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedRequest {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timestamp: i64,
    #[serde(with = "base64_bytes")]
    pub token: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub request: Vec<u8>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl AuthenticatedRequest {
    /// Sign `request` with `provider` and wrap both in an envelope.
    pub fn new(request: Vec<u8>, provider: &dyn AuthProvider) -> Result<Self> {
        let token = provider.token(&request)?;
        Ok(Self { timestamp: 0, token, request })
    }
}

/// HMAC-SHA256 shared-key provider.
pub struct StandardAuthProvider {
    key: Zeroizing<Vec<u8>>,
    additional_data: Vec<u8>,
}

impl fmt::Debug for StandardAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardAuthProvider")
            .field("key", &"[REDACTED]")
            .field("additional_data_len", &self.additional_data.len())
            .finish()
    }
}

impl StandardAuthProvider {
    /// Build a provider from a hex-encoded key.
    ///
    /// A key of the form `env:NAME` is read from environment variable `NAME`.
    pub fn new(key: &str, additional_data: Option<&[u8]>) -> Result<Self> {
        let key = match key.strip_prefix("env:") {
            Some(var) => std::env::var(var).map_err(|_| {
                SignError::config_error(format!("auth key environment variable {} is not set", var))
            })?,
            None => key.to_string(),
        };
        let key = Zeroizing::new(key);

        if key.trim().is_empty() {
            return Err(SignError::config_error("auth key cannot be empty"));
        }

        let decoded = hex::decode(key.trim())
            .map_err(|e| SignError::config_error(format!("auth key is not valid hex: {}", e)))?;

        Ok(Self {
            key: Zeroizing::new(decoded),
            additional_data: additional_data.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    fn mac(&self, request: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| SignError::auth(format!("invalid HMAC key: {}", e)))?;
        mac.update(request);
        mac.update(&self.additional_data);
        Ok(mac)
    }
}

impl AuthProvider for StandardAuthProvider {
    fn token(&self, request: &[u8]) -> Result<Vec<u8>> {
        Ok(self.mac(request)?.finalize().into_bytes().to_vec())
    }

    fn verify(&self, request: &AuthenticatedRequest) -> bool {
        match self.mac(&request.request) {
            Ok(mac) => mac.verify_slice(&request.token).is_ok(),
            Err(_) => false,
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
