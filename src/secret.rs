//! Redacting wrapper for generated private keys.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string whose contents never show up in Debug output.
///
/// Generated private-key PEMs travel through this type. Memory is zeroed on
/// drop; the value is reachable only through [`SecretString::expose_secret`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}
