//! Signing policy: named profiles plus a mandatory default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthProvider;
use crate::errors::{Result, SignError};

/// Default certificate lifetime: one year.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(8760 * 60 * 60);

/// Port assumed for a remote authority address given without one.
pub const DEFAULT_REMOTE_PORT: u16 = 8888;

/// A named bundle of issuance settings.
#[derive(Clone)]
pub struct SigningProfile {
    /// Key usage / extended key usage names.
    pub usage: Vec<String>,
    /// Lifetime of issued certificates.
    pub expiry: Duration,
    /// How far NotBefore is moved into the past.
    pub backdate: Duration,
    /// Profile issues CA certificates; such requests may omit hosts.
    pub ca: bool,
    /// Address of the authority that signs on this profile's behalf.
    pub remote: Option<String>,
    /// Authenticates outgoing remote calls when set.
    pub auth_provider: Option<Arc<dyn AuthProvider>>,
}

impl fmt::Debug for SigningProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningProfile")
            .field("usage", &self.usage)
            .field("expiry", &self.expiry)
            .field("backdate", &self.backdate)
            .field("ca", &self.ca)
            .field("remote", &self.remote)
            .field("authenticated", &self.auth_provider.is_some())
            .finish()
    }
}

impl Default for SigningProfile {
    fn default() -> Self {
        Self {
            usage: ["signing", "key encipherment", "server auth", "client auth"]
                .into_iter()
                .map(String::from)
                .collect(),
            expiry: DEFAULT_EXPIRY,
            backdate: Duration::ZERO,
            ca: false,
            remote: None,
            auth_provider: None,
        }
    }
}

impl SigningProfile {
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    pub fn with_ca(mut self, ca: bool) -> Self {
        self.ca = ca;
        self
    }
}

/// Profiles keyed by name plus the default used when no name matches.
#[derive(Debug, Clone, Default)]
pub struct SigningPolicy {
    pub profiles: HashMap<String, SigningProfile>,
    pub default: SigningProfile,
}

impl SigningPolicy {
    pub fn new(default: SigningProfile) -> Self {
        Self { profiles: HashMap::new(), default }
    }

    /// The policy used when none is configured: no named profiles and a
    /// one-year default profile.
    pub fn default_policy() -> Self {
        Self::new(SigningProfile::default())
    }

    pub fn with_profile(mut self, name: impl Into<String>, profile: SigningProfile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }

    /// Resolve a profile name. Empty and unknown names fall back to the default.
    pub fn profile(&self, name: &str) -> &SigningProfile {
        if name.is_empty() {
            return &self.default;
        }
        self.profiles.get(name).unwrap_or(&self.default)
    }

    /// Point every profile, the default included, at `remote`.
    pub fn override_remotes(&mut self, remote: &str) -> Result<()> {
        let remote = remote.trim();
        if remote.is_empty() {
            return Err(SignError::config_error("remote address cannot be empty"));
        }
        normalize_remote(remote)?;

        for profile in self.profiles.values_mut() {
            profile.remote = Some(remote.to_string());
        }
        self.default.remote = Some(remote.to_string());
        Ok(())
    }

    /// Check the policy is usable for signing and rotation.
    pub fn validate(&self) -> Result<()> {
        if self.default.expiry.is_zero() {
            return Err(SignError::config_error("default profile expiry must be non-zero"));
        }

        let named = self.profiles.iter().map(|(name, profile)| (name.as_str(), profile));
        for (name, profile) in std::iter::once(("default", &self.default)).chain(named) {
            if let Some(remote) = &profile.remote {
                normalize_remote(remote).map_err(|e| {
                    SignError::config_error(format!("profile '{}' has invalid remote: {}", name, e))
                })?;
            }
        }
        Ok(())
    }
}

/// Turn a remote authority address into a base URL.
///
/// Bare `host[:port]` gets an `http://` scheme; a missing port becomes
/// [`DEFAULT_REMOTE_PORT`].
pub fn normalize_remote(remote: &str) -> Result<url::Url> {
    let with_scheme = if remote.contains("://") {
        remote.to_string()
    } else {
        format!("http://{}", remote)
    };

    let mut url = url::Url::parse(&with_scheme)
        .map_err(|e| SignError::config_error(format!("invalid remote '{}': {}", remote, e)))?;

    if url.host_str().is_none() {
        return Err(SignError::config_error(format!("remote '{}' has no host", remote)));
    }

    if url.port().is_none() && !remote.contains("://") {
        url.set_port(Some(DEFAULT_REMOTE_PORT)).map_err(|_| {
            SignError::config_error(format!("remote '{}' cannot take a port", remote))
        })?;
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SigningPolicy {
        SigningPolicy::new(SigningProfile::default().with_remote("ca.internal:8888"))
            .with_profile(
                "server",
                SigningProfile::default()
                    .with_remote("server-ca.internal:8888")
                    .with_expiry(Duration::from_secs(3600)),
            )
            .with_profile("intermediate", SigningProfile::default().with_ca(true))
    }

    #[test]
    fn test_profile_resolution_present_name() {
        let policy = policy();
        let profile = policy.profile("server");
        assert_eq!(profile.remote.as_deref(), Some("server-ca.internal:8888"));
        assert_eq!(profile.expiry, Duration::from_secs(3600));
    }

    #[test]
    fn test_profile_resolution_falls_back_to_default() {
        let policy = policy();
        for name in ["", "unknown", "default"] {
            assert_eq!(policy.profile(name).remote.as_deref(), Some("ca.internal:8888"));
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = SigningPolicy::default_policy();
        assert!(policy.profiles.is_empty());
        assert_eq!(policy.default.expiry, DEFAULT_EXPIRY);
        assert!(policy.default.usage.contains(&"server auth".to_string()));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_override_remotes() {
        let mut policy = policy();
        policy.override_remotes("10.0.0.5:9000").unwrap();

        assert_eq!(policy.default.remote.as_deref(), Some("10.0.0.5:9000"));
        for profile in policy.profiles.values() {
            assert_eq!(profile.remote.as_deref(), Some("10.0.0.5:9000"));
        }

        assert!(matches!(policy.override_remotes("  "), Err(SignError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_expiry() {
        let policy = SigningPolicy::new(SigningProfile::default().with_expiry(Duration::ZERO));
        assert!(matches!(policy.validate(), Err(SignError::Config { .. })));
    }

    #[test]
    fn test_normalize_remote() {
        assert_eq!(normalize_remote("ca.internal").unwrap().as_str(), "http://ca.internal:8888/");
        assert_eq!(
            normalize_remote("ca.internal:9000").unwrap().as_str(),
            "http://ca.internal:9000/"
        );
        assert_eq!(
            normalize_remote("https://ca.example.com").unwrap().as_str(),
            "https://ca.example.com/"
        );
        assert!(normalize_remote("http://").is_err());
    }

    #[test]
    fn test_debug_hides_provider() {
        let rendered = format!("{:?}", SigningProfile::default());
        assert!(rendered.contains("authenticated: false"));
    }
}
