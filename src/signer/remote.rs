//! Signer that delegates every request to a remote authority.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn, Instrument};

use super::client::RemoteClient;
use super::{SignRequest, Signed, Signer};
use crate::config::{RemoteSettings, SigningPolicy};
use crate::errors::{Result, SignError};

/// Forwards sign requests to the authority named by the resolved profile.
///
/// Certificates come back exactly as the authority produced them. Failures
/// are returned as-is; this signer never retries or defers.
#[derive(Debug)]
pub struct RemoteSigner {
    policy: SigningPolicy,
    clients: HashMap<String, RemoteClient>,
}

impl RemoteSigner {
    /// Create a signer with default [`RemoteSettings`].
    pub fn new(policy: SigningPolicy) -> Result<Self> {
        Self::with_settings(policy, &RemoteSettings::default())
    }

    /// Create a signer, applying the settings' remote override and timeout.
    pub fn with_settings(mut policy: SigningPolicy, settings: &RemoteSettings) -> Result<Self> {
        settings.validate_settings()?;
        if let Some(remote) = &settings.remote {
            policy.override_remotes(remote)?;
        }
        policy.validate()?;

        let mut clients = HashMap::new();
        let profiles = std::iter::once(&policy.default).chain(policy.profiles.values());
        for remote in profiles.filter_map(|profile| profile.remote.as_deref()) {
            if !clients.contains_key(remote) {
                clients.insert(remote.to_string(), RemoteClient::new(remote, settings.timeout())?);
            }
        }

        info!(
            profiles = policy.profiles.len(),
            remotes = clients.len(),
            timeout_seconds = settings.timeout_seconds,
            "Remote signer configured"
        );

        Ok(Self { policy, clients })
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    async fn sign(&self, request: &SignRequest) -> Result<Signed> {
        let span = crate::sign_span!("remote", request.profile);

        async move {
            let profile = self.policy.profile(&request.profile);
            let remote = profile.remote.as_deref().ok_or_else(|| {
                SignError::config_error(format!(
                    "profile '{}' has no remote authority configured",
                    request.profile
                ))
            })?;

            if request.hosts.is_empty() && !profile.ca {
                return Err(SignError::invalid_request(
                    "hosts must not be empty for a non-CA profile",
                ));
            }

            let client = self.clients.get(remote).ok_or_else(|| {
                SignError::internal(format!("no client registered for remote '{}'", remote))
            })?;

            let body = serde_json::to_vec(request)?;
            let outcome = match &profile.auth_provider {
                Some(provider) => client.auth_sign(body, provider.as_ref()).await,
                None => client.sign(body).await,
            };

            match outcome {
                Ok(cert) => {
                    info!(
                        remote = %remote,
                        hosts = request.hosts.len(),
                        authenticated = profile.auth_provider.is_some(),
                        "Certificate signed by remote authority"
                    );
                    Ok(Signed::Certificate(cert))
                }
                Err(e) => {
                    warn!(remote = %remote, error = %e, "Remote signing failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn policy(&self) -> &SigningPolicy {
        &self.policy
    }
}
