//! HTTP client for a remote signing authority.
//!
//! Requests are posted as JSON; responses use the authority's standard
//! envelope:
//!
//! ```text
//! {"success": true, "result": {"certificate": "-----BEGIN CERTIFICATE-----..."},
//!  "errors": [], "messages": []}
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::auth::{AuthProvider, AuthenticatedRequest};
use crate::config::normalize_remote;
use crate::errors::{Result, SignError};

const SIGN_ENDPOINT: &str = "api/v1/cfssl/sign";
const AUTH_SIGN_ENDPOINT: &str = "api/v1/cfssl/authsign";

/// Error or informational entry in a response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Response envelope returned by the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<ResponseMessage>,
    #[serde(default)]
    pub messages: Vec<ResponseMessage>,
}

impl SignResponse {
    fn into_certificate(self) -> Result<Vec<u8>> {
        if !self.success {
            let (code, message) = self
                .errors
                .into_iter()
                .next()
                .map(|e| (e.code, e.message))
                .unwrap_or((0, "remote authority reported failure".to_string()));
            return Err(SignError::remote(code, message));
        }

        self.result
            .as_ref()
            .and_then(|result| result.get("certificate"))
            .and_then(|cert| cert.as_str())
            .map(|cert| cert.as_bytes().to_vec())
            .ok_or_else(|| SignError::remote(0, "response did not contain a certificate"))
    }
}

/// Client bound to one authority address.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: Url,
}

impl RemoteClient {
    /// Create a client for `remote` (`host[:port]` or a full URL).
    pub fn new(remote: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = normalize_remote(remote)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Post a serialized sign request unauthenticated.
    pub async fn sign(&self, request_json: Vec<u8>) -> Result<Vec<u8>> {
        self.post(SIGN_ENDPOINT, request_json).await
    }

    /// Post a serialized sign request wrapped with a provider-computed token.
    pub async fn auth_sign(
        &self,
        request_json: Vec<u8>,
        provider: &dyn AuthProvider,
    ) -> Result<Vec<u8>> {
        let envelope = AuthenticatedRequest::new(request_json, provider)?;
        let body = serde_json::to_vec(&envelope)?;
        self.post(AUTH_SIGN_ENDPOINT, body).await
    }

    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| SignError::config_error(format!("Invalid endpoint URL: {}", e)))?;
        debug!(url = %url, bytes = body.len(), "POST to remote authority");

        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<SignResponse>(&bytes) {
            Ok(envelope) => envelope.into_certificate(),
            Err(_) if !status.is_success() => {
                error!(url = %url, status = status.as_u16(), "Remote authority request failed");
                Err(SignError::http_status(
                    status.as_u16(),
                    String::from_utf8_lossy(&bytes).into_owned(),
                ))
            }
            Err(e) => Err(SignError::Serialization(e)),
        }
    }
}
