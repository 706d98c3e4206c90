//! HashiCorp Vault implementation of [`SecretIssuer`].
//!
//! Talks to the database secrets engine and the `sys/leases` endpoints over
//! HTTP. Unlike the KV helpers in `vaultrs`, these calls need the lease
//! envelope (`lease_id`, `lease_duration`, `renewable`), so responses are
//! decoded here.
//!
//! # Endpoints
//!
//! - `GET  /v1/{mount}/creds/{role}`: generate a credential
//! - `PUT  /v1/sys/leases/renew`: extend a lease
//! - `PUT  /v1/sys/leases/revoke`: revoke a lease
//!
//! # Example
//!
//! ```rust,ignore
//! use leasewarden::secrets::{AuthProvider, VaultLeaseClient};
//!
//! let session = Arc::new(AuthProvider::new(config.clone()).authenticate().await?);
//! let client = VaultLeaseClient::new(session, &config)?;
//! let credential = client.read_dynamic_credential("app-role").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::auth::Session;
use super::client::{Credential, LeaseRenewal, SecretIssuer};
use super::types::SecretString;
use crate::config::VaultConfig;
use crate::errors::{Error, IssuanceError, RenewalError, Result};

/// Vault client bound to an authenticated [`Session`].
pub struct VaultLeaseClient {
    http: reqwest::Client,
    session: Arc<Session>,
    database_mount: String,
}

impl std::fmt::Debug for VaultLeaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultLeaseClient")
            .field("address", &self.session.address())
            .field("method", &self.session.method())
            .field("database_mount", &self.database_mount)
            .finish()
    }
}

impl VaultLeaseClient {
    /// Create a client for the database secrets engine configured in `config`.
    pub fn new(session: Arc<Session>, config: &VaultConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            session,
            database_mount: config.database_mount.trim_matches('/').to_string(),
        })
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.session.address(), path.trim_start_matches('/'));
        let mut request = self
            .http
            .request(method, url)
            .header("X-Vault-Token", self.session.token().expose_secret())
            .header("X-Vault-Request", "true");

        if let Some(namespace) = self.session.namespace() {
            request = request.header("X-Vault-Namespace", namespace);
        }

        request
    }
}

#[async_trait]
impl SecretIssuer for VaultLeaseClient {
    async fn read_dynamic_credential(&self, role: &str) -> std::result::Result<Credential, IssuanceError> {
        let path = format!("{}/creds/{}", self.database_mount, role);
        debug!(path = %path, "Requesting dynamic database credential");

        let response = self.request(Method::GET, &path).send().await.map_err(|e| {
            error!(error = %e, role = %role, "Credential request failed");
            IssuanceError::backend_unavailable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| IssuanceError::backend_unavailable(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body);
            return Err(if is_unavailable(status) {
                IssuanceError::backend_unavailable(format!("status {}: {}", status.as_u16(), message))
            } else {
                IssuanceError::rejected(status.as_u16(), message)
            });
        }

        let credential = parse_credential(&body)?;
        info!(
            role = %role,
            username = %credential.username,
            lease_id = %credential.lease_id,
            ttl_secs = credential.lease_duration_secs,
            renewable = credential.renewable,
            "Dynamic credential issued"
        );

        Ok(credential)
    }

    async fn renew_lease(
        &self,
        lease_id: &str,
        increment: Option<Duration>,
    ) -> std::result::Result<LeaseRenewal, RenewalError> {
        let body = LeaseRequest { lease_id, increment: increment.map(|d| d.as_secs()) };

        let response = self
            .request(Method::PUT, "sys/leases/renew")
            .json(&body)
            .send()
            .await
            .map_err(|e| RenewalError::backend_unavailable(e.to_string()))?;

        let status = response.status();
        let bytes =
            response.bytes().await.map_err(|e| RenewalError::backend_unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_lease_error(lease_id, status, &bytes));
        }

        parse_renewal(lease_id, &bytes)
    }

    async fn revoke_lease(&self, lease_id: &str) -> std::result::Result<(), RenewalError> {
        let body = LeaseRequest { lease_id, increment: None };

        let response = self
            .request(Method::PUT, "sys/leases/revoke")
            .json(&body)
            .send()
            .await
            .map_err(|e| RenewalError::backend_unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(lease_id = %lease_id, "Lease revoked");
            return Ok(());
        }

        let bytes =
            response.bytes().await.map_err(|e| RenewalError::backend_unavailable(e.to_string()))?;
        Err(classify_lease_error(lease_id, status, &bytes))
    }
}

#[derive(Serialize)]
struct LeaseRequest<'a> {
    lease_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    increment: Option<u64>,
}

#[derive(Deserialize)]
struct CredentialEnvelope {
    lease_id: String,
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
    data: CredentialData,
}

#[derive(Deserialize)]
struct CredentialData {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RenewalEnvelope {
    #[serde(default)]
    lease_id: Option<String>,
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<String>,
}

/// Decode a `database/creds/<role>` response into a [`Credential`].
///
/// Fields are copied through unchanged.
pub fn parse_credential(body: &[u8]) -> std::result::Result<Credential, IssuanceError> {
    let envelope: CredentialEnvelope = serde_json::from_slice(body)
        .map_err(|e| IssuanceError::malformed_response(e.to_string()))?;

    if envelope.lease_id.is_empty() {
        return Err(IssuanceError::malformed_response("lease_id is empty"));
    }

    Ok(Credential {
        username: envelope.data.username,
        password: SecretString::new(envelope.data.password),
        lease_id: envelope.lease_id,
        lease_duration_secs: envelope.lease_duration,
        renewable: envelope.renewable,
    })
}

fn parse_renewal(lease_id: &str, body: &[u8]) -> std::result::Result<LeaseRenewal, RenewalError> {
    let envelope: RenewalEnvelope = serde_json::from_slice(body)
        .map_err(|e| RenewalError::malformed_response(e.to_string()))?;

    Ok(LeaseRenewal {
        lease_id: envelope.lease_id.filter(|id| !id.is_empty()).unwrap_or_else(|| lease_id.to_string()),
        lease_duration_secs: envelope.lease_duration,
        renewable: envelope.renewable,
    })
}

fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => envelope.errors.join("; "),
        _ => String::from_utf8_lossy(body).trim().to_string(),
    }
}

fn is_unavailable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_lease_error(lease_id: &str, status: StatusCode, body: &[u8]) -> RenewalError {
    let message = error_message(body);
    if is_unavailable(status) {
        return RenewalError::backend_unavailable(format!("status {}: {}", status.as_u16(), message));
    }

    let lowered = message.to_lowercase();
    if lowered.contains("not renewable") {
        RenewalError::not_renewable(lease_id)
    } else if status == StatusCode::NOT_FOUND
        || lowered.contains("not found")
        || lowered.contains("expired")
        || lowered.contains("invalid lease")
    {
        RenewalError::lease_not_found(lease_id, message)
    } else {
        RenewalError::rejected(status.as_u16(), message)
    }
}
