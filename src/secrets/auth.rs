//! Session bootstrap against the secret-issuing service.
//!
//! Two strategies, chosen by what the environment offers:
//!
//! 1. **Workload identity**: when a service-account token is mounted at the
//!    configured path, log in through Vault's Kubernetes auth method.
//! 2. **Static token**: otherwise fall back to `VAULT_TOKEN`, for local
//!    development.
//!
//! There are no retries here. A failed login is fatal to startup.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

use super::types::SecretString;
use crate::config::VaultConfig;
use crate::errors::AuthError;

/// How a [`Session`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Kubernetes service-account login
    WorkloadIdentity,
    /// Statically configured token
    StaticToken,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::WorkloadIdentity => write!(f, "workload_identity"),
            AuthMethod::StaticToken => write!(f, "static_token"),
        }
    }
}

/// Authenticated handle to the secret-issuing service.
///
/// Created once at startup and read-only afterwards. The token is never
/// refreshed: once a login token passes its [`token_ttl`](Self::token_ttl),
/// renewals and regenerations are rejected by the service and the renewal
/// loop reports them as failed cycles and keeps retrying with backoff.
#[derive(Debug, Clone)]
pub struct Session {
    address: String,
    token: SecretString,
    namespace: Option<String>,
    method: AuthMethod,
    token_ttl: Option<Duration>,
}

impl Session {
    /// Build a session from an already-known token.
    pub fn new(
        address: impl Into<String>,
        token: SecretString,
        namespace: Option<String>,
        method: AuthMethod,
    ) -> Self {
        Self { address: address.into(), token, namespace, method, token_ttl: None }
    }

    fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Service address, without trailing slash.
    pub fn address(&self) -> &str {
        self.address.trim_end_matches('/')
    }

    /// Client token sent as `X-Vault-Token`.
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Enterprise namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Strategy used to obtain the token.
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// Token lifetime reported at login. `None` for static tokens.
    ///
    /// Informational only. Nothing re-authenticates when it runs out.
    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl
    }
}

/// Establishes the [`Session`] used by every later service call.
#[derive(Debug, Clone)]
pub struct AuthProvider {
    config: VaultConfig,
}

impl AuthProvider {
    /// Create a provider for the given service configuration.
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// Authenticate, preferring workload identity over the static token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoCredentialSource`] if the token file is missing and no static token is set
    /// - [`AuthError::TokenFileUnreadable`] if the token file exists but cannot be used
    /// - [`AuthError::LoginRejected`] if the service refuses the Kubernetes login
    /// - [`AuthError::Unreachable`] if the service cannot be contacted
    pub async fn authenticate(&self) -> Result<Session, AuthError> {
        let token_path = Path::new(&self.config.kubernetes_token_path);

        if tokio::fs::metadata(token_path).await.is_ok() {
            return self.login_with_workload_identity(token_path).await;
        }

        match self.config.token.as_ref().filter(|token| !token.is_blank()) {
            Some(token) => {
                info!(
                    address = %self.config.address,
                    method = %AuthMethod::StaticToken,
                    "Authenticated with secret-issuing service"
                );
                Ok(Session::new(
                    self.config.address.clone(),
                    token.clone(),
                    self.config.namespace.clone(),
                    AuthMethod::StaticToken,
                ))
            }
            None => {
                warn!(
                    token_path = %self.config.kubernetes_token_path,
                    "No workload identity token and no static token configured"
                );
                Err(AuthError::no_credential_source(&self.config.kubernetes_token_path))
            }
        }
    }

    async fn login_with_workload_identity(&self, token_path: &Path) -> Result<Session, AuthError> {
        let path_display = token_path.display().to_string();
        let jwt = tokio::fs::read_to_string(token_path)
            .await
            .map_err(|e| AuthError::token_file_unreadable(&path_display, e.to_string()))?;
        let jwt = SecretString::new(jwt.trim());
        if jwt.is_empty() {
            return Err(AuthError::token_file_unreadable(&path_display, "file is empty"));
        }

        let client = self.login_client()?;
        let auth_info = vaultrs::auth::kubernetes::login(
            &client,
            &self.config.kubernetes_auth_mount,
            &self.config.kubernetes_role,
            jwt.expose_secret(),
        )
        .await
        .map_err(classify_login_error)?;

        let ttl = Duration::from_secs(auth_info.lease_duration);
        info!(
            address = %self.config.address,
            method = %AuthMethod::WorkloadIdentity,
            auth_mount = %self.config.kubernetes_auth_mount,
            role = %self.config.kubernetes_role,
            token_ttl_secs = ttl.as_secs(),
            "Authenticated with secret-issuing service"
        );

        Ok(Session::new(
            self.config.address.clone(),
            SecretString::new(auth_info.client_token),
            self.config.namespace.clone(),
            AuthMethod::WorkloadIdentity,
        )
        .with_token_ttl(ttl))
    }

    fn login_client(&self) -> Result<VaultClient, AuthError> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder
            .address(&self.config.address)
            .token("")
            .timeout(Some(self.config.request_timeout()));

        if let Some(ref namespace) = self.config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder.build().map_err(|e| {
            AuthError::unreachable(format!("Invalid Vault client configuration: {}", e))
        })?;

        VaultClient::new(settings)
            .map_err(|e| AuthError::unreachable(format!("Failed to create Vault client: {}", e)))
    }
}

fn classify_login_error(error: ClientError) -> AuthError {
    match error {
        ClientError::APIError { code, errors } if code < 500 => {
            AuthError::login_rejected(format!("status {}: {}", code, errors.join("; ")))
        }
        other => AuthError::unreachable(other.to_string()),
    }
}
