//! # Configuration Settings
//!
//! Defines the configuration sections for the lease engine. Every field has a
//! default and can be overridden from the environment.

use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default path of the Kubernetes service-account token.
pub const DEFAULT_KUBERNETES_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// TLS modes understood by the PostgreSQL driver.
pub const SSL_MODES: &[&str] = &["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];

/// Secret-issuing service (Vault) configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Service address, e.g. `https://vault.example.com:8200`
    #[validate(custom(function = "validate_address"))]
    pub address: String,

    /// Static token used when no workload identity is available
    pub token: Option<SecretString>,

    /// Enterprise namespace
    pub namespace: Option<String>,

    /// Database role to request credentials for
    #[validate(length(min = 1, message = "Role name cannot be empty"))]
    pub role_name: String,

    /// Mount path of the database secrets engine
    #[validate(length(min = 1, message = "Database mount cannot be empty"))]
    pub database_mount: String,

    /// Path of the mounted workload-identity token
    #[validate(length(min = 1, message = "Kubernetes token path cannot be empty"))]
    pub kubernetes_token_path: String,

    /// Mount path of the Kubernetes auth method
    #[validate(length(min = 1, message = "Kubernetes auth mount cannot be empty"))]
    pub kubernetes_auth_mount: String,

    /// Role used for Kubernetes login
    #[validate(length(min = 1, message = "Kubernetes role cannot be empty"))]
    pub kubernetes_role: String,

    /// Timeout for each request to the service
    #[validate(range(
        min = 1,
        max = 300,
        message = "Request timeout must be between 1 and 300 seconds"
    ))]
    pub request_timeout_seconds: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8200".to_string(),
            token: None,
            namespace: None,
            role_name: "app-role".to_string(),
            database_mount: "database".to_string(),
            kubernetes_token_path: DEFAULT_KUBERNETES_TOKEN_PATH.to_string(),
            kubernetes_auth_mount: "kubernetes".to_string(),
            kubernetes_role: "app-role".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl VaultConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Create VaultConfig from environment variables
    ///
    /// - `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`
    /// - `DB_ROLE`, `VAULT_DATABASE_MOUNT`
    /// - `VAULT_K8S_TOKEN_PATH`, `VAULT_K8S_AUTH_MOUNT`, `VAULT_K8S_ROLE`
    /// - `VAULT_REQUEST_TIMEOUT_SECONDS`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            address: env_string("VAULT_ADDR", &defaults.address),
            token: env_optional("VAULT_TOKEN").map(SecretString::new),
            namespace: env_optional("VAULT_NAMESPACE"),
            role_name: env_string("DB_ROLE", &defaults.role_name),
            database_mount: env_string("VAULT_DATABASE_MOUNT", &defaults.database_mount),
            kubernetes_token_path: env_string(
                "VAULT_K8S_TOKEN_PATH",
                &defaults.kubernetes_token_path,
            ),
            kubernetes_auth_mount: env_string(
                "VAULT_K8S_AUTH_MOUNT",
                &defaults.kubernetes_auth_mount,
            ),
            kubernetes_role: env_string("VAULT_K8S_ROLE", &defaults.kubernetes_role),
            request_timeout_seconds: env_parse(
                "VAULT_REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
        })
    }
}

/// Data-store connection target
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database host
    #[validate(length(min = 1, message = "Database host cannot be empty"))]
    pub host: String,

    /// Database port
    #[validate(range(min = 1, message = "Database port must be between 1 and 65535"))]
    pub port: u16,

    /// Database name
    #[validate(length(min = 1, message = "Database name cannot be empty"))]
    pub name: String,

    /// TLS mode (`disable`, `prefer`, `require`, `verify-full`, ...)
    #[validate(custom(function = "validate_ssl_mode"))]
    pub ssl_mode: String,

    /// Maximum number of pooled connections opened with one credential
    #[validate(range(
        min = 1,
        max = 100,
        message = "Max connections must be between 1 and 100"
    ))]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "mydb".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 5,
            connect_timeout_seconds: 10,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env_string("DB_HOST", &defaults.host),
            port: env_parse("DB_PORT", defaults.port)?,
            name: env_string("DB_NAME", &defaults.name),
            ssl_mode: env_string("DB_SSL_MODE", &defaults.ssl_mode),
            max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            connect_timeout_seconds: env_parse(
                "DB_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            )?,
        })
    }
}

/// Lease renewal scheduling
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenewalConfig {
    /// Fraction of the lease TTL to wait before renewing
    #[validate(custom(function = "validate_fraction"))]
    pub renew_fraction: f64,

    /// Lower bound for any wait, so a zero TTL cannot spin the loop
    #[validate(range(
        min = 1,
        max = 31536000,
        message = "Minimum wait must be between 1 second and 1 year"
    ))]
    pub min_wait_seconds: u64,

    /// First retry delay after a failed regeneration
    #[validate(range(
        min = 1,
        max = 31536000,
        message = "Initial retry delay must be between 1 second and 1 year"
    ))]
    pub retry_initial_seconds: u64,

    /// Upper bound for the retry delay
    #[validate(range(
        min = 1,
        max = 31536000,
        message = "Maximum retry delay must be between 1 second and 1 year"
    ))]
    pub retry_max_seconds: u64,

    /// Revoke the active lease on graceful shutdown
    pub revoke_on_shutdown: bool,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            renew_fraction: 0.67,
            min_wait_seconds: 1,
            retry_initial_seconds: 5,
            retry_max_seconds: 300,
            revoke_on_shutdown: true,
        }
    }
}

impl RenewalConfig {
    /// Create RenewalConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            renew_fraction: env_parse("LEASE_RENEW_FRACTION", defaults.renew_fraction)?,
            min_wait_seconds: env_parse("LEASE_MIN_WAIT_SECONDS", defaults.min_wait_seconds)?,
            retry_initial_seconds: env_parse(
                "LEASE_RETRY_INITIAL_SECONDS",
                defaults.retry_initial_seconds,
            )?,
            retry_max_seconds: env_parse("LEASE_RETRY_MAX_SECONDS", defaults.retry_max_seconds)?,
            revoke_on_shutdown: env_bool("LEASE_REVOKE_ON_SHUTDOWN", defaults.revoke_on_shutdown)?,
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name attached to log output
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level used when `RUST_LOG` is not set
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "leasewarden".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: env_string("LEASEWARDEN_SERVICE_NAME", &defaults.service_name),
            log_level: env_string("LOG_LEVEL", &defaults.log_level),
            json_logging: env_optional("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logging),
        }
    }
}

fn validate_address(address: &str) -> std::result::Result<(), ValidationError> {
    match url::Url::parse(address) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("address")
            .with_message("Address must be an http:// or https:// URL".into())),
    }
}

fn validate_ssl_mode(mode: &str) -> std::result::Result<(), ValidationError> {
    if SSL_MODES.contains(&mode) {
        Ok(())
    } else {
        Err(ValidationError::new("ssl_mode").with_message(
            format!("SSL mode must be one of: {}", SSL_MODES.join(", ")).into(),
        ))
    }
}

fn validate_fraction(fraction: f64) -> std::result::Result<(), ValidationError> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::new("renew_fraction")
            .with_message("Renew fraction must be greater than 0 and at most 1".into()))
    }
}

/// Read a variable, treating unset and empty the same.
pub(crate) fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_string(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env_optional(key).map(|raw| raw.trim().to_lowercase()) {
        Some(raw) => match raw.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("Invalid {} '{}': expected a boolean", key, raw))),
        },
        None => Ok(default),
    }
}
