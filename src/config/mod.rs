//! # Configuration Management
//!
//! Environment-style configuration for the lease engine. All keys are
//! optional; see [`settings`] for the individual sections and their defaults.

pub mod settings;

pub use settings::{
    DatabaseConfig, ObservabilityConfig, RenewalConfig, VaultConfig,
    DEFAULT_KUBERNETES_TOKEN_PATH, SSL_MODES,
};

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Secret-issuing service configuration
    #[validate(nested)]
    pub vault: VaultConfig,

    /// Data-store connection target
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Renewal scheduling
    #[validate(nested)]
    pub renewal: RenewalConfig,

    /// Logging
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            vault: VaultConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            renewal: RenewalConfig::from_env()?,
            observability: ObservabilityConfig::from_env(),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        if self.renewal.retry_max_seconds < self.renewal.retry_initial_seconds {
            return Err(Error::config(
                "LEASE_RETRY_MAX_SECONDS cannot be smaller than LEASE_RETRY_INITIAL_SECONDS",
            ));
        }

        Ok(())
    }
}
