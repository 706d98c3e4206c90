//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and everything else logs at `warn`. JSON output is selected with
//! `LOG_FORMAT=json`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, ObservabilityConfig};

/// Create a tracing span for lease operations.
///
/// ```rust,ignore
/// let span = lease_span!("renew", lease_id = %lease.lease_id);
/// ```
#[macro_export]
macro_rules! lease_span {
    ($operation:expr) => {
        tracing::info_span!("lease_operation", operation = %$operation)
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!("lease_operation", operation = %$operation, $($field)*)
    };
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (for example by a
/// test harness); the existing one is left in place.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let result = if config.json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.is_ok()
}

fn default_directives(config: &ObservabilityConfig) -> String {
    format!("{}={},warn", env!("CARGO_PKG_NAME"), config.log_level)
}

/// Log configuration at startup. Secrets are never included.
pub fn log_config_info(config: &EngineConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        vault_address = %config.vault.address,
        vault_namespace = config.vault.namespace.as_deref().unwrap_or("-"),
        role = %config.vault.role_name,
        database_mount = %config.vault.database_mount,
        db_host = %config.database.host,
        db_port = config.database.port,
        db_name = %config.database.name,
        db_ssl_mode = %config.database.ssl_mode,
        renew_fraction = config.renewal.renew_fraction,
        revoke_on_shutdown = config.renewal.revoke_on_shutdown,
        "Lease engine configuration"
    );
}
