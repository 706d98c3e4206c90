//! # Observability Infrastructure
//!
//! Structured logging and lease lifecycle metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::{describe_metrics, LeaseMetrics};

use crate::config::ObservabilityConfig;
use ::tracing::info;

/// Initialize logging and register metric descriptions.
pub fn init_observability(config: &ObservabilityConfig) {
    let installed = init_logging(config);
    describe_metrics();

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        subscriber_installed = installed,
        "Observability initialized"
    );
}
