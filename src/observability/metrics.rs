//! # Metrics Collection
//!
//! Lease lifecycle metrics emitted through the `metrics` facade. Without an
//! installed recorder every call is a no-op, so the engine can record
//! unconditionally and leave exporting to the embedding application.

use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

/// Renewal attempts, labelled by `outcome`.
pub const RENEWALS_TOTAL: &str = "leasewarden_renewals_total";

/// Credential regenerations, labelled by `outcome`.
pub const REGENERATIONS_TOTAL: &str = "leasewarden_regenerations_total";

/// TTL of the active lease at the time it was issued or last renewed.
pub const LEASE_TTL_SECONDS: &str = "leasewarden_lease_ttl_seconds";

/// Consecutive failed renewal cycles.
pub const CONSECUTIVE_FAILURES: &str = "leasewarden_consecutive_failures";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(RENEWALS_TOTAL, Unit::Count, "Lease renewal attempts by outcome");
    describe_counter!(REGENERATIONS_TOTAL, Unit::Count, "Credential regenerations by outcome");
    describe_gauge!(LEASE_TTL_SECONDS, Unit::Seconds, "TTL of the active lease");
    describe_gauge!(CONSECUTIVE_FAILURES, Unit::Count, "Consecutive failed renewal cycles");
}

/// Metrics recorder for the lease lifecycle
#[derive(Debug, Clone, Default)]
pub struct LeaseMetrics;

impl LeaseMetrics {
    /// Create a new recorder
    pub fn new() -> Self {
        Self
    }

    /// Record a renewal attempt
    pub fn record_renewal(&self, success: bool) {
        let labels = [("outcome", outcome(success).to_string())];
        counter!(RENEWALS_TOTAL, &labels).increment(1);
    }

    /// Record a regeneration attempt
    pub fn record_regeneration(&self, success: bool) {
        let labels = [("outcome", outcome(success).to_string())];
        counter!(REGENERATIONS_TOTAL, &labels).increment(1);
    }

    /// Update the active lease TTL gauge
    pub fn update_lease_ttl(&self, ttl_seconds: u64) {
        gauge!(LEASE_TTL_SECONDS).set(ttl_seconds as f64);
    }

    /// Update the consecutive failure gauge
    pub fn update_consecutive_failures(&self, failures: u32) {
        gauge!(CONSECUTIVE_FAILURES).set(failures as f64);
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
