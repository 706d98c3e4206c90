//! Scheduling arithmetic for the renewal loop.

use std::time::Duration;

use crate::config::RenewalConfig;

/// Upper bound for any computed wait.
pub const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// When to renew, and how long to back off after a failed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RenewalPolicy {
    /// Fraction of the lease TTL to wait before renewing
    pub renew_fraction: f64,
    /// Floor for every wait
    pub min_wait: Duration,
    /// Delay after the first failed cycle
    pub retry_initial: Duration,
    /// Cap for the exponential backoff
    pub retry_max: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self::from(&RenewalConfig::default())
    }
}

impl From<&RenewalConfig> for RenewalPolicy {
    fn from(config: &RenewalConfig) -> Self {
        Self {
            renew_fraction: config.renew_fraction,
            min_wait: Duration::from_secs(config.min_wait_seconds),
            retry_initial: Duration::from_secs(config.retry_initial_seconds),
            retry_max: Duration::from_secs(config.retry_max_seconds),
        }
    }
}

impl RenewalPolicy {
    /// Wait before renewing a lease of `lease_duration_secs`.
    ///
    /// `lease_duration_secs × renew_fraction`, rounded to the millisecond and
    /// clamped to `[min_wait, MAX_WAIT]`.
    pub fn wait_for_lease(&self, lease_duration_secs: u64) -> Duration {
        let millis = (lease_duration_secs as f64 * self.renew_fraction * 1000.0).round();
        let wait = if millis.is_finite() && millis >= 0.0 {
            Duration::from_millis(millis as u64)
        } else {
            MAX_WAIT
        };

        self.clamp(wait)
    }

    /// Delay before the next attempt after `consecutive_failures` failed cycles.
    ///
    /// `retry_initial × 2^(n-1)`, capped at `retry_max` and floored at `min_wait`.
    /// Never exceeds [`MAX_WAIT`].
    pub fn retry_delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(31);
        let delay = self.retry_initial.saturating_mul(1u32 << exponent).min(self.retry_max);

        self.clamp(delay)
    }

    fn clamp(&self, wait: Duration) -> Duration {
        wait.max(self.min_wait).min(MAX_WAIT)
    }
}
