//! Lease bookkeeping and the renewer's observable state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::secrets::{Credential, LeaseRenewal};

/// The single live lease.
///
/// Replaced wholesale: on renewal (same ID, new duration) or on regeneration
/// (new ID and duration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseState {
    pub lease_id: String,
    pub lease_duration_secs: u64,
    pub renewable: bool,
    pub issued_at: DateTime<Utc>,
}

impl LeaseState {
    /// Lease state for a freshly issued credential.
    pub fn from_credential(credential: &Credential) -> Self {
        Self {
            lease_id: credential.lease_id.clone(),
            lease_duration_secs: credential.lease_duration_secs,
            renewable: credential.renewable,
            issued_at: Utc::now(),
        }
    }

    /// State after a successful renewal of this lease.
    pub fn renewed(&self, renewal: &LeaseRenewal) -> Self {
        Self {
            lease_id: self.lease_id.clone(),
            lease_duration_secs: renewal.lease_duration_secs,
            renewable: renewal.renewable,
            issued_at: Utc::now(),
        }
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }

    /// When the lease lapses unless renewed.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.lease_duration_secs).unwrap_or(i64::MAX);

        chrono::Duration::try_seconds(secs)
            .and_then(|duration| self.issued_at.checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Observable state of the renewal loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewerState {
    /// Sleeping until the next renewal.
    Scheduled { wait: Duration, wake_at: Instant },
    /// Renewal request in flight.
    Renewing,
    /// Issuing a new credential and swapping the connection.
    Regenerating,
    /// The last cycle failed; the next attempt runs at `retry_at`.
    Failed { error: String, consecutive_failures: u32, retry_at: Instant },
    /// The loop has exited after cancellation.
    Stopped,
}

impl RenewerState {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RenewerState::Scheduled { .. } => "scheduled",
            RenewerState::Renewing => "renewing",
            RenewerState::Regenerating => "regenerating",
            RenewerState::Failed { .. } => "failed",
            RenewerState::Stopped => "stopped",
        }
    }
}
