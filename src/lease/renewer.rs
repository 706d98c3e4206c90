//! Background lease renewal.
//!
//! The loop sleeps for a fraction of the lease TTL, renews, and falls back to
//! regenerating the credential when renewal fails. A failed regeneration is
//! retried with exponential backoff; the loop never exits on its own.
//!
//! ```text
//!   Scheduled ──wake──▶ Renewing ──ok──▶ Scheduled
//!                          │
//!                          └──err──▶ Regenerating ──ok──▶ Scheduled
//!                                        │
//!                                        └──err──▶ Failed ──wake──▶ Renewing
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::issuer::CredentialIssuer;
use super::policy::RenewalPolicy;
use super::state::{LeaseState, RenewerState};
use crate::errors::Result;
use crate::lease_span;
use crate::observability::LeaseMetrics;
use crate::storage::{ConnectionHandle, DataStoreDriver};

/// Keeps the current lease alive for as long as the task runs.
pub struct LeaseRenewer<D: DataStoreDriver> {
    issuer: Arc<CredentialIssuer<D>>,
    handle: Arc<ConnectionHandle<D::Connection>>,
    policy: RenewalPolicy,
    metrics: LeaseMetrics,
    lease_tx: watch::Sender<LeaseState>,
    state_tx: watch::Sender<RenewerState>,
}

impl<D: DataStoreDriver> LeaseRenewer<D> {
    /// Create a renewer for `initial`, which must already be installed in `handle`.
    pub fn new(
        issuer: Arc<CredentialIssuer<D>>,
        handle: Arc<ConnectionHandle<D::Connection>>,
        policy: RenewalPolicy,
        initial: LeaseState,
    ) -> Self {
        let wait = policy.wait_for_lease(initial.lease_duration_secs);
        let (lease_tx, _) = watch::channel(initial);
        let (state_tx, _) =
            watch::channel(RenewerState::Scheduled { wait, wake_at: Instant::now() + wait });

        Self { issuer, handle, policy, metrics: LeaseMetrics::new(), lease_tx, state_tx }
    }

    /// Receiver for state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<RenewerState> {
        self.state_tx.subscribe()
    }

    /// Receiver for lease replacements.
    pub fn subscribe_lease(&self) -> watch::Receiver<LeaseState> {
        self.lease_tx.subscribe()
    }

    pub fn current_lease(&self) -> LeaseState {
        self.lease_tx.borrow().clone()
    }

    /// Run the loop on the current runtime until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run the loop until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let initial = self.current_lease();
        self.metrics.update_lease_ttl(initial.lease_duration_secs);

        let mut wait = self.policy.wait_for_lease(initial.lease_duration_secs);
        let mut wake_at = Instant::now() + wait;
        let mut consecutive_failures: u32 = 0;
        self.set_state(RenewerState::Scheduled { wait, wake_at });
        info!(
            lease_id = %initial.lease_id,
            wait_secs = wait.as_secs_f64(),
            "Lease renewal scheduled"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(wake_at) => {}
            }

            match self.run_cycle().await {
                Ok(lease) => {
                    consecutive_failures = 0;
                    self.metrics.update_consecutive_failures(0);

                    wait = self.policy.wait_for_lease(lease.lease_duration_secs);
                    wake_at = Instant::now() + wait;
                    self.set_state(RenewerState::Scheduled { wait, wake_at });
                    info!(
                        lease_id = %lease.lease_id,
                        wait_secs = wait.as_secs_f64(),
                        "Lease renewal scheduled"
                    );
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    self.metrics.update_consecutive_failures(consecutive_failures);

                    wait = self.policy.retry_delay(consecutive_failures);
                    wake_at = Instant::now() + wait;
                    error!(
                        error = %e,
                        consecutive_failures,
                        retry_in_secs = wait.as_secs_f64(),
                        "Credential regeneration failed, will retry"
                    );
                    self.set_state(RenewerState::Failed {
                        error: e.to_string(),
                        consecutive_failures,
                        retry_at: wake_at,
                    });
                }
            }
        }

        self.set_state(RenewerState::Stopped);
        info!("Lease renewer stopped");
    }

    /// One wake-up: renew, or regenerate if renewal is impossible or fails.
    async fn run_cycle(&self) -> Result<LeaseState> {
        let lease = self.current_lease();
        let span = lease_span!("renewal_cycle", lease_id = %lease.lease_id);

        async {
            if lease.renewable {
                if let Some(renewed) = self.renew(&lease).await {
                    return Ok(renewed);
                }
            } else {
                info!(lease_id = %lease.lease_id, "Lease is not renewable, regenerating credential");
            }

            self.regenerate().await
        }
        .instrument(span)
        .await
    }

    async fn renew(&self, lease: &LeaseState) -> Option<LeaseState> {
        self.set_state(RenewerState::Renewing);
        debug!(lease_id = %lease.lease_id, "Renewing lease");

        match self.issuer.secrets().renew_lease(&lease.lease_id, None).await {
            Ok(renewal) => {
                self.metrics.record_renewal(true);
                self.metrics.update_lease_ttl(renewal.lease_duration_secs);

                let renewed = lease.renewed(&renewal);
                info!(
                    lease_id = %renewed.lease_id,
                    ttl_secs = renewed.lease_duration_secs,
                    renewable = renewed.renewable,
                    "Lease renewed"
                );
                self.lease_tx.send_replace(renewed.clone());
                Some(renewed)
            }
            Err(e) => {
                self.metrics.record_renewal(false);
                warn!(
                    lease_id = %lease.lease_id,
                    error = %e,
                    "Lease renewal failed, regenerating credential"
                );
                None
            }
        }
    }

    async fn regenerate(&self) -> Result<LeaseState> {
        self.set_state(RenewerState::Regenerating);

        match self.issuer.provision(&self.handle).await {
            Ok(lease) => {
                self.metrics.record_regeneration(true);
                self.metrics.update_lease_ttl(lease.lease_duration_secs);
                info!(
                    lease_id = %lease.lease_id,
                    ttl_secs = lease.lease_duration_secs,
                    "Credential regenerated"
                );
                self.lease_tx.send_replace(lease.clone());
                Ok(lease)
            }
            Err(e) => {
                self.metrics.record_regeneration(false);
                Err(e)
            }
        }
    }

    fn set_state(&self, state: RenewerState) {
        debug!(state = state.name(), "Renewer state changed");
        self.state_tx.send_replace(state);
    }
}
