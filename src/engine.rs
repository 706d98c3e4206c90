//! # Lease Engine
//!
//! Startup sequence and lifecycle for one dynamic-credential lease bound to
//! one data-store connection:
//!
//! 1. authenticate with the secret-issuing service
//! 2. issue the initial credential, connect, install it in the handle
//! 3. spawn the renewal loop
//!
//! Any failure during startup is returned; the engine never runs
//! half-initialized.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::errors::{Error, Result};
use crate::lease::{CredentialIssuer, LeaseRenewer, LeaseState, RenewalPolicy, RenewerState};
use crate::secrets::{AuthProvider, SecretIssuer, VaultLeaseClient};
use crate::storage::{ConnectionHandle, DataStoreDriver, PostgresDriver};

/// A running lease engine.
///
/// Dropping the engine cancels the renewal loop; call
/// [`shutdown`](Self::shutdown) to also revoke the lease and close the connection.
pub struct LeaseEngine<D: DataStoreDriver = PostgresDriver> {
    handle: Arc<ConnectionHandle<D::Connection>>,
    issuer: Arc<CredentialIssuer<D>>,
    lease_rx: watch::Receiver<LeaseState>,
    state_rx: watch::Receiver<RenewerState>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
    revoke_on_shutdown: bool,
}

impl LeaseEngine<PostgresDriver> {
    /// Start against Vault and PostgreSQL using `config`.
    pub async fn start(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let session = AuthProvider::new(config.vault.clone()).authenticate().await?;
        let secrets = VaultLeaseClient::new(Arc::new(session), &config.vault)?;

        Self::start_with(Arc::new(secrets), PostgresDriver::new(), &config).await
    }

    /// Load configuration from the environment and start.
    pub async fn from_env() -> Result<Self> {
        Self::start(EngineConfig::from_env()?).await
    }
}

impl<D: DataStoreDriver> LeaseEngine<D> {
    /// Start with an already-authenticated secret issuer and a driver.
    pub async fn start_with(
        secrets: Arc<dyn SecretIssuer>,
        driver: D,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let issuer = Arc::new(CredentialIssuer::new(
            secrets,
            driver,
            config.vault.role_name.clone(),
            config.database.clone(),
        ));
        let handle = Arc::new(ConnectionHandle::new());

        let lease = issuer.provision(&handle).await?;

        let renewer = LeaseRenewer::new(
            Arc::clone(&issuer),
            Arc::clone(&handle),
            RenewalPolicy::from(&config.renewal),
            lease.clone(),
        );
        let lease_rx = renewer.subscribe_lease();
        let state_rx = renewer.subscribe_state();

        let cancel = CancellationToken::new();
        let task = renewer.spawn(cancel.clone());

        info!(
            role = %config.vault.role_name,
            lease_id = %lease.lease_id,
            ttl_secs = lease.lease_duration_secs,
            "Lease engine started"
        );

        Ok(Self {
            handle,
            issuer,
            lease_rx,
            state_rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
            revoke_on_shutdown: config.renewal.revoke_on_shutdown,
        })
    }

    /// The connection handle for application queries.
    pub fn handle(&self) -> Arc<ConnectionHandle<D::Connection>> {
        Arc::clone(&self.handle)
    }

    pub fn current_lease(&self) -> LeaseState {
        self.lease_rx.borrow().clone()
    }

    pub fn renewer_state(&self) -> RenewerState {
        self.state_rx.borrow().clone()
    }

    /// Receiver for lease replacements.
    pub fn subscribe_lease(&self) -> watch::Receiver<LeaseState> {
        self.lease_rx.clone()
    }

    /// Receiver for renewer state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<RenewerState> {
        self.state_rx.clone()
    }

    /// Stop renewing, optionally revoke the lease, close the connection.
    ///
    /// A failed revocation is logged and does not fail the shutdown.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await.map_err(|e| Error::internal(format!("Renewal task failed: {}", e)))?;

        let lease = self.lease_rx.borrow().clone();
        if self.revoke_on_shutdown {
            match self.issuer.revoke(&lease.lease_id).await {
                Ok(()) => info!(lease_id = %lease.lease_id, "Lease revoked on shutdown"),
                Err(e) => warn!(lease_id = %lease.lease_id, error = %e, "Failed to revoke lease on shutdown"),
            }
        }

        self.handle.close().await;
        info!("Lease engine stopped");
        Ok(())
    }
}
