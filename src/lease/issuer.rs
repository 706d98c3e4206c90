//! Credential acquisition and connection construction.
//!
//! [`CredentialIssuer`] is used twice: once at startup for the initial
//! credential, and again by the renewal loop whenever a lease has to be
//! replaced. Both paths go through [`CredentialIssuer::provision`].

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn, Instrument};

use super::state::LeaseState;
use crate::config::DatabaseConfig;
use crate::errors::{ConnectionError, IssuanceError, RenewalError, Result};
use crate::lease_span;
use crate::secrets::{Credential, SecretIssuer};
use crate::storage::{ConnectParams, ConnectionHandle, DataStoreConnection, DataStoreDriver};

/// Issues credentials for one role and opens connections with them.
pub struct CredentialIssuer<D: DataStoreDriver> {
    secrets: Arc<dyn SecretIssuer>,
    driver: D,
    role_name: String,
    database: DatabaseConfig,
}

impl<D: DataStoreDriver> fmt::Debug for CredentialIssuer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("role_name", &self.role_name)
            .field("database", &self.database)
            .finish()
    }
}

impl<D: DataStoreDriver> CredentialIssuer<D> {
    pub fn new(
        secrets: Arc<dyn SecretIssuer>,
        driver: D,
        role_name: impl Into<String>,
        database: DatabaseConfig,
    ) -> Self {
        Self { secrets, driver, role_name: role_name.into(), database }
    }

    /// The secret-issuing service this issuer talks to.
    pub fn secrets(&self) -> &Arc<dyn SecretIssuer> {
        &self.secrets
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Request a fresh credential for the configured role.
    pub async fn issue(&self) -> std::result::Result<Credential, IssuanceError> {
        self.secrets.read_dynamic_credential(&self.role_name).await
    }

    /// Open a connection with `credential` and check that it answers.
    ///
    /// A connection that opens but fails its ping is closed before returning.
    pub async fn connect(
        &self,
        credential: &Credential,
    ) -> std::result::Result<D::Connection, ConnectionError> {
        let params = ConnectParams::from_credential(credential, &self.database);
        let target = params.target();

        let connection = self
            .driver
            .open(&params)
            .await
            .map_err(|source| ConnectionError::OpenFailed { target: target.clone(), source })?;

        if let Err(source) = connection.ping().await {
            connection.close().await;
            return Err(ConnectionError::LivenessCheckFailed { target, source });
        }

        info!(db_target = %target, "Database connection established");
        Ok(connection)
    }

    /// Swap `connection` into `handle`, closing the one it replaces.
    pub async fn install(
        &self,
        handle: &ConnectionHandle<D::Connection>,
        connection: D::Connection,
    ) -> Result<u64> {
        handle.install(connection).await
    }

    /// Issue, connect and install in one step.
    ///
    /// If anything after issuance fails, the new lease is revoked so it is not
    /// left orphaned, and the handle keeps its current connection.
    pub async fn provision(&self, handle: &ConnectionHandle<D::Connection>) -> Result<LeaseState> {
        let span = lease_span!("provision", role = %self.role_name);
        self.provision_inner(handle).instrument(span).await
    }

    async fn provision_inner(&self, handle: &ConnectionHandle<D::Connection>) -> Result<LeaseState> {
        let credential = self.issue().await?;
        let lease = LeaseState::from_credential(&credential);

        let connection = match self.connect(&credential).await {
            Ok(connection) => connection,
            Err(e) => {
                self.revoke_orphan(&lease.lease_id).await;
                return Err(e.into());
            }
        };

        let generation = match self.install(handle, connection).await {
            Ok(generation) => generation,
            Err(e) => {
                self.revoke_orphan(&lease.lease_id).await;
                return Err(e);
            }
        };

        info!(
            lease_id = %lease.lease_id,
            ttl_secs = lease.lease_duration_secs,
            renewable = lease.renewable,
            generation,
            "Credential provisioned"
        );
        Ok(lease)
    }

    /// Revoke a lease.
    pub async fn revoke(&self, lease_id: &str) -> std::result::Result<(), RenewalError> {
        self.secrets.revoke_lease(lease_id).await
    }

    async fn revoke_orphan(&self, lease_id: &str) {
        if let Err(e) = self.revoke(lease_id).await {
            warn!(lease_id = %lease_id, error = %e, "Failed to revoke unused lease");
        }
    }
}
