//! The swappable connection exposed to application code.
//!
//! Callers only ever see a [`ConnectionHandle`]. The renewal loop replaces the
//! connection behind it when a credential is regenerated; readers hold the
//! read lock for the duration of one call, and the swap plus the close of the
//! superseded connection happen under the write lock. A reader therefore runs
//! against either the old or the new connection, never a closed one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::driver::DataStoreConnection;
use crate::errors::{Error, HandleError, Result, StoreError};

enum Slot<C> {
    Uninitialized,
    Active(Arc<C>),
    Closed,
}

/// Live, swappable data-store connection.
pub struct ConnectionHandle<C> {
    slot: RwLock<Slot<C>>,
    generation: AtomicU64,
}

impl<C> Default for ConnectionHandle<C> {
    fn default() -> Self {
        Self { slot: RwLock::new(Slot::Uninitialized), generation: AtomicU64::new(0) }
    }
}

impl<C> std::fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").field("generation", &self.generation()).finish()
    }
}

impl<C: DataStoreConnection> ConnectionHandle<C> {
    /// An empty handle. Every call fails with [`HandleError::NotInitialized`]
    /// until the first [`install`](Self::install).
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the current connection while holding the read lock.
    ///
    /// The connection cannot be swapped or closed until the returned future
    /// completes. Do not keep the `Arc` past the closure.
    pub async fn with_connection<F, Fut, T>(&self, f: F) -> std::result::Result<T, HandleError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let slot = self.slot.read().await;
        let connection = match &*slot {
            Slot::Active(connection) => Arc::clone(connection),
            Slot::Uninitialized => return Err(HandleError::NotInitialized),
            Slot::Closed => return Err(HandleError::Closed),
        };

        let result = f(connection).await;
        drop(slot);
        Ok(result?)
    }

    /// Run a statement and collect its rows.
    pub async fn query(&self, statement: &str) -> std::result::Result<Vec<C::Row>, HandleError> {
        self.with_connection(|connection| async move { connection.query(statement).await }).await
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&self, statement: &str) -> std::result::Result<u64, HandleError> {
        self.with_connection(|connection| async move { connection.execute(statement).await }).await
    }

    /// Run a statement with bound parameters and collect its rows.
    ///
    /// For PostgreSQL `args` is a [`PgArguments`](sqlx::postgres::PgArguments)
    /// filled with `Arguments::add` in placeholder order.
    pub async fn query_with(
        &self,
        statement: &str,
        args: C::Args,
    ) -> std::result::Result<Vec<C::Row>, HandleError> {
        self.with_connection(|connection| async move { connection.query_with(statement, args).await })
            .await
    }

    /// Run a statement with bound parameters and return the number of affected rows.
    pub async fn execute_with(
        &self,
        statement: &str,
        args: C::Args,
    ) -> std::result::Result<u64, HandleError> {
        self.with_connection(|connection| async move {
            connection.execute_with(statement, args).await
        })
        .await
    }

    /// Swap in `connection` and close the one it replaces.
    ///
    /// Returns the new generation number. If the handle was already closed the
    /// new connection is closed too and [`Error::HandleClosed`] is returned.
    pub async fn install(&self, connection: C) -> Result<u64> {
        let mut slot = self.slot.write().await;

        if matches!(*slot, Slot::Closed) {
            drop(slot);
            connection.close().await;
            return Err(Error::HandleClosed);
        }

        let previous = std::mem::replace(&mut *slot, Slot::Active(Arc::new(connection)));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Slot::Active(previous) = previous {
            previous.close().await;
            tracing::debug!(generation, "Superseded connection closed");
        }

        Ok(generation)
    }

    /// Close the current connection. Later calls fail with [`HandleError::Closed`].
    ///
    /// Idempotent.
    pub async fn close(&self) {
        let mut slot = self.slot.write().await;
        if let Slot::Active(connection) = std::mem::replace(&mut *slot, Slot::Closed) {
            connection.close().await;
            tracing::info!(generation = self.generation(), "Connection handle closed");
        }
    }

    /// Whether a connection has been installed and the handle is not closed.
    pub async fn is_initialized(&self) -> bool {
        matches!(*self.slot.read().await, Slot::Active(_))
    }

    /// Whether [`close`](Self::close) has been called.
    pub async fn is_closed(&self) -> bool {
        matches!(*self.slot.read().await, Slot::Closed)
    }
}

impl<C> ConnectionHandle<C> {
    /// Number of connections installed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
