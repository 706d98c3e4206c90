//! Data-store driver seam.
//!
//! The lease engine only needs to open a connection with issued credentials,
//! check that it is alive, and close it. Query execution is exposed so the
//! [`ConnectionHandle`](super::ConnectionHandle) can forward caller work.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::errors::StoreError;
use crate::secrets::{Credential, SecretString};

/// Everything a driver needs to open one connection.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl ConnectParams {
    /// Combine an issued credential with the configured target.
    pub fn from_credential(credential: &Credential, config: &DatabaseConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            database: config.name.clone(),
            username: credential.username.clone(),
            password: credential.password.clone(),
            ssl_mode: config.ssl_mode.clone(),
            max_connections: config.max_connections,
            connect_timeout: config.connect_timeout(),
        }
    }

    /// `user@host:port/database`, safe for logs.
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.username, self.host, self.port, self.database)
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("target", &self.target())
            .field("password", &self.password)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Opens connections with a given set of credentials.
#[async_trait]
pub trait DataStoreDriver: Send + Sync + 'static {
    type Connection: DataStoreConnection;

    /// Open a connection. No liveness check is implied.
    async fn open(&self, params: &ConnectParams) -> Result<Self::Connection, StoreError>;
}

/// A live connection as seen by the lease engine.
#[async_trait]
pub trait DataStoreConnection: Send + Sync + 'static {
    /// Row type returned by [`query`](Self::query).
    type Row: Send + 'static;

    /// Bind parameters for a statement. The default value binds nothing.
    type Args: Default + Send + 'static;

    /// Round-trip to the server.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Run a statement with bound parameters and collect its rows.
    async fn query_with(
        &self,
        statement: &str,
        args: Self::Args,
    ) -> Result<Vec<Self::Row>, StoreError>;

    /// Run a statement with bound parameters and return the number of affected rows.
    async fn execute_with(&self, statement: &str, args: Self::Args) -> Result<u64, StoreError>;

    /// Run a statement without parameters and collect its rows.
    async fn query(&self, statement: &str) -> Result<Vec<Self::Row>, StoreError> {
        self.query_with(statement, Self::Args::default()).await
    }

    /// Run a statement without parameters and return the number of affected rows.
    async fn execute(&self, statement: &str) -> Result<u64, StoreError> {
        self.execute_with(statement, Self::Args::default()).await
    }

    /// Release the connection. Must be idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}
