//! # PostgreSQL Driver
//!
//! `sqlx` implementation of the data-store seam. Each issued credential gets
//! its own small pool; the pool is closed when the credential is superseded.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{Connection, PgPool};

use super::driver::{ConnectParams, DataStoreConnection, DataStoreDriver};
use crate::errors::StoreError;

/// Opens [`PostgresConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

/// Build sqlx connect options from the issued credential and target.
pub fn connect_options(params: &ConnectParams) -> Result<PgConnectOptions, StoreError> {
    let ssl_mode = PgSslMode::from_str(&params.ssl_mode)?;

    Ok(PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .database(&params.database)
        .username(&params.username)
        .password(params.password.expose_secret())
        .ssl_mode(ssl_mode))
}

#[async_trait]
impl DataStoreDriver for PostgresDriver {
    type Connection = PostgresConnection;

    async fn open(&self, params: &ConnectParams) -> Result<PostgresConnection, StoreError> {
        let options = connect_options(params)?;

        let pool = PgPoolOptions::new()
            .max_connections(params.max_connections)
            .acquire_timeout(params.connect_timeout)
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, db_target = %params.target(), "Failed to create database pool");
                StoreError::from(e)
            })?;

        tracing::info!(
            db_target = %params.target(),
            ssl_mode = %params.ssl_mode,
            max_connections = params.max_connections,
            connect_timeout_ms = params.connect_timeout.as_millis(),
            "Database connection pool created"
        );

        Ok(PostgresConnection { pool })
    }
}

/// A pool opened with one issued credential.
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    /// The underlying pool, for callers that need the full sqlx API.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DataStoreConnection for PostgresConnection {
    type Row = PgRow;
    type Args = PgArguments;

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn query_with(&self, statement: &str, args: PgArguments) -> Result<Vec<PgRow>, StoreError> {
        Ok(sqlx::query_with(statement, args).fetch_all(&self.pool).await?)
    }

    async fn execute_with(&self, statement: &str, args: PgArguments) -> Result<u64, StoreError> {
        let result = sqlx::query_with(statement, args).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::debug!("Database connection pool closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
