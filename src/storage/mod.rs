//! # Storage
//!
//! Data-store connectivity for the lease engine:
//!
//! - [`DataStoreDriver`] / [`DataStoreConnection`]: the driver seam
//! - [`PostgresDriver`]: the `sqlx` PostgreSQL implementation
//! - [`ConnectionHandle`]: the swappable connection handed to callers

pub mod driver;
pub mod handle;
pub mod postgres;

pub use crate::config::DatabaseConfig;

pub use driver::{ConnectParams, DataStoreConnection, DataStoreDriver};
pub use handle::ConnectionHandle;
pub use postgres::{PostgresConnection, PostgresDriver};
pub use sqlx::postgres::PgArguments;

/// Handle type used by the default engine.
pub type PgConnectionHandle = ConnectionHandle<PostgresConnection>;
