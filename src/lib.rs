//! # leasewarden
//!
//! Keeps a PostgreSQL connection authorized with short-lived database
//! credentials issued by HashiCorp Vault.
//!
//! ## Architecture
//!
//! ```text
//! AuthProvider → CredentialIssuer → ConnectionHandle ← application queries
//!                       ↑
//!                 LeaseRenewer (background: renew, or regenerate on failure)
//! ```
//!
//! ## Core Components
//!
//! - **AuthProvider**: Kubernetes workload-identity login with static-token fallback
//! - **CredentialIssuer**: dynamic credential issuance and connection setup
//! - **LeaseRenewer**: cancellable renewal loop with regeneration and backoff
//! - **ConnectionHandle**: the live connection, swapped atomically on regeneration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use leasewarden::{LeaseEngine, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = LeaseEngine::from_env().await?;
//!     let rows = engine.handle().query("SELECT current_user").await;
//!     println!("{} row(s)", rows.map(|r| r.len()).unwrap_or(0));
//!     engine.shutdown().await
//! }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod lease;
pub mod observability;
pub mod secrets;
pub mod storage;

pub use config::EngineConfig;
pub use engine::LeaseEngine;
pub use errors::{Error, Result};
pub use lease::{LeaseState, RenewerState};
pub use storage::ConnectionHandle;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
