//! Access to the secret-issuing service.
//!
//! This module covers everything that talks to Vault:
//!
//! - [`AuthProvider`] establishes a [`Session`] at startup, preferring a mounted
//!   Kubernetes service-account token and falling back to a static token.
//! - [`SecretIssuer`] is the narrow trait the lease engine depends on: issue a
//!   dynamic credential, renew its lease, revoke it.
//! - [`VaultLeaseClient`] implements [`SecretIssuer`] against the database
//!   secrets engine and the `sys/leases` endpoints.
//! - [`SecretString`] keeps passwords and tokens out of logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use leasewarden::config::VaultConfig;
//! use leasewarden::secrets::{AuthProvider, SecretIssuer, VaultLeaseClient};
//!
//! let config = VaultConfig::from_env()?;
//! let session = AuthProvider::new(config.clone()).authenticate().await?;
//! let issuer = VaultLeaseClient::new(Arc::new(session), &config)?;
//!
//! let credential = issuer.read_dynamic_credential(&config.role_name).await?;
//! issuer.renew_lease(&credential.lease_id, None).await?;
//! ```

pub mod auth;
pub mod client;
pub mod types;
pub mod vault;

pub use auth::{AuthMethod, AuthProvider, Session};
pub use client::{Credential, LeaseRenewal, SecretIssuer};
pub use types::SecretString;
pub use vault::{parse_credential, VaultLeaseClient};
