//! Narrow interface to the secret-issuing service.
//!
//! The lease engine needs exactly three operations from the service once a
//! session exists: read a dynamic credential, renew its lease, and revoke it.

use async_trait::async_trait;
use std::time::Duration;

use super::types::SecretString;
use crate::errors::{IssuanceError, RenewalError};

/// A dynamically generated database credential and the lease that bounds it.
///
/// Immutable once issued. A regeneration produces a new `Credential`; the old
/// one is simply dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Database username generated for this lease
    pub username: String,

    /// Database password (redacted in logs)
    pub password: SecretString,

    /// Opaque lease identifier used for renew and revoke
    pub lease_id: String,

    /// Lease time-to-live in seconds at issue time
    pub lease_duration_secs: u64,

    /// Whether the service allows this lease to be extended
    pub renewable: bool,
}

impl Credential {
    /// Lease time-to-live as a `Duration`.
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}

/// Result of a successful lease renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRenewal {
    /// Lease identifier echoed back by the service
    pub lease_id: String,

    /// New time-to-live in seconds, counted from the renewal
    pub lease_duration_secs: u64,

    /// Whether further renewals are allowed
    pub renewable: bool,
}

/// Operations the lease engine performs against the secret-issuing service.
///
/// Implementations are bound to an authenticated session. They MUST NOT log
/// credential passwords or session tokens.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use leasewarden::secrets::{Credential, LeaseRenewal, SecretIssuer};
///
/// struct StaticIssuer;
///
/// #[async_trait::async_trait]
/// impl SecretIssuer for StaticIssuer {
///     async fn read_dynamic_credential(&self, role: &str) -> Result<Credential, IssuanceError> {
///         Ok(Credential { /* ... */ })
///     }
///
///     async fn renew_lease(&self, lease_id: &str, increment: Option<Duration>)
///         -> Result<LeaseRenewal, RenewalError> { /* ... */ }
///
///     async fn revoke_lease(&self, lease_id: &str) -> Result<(), RenewalError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SecretIssuer: Send + Sync {
    /// Generate a fresh credential for `role`.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::BackendUnavailable`] on network faults or 5xx responses
    /// - [`IssuanceError::MalformedResponse`] when fields are missing or mistyped
    /// - [`IssuanceError::Rejected`] when the service refuses the request
    async fn read_dynamic_credential(&self, role: &str) -> Result<Credential, IssuanceError>;

    /// Extend the lease identified by `lease_id`.
    ///
    /// `increment` asks for a specific extension; `None` lets the service pick.
    async fn renew_lease(
        &self,
        lease_id: &str,
        increment: Option<Duration>,
    ) -> Result<LeaseRenewal, RenewalError>;

    /// Revoke the lease, invalidating its credential immediately.
    async fn revoke_lease(&self, lease_id: &str) -> Result<(), RenewalError>;
}
