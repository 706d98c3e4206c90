//! # Lease Lifecycle
//!
//! Credential acquisition ([`CredentialIssuer`]), background renewal
//! ([`LeaseRenewer`]) and the scheduling rules they share ([`RenewalPolicy`]).

pub mod issuer;
pub mod policy;
pub mod renewer;
pub mod state;

pub use issuer::CredentialIssuer;
pub use policy::{RenewalPolicy, MAX_WAIT};
pub use renewer::LeaseRenewer;
pub use state::{LeaseState, RenewerState};
