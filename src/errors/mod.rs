//! # Error Handling
//!
//! Error types for the lease lifecycle engine, built on `thiserror`.
//!
//! Each stage of the lifecycle has its own error enum (see [`types`]). The
//! top-level [`Error`] wraps them so that startup can propagate any stage
//! failure with `?`.

pub mod types;

pub use types::{
    AuthError, ConnectionError, HandleError, IssuanceError, RenewalError, StoreError,
};

/// Custom result type for leasewarden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the lease lifecycle engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication with the secret-issuing service failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Dynamic credential issuance failed
    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    /// Opening or validating the data-store connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Lease renewal or revocation failed
    #[error(transparent)]
    Renewal(#[from] RenewalError),

    /// The connection handle was closed while a new connection was being installed
    #[error("Connection handle is closed")]
    HandleClosed,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = Vec::new();
        collect_validation_messages("", &errors, &mut messages);
        messages.sort();

        Self::Config(format!("Validation failed: {}", messages.join("; ")))
    }
}

fn collect_validation_messages(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<String>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path =
            if prefix.is_empty() { field.to_string() } else { format!("{}.{}", prefix, field) };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                out.push(format!("{}: {}", path, error_messages.join(", ")));
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_messages(&path, nested, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}
