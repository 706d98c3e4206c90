//! # Error Types
//!
//! One error enum per lifecycle stage: authentication, issuance, connection,
//! renewal, plus the errors callers of the connection handle can observe.

/// Errors raised while establishing a session with the secret-issuing service.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Neither the workload-identity token file nor a static token is available.
    #[error(
        "No credential source: workload identity token not found at '{token_path}' and no static token configured"
    )]
    NoCredentialSource { token_path: String },

    /// The workload-identity token file exists but could not be used.
    #[error("Workload identity token at '{path}' is unusable: {reason}")]
    TokenFileUnreadable { path: String, reason: String },

    /// The service refused the login.
    #[error("Login rejected by secret-issuing service: {message}")]
    LoginRejected { message: String },

    /// The service could not be reached or the client could not be built.
    #[error("Secret-issuing service unreachable: {message}")]
    Unreachable { message: String },
}

impl AuthError {
    /// Create a no credential source error.
    pub fn no_credential_source(token_path: impl Into<String>) -> Self {
        Self::NoCredentialSource { token_path: token_path.into() }
    }

    /// Create a token file unreadable error.
    pub fn token_file_unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TokenFileUnreadable { path: path.into(), reason: reason.into() }
    }

    /// Create a login rejected error.
    pub fn login_rejected(message: impl Into<String>) -> Self {
        Self::LoginRejected { message: message.into() }
    }

    /// Create an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable { message: message.into() }
    }
}

/// Errors raised while requesting a dynamic credential.
#[derive(thiserror::Error, Debug)]
pub enum IssuanceError {
    /// Network fault, timeout, or a 5xx / 429 response.
    #[error("Secret-issuing service unavailable: {message}")]
    BackendUnavailable { message: String },

    /// The response was missing fields or had fields of the wrong type.
    #[error("Malformed credential response: {message}")]
    MalformedResponse { message: String },

    /// The service refused the request (permission denied, unknown role).
    #[error("Credential request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl IssuanceError {
    /// Create a backend unavailable error.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable { message: message.into() }
    }

    /// Create a malformed response error.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse { message: message.into() }
    }

    /// Create a rejected error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected { status, message: message.into() }
    }
}

/// Errors raised while opening and validating a data-store connection.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// The driver could not open a connection with the issued credential.
    #[error("Failed to open data-store connection to {target}: {source}")]
    OpenFailed {
        target: String,
        #[source]
        source: StoreError,
    },

    /// The connection opened but did not answer a ping.
    #[error("Data-store liveness check failed for {target}: {source}")]
    LivenessCheckFailed {
        target: String,
        #[source]
        source: StoreError,
    },
}

/// Errors raised while renewing or revoking a lease.
#[derive(thiserror::Error, Debug)]
pub enum RenewalError {
    /// The lease is unknown to the service: expired, revoked, or never existed.
    #[error("Lease '{lease_id}' not found: {message}")]
    LeaseNotFound { lease_id: String, message: String },

    /// The lease exists but the service will not extend it.
    #[error("Lease '{lease_id}' is not renewable")]
    NotRenewable { lease_id: String },

    /// Network fault, timeout, or a 5xx / 429 response.
    #[error("Secret-issuing service unavailable: {message}")]
    BackendUnavailable { message: String },

    /// The service refused the request for another reason.
    #[error("Lease request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The renewal response could not be decoded.
    #[error("Malformed lease response: {message}")]
    MalformedResponse { message: String },
}

impl RenewalError {
    /// Create a lease not found error.
    pub fn lease_not_found(lease_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LeaseNotFound { lease_id: lease_id.into(), message: message.into() }
    }

    /// Create a not renewable error.
    pub fn not_renewable(lease_id: impl Into<String>) -> Self {
        Self::NotRenewable { lease_id: lease_id.into() }
    }

    /// Create a backend unavailable error.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable { message: message.into() }
    }

    /// Create a rejected error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected { status, message: message.into() }
    }

    /// Create a malformed response error.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse { message: message.into() }
    }
}

/// Errors reported by a data-store driver.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Database driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The connection has already been closed
    #[error("Connection is closed")]
    Closed,

    /// Any other driver failure
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a generic driver error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors observable by callers of the connection handle.
///
/// Lease-management failures never surface here: callers only see whether a
/// connection is available and whatever the driver reports for their statement.
#[derive(thiserror::Error, Debug)]
pub enum HandleError {
    /// No connection has been installed yet.
    #[error("Database connection not initialized")]
    NotInitialized,

    /// The handle was closed.
    #[error("Database connection closed")]
    Closed,

    /// The driver failed to run the statement.
    #[error(transparent)]
    Driver(#[from] StoreError),
}
