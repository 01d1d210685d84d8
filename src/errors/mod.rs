//! # Error Handling
//!
//! Error types for the secrets lifecycle engine using `thiserror`.
//!
//! Every operation returns [`Result`]. Callers that render results (request
//! layers, the CLI) use [`Error::kind`] as the machine-checkable category and
//! the `Display` output as the human-readable message; they never need to look
//! inside store responses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Custom result type for vaultgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the secrets lifecycle engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed domain object. Never reaches the store.
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// The store rejected a write because of an optimistic-concurrency mismatch
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The tenant's secrets configuration is not active
    #[error("Secrets manager is not active for {tenant}")]
    InactiveConfig { tenant: String },

    /// Resource not found
    #[error("Resource not found: {resource_type} '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Opaque remote failure reported by (or on the way to) the secret store
    #[error("Secret store error: {message}")]
    Store { status: Option<u16>, message: String },

    /// An exclusive lease could not be acquired
    #[error("Lease contention: '{scope}' is held by another operation")]
    LeaseContention { scope: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-checkable error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    InactiveConfig,
    NotFound,
    Store,
    LeaseContention,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InactiveConfig => "inactive_config",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Store => "store",
            ErrorKind::LeaseContention => "lease_contention",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Create an inactive-configuration error for a tenant
    pub fn inactive<S: Into<String>>(tenant: S) -> Self {
        Self::InactiveConfig { tenant: tenant.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a store error carrying the remote status, if any
    pub fn store<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Store { status, message: message.into() }
    }

    /// Create a lease contention error
    pub fn lease_contention<S: Into<String>>(scope: S) -> Self {
        Self::LeaseContention { scope: scope.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// The machine-checkable category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::InactiveConfig { .. } => ErrorKind::InactiveConfig,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Store { .. } => ErrorKind::Store,
            Error::LeaseContention { .. } => ErrorKind::LeaseContention,
            Error::Config(_) => ErrorKind::Config,
            Error::Serialization { .. } | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the store could not be reached at all (no HTTP status)
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Store { status: None, .. })
    }

    /// Check if the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict { .. } | Error::LeaseContention { .. } => true,
            Error::Store { status, .. } => status.map_or(true, |s| s >= 500),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Store { status: error.status().map(|s| s.as_u16()), message: error.to_string() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let first_field = fields.first().map(|(field, _)| field.to_string());
        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Validation { message: format!("Validation failed: {}", message), field: first_field }
    }
}

/// Tagged success/error result handed to rendering layers.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceResponse<T> {
    Success { payload: T },
    Error { message: String, kind: ErrorKind },
}

impl<T> ServiceResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ServiceResponse::Success { .. })
    }
}

impl<T> From<Result<T>> for ServiceResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => ServiceResponse::Success { payload },
            Err(error) => ServiceResponse::Error { message: error.to_string(), kind: error.kind() },
        }
    }
}
