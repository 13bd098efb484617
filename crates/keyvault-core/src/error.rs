//! Vault error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during secret lifecycle operations
///
/// `NotFound` and `InvalidState` are expected control flow (checking existence
/// before a purge, for example), not fatal conditions.
///
/// The enum is serializable so the RPC server can hand the exact variant back
/// to a remote caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum VaultError {
    /// Unknown secret name or version, or a secret that was already purged
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// Illegal lifecycle transition or request
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed request (e.g. an empty secret name)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A wait on a long-running operation exceeded its deadline
    #[error("Timed out waiting for operation {operation}")]
    Timeout { operation: String },

    /// The backend reported a terminal failure for an operation
    #[error("Operation {operation} failed: {cause}")]
    OperationFailed { operation: String, cause: String },

    /// The caller stopped waiting
    #[error("Wait cancelled")]
    Cancelled,

    /// The backend does not offer this capability
    #[error("Not supported by backend {backend}: {message}")]
    Unsupported { backend: String, message: String },

    /// Credentials were missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport-level failure talking to the backend
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl VaultError {
    /// Create a not found error for a secret name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a not found error for a specific version of a secret
    pub fn version_not_found(name: &str, version: &str) -> Self {
        Self::NotFound(format!("{}/{}", name, version))
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an operation failed error
    pub fn operation_failed(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    /// Create an unsupported capability error
    pub fn unsupported(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a backend unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = VaultError::version_not_found("BankAccountSecret", "abc123");
        assert_eq!(err.to_string(), "Secret not found: BankAccountSecret/abc123");

        let err = VaultError::operation_failed("op-1", "disk full");
        assert_eq!(err.to_string(), "Operation op-1 failed: disk full");

        let err = VaultError::unsupported("memory", "operation cancel");
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_predicates() {
        assert!(VaultError::not_found("a").is_not_found());
        assert!(!VaultError::not_found("a").is_invalid_state());
        assert!(VaultError::invalid_state("purge before delete").is_invalid_state());
        assert!(VaultError::Timeout { operation: "op".into() }.is_timeout());
    }
}
