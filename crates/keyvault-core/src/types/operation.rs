//! Long-running operation types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::secret::{DeletedSecret, SecretProperties};

/// Opaque handle to a backend operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationToken(String);

impl OperationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    /// Cancelled on the backend (only when the backend supports it)
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::NotStarted => "not_started",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of an operation's progress
///
/// `value` may be populated before the operation finishes when the backend
/// already knows the result (a delete knows its recovery id up front).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse<T> {
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    /// Failure cause reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> PollResponse<T> {
    pub fn not_started() -> Self {
        Self {
            status: OperationStatus::NotStarted,
            value: None,
            error: None,
        }
    }

    pub fn in_progress(value: Option<T>) -> Self {
        Self {
            status: OperationStatus::InProgress,
            value,
            error: None,
        }
    }

    pub fn succeeded(value: T) -> Self {
        Self {
            status: OperationStatus::Succeeded,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            value: None,
            error: Some(cause.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: OperationStatus::Cancelled,
            value: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Convert the carried value, keeping status and error
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<PollResponse<U>, E> {
        let value = self.value.map(f).transpose()?;
        Ok(PollResponse {
            status: self.status,
            value,
            error: self.error,
        })
    }
}

/// Result payload of a backend operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "camelCase")]
pub enum OperationOutcome {
    /// A delete finished (or is in flight) and produced this deleted secret
    Deleted(DeletedSecret),
    /// A recover finished and the secret is active again
    Recovered(SecretProperties),
}

impl OperationOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationOutcome::Deleted(_) => "deleted",
            OperationOutcome::Recovered(_) => "recovered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!OperationStatus::NotStarted.is_terminal());
        assert!(!OperationStatus::InProgress.is_terminal());
        assert!(OperationStatus::Succeeded.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_poll_response_try_map() {
        let response = PollResponse::in_progress(Some(2u32));
        let mapped: PollResponse<String> = response
            .try_map(|v| Ok::<_, ()>(format!("v{}", v)))
            .unwrap();
        assert_eq!(mapped.status, OperationStatus::InProgress);
        assert_eq!(mapped.value.as_deref(), Some("v2"));

        let failed: PollResponse<u32> = PollResponse::failed("boom");
        let mapped = failed.try_map(|v| Ok::<_, ()>(v + 1)).unwrap();
        assert_eq!(mapped.error.as_deref(), Some("boom"));
        assert!(mapped.value.is_none());
    }

    #[test]
    fn test_poll_response_wire_format() {
        let response: PollResponse<u32> = PollResponse::failed("boom");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_poll_response_without_value_decodes() {
        // OperationOutcome has no Default; a missing value must still decode
        let json = serde_json::json!({ "status": "inProgress" });
        let response: PollResponse<OperationOutcome> = serde_json::from_value(json).unwrap();
        assert_eq!(response.status, OperationStatus::InProgress);
        assert!(response.value.is_none());
        assert!(response.error.is_none());
    }
}
