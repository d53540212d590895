//! Error types for the task store and structured error bodies for HTTP responses.

use crate::types::TaskId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Failure reaching, reading or decoding the remote document.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Network error or timeout talking to the document store.
    #[error("remote document store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The document store answered with a non-success status.
    #[error("remote document store rejected the request: HTTP {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    /// The stored content is not a valid task list.
    #[error("malformed task document: {0}")]
    MalformedDocument(String),
}

impl StorageError {
    /// Classify a transport error. Non-success statuses are handled by the
    /// callers before a body is read, so everything here is "unavailable".
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::RemoteUnavailable(format!("request timed out: {}", err))
        } else {
            StorageError::RemoteUnavailable(err.to_string())
        }
    }
}

/// Candidate task fields violate the task invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Error returned by every task store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl StoreError {
    /// True for failures of the remote document rather than of the caller's input.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,

    // Storage errors
    RemoteUnavailable,
    RemoteRejected,
    MalformedDocument,
}

impl ErrorCode {
    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidFieldValue => 422,
            ErrorCode::TaskNotFound => 404,
            ErrorCode::RemoteUnavailable | ErrorCode::RemoteRejected => 502,
            ErrorCode::MalformedDocument => 500,
        }
    }
}

/// Structured error body for HTTP responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn task_not_found(task_id: TaskId) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::task_not_found(id),
            StoreError::Validation(e) => {
                ApiError::new(ErrorCode::InvalidFieldValue, e.reason).with_field(e.field)
            }
            StoreError::Storage(e) => {
                // Upstream detail stays in the log, not in the response.
                error!("Document store failure: {}", e);
                let (code, message) = match e {
                    StorageError::RemoteUnavailable(_) => (
                        ErrorCode::RemoteUnavailable,
                        "Task document store is unavailable",
                    ),
                    StorageError::RemoteRejected { .. } => (
                        ErrorCode::RemoteRejected,
                        "Task document store rejected the request",
                    ),
                    StorageError::MalformedDocument(_) => (
                        ErrorCode::MalformedDocument,
                        "Stored task document is malformed",
                    ),
                };
                ApiError::new(code, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization() {
        let err = ApiError::task_not_found(3);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TASK_NOT_FOUND");
        assert_eq!(json["message"], "Task not found: 3");
        assert!(json.get("field").is_none());
    }

    #[test]
    fn test_store_error_mapping() {
        let api: ApiError = StoreError::from(ValidationError::new("name", "bad")).into();
        assert_eq!(api.code, ErrorCode::InvalidFieldValue);
        assert_eq!(api.field.as_deref(), Some("name"));
        assert_eq!(api.code.http_status(), 422);

        let api: ApiError = StoreError::from(StorageError::RemoteRejected {
            status: 401,
            body: "Bad credentials".into(),
        })
        .into();
        assert_eq!(api.code, ErrorCode::RemoteRejected);
        assert_eq!(api.code.http_status(), 502);
        assert!(!api.message.contains("Bad credentials"));

        let api: ApiError =
            StoreError::from(StorageError::MalformedDocument("not an array".into())).into();
        assert_eq!(api.code.http_status(), 500);
    }

    #[test]
    fn test_is_storage_failure() {
        assert!(StoreError::from(StorageError::RemoteUnavailable("x".into())).is_storage_failure());
        assert!(!StoreError::NotFound(1).is_storage_failure());
    }
}
