//! Error types for planbook
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown entity, invalid transition)
//! - 3: Blocked by policy (task deletion disabled, dependency cycle)
//! - 4: Operation failed (storage I/O, serialization, lock contention)

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Exit codes for the planbook CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for planbook operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Story not found: {0}")]
    StoryNotFound(Uuid),

    #[error("Schedule entry not found: {entry_id} on task {task_id}")]
    ScheduleEntryNotFound { task_id: Uuid, entry_id: String },

    #[error("Relationship not found: {relationship_id} on task {task_id}")]
    RelationshipNotFound {
        task_id: Uuid,
        relationship_id: String,
    },

    #[error(
        "Invalid state transition from {from} to {to}: \
         tasks may only be closed as Finished, Failed, Deferred, or Removed"
    )]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // Policy blocks (exit code 3)
    #[error("Task deletion is disabled: tasks are a permanent record once filed")]
    TaskDeletionDisabled,

    #[error("Dependency cycle detected involving task {0}")]
    DependencyCycle(Uuid),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::TaskNotFound(_)
            | Error::StoryNotFound(_)
            | Error::ScheduleEntryNotFound { .. }
            | Error::RelationshipNotFound { .. }
            | Error::InvalidStateTransition { .. }
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::MalformedSnapshot(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::TaskDeletionDisabled | Error::DependencyCycle(_) => {
                exit_codes::POLICY_BLOCKED
            }

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured detail payload for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidStateTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
                "allowed": ["Finished", "Failed", "Deferred", "Removed"],
            })),
            Error::DependencyCycle(task_id) => {
                Some(serde_json::json!({ "task_id": task_id }))
            }
            _ => None,
        }
    }
}

/// Result type alias for planbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
