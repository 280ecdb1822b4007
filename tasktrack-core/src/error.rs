//! Error types for TaskTrack operations

use thiserror::Error;

use crate::entities::TaskId;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Task not found: {id}")]
    NotFound { id: TaskId },

    #[error("Insert failed: {reason}")]
    InsertFailed { reason: String },

    #[error("Update failed for task {id}: {reason}")]
    UpdateFailed { id: TaskId, reason: String },

    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Value {value} for {field} is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Id mismatch: path has {path}, body has {body}")]
    IdMismatch { path: TaskId, body: TaskId },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all TaskTrack errors.
#[derive(Debug, Clone, Error)]
pub enum TaskTrackError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for TaskTrack operations.
pub type TaskTrackResult<T> = Result<T, TaskTrackError>;

// =============================================================================
// TESTS
// =============================================================================
