use crate::task::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Top-level error type for the Ensemble orchestrator.
///
/// Per-task variants (`Schema`, `Dispatch`, `Reasoning`, `Cancelled`) abort only
/// the task they were raised for. `Connection` is transient and retried by the
/// loop. Partial collection is not an error; see `CollectionOutcome`.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// The queue backend (or another remote dependency) is unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A message or reasoning response did not match its schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Enqueueing the subtasks of a task failed; nothing was delivered.
    #[error("Dispatch failure for task {task_id}: {reason}")]
    Dispatch {
        /// Task whose dispatch was rolled back.
        task_id: TaskId,
        /// Underlying cause.
        reason: String,
    },

    /// Artifact or ledger persistence failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The reasoning capability could not be reached or answered with an error.
    #[error("Reasoning error: {0}")]
    Reasoning(String),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The task was cancelled by an operator or by shutdown.
    #[error("Task {0} was cancelled")]
    Cancelled(TaskId),

    /// A task with this id is already being processed.
    #[error("Task {0} is already in flight")]
    DuplicateTask(TaskId),

    /// A status change that would move a task backwards or out of a terminal state.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`EnsembleError`], recorded on failed tasks and
/// attached to log lines as `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend unreachable.
    Connection,
    /// Malformed message or reasoning response.
    Schema,
    /// Subtask enqueue failed.
    Dispatch,
    /// Persistence failed.
    Store,
    /// Reasoning capability failed.
    Reasoning,
    /// Configuration problem.
    Config,
    /// Cancelled by operator or shutdown.
    Cancelled,
    /// Anything else (duplicates, invalid transitions, I/O, JSON).
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Schema => "schema",
            ErrorKind::Dispatch => "dispatch",
            ErrorKind::Store => "store",
            ErrorKind::Reasoning => "reasoning",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl EnsembleError {
    /// Classify this error for logging and failure records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnsembleError::Connection(_) => ErrorKind::Connection,
            EnsembleError::Schema(_) => ErrorKind::Schema,
            EnsembleError::Dispatch { .. } => ErrorKind::Dispatch,
            EnsembleError::Store(_) => ErrorKind::Store,
            EnsembleError::Reasoning(_) => ErrorKind::Reasoning,
            EnsembleError::Config(_) => ErrorKind::Config,
            EnsembleError::Cancelled(_) => ErrorKind::Cancelled,
            EnsembleError::DuplicateTask(_)
            | EnsembleError::InvalidTransition { .. }
            | EnsembleError::Json(_)
            | EnsembleError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Connection errors always qualify. Reasoning errors qualify when they
    /// carry a rate-limit, server-side or timeout status.
    pub fn is_transient(&self) -> bool {
        match self {
            EnsembleError::Connection(_) => true,
            EnsembleError::Reasoning(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("400") {
                    return false;
                }
                lower.contains("429")
                    || lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("500")
                    || lower.contains("502")
                    || lower.contains("503")
                    || lower.contains("504")
                    || lower.contains("connect")
            }
            _ => false,
        }
    }

    /// Shorthand for building a schema error naming the offending message kind.
    pub fn schema(kind: &str, detail: impl std::fmt::Display) -> Self {
        EnsembleError::Schema(format!("{kind}: {detail}"))
    }
}
