//! Core types and error definitions for the Ensemble orchestrator.
//!
//! This crate provides the foundational types shared across all Ensemble crates:
//! the task lifecycle model, the wire schemas that cross queue boundaries, and
//! the error taxonomy.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum; [`ErrorKind`] classifies it.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`Task`] / [`TaskStatus`] — A submitted unit of work and its state machine.
//! - [`Subtask`] / [`PlannedSubtask`] — Agent-specific steps produced by the planner.
//! - [`IncomingTask`], [`DispatchMessage`], [`ResultMessage`], [`ApprovalMessage`] — Wire schemas.
//! - [`TaskResult`], [`Judgement`], [`Verdict`], [`ArtifactRecord`] — Collection and judging output.
//! - [`RetryPolicy`] — Exponential backoff settings.

/// Error taxonomy.
pub mod error;
/// Queue message schemas.
pub mod message;
/// Backoff policy.
pub mod retry;
/// Task and subtask model.
pub mod task;
/// Results, verdicts, and artifact records.
pub mod verdict;

pub use error::{EnsembleError, EnsembleResult, ErrorKind};
pub use message::{ApprovalMessage, DispatchMessage, IncomingTask, ResultMessage, WireMessage};
pub use retry::RetryPolicy;
pub use task::{Failure, PlannedSubtask, Subtask, SubtaskStatus, Task, TaskId, TaskStatus};
pub use verdict::{ArtifactRecord, Judgement, TaskResult, Verdict};
