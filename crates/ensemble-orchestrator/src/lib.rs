//! Multi-agent orchestration: plan, dispatch, collect, judge, persist, approve.
//!
//! Each incoming task runs as its own pipeline. The planner splits it into
//! agent-specific subtasks, the dispatcher fans them out over the queues, the
//! collector gathers worker results until everything reported or a deadline
//! passes, and the judge turns the results into a report and bundle that are
//! persisted before the bundle goes to the approval queue.
//!
//! # Main types
//!
//! - [`Orchestrator`] — The ingestion loop, recovery and operator actions.
//! - [`Planner`] / [`Judge`] — Reasoning adapters with strict response schemas.
//! - [`Dispatcher`] — All-or-nothing fan-out of a task's subtasks.
//! - [`Collector`] / [`Collection`] — Per-task result gathering with a deadline.
//! - [`ArtifactStore`] — Idempotent report and bundle persistence.
//! - [`TaskStore`] — Checkpoint ledger used to resume after a restart.
//! - [`AgentWorker`] — Harness for the worker side of the queue contract.

/// Artifact persistence.
pub mod artifacts;
/// Per-task result collection.
pub mod collector;
/// Orchestrator settings.
pub mod config;
/// Subtask fan-out.
pub mod dispatcher;
/// Orchestrator loop and operator API.
pub mod engine;
/// Judge adapter.
pub mod judge;
/// Task checkpoint ledger.
pub mod ledger;
mod pipeline;
/// Planner adapter.
pub mod planner;
mod response;
/// In-flight task tracking and metrics.
pub mod tracker;
/// Worker harness.
pub mod worker;

pub use artifacts::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore};
pub use collector::{Collection, CollectionOutcome, Collector};
pub use config::OrchestratorConfig;
pub use dispatcher::Dispatcher;
pub use engine::{Orchestrator, OrchestratorBuilder};
pub use judge::{parse_judgement, Judge, ReasoningJudge};
pub use ledger::{FileTaskStore, MemoryTaskStore, TaskRecord, TaskStore};
pub use planner::{parse_plan, Planner, ReasoningPlanner};
pub use tracker::{PipelineMetrics, TaskTracker};
pub use worker::{AgentWorker, SubtaskHandler};
