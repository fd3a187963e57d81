//! Access to the external reasoning capability used for planning and judging.
//!
//! Provider backends turn a prompt into a completion; schema enforcement lives
//! with the callers in `ensemble-orchestrator`.

pub mod backends;
pub mod client;
pub mod config;
pub mod failover;

pub use backends::ReasoningBackend;
pub use client::ReasoningClient;
pub use config::{ModelConfig, ReasoningProvider};
pub use failover::FailoverBackend;
