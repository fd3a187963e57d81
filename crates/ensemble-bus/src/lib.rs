//! Queue transport for Ensemble.
//!
//! Processes talk to each other only through named FIFO queues. This crate
//! provides the backend abstraction, an in-process backend, a Redis backend
//! (feature `redis`), and a typed client that speaks the wire schemas from
//! `ensemble-core`.
//!
//! # Main types
//!
//! - [`QueueBackend`] — Push/pop contract every backend implements.
//! - [`MemoryQueue`] — In-process backend built on `tokio::sync::Notify`.
//! - `RedisQueue` — `LPUSH`/`BRPOP` backend for multi-process deployments.
//! - [`QueueClient`] — Typed handle shared by all components.
//! - [`QueueNames`] — Naming convention for incoming, agent, result, and approval queues.

pub mod backend;
pub mod client;
pub mod memory;
pub mod names;
#[cfg(feature = "redis")]
pub mod redis_queue;

pub use backend::QueueBackend;
pub use client::QueueClient;
pub use memory::MemoryQueue;
pub use names::QueueNames;
#[cfg(feature = "redis")]
pub use redis_queue::RedisQueue;
