//! Durable at-least-once task queue.
//!
//! Triggers (scheduler, REST sync endpoint) enqueue typed tasks through
//! [`QueueClient`]; [`QueueServer`] pops them with bounded concurrency over
//! weighted lanes and drives the registered handlers. The queue is the sole
//! retry authority: handlers surface errors, the server decides between
//! exponential-backoff re-queueing and the dead-letter lane.

pub mod broker;
pub mod client;
pub mod config;
pub mod server;
pub mod task;

pub use broker::{Broker, MemoryBroker, RedisBroker};
pub use client::QueueClient;
pub use config::{LaneConfig, QueueConfig};
pub use server::{QueueServer, TaskHandler};
pub use task::{
    task_types, AnalyzeMetricsPayload, SyncCurrentPayload, SyncMonthPayload, TaskMessage,
    TaskOptions,
};
