//! Task types and payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Task type names.
pub mod task_types {
    /// Sync the current month of a project (both sources).
    pub const SYNC_CURRENT: &str = "sync:current";
    /// Sync Metrika data for a specific month.
    pub const SYNC_ANALYTICS: &str = "sync:analytics";
    /// Sync Direct data for a specific month.
    pub const SYNC_ADS: &str = "sync:ads";
    /// AI analysis over channel metrics.
    pub const ANALYZE_METRICS: &str = "analyze:metrics";
}

/// Payload for [`task_types::SYNC_CURRENT`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncCurrentPayload {
    pub project_id: i64,
}

/// Payload for [`task_types::SYNC_ANALYTICS`] and [`task_types::SYNC_ADS`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncMonthPayload {
    pub project_id: i64,
    pub year: i32,
    pub month: u32,
}

/// Payload for [`task_types::ANALYZE_METRICS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeMetricsPayload {
    pub project_id: i64,
    /// Period labels in `YYYY-MM` form.
    pub periods: Vec<String>,
}

/// Enqueue-time options.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub max_retries: u32,
    pub timeout: Duration,
    pub lane: String,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(600),
            lane: "default".to_string(),
        }
    }
}

/// A durable task envelope.
///
/// The envelope round-trips through the broker unchanged between dequeue and
/// acknowledgement; only a retry produces a new envelope with `retried`
/// incremented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub lane: String,
    pub max_retries: u32,
    /// Retries already performed (0 on first delivery).
    pub retried: u32,
    pub timeout_secs: u64,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskMessage {
    pub fn new(kind: &str, payload: serde_json::Value, opts: &TaskOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            payload,
            lane: opts.lane.clone(),
            max_retries: opts.max_retries,
            retried: 0,
            timeout_secs: opts.timeout.as_secs(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Decodes the payload into a concrete type.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> bi_core::Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            bi_core::Error::validation(format!("invalid {} payload: {e}", self.kind))
        })
    }
}
