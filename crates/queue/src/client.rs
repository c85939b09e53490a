//! Enqueue client.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use bi_core::Result;

use crate::broker::Broker;
use crate::task::{task_types, AnalyzeMetricsPayload, SyncCurrentPayload, SyncMonthPayload, TaskMessage, TaskOptions};

/// Client for enqueueing tasks. Safe to clone and share.
#[derive(Clone)]
pub struct QueueClient {
    broker: Arc<dyn Broker>,
}

impl QueueClient {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Enqueues an arbitrary task. Returns the task id.
    pub async fn enqueue<P: Serialize>(
        &self,
        kind: &str,
        payload: &P,
        opts: TaskOptions,
    ) -> Result<String> {
        let task = TaskMessage::new(kind, serde_json::to_value(payload)?, &opts);
        let id = task.id.clone();
        self.broker.enqueue(&task).await?;

        debug!(task_id = %id, kind, lane = %task.lane, "Enqueued task");
        Ok(id)
    }

    /// Enqueues a whole-project current-month sync.
    pub async fn enqueue_sync_current(&self, project_id: i64) -> Result<String> {
        self.enqueue(
            task_types::SYNC_CURRENT,
            &SyncCurrentPayload { project_id },
            TaskOptions {
                max_retries: 3,
                timeout: Duration::from_secs(15 * 60),
                lane: "default".into(),
            },
        )
        .await
    }

    /// Enqueues a Metrika sync for a specific month.
    pub async fn enqueue_sync_analytics(
        &self,
        project_id: i64,
        year: i32,
        month: u32,
    ) -> Result<String> {
        self.enqueue(
            task_types::SYNC_ANALYTICS,
            &SyncMonthPayload { project_id, year, month },
            TaskOptions {
                max_retries: 3,
                timeout: Duration::from_secs(10 * 60),
                lane: "default".into(),
            },
        )
        .await
    }

    /// Enqueues a Direct sync for a specific month.
    pub async fn enqueue_sync_ads(&self, project_id: i64, year: i32, month: u32) -> Result<String> {
        self.enqueue(
            task_types::SYNC_ADS,
            &SyncMonthPayload { project_id, year, month },
            TaskOptions {
                max_retries: 3,
                timeout: Duration::from_secs(10 * 60),
                lane: "default".into(),
            },
        )
        .await
    }

    /// Enqueues an AI metrics analysis. Fewer retries, low-priority lane.
    pub async fn enqueue_analyze_metrics(
        &self,
        project_id: i64,
        periods: Vec<String>,
    ) -> Result<String> {
        self.enqueue(
            task_types::ANALYZE_METRICS,
            &AnalyzeMetricsPayload { project_id, periods },
            TaskOptions {
                max_retries: 2,
                timeout: Duration::from_secs(2 * 60),
                lane: "low".into(),
            },
        )
        .await
    }
}
