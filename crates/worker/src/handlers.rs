//! Queue task handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use bi_core::Result;
use cache::{keys, Cache};
use queue::{task_types, AnalyzeMetricsPayload, QueueServer, SyncCurrentPayload, SyncMonthPayload, TaskHandler, TaskMessage};
use report::{AiInsights, ReportService};

use crate::analyze::AiClient;
use crate::sync::SyncEngine;

/// Handles `sync:current`: both sources, current month.
pub struct SyncCurrentHandler {
    engine: Arc<SyncEngine>,
}

#[async_trait]
impl TaskHandler for SyncCurrentHandler {
    async fn handle(&self, task: &TaskMessage) -> Result<()> {
        let payload: SyncCurrentPayload = task.parse_payload()?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            "Processing project sync task"
        );

        self.engine.sync_project(payload.project_id).await?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            "Project sync task completed"
        );
        Ok(())
    }
}

/// Handles `sync:analytics`: Metrika for a specific month.
pub struct SyncAnalyticsHandler {
    engine: Arc<SyncEngine>,
}

#[async_trait]
impl TaskHandler for SyncAnalyticsHandler {
    async fn handle(&self, task: &TaskMessage) -> Result<()> {
        let payload: SyncMonthPayload = task.parse_payload()?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            year = payload.year,
            month = payload.month,
            "Processing analytics sync task"
        );

        self.engine
            .sync_analytics(payload.project_id, payload.year, payload.month)
            .await?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            "Analytics sync task completed"
        );
        Ok(())
    }
}

/// Handles `sync:ads`: Direct for a specific month.
pub struct SyncAdsHandler {
    engine: Arc<SyncEngine>,
}

#[async_trait]
impl TaskHandler for SyncAdsHandler {
    async fn handle(&self, task: &TaskMessage) -> Result<()> {
        let payload: SyncMonthPayload = task.parse_payload()?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            year = payload.year,
            month = payload.month,
            "Processing ads sync task"
        );

        self.engine
            .sync_ads(payload.project_id, payload.year, payload.month)
            .await?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            "Ads sync task completed"
        );
        Ok(())
    }
}

/// Handles `analyze:metrics`: AI analysis over channel metrics, cached for
/// an hour under the project's report key.
pub struct AnalyzeMetricsHandler {
    reports: Arc<ReportService>,
    ai: Arc<AiClient>,
    cache: Option<Cache>,
}

#[async_trait]
impl TaskHandler for AnalyzeMetricsHandler {
    async fn handle(&self, task: &TaskMessage) -> Result<()> {
        let payload: AnalyzeMetricsPayload = task.parse_payload()?;

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            periods = ?payload.periods,
            "Processing metrics analysis task"
        );

        let metrics = self
            .reports
            .get_channel_metrics(payload.project_id, &payload.periods)
            .await?;

        let summary = self.ai.analyze(&metrics).await?;

        if let Some(cache) = &self.cache {
            let key = keys::build(keys::REPORT_BY_PROJECT, payload.project_id);
            let insights = AiInsights { summary };
            if let Err(e) = cache.set(&key, &insights, Duration::from_secs(3600)).await {
                warn!(
                    project_id = payload.project_id,
                    error = %e,
                    "Failed to cache analysis result"
                );
            }
        }

        info!(
            task_id = %task.id,
            project_id = payload.project_id,
            "Metrics analysis task completed"
        );
        Ok(())
    }
}

/// Registers every task handler on the queue server.
pub fn register_handlers(
    server: &mut QueueServer,
    engine: Arc<SyncEngine>,
    reports: Arc<ReportService>,
    ai: Arc<AiClient>,
    cache: Option<Cache>,
) {
    server.register(
        task_types::SYNC_CURRENT,
        Arc::new(SyncCurrentHandler { engine: engine.clone() }),
    );
    server.register(
        task_types::SYNC_ANALYTICS,
        Arc::new(SyncAnalyticsHandler { engine: engine.clone() }),
    );
    server.register(task_types::SYNC_ADS, Arc::new(SyncAdsHandler { engine }));
    server.register(
        task_types::ANALYZE_METRICS,
        Arc::new(AnalyzeMetricsHandler { reports, ai, cache }),
    );
}
