//! Report, channel-metrics, and AI-analysis endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use cache::keys;
use report::{report_months, AiInsights, ChannelMetricsDoc, ReportDoc};

use crate::middleware::auth::{require_project_access, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

/// The report document, with cached AI insights attached when present.
pub async fn get_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ReportDoc>> {
    require_project_access(&state, &user, project_id).await?;

    let mut doc = state.reports.get_report(project_id).await?;

    if let Some(cache) = &state.cache {
        let key = keys::build(keys::REPORT_BY_PROJECT, project_id);
        if let Ok(Some(insights)) = cache.get::<AiInsights>(&key).await {
            doc.ai_insights = Some(insights);
        }
    }

    Ok(Json(doc))
}

/// Unauthenticated report access by project slug (shareable link).
pub async fn public_report(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ReportDoc>> {
    let project = state
        .projects
        .get_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("report not available"))?;

    let doc = state.reports.get_report(project.id).await?;
    Ok(Json(doc))
}

/// The channel series over the current report periods.
pub async fn channel_metrics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<ChannelMetricsDoc>> {
    require_project_access(&state, &user, project_id).await?;

    let periods = current_periods(&state, project_id).await?;
    let doc = state
        .reports
        .get_channel_metrics(project_id, &periods)
        .await?;
    Ok(Json(doc))
}

/// Kicks off an async AI analysis over the current report periods.
pub async fn analyze(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    require_project_access(&state, &user, project_id).await?;

    let periods = current_periods(&state, project_id).await?;
    let task_id = state
        .queue
        .enqueue_analyze_metrics(project_id, periods)
        .await?;

    info!(project_id, task_id = %task_id, "Metrics analysis enqueued");
    Ok((StatusCode::ACCEPTED, Json(json!({ "task_id": task_id }))))
}

async fn current_periods(state: &AppState, project_id: i64) -> Result<Vec<String>, ApiError> {
    let project = state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;

    Ok(report_months(&project, Utc::now())
        .iter()
        .map(|m| m.label())
        .collect())
}
