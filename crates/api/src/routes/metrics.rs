//! Metrics rows endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use bi_core::MetricsAgeMonthly;
use report::{report_months, MetricsPeriodRow};

use crate::middleware::auth::{require_project_access, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub project_id: i64,
    pub rows: Vec<MetricsPeriodRow>,
    /// Age breakdown of the current period.
    pub age: Vec<MetricsAgeMonthly>,
}

pub async fn get_metrics(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<MetricsResponse>> {
    require_project_access(&state, &user, project_id).await?;

    let project = state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;
    let current = report_months(&project, Utc::now())[0];

    let rows = state.reports.get_metrics_rows(project_id).await?;
    let age = state
        .metrics
        .list_age_months(project_id, current.year, current.month as i32)
        .await?;

    Ok(Json(MetricsResponse {
        project_id,
        rows,
        age,
    }))
}
