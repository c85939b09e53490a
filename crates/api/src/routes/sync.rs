//! Manual sync trigger.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::middleware::auth::{require_admin, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

/// Enqueues a current-month sync for the project. The work happens in the
/// queue worker; this endpoint only accepts it.
pub async fn trigger(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    require_admin(&user)?;

    state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;

    let task_id = state.queue.enqueue_sync_current(project_id).await?;

    info!(project_id, task_id = %task_id, "Manual sync enqueued");
    Ok((StatusCode::ACCEPTED, Json(json!({ "task_id": task_id }))))
}
