//! Counter admin endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use bi_core::Counter;
use cache::keys;
use storage::NewCounter;

use crate::middleware::auth::{require_project_access, require_project_manager, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

const DIMENSION_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct CreateCounterRequest {
    pub counter_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Counter>>> {
    require_project_access(&state, &user, project_id).await?;

    let key = keys::build(keys::COUNTERS_BY_PROJECT, project_id);
    if let Some(cache) = &state.cache {
        if let Ok(Some(counters)) = cache.get::<Vec<Counter>>(&key).await {
            return Ok(Json(counters));
        }
    }

    let counters = state.counters.list_by_project(project_id).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &counters, DIMENSION_CACHE_TTL).await {
            warn!(project_id, error = %e, "Failed to cache counters");
        }
    }

    Ok(Json(counters))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateCounterRequest>,
) -> ApiResult<(StatusCode, Json<Counter>)> {
    require_project_manager(&state, &user, project_id).await?;

    if req.counter_id <= 0 {
        return Err(ApiError::bad_request("counter_id is required"));
    }
    state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;

    let counter = state
        .counters
        .create(NewCounter {
            project_id,
            counter_id: req.counter_id,
            name: req.name,
            is_primary: req.is_primary,
        })
        .await?;

    invalidate_counters(&state, project_id).await;

    info!(project_id, counter_id = counter.counter_id, "Counter added");
    Ok((StatusCode::CREATED, Json(counter)))
}

pub async fn set_primary(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, counter_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require_project_manager(&state, &user, project_id).await?;

    state.counters.set_primary(project_id, counter_id).await?;
    invalidate_counters(&state, project_id).await;

    info!(project_id, counter_id, "Primary counter changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, counter_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require_project_manager(&state, &user, project_id).await?;

    let counter = state
        .counters
        .get(counter_id)
        .await?
        .filter(|c| c.project_id == project_id)
        .ok_or_else(|| ApiError::not_found(format!("counter {counter_id}")))?;

    state.counters.delete(counter.id).await?;
    invalidate_counters(&state, project_id).await;

    // goals cascade with the counter
    if let Some(cache) = &state.cache {
        let prefix = keys::build(keys::GOALS_BY_COUNTER, counter.id);
        if let Err(e) = cache.invalidate_prefix(&prefix).await {
            warn!(counter_id, error = %e, "Goal cache invalidation failed");
        }
    }

    info!(project_id, counter_id, "Counter removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn invalidate_counters(state: &AppState, project_id: i64) {
    if let Some(cache) = &state.cache {
        let prefix = keys::build(keys::COUNTERS_BY_PROJECT, project_id);
        if let Err(e) = cache.invalidate_prefix(&prefix).await {
            warn!(project_id, error = %e, "Counter cache invalidation failed");
        }
    }
}
