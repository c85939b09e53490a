//! Goal admin endpoints, including vendor import.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use bi_core::{Counter, Goal};
use cache::keys;
use storage::NewGoal;

use crate::middleware::auth::{require_project_access, require_project_manager, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

const DIMENSION_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub goal_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_conversion: bool,
}

async fn counter_or_404(state: &AppState, counter_id: i64) -> Result<Counter, ApiError> {
    state
        .counters
        .get(counter_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("counter {counter_id}")))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Path(counter_id): Path<i64>,
) -> ApiResult<Json<Vec<Goal>>> {
    let counter = counter_or_404(&state, counter_id).await?;
    require_project_access(&state, &user, counter.project_id).await?;

    let key = keys::build(keys::GOALS_BY_COUNTER, counter_id);
    if let Some(cache) = &state.cache {
        if let Ok(Some(goals)) = cache.get::<Vec<Goal>>(&key).await {
            return Ok(Json(goals));
        }
    }

    let goals = state.goals.list_by_counter(counter_id).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &goals, DIMENSION_CACHE_TTL).await {
            warn!(counter_id, error = %e, "Failed to cache goals");
        }
    }

    Ok(Json(goals))
}

pub async fn list_by_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<Goal>>> {
    require_project_access(&state, &user, project_id).await?;

    let counters = state.counters.list_by_project(project_id).await?;
    let mut goals = Vec::new();
    for counter in counters {
        goals.extend(state.goals.list_by_counter(counter.id).await?);
    }

    Ok(Json(goals))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(counter_id): Path<i64>,
    Json(req): Json<CreateGoalRequest>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    let counter = counter_or_404(&state, counter_id).await?;
    require_project_manager(&state, &user, counter.project_id).await?;

    if req.goal_id <= 0 {
        return Err(ApiError::bad_request("goal_id is required"));
    }

    let goal = state
        .goals
        .create(NewGoal {
            counter_id,
            goal_id: req.goal_id,
            name: req.name,
            is_conversion: req.is_conversion,
        })
        .await?;

    invalidate_goals(&state, counter_id).await;

    info!(counter_id, goal_id = goal.goal_id, "Goal added");
    Ok((StatusCode::CREATED, Json(goal)))
}

/// Imports goal definitions from Metrika, creating the ones not yet known
/// locally. Imported goals start with `is_conversion = false`; flagging
/// them is an explicit admin decision.
pub async fn import(
    State(state): State<AppState>,
    user: AuthUser,
    Path(counter_id): Path<i64>,
) -> ApiResult<Json<Vec<Goal>>> {
    let counter = counter_or_404(&state, counter_id).await?;
    require_project_manager(&state, &user, counter.project_id).await?;

    let definitions = state.analytics.list_goals(counter.counter_id).await?;

    let mut created = 0;
    for def in &definitions {
        let existing = state.goals.get_by_vendor_id(counter.id, def.id).await?;
        if existing.is_none() {
            state
                .goals
                .create(NewGoal {
                    counter_id: counter.id,
                    goal_id: def.id,
                    name: def.name.clone(),
                    is_conversion: false,
                })
                .await?;
            created += 1;
        }
    }

    if created > 0 {
        invalidate_goals(&state, counter_id).await;
    }

    info!(
        counter_id,
        vendor_goals = definitions.len(),
        created,
        "Goals imported from Metrika"
    );

    let goals = state.goals.list_by_counter(counter.id).await?;
    Ok(Json(goals))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(goal_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let goal = state
        .goals
        .get(goal_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("goal {goal_id}")))?;
    let counter = counter_or_404(&state, goal.counter_id).await?;
    require_project_manager(&state, &user, counter.project_id).await?;

    state.goals.delete(goal.id).await?;
    invalidate_goals(&state, counter.id).await;

    info!(counter_id = counter.id, goal_id = goal.goal_id, "Goal removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn invalidate_goals(state: &AppState, counter_id: i64) {
    if let Some(cache) = &state.cache {
        let prefix = keys::build(keys::GOALS_BY_COUNTER, counter_id);
        if let Err(e) = cache.invalidate_prefix(&prefix).await {
            warn!(counter_id, error = %e, "Goal cache invalidation failed");
        }
    }
}
