//! Project CRUD with role enforcement.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use bi_core::Project;
use storage::{NewProject, ProjectUpdate};

use crate::extractors::Pagination;
use crate::middleware::auth::{require_admin, require_project_access, require_project_manager, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    pub timezone: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    require_admin(&user)?;
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let project = state
        .projects
        .create(NewProject {
            name: req.name,
            slug: req.slug,
            timezone: req.timezone.unwrap_or_else(|| state.default_timezone.clone()),
            currency: req.currency.unwrap_or_else(|| state.default_currency.clone()),
        })
        .await?;

    info!(project_id = project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Vec<Project>>> {
    let pagination = pagination.clamp();

    let projects = if user.is_admin() {
        state.projects.list().await?
    } else {
        state.projects.list_for_user(user.id).await?
    };

    let page = projects
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.limit())
        .collect();
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Project>> {
    require_project_access(&state, &user, project_id).await?;

    let project = state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;
    Ok(Json(project))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    require_project_manager(&state, &user, project_id).await?;

    let project = state
        .projects
        .update(
            project_id,
            ProjectUpdate {
                name: req.name,
                timezone: req.timezone,
                currency: req.currency,
                is_active: req.is_active,
            },
        )
        .await?;

    info!(project_id, "Project updated");
    Ok(Json(project))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    // Cascades to dimensions and facts.
    state.projects.delete(project_id).await?;

    info!(project_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}
