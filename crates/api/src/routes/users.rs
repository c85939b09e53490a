//! User administration and project role assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use bi_core::{roles, User, UserProjectRole};

use crate::middleware::auth::{require_admin, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: i64,
    pub role: String,
}

pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<User>>> {
    require_admin(&user)?;

    let users = state.users.list().await?;
    Ok(Json(users))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    if user_id == user.id {
        return Err(ApiError::bad_request("cannot delete your own account"));
    }

    state.users.delete(user_id).await?;
    state.invalidate_user(user_id).await;

    info!(user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<UserProjectRole>>> {
    require_admin(&user)?;

    let roles = state.users.list_user_projects(user_id).await?;
    Ok(Json(roles))
}

pub async fn project_users(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<UserProjectRole>>> {
    require_admin(&user)?;

    let users = state.users.list_project_users(project_id).await?;
    Ok(Json(users))
}

pub async fn assign_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    if req.role != roles::MANAGER && req.role != roles::VIEWER {
        return Err(ApiError::bad_request(format!(
            "role must be '{}' or '{}'",
            roles::MANAGER,
            roles::VIEWER
        )));
    }

    state
        .users
        .get(req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {}", req.user_id)))?;
    state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;

    state
        .users
        .assign_project_role(req.user_id, project_id, &req.role)
        .await?;

    info!(project_id, user_id = req.user_id, role = %req.role, "Project role assigned");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path((project_id, user_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    state.users.remove_project_role(user_id, project_id).await?;

    info!(project_id, user_id, "Project role removed");
    Ok(StatusCode::NO_CONTENT)
}
