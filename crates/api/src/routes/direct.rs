//! Direct account and campaign admin endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use bi_core::{DirectAccount, DirectCampaign};
use cache::keys;
use storage::NewDirectAccount;

use crate::middleware::auth::{require_project_access, require_project_manager, AuthUser};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

const DIMENSION_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub client_login: String,
    #[serde(default)]
    pub account_name: String,
}

pub async fn list_accounts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<DirectAccount>>> {
    require_project_access(&state, &user, project_id).await?;

    let key = keys::build(keys::DIRECT_ACCOUNTS_BY_PROJECT, project_id);
    if let Some(cache) = &state.cache {
        if let Ok(Some(accounts)) = cache.get::<Vec<DirectAccount>>(&key).await {
            return Ok(Json(accounts));
        }
    }

    let accounts = state.direct.list_accounts(project_id).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &accounts, DIMENSION_CACHE_TTL).await {
            warn!(project_id, error = %e, "Failed to cache Direct accounts");
        }
    }

    Ok(Json(accounts))
}

pub async fn create_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<DirectAccount>)> {
    require_project_manager(&state, &user, project_id).await?;

    if req.client_login.trim().is_empty() {
        return Err(ApiError::bad_request("client_login is required"));
    }
    state
        .projects
        .get(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("project {project_id}")))?;

    let login = req.client_login.trim();
    if state
        .direct
        .get_account_by_login(project_id, login)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(
            "account with this client login already exists",
        ));
    }

    let account = state
        .direct
        .create_account(NewDirectAccount {
            project_id,
            client_login: req.client_login.trim().to_string(),
            account_name: req.account_name,
        })
        .await?;

    if let Some(cache) = &state.cache {
        let prefix = keys::build(keys::DIRECT_ACCOUNTS_BY_PROJECT, project_id);
        if let Err(e) = cache.invalidate_prefix(&prefix).await {
            warn!(project_id, error = %e, "Direct account cache invalidation failed");
        }
    }

    info!(project_id, client_login = %account.client_login, "Direct account added");
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn remove_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(account_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let account = state
        .direct
        .get_account(account_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("direct account {account_id}")))?;
    require_project_manager(&state, &user, account.project_id).await?;

    state.direct.delete_account(account.id).await?;

    if let Some(cache) = &state.cache {
        let accounts = keys::build(keys::DIRECT_ACCOUNTS_BY_PROJECT, account.project_id);
        let campaigns = keys::build(keys::DIRECT_CAMPAIGNS_BY_ACCOUNT, account.id);
        for prefix in [accounts, campaigns] {
            if let Err(e) = cache.invalidate_prefix(&prefix).await {
                warn!(account_id, error = %e, "Direct cache invalidation failed");
            }
        }
    }

    info!(account_id, project_id = account.project_id, "Direct account removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    user: AuthUser,
    Path(account_id): Path<i64>,
) -> ApiResult<Json<Vec<DirectCampaign>>> {
    let account = state
        .direct
        .get_account(account_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("direct account {account_id}")))?;
    require_project_access(&state, &user, account.project_id).await?;

    let key = keys::build(keys::DIRECT_CAMPAIGNS_BY_ACCOUNT, account_id);
    if let Some(cache) = &state.cache {
        if let Ok(Some(campaigns)) = cache.get::<Vec<DirectCampaign>>(&key).await {
            return Ok(Json(campaigns));
        }
    }

    let campaigns = state.direct.list_campaigns_by_account(account_id).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &campaigns, DIMENSION_CACHE_TTL).await {
            warn!(account_id, error = %e, "Failed to cache campaigns");
        }
    }

    Ok(Json(campaigns))
}
