//! Marketing document and campaign metrics endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use report::{CampaignWithMetrics, MarketingDoc};

use crate::middleware::auth::{require_project_access, AuthUser};
use crate::response::ApiResult;
use crate::state::AppState;

pub async fn get_marketing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<MarketingDoc>> {
    require_project_access(&state, &user, project_id).await?;

    let doc = state.marketing.get_marketing(project_id).await?;
    Ok(Json(doc))
}

pub async fn campaigns(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<Vec<CampaignWithMetrics>>> {
    require_project_access(&state, &user, project_id).await?;

    let campaigns = state.marketing.get_campaigns_with_metrics(project_id).await?;
    Ok(Json(campaigns))
}
