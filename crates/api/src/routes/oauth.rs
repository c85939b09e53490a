//! Yandex OAuth authorization-code flow.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use url::Url;

use crate::middleware::auth::AuthUser;
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

const AUTHORIZE_URL: &str = "https://oauth.yandex.ru/authorize";
const TOKEN_URL: &str = "https://oauth.yandex.ru/token";

/// Starts the flow by redirecting the browser to the vendor consent page.
pub async fn initiate(State(state): State<AppState>) -> ApiResult<Redirect> {
    if state.oauth.client_id.is_empty() {
        return Err(ApiError::bad_request("OAuth is not configured"));
    }

    let mut url = Url::parse(AUTHORIZE_URL)
        .map_err(|e| ApiError::internal(format!("bad authorize URL: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &state.oauth.client_id);
        query.append_pair(
            "redirect_uri",
            &format!("{}/api/oauth/yandex/callback", state.oauth.app_url),
        );
        if !state.oauth.scopes.is_empty() {
            query.append_pair("scope", &state.oauth.scopes);
        }
    }

    Ok(Redirect::temporary(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges the authorization code and persists the token in the
/// single-tenant credential store.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Redirect> {
    let frontend = &state.oauth.frontend_url;

    if let Some(err) = query.error {
        warn!(error = %err, "OAuth flow denied by vendor");
        return Ok(Redirect::temporary(&format!("{frontend}/?oauth=error")));
    }

    let code = query
        .code
        .ok_or_else(|| ApiError::bad_request("missing authorization code"))?;

    let http = reqwest::Client::new();
    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", state.oauth.client_id.as_str()),
            ("client_secret", state.oauth.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| ApiError::internal(format!("token exchange failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Token exchange rejected");
        return Ok(Redirect::temporary(&format!("{frontend}/?oauth=error")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::internal(format!("invalid token response: {e}")))?;

    state
        .credentials
        .save("YANDEX_OAUTH_TOKEN", &token.access_token)?;

    Ok(Redirect::temporary(&format!("{frontend}/?oauth=success")))
}

/// Whether a vendor token is currently configured.
pub async fn status(State(_state): State<AppState>, _user: AuthUser) -> Json<serde_json::Value> {
    let connected = std::env::var("YANDEX_OAUTH_TOKEN")
        .map(|t| !t.is_empty())
        .unwrap_or(false);

    Json(json!({ "connected": connected }))
}
