//! Registration and login.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use bi_core::{roles, User};
use storage::NewUser;

use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            email: req.email.trim().to_lowercase(),
            password_hash,
            name: req.name,
            role: roles::USER.to_string(),
        })
        .await?;

    info!(user_id = user.id, "User registered");

    let token = state.auth.issue(&user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .users
        .get_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("account is deactivated"));
    }

    state.users.update_last_login(user.id).await?;
    state.invalidate_user(user.id).await;

    let token = state.auth.issue(&user)?;
    Ok(Json(AuthResponse { token, user }))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
