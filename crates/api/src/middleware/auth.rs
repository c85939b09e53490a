//! JWT authentication and role checks.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use bi_core::{roles, User};

use crate::response::ApiError;
use crate::state::AppState;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    /// Global role.
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys plus token lifetime.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: chrono::Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry: chrono::Duration::hours(expiry_hours),
        }
    }

    /// Issues a token for a user.
    pub fn issue(&self, user: &User) -> bi_core::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| bi_core::Error::internal(format!("failed to sign token: {e}")))
    }

    /// Verifies a token and returns its claims.
    pub fn verify(&self, token: &str) -> bi_core::Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| bi_core::Error::unauthorized(format!("invalid token: {e}")))
    }
}

/// Authenticated user extracted from the bearer token.
///
/// The user record is re-checked against the store (through a short-TTL
/// cache) so deactivated accounts lose access before token expiry.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected a bearer token"))?;

        let claims = state.auth.verify(token)?;

        let user = load_user(state, claims.sub).await?;
        if !user.is_active {
            return Err(ApiError::forbidden("account is deactivated"));
        }

        Ok(AuthUser {
            id: user.id,
            // role comes from the store, not the token, so demotions apply
            // immediately
            role: user.role,
        })
    }
}

async fn load_user(state: &AppState, user_id: i64) -> Result<User, ApiError> {
    if let Some(user) = state.user_cache.get(&user_id).await {
        return Ok(user);
    }

    let user = state
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("unknown user"))?;

    state.user_cache.insert(user_id, user.clone()).await;
    Ok(user)
}

/// Requires the global admin role.
pub fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin role required"))
    }
}

/// Requires any membership on the project (admins bypass).
pub async fn require_project_access(
    state: &AppState,
    user: &AuthUser,
    project_id: i64,
) -> Result<(), ApiError> {
    if user.is_admin() {
        return Ok(());
    }

    let role = state.users.project_role(user.id, project_id).await?;
    if role.is_some() {
        Ok(())
    } else {
        Err(ApiError::forbidden("no access to this project"))
    }
}

/// Requires the manager role on the project (admins bypass).
pub async fn require_project_manager(
    state: &AppState,
    user: &AuthUser,
    project_id: i64,
) -> Result<(), ApiError> {
    if user.is_admin() {
        return Ok(());
    }

    match state.users.project_role(user.id, project_id).await? {
        Some(role) if role.role == roles::MANAGER => Ok(()),
        Some(_) => Err(ApiError::forbidden("manager role required")),
        None => Err(ApiError::forbidden("no access to this project")),
    }
}
