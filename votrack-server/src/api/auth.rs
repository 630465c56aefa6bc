//! Login, logout and the session middleware
//!
//! Every `/api/*` route except login carries `Authorization: Bearer <token>`.
//! The middleware resolves the token to a [`Principal`] and stores it (and
//! the token digest, for logout) in the request extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use votrack_common::auth::{token_digest, verify_password};
use votrack_common::db::settings::{
    get_setting_i64, DEFAULT_SESSION_TIMEOUT_SECONDS, SESSION_TIMEOUT_SECONDS,
};
use votrack_common::db::User;
use votrack_common::Principal;

use crate::api::extract::ApiJson;
use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Digest of the token that authenticated the current request
#[derive(Debug, Clone)]
pub struct SessionDigest(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Session middleware for protected routes
///
/// Missing, unknown and expired tokens are all 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let principal = sessions::find_principal(&state.db, &token)
        .await?
        .ok_or_else(|| {
            warn!("Rejected unknown or expired session token");
            ApiError::Unauthorized("invalid or expired session".to_string())
        })?;

    request
        .extensions_mut()
        .insert(SessionDigest(token_digest(&token)));
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let credentials = users::find_credentials(&state.db, &req.username).await?;

    let user = match credentials {
        Some(c)
            if c.user.active
                && verify_password(&c.password_salt, &req.password, &c.password_hash) =>
        {
            c.user
        }
        _ => {
            warn!("Failed login attempt for '{}'", req.username.trim());
            return Err(ApiError::Unauthorized(
                "invalid username or password".to_string(),
            ));
        }
    };

    let timeout = get_setting_i64(
        &state.db,
        SESSION_TIMEOUT_SECONDS,
        DEFAULT_SESSION_TIMEOUT_SECONDS,
    )
    .await?;
    let (token, expires_at) = sessions::create_session(&state.db, user.id, timeout).await?;

    info!("User {} ({}) logged in", user.username, user.role);
    Ok(Json(LoginResponse {
        token,
        expires_at,
        user,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(SessionDigest(digest)): Extension<SessionDigest>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<StatusCode> {
    sessions::delete_session(&state.db, &digest).await?;
    info!("User {} logged out", principal.username);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<User>> {
    let user = users::get_user(&state.db, principal.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", principal.id)))?;
    Ok(Json(user))
}
