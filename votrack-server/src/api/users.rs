//! User administration endpoints (ADMIN) and the líder directory

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use votrack_common::db::User;
use votrack_common::policy::ensure_can_manage_users;
use votrack_common::{Principal, Role};

use crate::api::extract::{ApiJson, ApiPath};
use crate::db::users::{self, NewUser, UserUpdate};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<User>>> {
    ensure_can_manage_users(&principal)?;
    Ok(Json(users::list_users(&state.db).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    ensure_can_manage_users(&principal)?;
    let user = users::create_user(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    ensure_can_manage_users(&principal)?;
    let user = users::get_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))?;
    Ok(Json(user))
}

/// PATCH /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UserUpdate>,
) -> ApiResult<Json<User>> {
    ensure_can_manage_users(&principal)?;
    Ok(Json(users::update_user(&state.db, id, req).await?))
}

/// GET /api/lideres
///
/// Coordinadores get their own líderes; roles that see every persona get
/// all of them. Líderes have no directory.
pub async fn list_lideres(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<User>>> {
    if principal.role == Role::Lider {
        return Err(ApiError::Forbidden("LIDER may not list líderes".to_string()));
    }
    Ok(Json(users::list_lideres(&state.db, principal.scope()).await?))
}
