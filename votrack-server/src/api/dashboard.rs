//! Dashboard endpoints

use axum::{extract::State, Extension, Json};
use votrack_common::Principal;

use crate::db::dashboard::{self, CoordinadorStats, DashboardSummary, LiderStats};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/dashboard
pub async fn summary(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<DashboardSummary>> {
    Ok(Json(dashboard::summary(&state.db, principal.scope()).await?))
}

/// GET /api/dashboard/lideres
pub async fn por_lider(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<LiderStats>>> {
    Ok(Json(dashboard::por_lider(&state.db, principal.scope()).await?))
}

/// GET /api/dashboard/coordinadores
///
/// Only roles that see every persona.
pub async fn por_coordinador(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<CoordinadorStats>>> {
    if !principal.role.sees_all() {
        return Err(ApiError::Forbidden(format!(
            "{} may not view the coordinador dashboard",
            principal.role
        )));
    }
    Ok(Json(dashboard::por_coordinador(&state.db).await?))
}
