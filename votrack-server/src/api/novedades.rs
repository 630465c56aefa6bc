//! Novedad endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use votrack_common::db::Novedad;
use votrack_common::Principal;

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::novedades;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenNovedadRequest {
    pub descripcion: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveNovedadRequest {
    pub resolution: String,
}

#[derive(Debug, Deserialize)]
pub struct NovedadesQuery {
    /// Only unresolved novedades (default true)
    #[serde(default = "default_open")]
    pub open: bool,
}

fn default_open() -> bool {
    true
}

/// POST /api/personas/:id/novedades
pub async fn open_novedad(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(persona_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<OpenNovedadRequest>,
) -> ApiResult<(StatusCode, Json<Novedad>)> {
    let (novedad, transition) =
        novedades::open_novedad(&state.db, &principal, persona_id, &req.descripcion).await?;
    state.event_bus.emit(transition.into_event());
    Ok((StatusCode::CREATED, Json(novedad)))
}

/// GET /api/personas/:id/novedades
pub async fn list_persona_novedades(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(persona_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Novedad>>> {
    let list = novedades::list_for_persona(&state.db, principal.scope(), persona_id).await?;
    Ok(Json(list))
}

/// POST /api/novedades/:id/resolve
pub async fn resolve_novedad(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(novedad_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ResolveNovedadRequest>,
) -> ApiResult<Json<Novedad>> {
    let (novedad, transition) =
        novedades::resolve_novedad(&state.db, &principal, novedad_id, &req.resolution).await?;
    state.event_bus.emit(transition.into_event());
    Ok(Json(novedad))
}

/// GET /api/novedades
pub async fn list_novedades(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<NovedadesQuery>,
) -> ApiResult<Json<Vec<Novedad>>> {
    let list = novedades::list_in_scope(&state.db, principal.scope(), query.open).await?;
    Ok(Json(list))
}
