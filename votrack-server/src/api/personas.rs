//! Persona endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;
use votrack_common::db::settings::{get_setting_i64, DEFAULT_PAGE_SIZE, PAGE_SIZE};
use votrack_common::db::{HistorialEntry, Persona};
use votrack_common::validation::PersonaData;
use votrack_common::{Estado, Principal};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::personas::{self, PersonaDetail, PersonaFilter};
use crate::db::historial;
use crate::error::ApiResult;
use crate::pagination::{calculate_pagination, Page};
use crate::AppState;

/// Query parameters shared by the list and CSV export endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
    pub estado: Option<String>,
    pub lider_id: Option<Uuid>,
    pub q: Option<String>,
}

fn default_page() -> i64 {
    1
}

impl ListQuery {
    pub fn filter(&self) -> ApiResult<PersonaFilter> {
        let estado = match self.estado.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => Some(e.parse::<Estado>()?),
            _ => None,
        };
        Ok(PersonaFilter {
            estado,
            lider_id: self.lider_id,
            q: self.q.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    /// Ignored for líderes, who always register under themselves
    #[serde(default)]
    pub lider_id: Option<Uuid>,
    #[serde(flatten)]
    pub data: PersonaData,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub lider_id: Uuid,
}

/// POST /api/personas
pub async fn create_persona(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<CreatePersonaRequest>,
) -> ApiResult<(StatusCode, Json<Persona>)> {
    let persona = personas::create_persona(&state.db, &principal, req.lider_id, req.data).await?;
    Ok((StatusCode::CREATED, Json(persona)))
}

/// GET /api/personas
pub async fn list_personas(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Page<Persona>>> {
    let filter = query.filter()?;
    let scope = principal.scope();
    let page_size = get_setting_i64(&state.db, PAGE_SIZE, DEFAULT_PAGE_SIZE).await?;

    let total = personas::count_personas(&state.db, scope, &filter).await?;
    let pagination = calculate_pagination(total, query.page, page_size);
    let items = personas::list_personas(
        &state.db,
        scope,
        &filter,
        Some((page_size, pagination.offset)),
    )
    .await?;

    Ok(Json(Page::new(items, total, pagination, page_size)))
}

/// GET /api/personas/:id
pub async fn get_persona(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PersonaDetail>> {
    let detail = personas::get_detail(&state.db, principal.scope(), id).await?;
    Ok(Json(detail))
}

/// PUT /api/personas/:id
pub async fn update_persona(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(data): ApiJson<PersonaData>,
) -> ApiResult<Json<Persona>> {
    let persona = personas::update_persona(&state.db, &principal, id, data).await?;
    Ok(Json(persona))
}

/// PUT /api/personas/:id/lider
pub async fn reassign_lider(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReassignRequest>,
) -> ApiResult<Json<Persona>> {
    let persona = personas::reassign_lider(&state.db, &principal, id, req.lider_id).await?;
    Ok(Json(persona))
}

/// DELETE /api/personas/:id
///
/// Stored evidence photos are removed after the rows are gone; a failure
/// there is logged and does not fail the request.
pub async fn delete_persona(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let keys = personas::delete_persona(&state.db, &principal, id).await?;
    for key in keys {
        if let Err(e) = state.evidence.delete(&key).await {
            warn!("Failed to delete evidence {} of persona {}: {}", key, id, e);
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/personas/:id/historial
pub async fn get_historial(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<HistorialEntry>>> {
    let entries = historial::list_for_persona(&state.db, principal.scope(), id).await?;
    Ok(Json(entries))
}

