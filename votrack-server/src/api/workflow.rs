//! Verification endpoints

use axum::{
    extract::State,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use votrack_common::db::Persona;
use votrack_common::Principal;

use crate::api::extract::{ApiPath, OptionalJson};
use crate::db::workflow;
use crate::error::ApiResult;
use crate::AppState;

/// Optional body of the verification endpoints
#[derive(Debug, Default, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

fn note_of(body: OptionalJson<NoteRequest>) -> Option<String> {
    body.0.and_then(|b| b.note)
}

/// POST /api/personas/:id/verificar
pub async fn verificar(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
    body: OptionalJson<NoteRequest>,
) -> ApiResult<Json<Persona>> {
    let (persona, transition) =
        workflow::verificar(&state.db, &principal, id, note_of(body)).await?;
    state.event_bus.emit(transition.into_event());
    Ok(Json(persona))
}

/// POST /api/personas/:id/revertir-verificacion
pub async fn revertir_verificacion(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
    body: OptionalJson<NoteRequest>,
) -> ApiResult<Json<Persona>> {
    let (persona, transition) =
        workflow::revertir_verificacion(&state.db, &principal, id, note_of(body)).await?;
    state.event_bus.emit(transition.into_event());
    Ok(Json(persona))
}
