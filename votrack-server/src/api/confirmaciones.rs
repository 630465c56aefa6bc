//! Vote confirmation endpoints
//!
//! The photo arrives base64-encoded in the JSON body. It is checked against
//! the accepted content types and the `evidence_max_bytes` setting, written
//! to the evidence store, and only then recorded. If recording fails the
//! stored photo is deleted again.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use votrack_common::db::settings::{get_setting_i64, DEFAULT_EVIDENCE_MAX_BYTES, EVIDENCE_MAX_BYTES};
use votrack_common::db::VotoConfirmacion;
use votrack_common::Principal;

use crate::api::extract::{ApiJson, ApiPath};
use crate::db::confirmaciones;
use crate::db::workflow::clean_note;
use crate::error::{ApiError, ApiResult};
use crate::evidence::{extension_for, store_photo, ACCEPTED_CONTENT_TYPES};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmarRequest {
    pub photo_base64: String,
    pub content_type: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevertirConfirmacionRequest {
    pub reason: String,
}

/// Decode the photo, accepting an optional `data:<type>;base64,` prefix
fn decode_photo(encoded: &str, max_bytes: i64) -> ApiResult<Vec<u8>> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    }
    .trim();

    let too_large = || {
        ApiError::PayloadTooLarge(format!("photo exceeds the {} byte limit", max_bytes))
    };

    // Every 4 base64 characters carry 3 bytes
    if (data.len() / 4) as i64 * 3 > max_bytes + 2 {
        return Err(too_large());
    }

    let bytes = STANDARD
        .decode(data)
        .map_err(|e| ApiError::BadRequest(format!("photo_base64 is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(ApiError::BadRequest("photo is empty".to_string()));
    }
    if bytes.len() as i64 > max_bytes {
        return Err(too_large());
    }
    Ok(bytes)
}

/// POST /api/personas/:id/confirmar
pub async fn confirmar(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(persona_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ConfirmarRequest>,
) -> ApiResult<(StatusCode, Json<VotoConfirmacion>)> {
    let note = clean_note(req.note)?;
    if extension_for(&req.content_type).is_none() {
        let accepted: Vec<&str> = ACCEPTED_CONTENT_TYPES.iter().map(|(ct, _)| *ct).collect();
        return Err(ApiError::BadRequest(format!(
            "content_type must be one of {}",
            accepted.join(", ")
        )));
    }

    let max_bytes =
        get_setting_i64(&state.db, EVIDENCE_MAX_BYTES, DEFAULT_EVIDENCE_MAX_BYTES).await?;
    let bytes = decode_photo(&req.photo_base64, max_bytes)?;

    confirmaciones::precheck_confirm(&state.db, &principal, persona_id).await?;
    let stored = store_photo(state.evidence.as_ref(), persona_id, &req.content_type, bytes).await?;

    match confirmaciones::confirm(&state.db, &principal, persona_id, &stored, note.as_deref()).await
    {
        Ok((confirmacion, transition)) => {
            info!(
                "Stored evidence {} ({} bytes) for persona {}",
                stored.key, stored.size_bytes, persona_id
            );
            state.event_bus.emit(transition.into_event());
            Ok((StatusCode::CREATED, Json(confirmacion)))
        }
        Err(e) => {
            if let Err(cleanup) = state.evidence.delete(&stored.key).await {
                warn!("Failed to remove orphaned evidence {}: {}", stored.key, cleanup);
            }
            Err(e.into())
        }
    }
}

/// POST /api/personas/:id/revertir-confirmacion
pub async fn revertir_confirmacion(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(persona_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RevertirConfirmacionRequest>,
) -> ApiResult<Json<VotoConfirmacion>> {
    let (confirmacion, transition) =
        confirmaciones::revert(&state.db, &principal, persona_id, &req.reason).await?;
    state.event_bus.emit(transition.into_event());
    Ok(Json(confirmacion))
}

/// GET /api/personas/:id/confirmaciones
pub async fn list_confirmaciones(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(persona_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<VotoConfirmacion>>> {
    let list = confirmaciones::list_for_persona(&state.db, principal.scope(), persona_id).await?;
    Ok(Json(list))
}

/// GET /api/confirmaciones/:id/foto
pub async fn get_foto(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let confirmacion = confirmaciones::get_visible(&state.db, principal.scope(), id).await?;
    let bytes = state.evidence.get(&confirmacion.evidence_key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, confirmacion.content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        bytes,
    )
        .into_response())
}
