//! Runtime settings endpoints (ADMIN)
//!
//! Lists every tunable in the `settings` table with its units, default and
//! a short description, and updates one value at a time.

use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use votrack_common::db::settings::{
    get_setting, set_setting, DEFAULT_EVIDENCE_MAX_BYTES, DEFAULT_PAGE_SIZE,
    DEFAULT_SESSION_TIMEOUT_SECONDS, EVIDENCE_MAX_BYTES, PAGE_SIZE, SESSION_TIMEOUT_SECONDS,
};
use votrack_common::policy::ensure_can_manage_users;
use votrack_common::Principal;

use crate::api::extract::{ApiJson, ApiPath};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Individual setting row with metadata
#[derive(Debug, Serialize)]
pub struct SettingRow {
    pub key: String,
    pub value: Option<String>,
    pub units: String,
    pub default_value: String,
    pub description: String,
}

/// Parameter metadata definition
struct ParamMetadata {
    key: &'static str,
    units: &'static str,
    default_value: i64,
    min: i64,
    max: i64,
    description: &'static str,
}

const PARAMETERS: [ParamMetadata; 3] = [
    ParamMetadata {
        key: SESSION_TIMEOUT_SECONDS,
        units: "seconds",
        default_value: DEFAULT_SESSION_TIMEOUT_SECONDS,
        min: 60,
        max: 30 * 24 * 3600,
        description: "Lifetime of a login session. Applies to sessions created after the change.",
    },
    ParamMetadata {
        key: EVIDENCE_MAX_BYTES,
        units: "bytes",
        default_value: DEFAULT_EVIDENCE_MAX_BYTES,
        min: 1024,
        max: crate::MAX_EVIDENCE_BYTES,
        description: "Largest accepted confirmation photo after base64 decoding.",
    },
    ParamMetadata {
        key: PAGE_SIZE,
        units: "rows",
        default_value: DEFAULT_PAGE_SIZE,
        min: 1,
        max: 500,
        description: "Rows per page of the persona list.",
    },
];

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: i64,
}

/// GET /api/settings
pub async fn list_settings(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<SettingRow>>> {
    ensure_can_manage_users(&principal)?;

    let mut rows = Vec::with_capacity(PARAMETERS.len());
    for param in &PARAMETERS {
        rows.push(SettingRow {
            key: param.key.to_string(),
            value: get_setting(&state.db, param.key).await?,
            units: param.units.to_string(),
            default_value: param.default_value.to_string(),
            description: param.description.to_string(),
        });
    }
    Ok(Json(rows))
}

/// PUT /api/settings/:key
pub async fn update_setting(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiPath(key): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateSettingRequest>,
) -> ApiResult<Json<SettingRow>> {
    ensure_can_manage_users(&principal)?;

    let param = PARAMETERS
        .iter()
        .find(|p| p.key == key)
        .ok_or_else(|| ApiError::NotFound(format!("Setting {}", key)))?;

    if req.value < param.min || req.value > param.max {
        return Err(ApiError::BadRequest(format!(
            "{} must be between {} and {} {}",
            param.key, param.min, param.max, param.units
        )));
    }

    set_setting(&state.db, param.key, &req.value.to_string()).await?;
    info!("Setting {} = {} (by {})", param.key, req.value, principal.username);

    Ok(Json(SettingRow {
        key: param.key.to_string(),
        value: Some(req.value.to_string()),
        units: param.units.to_string(),
        default_value: param.default_value.to_string(),
        description: param.description.to_string(),
    }))
}
