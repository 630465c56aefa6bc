//! CSV export endpoint

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use tracing::info;
use votrack_common::Principal;

use crate::api::extract::ApiQuery;
use crate::api::personas::ListQuery;
use crate::db::personas;
use crate::error::ApiResult;
use crate::export::personas_csv;
use crate::AppState;

/// GET /api/export/personas.csv
///
/// Same filters as the persona list, unpaginated.
pub async fn export_personas(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Response> {
    let filter = query.filter()?;
    let list = personas::list_personas(&state.db, principal.scope(), &filter, None).await?;
    info!("Exporting {} persona(s) for {}", list.len(), principal.username);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"personas.csv\"",
            ),
        ],
        personas_csv(&list),
    )
        .into_response())
}
