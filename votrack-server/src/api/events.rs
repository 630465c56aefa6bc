//! Server-Sent Events (SSE) for estado changes

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Extension,
};
use futures::stream::Stream;
use std::convert::Infallible;
use votrack_common::sse::filtered_event_stream;
use votrack_common::Principal;

use crate::AppState;

/// GET /api/events - estado changes of personas in the caller's scope
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let scope = principal.scope();
    filtered_event_stream(state.event_bus.subscribe(), move |event| {
        let (lider_id, coordinador_id) = event.owner();
        scope.contains(lider_id, coordinador_id)
    })
}
