//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::events::VotrackEvent;

/// Heartbeat interval for idle streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Turn a bus subscription into an SSE response, forwarding only the events
/// accepted by `filter`
///
/// The stream opens with a `ConnectionStatus` event. Lagged receivers log the
/// number of skipped events and keep going; the stream ends when the bus is
/// dropped.
pub fn filtered_event_stream<F>(
    mut rx: broadcast::Receiver<VotrackEvent>,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&VotrackEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected");

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter(&event) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(data) => {
                            debug!("SSE: sending {}", event.event_type());
                            yield Ok(Event::default().event(event.event_type()).data(data));
                        }
                        Err(e) => warn!("SSE: failed to serialize event: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
