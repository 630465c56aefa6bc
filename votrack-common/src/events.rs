//! In-process event bus
//!
//! Estado transitions are published here and fanned out to SSE subscribers.
//! Delivery is best-effort: with no subscribers the event is dropped, and a
//! slow subscriber that lags behind the channel capacity skips ahead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::estado::{Action, Estado};

/// Events published by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VotrackEvent {
    /// A persona moved between estados
    PersonaEstadoChanged {
        persona_id: Uuid,
        lider_id: Uuid,
        /// Coordinador of the persona's líder at the time of the change
        coordinador_id: Option<Uuid>,
        from: Estado,
        to: Estado,
        action: Action,
        by: Uuid,
        at: DateTime<Utc>,
    },
}

impl VotrackEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            VotrackEvent::PersonaEstadoChanged { .. } => "PersonaEstadoChanged",
        }
    }

    /// Owner líder and its coordinador, for scope filtering
    pub fn owner(&self) -> (Uuid, Option<Uuid>) {
        match self {
            VotrackEvent::PersonaEstadoChanged {
                lider_id,
                coordinador_id,
                ..
            } => (*lider_id, *coordinador_id),
        }
    }
}

/// Broadcast bus shared through application state
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VotrackEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<VotrackEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; returns the number of subscribers reached
    pub fn emit(&self, event: VotrackEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
