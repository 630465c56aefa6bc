//! Database models
//!
//! Records as returned by the API. Credential columns never leave the
//! database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::estado::{Action, Estado};
use crate::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub coordinador_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    pub documento: String,
    pub nombres: String,
    pub apellidos: String,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub barrio: Option<String>,
    pub municipio: Option<String>,
    pub puesto_votacion: Option<String>,
    pub mesa: Option<String>,
    pub lider_id: Uuid,
    pub lider_nombre: String,
    /// Coordinador of the owning líder
    pub coordinador_id: Option<Uuid>,
    pub estado: Estado,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Novedad {
    pub id: Uuid,
    pub persona_id: Uuid,
    pub descripcion: String,
    pub opened_by: Uuid,
    pub opened_at: DateTime<Utc>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl Novedad {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Photo evidence that a persona voted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotoConfirmacion {
    pub id: Uuid,
    pub persona_id: Uuid,
    #[serde(skip_serializing)]
    pub evidence_key: String,
    pub content_type: String,
    pub sha256: String,
    pub size_bytes: i64,
    pub note: Option<String>,
    pub confirmed_by: Uuid,
    pub confirmed_at: DateTime<Utc>,
    pub reverted_by: Option<Uuid>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub revert_reason: Option<String>,
}

/// One applied estado transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorialEntry {
    pub seq: i64,
    pub persona_id: Uuid,
    pub action: Action,
    pub from_estado: Estado,
    pub to_estado: Estado,
    pub user_id: Uuid,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}
