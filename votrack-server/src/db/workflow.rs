//! Estado transitions
//!
//! [`apply_transition`] is the only place that writes `personas.estado`. It
//! asks `next_estado` for the target, updates the row guarded by the estado it
//! was read in, and appends the historial entry on the same connection, so
//! callers running inside a transaction get both or neither.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use votrack_common::db::Persona;
use votrack_common::estado::next_estado;
use votrack_common::events::VotrackEvent;
use votrack_common::policy::ensure_can_apply;
use votrack_common::validation::require_text;
use votrack_common::{time, Action, Error, Estado, Principal, Result, Scope};

use super::novedades::count_open;
use super::begin_write;
use super::personas::fetch_visible;

/// An estado change that has been written
#[derive(Debug, Clone)]
pub struct Transition {
    pub persona_id: Uuid,
    pub lider_id: Uuid,
    pub coordinador_id: Option<Uuid>,
    pub from: Estado,
    pub to: Estado,
    pub action: Action,
    pub by: Uuid,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn into_event(self) -> VotrackEvent {
        VotrackEvent::PersonaEstadoChanged {
            persona_id: self.persona_id,
            lider_id: self.lider_id,
            coordinador_id: self.coordinador_id,
            from: self.from,
            to: self.to,
            action: self.action,
            by: self.by,
            at: self.at,
        }
    }
}

/// Optional free-text note; blank is absent
pub fn clean_note(note: Option<String>) -> Result<Option<String>> {
    match note.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => require_text("note", n).map(Some),
        _ => Ok(None),
    }
}

/// Move `persona` through `action`
///
/// `open_novedades` is the open count before the action (see `next_estado`).
pub async fn apply_transition(
    conn: &mut SqliteConnection,
    persona: &Persona,
    action: Action,
    open_novedades: i64,
    by: &Principal,
    note: Option<&str>,
) -> Result<Transition> {
    let to = next_estado(persona.estado, action, open_novedades)?;
    let at = time::now();
    let at_db = time::to_db(&at);

    let updated = sqlx::query(
        "UPDATE personas SET estado = ?, updated_at = ? WHERE id = ? AND estado = ?",
    )
    .bind(to.as_str())
    .bind(&at_db)
    .bind(persona.id.to_string())
    .bind(persona.estado.as_str())
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "persona {} changed concurrently, reload and retry",
            persona.id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO persona_historial (persona_id, action, from_estado, to_estado, user_id, note, at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(persona.id.to_string())
    .bind(action.as_str())
    .bind(persona.estado.as_str())
    .bind(to.as_str())
    .bind(by.id.to_string())
    .bind(note)
    .bind(&at_db)
    .execute(&mut *conn)
    .await?;

    info!(
        "Persona {}: {} {} -> {} by {}",
        persona.id, action, persona.estado, to, by.username
    );

    Ok(Transition {
        persona_id: persona.id,
        lider_id: persona.lider_id,
        coordinador_id: persona.coordinador_id,
        from: persona.estado,
        to,
        action,
        by: by.id,
        at,
    })
}

/// Run an action that touches nothing but the estado (verification and its
/// reversal)
async fn run_estado_action(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    action: Action,
    note: Option<String>,
) -> Result<(Persona, Transition)> {
    let note = clean_note(note)?;

    let mut tx = begin_write(pool).await?;
    let persona = fetch_visible(&mut tx, principal.scope(), id).await?;
    ensure_can_apply(principal, action)?;

    let open = count_open(&mut tx, id).await?;
    let transition =
        apply_transition(&mut tx, &persona, action, open, principal, note.as_deref()).await?;

    let persona = fetch_visible(&mut tx, Scope::All, id).await?;
    tx.commit().await?;

    Ok((persona, transition))
}

pub async fn verificar(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    note: Option<String>,
) -> Result<(Persona, Transition)> {
    run_estado_action(pool, principal, id, Action::Verificar, note).await
}

pub async fn revertir_verificacion(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    note: Option<String>,
) -> Result<(Persona, Transition)> {
    run_estado_action(pool, principal, id, Action::RevertirVerificacion, note).await
}
