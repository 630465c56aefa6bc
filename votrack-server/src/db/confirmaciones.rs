//! Vote confirmations with photo evidence

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use votrack_common::db::VotoConfirmacion;
use votrack_common::policy::ensure_can_apply;
use votrack_common::validation::require_text;
use votrack_common::{time, uuid_utils, Action, Error, Principal, Result, Scope};

use super::novedades::count_open;
use super::personas::{fetch_visible, push_scope};
use super::workflow::{apply_transition, Transition};
use super::{begin_write, opt_time_col, opt_uuid_col, time_col, uuid_col};
use crate::evidence::StoredEvidence;

const CONFIRMACION_COLUMNS: &str = "c.id, c.persona_id, c.evidence_key, c.content_type, c.sha256, \
     c.size_bytes, c.note, c.confirmed_by, c.confirmed_at, c.reverted_by, c.reverted_at, \
     c.revert_reason";

fn confirmacion_from_row(row: &SqliteRow) -> Result<VotoConfirmacion> {
    Ok(VotoConfirmacion {
        id: uuid_col(row, "id")?,
        persona_id: uuid_col(row, "persona_id")?,
        evidence_key: row.try_get("evidence_key")?,
        content_type: row.try_get("content_type")?,
        sha256: row.try_get("sha256")?,
        size_bytes: row.try_get("size_bytes")?,
        note: row.try_get("note")?,
        confirmed_by: uuid_col(row, "confirmed_by")?,
        confirmed_at: time_col(row, "confirmed_at")?,
        reverted_by: opt_uuid_col(row, "reverted_by")?,
        reverted_at: opt_time_col(row, "reverted_at")?,
        revert_reason: row.try_get("revert_reason")?,
    })
}

async fn fetch_confirmacion(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<VotoConfirmacion>> {
    let sql = format!(
        "SELECT {} FROM voto_confirmaciones c WHERE c.id = ?",
        CONFIRMACION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(confirmacion_from_row).transpose()
}

/// Id of the non-reverted confirmation of a persona, if any
pub async fn active_id(conn: &mut SqliteConnection, persona_id: Uuid) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM voto_confirmaciones WHERE persona_id = ? AND reverted_at IS NULL",
    )
    .bind(persona_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    id.as_deref().map(uuid_utils::from_db).transpose()
}

/// Check visibility and rights before any evidence is written
pub async fn precheck_confirm(
    pool: &SqlitePool,
    principal: &Principal,
    persona_id: Uuid,
) -> Result<()> {
    let mut conn = pool.acquire().await?;
    fetch_visible(&mut conn, principal.scope(), persona_id).await?;
    ensure_can_apply(principal, Action::Confirmar)
}

/// Record a confirmation for evidence already written to the store;
/// moves the persona to CONFIRMADO
pub async fn confirm(
    pool: &SqlitePool,
    principal: &Principal,
    persona_id: Uuid,
    evidence: &StoredEvidence,
    note: Option<&str>,
) -> Result<(VotoConfirmacion, Transition)> {
    let mut tx = begin_write(pool).await?;
    let persona = fetch_visible(&mut tx, principal.scope(), persona_id).await?;
    ensure_can_apply(principal, Action::Confirmar)?;

    let open = count_open(&mut tx, persona_id).await?;
    let transition =
        apply_transition(&mut tx, &persona, Action::Confirmar, open, principal, note).await?;

    let id = uuid_utils::generate();
    let inserted = sqlx::query(
        r#"
        INSERT INTO voto_confirmaciones (id, persona_id, evidence_key, content_type, sha256,
                                         size_bytes, note, confirmed_by, confirmed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(persona_id.to_string())
    .bind(&evidence.key)
    .bind(&evidence.content_type)
    .bind(&evidence.sha256)
    .bind(evidence.size_bytes)
    .bind(note)
    .bind(principal.id.to_string())
    .bind(time::to_db(&transition.at))
    .execute(&mut *tx)
    .await
    .map_err(Error::from);

    if let Err(e) = inserted {
        return Err(if e.is_unique_violation() {
            Error::Conflict(format!("persona {} already has an active confirmation", persona_id))
        } else {
            e
        });
    }

    let confirmacion = fetch_confirmacion(&mut tx, id)
        .await?
        .ok_or_else(|| Error::Internal("created confirmation not found".to_string()))?;
    tx.commit().await?;

    Ok((confirmacion, transition))
}

/// Mark the active confirmation reverted (evidence is kept); moves the
/// persona back to VERIFICADO
pub async fn revert(
    pool: &SqlitePool,
    principal: &Principal,
    persona_id: Uuid,
    reason: &str,
) -> Result<(VotoConfirmacion, Transition)> {
    let reason = require_text("reason", reason)?;

    let mut tx = begin_write(pool).await?;
    let persona = fetch_visible(&mut tx, principal.scope(), persona_id).await?;
    ensure_can_apply(principal, Action::RevertirConfirmacion)?;

    let open = count_open(&mut tx, persona_id).await?;
    let transition = apply_transition(
        &mut tx,
        &persona,
        Action::RevertirConfirmacion,
        open,
        principal,
        Some(&reason),
    )
    .await?;

    let active = active_id(&mut tx, persona_id).await?.ok_or_else(|| {
        Error::Conflict(format!("persona {} has no active confirmation", persona_id))
    })?;

    sqlx::query(
        r#"
        UPDATE voto_confirmaciones SET reverted_by = ?, reverted_at = ?, revert_reason = ?
        WHERE id = ?
        "#,
    )
    .bind(principal.id.to_string())
    .bind(time::to_db(&transition.at))
    .bind(&reason)
    .bind(active.to_string())
    .execute(&mut *tx)
    .await?;

    let confirmacion = fetch_confirmacion(&mut tx, active)
        .await?
        .ok_or_else(|| Error::Internal("reverted confirmation not found".to_string()))?;
    tx.commit().await?;

    Ok((confirmacion, transition))
}

/// Confirmations of a visible persona, newest first
pub async fn list_for_persona(
    pool: &SqlitePool,
    scope: Scope,
    persona_id: Uuid,
) -> Result<Vec<VotoConfirmacion>> {
    let mut conn = pool.acquire().await?;
    fetch_visible(&mut conn, scope, persona_id).await?;

    let sql = format!(
        "SELECT {} FROM voto_confirmaciones c WHERE c.persona_id = ? \
         ORDER BY c.confirmed_at DESC, c.rowid DESC",
        CONFIRMACION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(persona_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(confirmacion_from_row).collect()
}

/// Confirmation by id, when its persona is visible in `scope`
pub async fn get_visible(pool: &SqlitePool, scope: Scope, id: Uuid) -> Result<VotoConfirmacion> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM voto_confirmaciones c \
         JOIN personas p ON p.id = c.persona_id \
         JOIN users l ON l.id = p.lider_id \
         WHERE c.id = ",
        CONFIRMACION_COLUMNS
    ));
    qb.push_bind(id.to_string());
    push_scope(&mut qb, scope);

    match qb.build().fetch_optional(pool).await? {
        Some(row) => confirmacion_from_row(&row),
        None => Err(Error::NotFound(format!("Confirmacion {}", id))),
    }
}
