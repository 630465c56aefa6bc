//! Persona estado history

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use votrack_common::db::HistorialEntry;
use votrack_common::{Result, Scope};

use super::personas::fetch_visible;
use super::{time_col, uuid_col};

/// Transitions of a visible persona, oldest first
pub async fn list_for_persona(
    pool: &SqlitePool,
    scope: Scope,
    persona_id: Uuid,
) -> Result<Vec<HistorialEntry>> {
    let mut conn = pool.acquire().await?;
    fetch_visible(&mut conn, scope, persona_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT seq, persona_id, action, from_estado, to_estado, user_id, note, at
        FROM persona_historial
        WHERE persona_id = ?
        ORDER BY seq
        "#,
    )
    .bind(persona_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<HistorialEntry> {
            let action: String = row.try_get("action")?;
            let from: String = row.try_get("from_estado")?;
            let to: String = row.try_get("to_estado")?;
            Ok(HistorialEntry {
                seq: row.try_get("seq")?,
                persona_id: uuid_col(row, "persona_id")?,
                action: action.parse()?,
                from_estado: from.parse()?,
                to_estado: to.parse()?,
                user_id: uuid_col(row, "user_id")?,
                note: row.try_get("note")?,
                at: time_col(row, "at")?,
            })
        })
        .collect()
}
