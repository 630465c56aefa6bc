//! Novedades (issues blocking a persona's progress)

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;
use votrack_common::db::Novedad;
use votrack_common::policy::ensure_can_apply;
use votrack_common::validation::require_text;
use votrack_common::{time, uuid_utils, Action, Error, Principal, Result, Scope};

use super::personas::{fetch_visible, push_scope};
use super::workflow::{apply_transition, Transition};
use super::{begin_write, opt_time_col, opt_uuid_col, time_col, uuid_col};

const NOVEDAD_COLUMNS: &str = "n.id, n.persona_id, n.descripcion, n.opened_by, n.opened_at, \
     n.resolved_by, n.resolved_at, n.resolution";

fn novedad_from_row(row: &SqliteRow) -> Result<Novedad> {
    Ok(Novedad {
        id: uuid_col(row, "id")?,
        persona_id: uuid_col(row, "persona_id")?,
        descripcion: row.try_get("descripcion")?,
        opened_by: uuid_col(row, "opened_by")?,
        opened_at: time_col(row, "opened_at")?,
        resolved_by: opt_uuid_col(row, "resolved_by")?,
        resolved_at: opt_time_col(row, "resolved_at")?,
        resolution: row.try_get("resolution")?,
    })
}

/// Number of unresolved novedades on a persona
pub async fn count_open(conn: &mut SqliteConnection, persona_id: Uuid) -> Result<i64> {
    let n = sqlx::query_scalar(
        "SELECT COUNT(*) FROM novedades WHERE persona_id = ? AND resolved_at IS NULL",
    )
    .bind(persona_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(n)
}

async fn fetch_novedad(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Novedad>> {
    let sql = format!("SELECT {} FROM novedades n WHERE n.id = ?", NOVEDAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(novedad_from_row).transpose()
}

/// Open a novedad on a visible persona; moves it to CON_NOVEDAD
pub async fn open_novedad(
    pool: &SqlitePool,
    principal: &Principal,
    persona_id: Uuid,
    descripcion: &str,
) -> Result<(Novedad, Transition)> {
    let descripcion = require_text("descripcion", descripcion)?;

    let mut tx = begin_write(pool).await?;
    let persona = fetch_visible(&mut tx, principal.scope(), persona_id).await?;
    ensure_can_apply(principal, Action::AbrirNovedad)?;

    let open = count_open(&mut tx, persona_id).await?;
    let transition = apply_transition(
        &mut tx,
        &persona,
        Action::AbrirNovedad,
        open,
        principal,
        Some(&descripcion),
    )
    .await?;

    let id = uuid_utils::generate();
    sqlx::query(
        r#"
        INSERT INTO novedades (id, persona_id, descripcion, opened_by, opened_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(persona_id.to_string())
    .bind(&descripcion)
    .bind(principal.id.to_string())
    .bind(time::to_db(&transition.at))
    .execute(&mut *tx)
    .await?;

    let novedad = fetch_novedad(&mut tx, id)
        .await?
        .ok_or_else(|| Error::Internal("created novedad not found".to_string()))?;
    tx.commit().await?;

    Ok((novedad, transition))
}

/// Resolve an open novedad; the persona returns to DATOS_PENDIENTES once its
/// last open novedad is resolved
pub async fn resolve_novedad(
    pool: &SqlitePool,
    principal: &Principal,
    novedad_id: Uuid,
    resolution: &str,
) -> Result<(Novedad, Transition)> {
    let resolution = require_text("resolution", resolution)?;

    let mut tx = begin_write(pool).await?;
    let novedad = fetch_novedad(&mut tx, novedad_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Novedad {}", novedad_id)))?;
    let persona = fetch_visible(&mut tx, principal.scope(), novedad.persona_id)
        .await
        .map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("Novedad {}", novedad_id)),
            other => other,
        })?;
    ensure_can_apply(principal, Action::ResolverNovedad)?;

    if !novedad.is_open() {
        return Err(Error::Conflict(format!(
            "novedad {} is already resolved",
            novedad_id
        )));
    }

    let open = count_open(&mut tx, persona.id).await?;
    let transition = apply_transition(
        &mut tx,
        &persona,
        Action::ResolverNovedad,
        open,
        principal,
        Some(&resolution),
    )
    .await?;

    sqlx::query(
        r#"
        UPDATE novedades SET resolved_by = ?, resolved_at = ?, resolution = ?
        WHERE id = ? AND resolved_at IS NULL
        "#,
    )
    .bind(principal.id.to_string())
    .bind(time::to_db(&transition.at))
    .bind(&resolution)
    .bind(novedad_id.to_string())
    .execute(&mut *tx)
    .await?;

    let novedad = fetch_novedad(&mut tx, novedad_id)
        .await?
        .ok_or_else(|| Error::Internal("resolved novedad not found".to_string()))?;
    tx.commit().await?;

    Ok((novedad, transition))
}

/// Novedades of a visible persona, open ones first, newest first within each
/// group
pub async fn list_for_persona(
    pool: &SqlitePool,
    scope: Scope,
    persona_id: Uuid,
) -> Result<Vec<Novedad>> {
    let mut conn = pool.acquire().await?;
    fetch_visible(&mut conn, scope, persona_id).await?;

    let sql = format!(
        "SELECT {} FROM novedades n WHERE n.persona_id = ? \
         ORDER BY (n.resolved_at IS NOT NULL), n.opened_at DESC",
        NOVEDAD_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(persona_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(novedad_from_row).collect()
}

/// Novedades across every visible persona, newest first
pub async fn list_in_scope(
    pool: &SqlitePool,
    scope: Scope,
    only_open: bool,
) -> Result<Vec<Novedad>> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM novedades n \
         JOIN personas p ON p.id = n.persona_id \
         JOIN users l ON l.id = p.lider_id \
         WHERE 1=1",
        NOVEDAD_COLUMNS
    ));
    push_scope(&mut qb, scope);
    if only_open {
        qb.push(" AND n.resolved_at IS NULL");
    }
    qb.push(" ORDER BY n.opened_at DESC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(novedad_from_row).collect()
}
