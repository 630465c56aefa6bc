//! Persona repository
//!
//! Lists and lookups are built with `QueryBuilder` so the caller's scope and
//! the optional filters become bound parameters.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use votrack_common::db::Persona;
use votrack_common::policy::{
    ensure_can_delete, ensure_can_edit, ensure_can_reassign, ensure_can_register,
};
use votrack_common::validation::PersonaData;
use votrack_common::{time, uuid_utils, Error, Estado, Principal, Result, Scope};

use super::users::find_lider;
use super::{begin_write, opt_uuid_col, time_col, uuid_col};

pub(crate) const PERSONA_SELECT: &str = r#"
    SELECT p.id, p.documento, p.nombres, p.apellidos, p.telefono, p.direccion,
           p.barrio, p.municipio, p.puesto_votacion, p.mesa, p.lider_id,
           l.display_name AS lider_nombre, l.coordinador_id AS coordinador_id,
           p.estado, p.created_by, p.created_at, p.updated_at
    FROM personas p
    JOIN users l ON l.id = p.lider_id"#;

pub(crate) fn persona_from_row(row: &SqliteRow) -> Result<Persona> {
    let estado: String = row.try_get("estado")?;
    Ok(Persona {
        id: uuid_col(row, "id")?,
        documento: row.try_get("documento")?,
        nombres: row.try_get("nombres")?,
        apellidos: row.try_get("apellidos")?,
        telefono: row.try_get("telefono")?,
        direccion: row.try_get("direccion")?,
        barrio: row.try_get("barrio")?,
        municipio: row.try_get("municipio")?,
        puesto_votacion: row.try_get("puesto_votacion")?,
        mesa: row.try_get("mesa")?,
        lider_id: uuid_col(row, "lider_id")?,
        lider_nombre: row.try_get("lider_nombre")?,
        coordinador_id: opt_uuid_col(row, "coordinador_id")?,
        estado: estado.parse()?,
        created_by: uuid_col(row, "created_by")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

/// Restrict a query over `personas p JOIN users l` to `scope`
///
/// Expects a WHERE clause to be open already.
pub(crate) fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: Scope) {
    match scope {
        Scope::All => {}
        Scope::Coordinador(id) => {
            qb.push(" AND l.coordinador_id = ").push_bind(id.to_string());
        }
        Scope::Lider(id) => {
            qb.push(" AND p.lider_id = ").push_bind(id.to_string());
        }
    }
}

/// List filters shared by the list and export endpoints
#[derive(Debug, Clone, Default)]
pub struct PersonaFilter {
    pub estado: Option<Estado>,
    pub lider_id: Option<Uuid>,
    /// Substring of documento, nombres or apellidos
    pub q: Option<String>,
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PersonaFilter) {
    if let Some(estado) = filter.estado {
        qb.push(" AND p.estado = ").push_bind(estado.as_str());
    }
    if let Some(lider_id) = filter.lider_id {
        qb.push(" AND p.lider_id = ").push_bind(lider_id.to_string());
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (p.documento LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR p.nombres LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR p.apellidos LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

pub async fn count_personas(
    pool: &SqlitePool,
    scope: Scope,
    filter: &PersonaFilter,
) -> Result<i64> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM personas p JOIN users l ON l.id = p.lider_id WHERE 1=1",
    );
    push_scope(&mut qb, scope);
    push_filter(&mut qb, filter);

    let total = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(total)
}

/// Visible personas, newest first; `page` is `(limit, offset)`
pub async fn list_personas(
    pool: &SqlitePool,
    scope: Scope,
    filter: &PersonaFilter,
    page: Option<(i64, i64)>,
) -> Result<Vec<Persona>> {
    let mut qb = QueryBuilder::new(PERSONA_SELECT);
    qb.push(" WHERE 1=1");
    push_scope(&mut qb, scope);
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY p.created_at DESC, p.rowid DESC");
    if let Some((limit, offset)) = page {
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
    }

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(persona_from_row).collect()
}

/// Persona by id, or `NotFound` when missing or outside `scope`
pub async fn fetch_visible(conn: &mut SqliteConnection, scope: Scope, id: Uuid) -> Result<Persona> {
    let mut qb = QueryBuilder::new(PERSONA_SELECT);
    qb.push(" WHERE p.id = ").push_bind(id.to_string());
    push_scope(&mut qb, scope);

    match qb.build().fetch_optional(&mut *conn).await? {
        Some(row) => persona_from_row(&row),
        None => Err(Error::NotFound(format!("Persona {}", id))),
    }
}

/// Persona with its workflow context
#[derive(Debug, Serialize)]
pub struct PersonaDetail {
    #[serde(flatten)]
    pub persona: Persona,
    pub open_novedades: i64,
    pub active_confirmacion_id: Option<Uuid>,
}

pub async fn get_detail(pool: &SqlitePool, scope: Scope, id: Uuid) -> Result<PersonaDetail> {
    let mut conn = pool.acquire().await?;
    let persona = fetch_visible(&mut conn, scope, id).await?;
    let open_novedades = super::novedades::count_open(&mut conn, id).await?;
    let active_confirmacion_id = super::confirmaciones::active_id(&mut conn, id).await?;

    Ok(PersonaDetail {
        persona,
        open_novedades,
        active_confirmacion_id,
    })
}

fn documento_conflict(err: sqlx::Error, documento: &str) -> Error {
    let err = Error::from(err);
    if err.is_unique_violation() {
        Error::Conflict(format!("documento {} is already registered", documento))
    } else {
        err
    }
}

/// Register a persona
///
/// Líderes always register under themselves; other roles must name the
/// líder.
pub async fn create_persona(
    pool: &SqlitePool,
    principal: &Principal,
    lider_id: Option<Uuid>,
    data: PersonaData,
) -> Result<Persona> {
    if !principal.role.can_register_personas() {
        return Err(Error::Forbidden(format!(
            "{} may not register personas",
            principal.role
        )));
    }
    let lider_id = match principal.role {
        votrack_common::Role::Lider => principal.id,
        _ => lider_id.ok_or_else(|| Error::InvalidInput("lider_id is required".to_string()))?,
    };
    let data = data.normalized()?;

    let mut tx = begin_write(pool).await?;
    let lider = find_lider(&mut tx, lider_id).await?.ok_or_else(|| {
        Error::InvalidInput("lider_id must reference an active LIDER".to_string())
    })?;
    ensure_can_register(principal, lider.id, lider.coordinador_id)?;

    let id = uuid_utils::generate();
    let now = time::to_db(&time::now());
    sqlx::query(
        r#"
        INSERT INTO personas (id, documento, nombres, apellidos, telefono, direccion, barrio,
                              municipio, puesto_votacion, mesa, lider_id, estado, created_by,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&data.documento)
    .bind(&data.nombres)
    .bind(&data.apellidos)
    .bind(&data.telefono)
    .bind(&data.direccion)
    .bind(&data.barrio)
    .bind(&data.municipio)
    .bind(&data.puesto_votacion)
    .bind(&data.mesa)
    .bind(lider.id.to_string())
    .bind(Estado::DatosPendientes.as_str())
    .bind(principal.id.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| documento_conflict(e, &data.documento))?;

    let persona = fetch_visible(&mut tx, Scope::All, id).await?;
    tx.commit().await?;

    info!(
        "Persona {} registered under líder {} by {}",
        persona.id, persona.lider_id, principal.username
    );
    Ok(persona)
}

/// Replace the data fields of a visible persona
pub async fn update_persona(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    data: PersonaData,
) -> Result<Persona> {
    let data = data.normalized()?;

    let mut tx = begin_write(pool).await?;
    let current = fetch_visible(&mut tx, principal.scope(), id).await?;
    ensure_can_edit(principal, current.estado)?;

    sqlx::query(
        r#"
        UPDATE personas
        SET documento = ?, nombres = ?, apellidos = ?, telefono = ?, direccion = ?,
            barrio = ?, municipio = ?, puesto_votacion = ?, mesa = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&data.documento)
    .bind(&data.nombres)
    .bind(&data.apellidos)
    .bind(&data.telefono)
    .bind(&data.direccion)
    .bind(&data.barrio)
    .bind(&data.municipio)
    .bind(&data.puesto_votacion)
    .bind(&data.mesa)
    .bind(time::to_db(&time::now()))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await
    .map_err(|e| documento_conflict(e, &data.documento))?;

    let persona = fetch_visible(&mut tx, Scope::All, id).await?;
    tx.commit().await?;

    info!("Persona {} updated by {}", id, principal.username);
    Ok(persona)
}

/// Move a visible persona to another active líder
pub async fn reassign_lider(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    new_lider_id: Uuid,
) -> Result<Persona> {
    let mut tx = begin_write(pool).await?;
    let current = fetch_visible(&mut tx, principal.scope(), id).await?;
    let lider = find_lider(&mut tx, new_lider_id).await?.ok_or_else(|| {
        Error::InvalidInput("lider_id must reference an active LIDER".to_string())
    })?;
    ensure_can_reassign(principal, lider.coordinador_id)?;

    sqlx::query("UPDATE personas SET lider_id = ?, updated_at = ? WHERE id = ?")
        .bind(lider.id.to_string())
        .bind(time::to_db(&time::now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    let persona = fetch_visible(&mut tx, Scope::All, id).await?;
    tx.commit().await?;

    info!(
        "Persona {} reassigned from líder {} to {} by {}",
        id, current.lider_id, persona.lider_id, principal.username
    );
    Ok(persona)
}

/// Delete a visible persona with its novedades, confirmations and historial
///
/// Returns the evidence keys that belonged to it so the caller can remove
/// the stored photos.
pub async fn delete_persona(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
) -> Result<Vec<String>> {
    let mut tx = begin_write(pool).await?;
    let persona = fetch_visible(&mut tx, principal.scope(), id).await?;
    ensure_can_delete(principal, persona.estado, persona.lider_id)?;

    let keys: Vec<String> =
        sqlx::query_scalar("SELECT evidence_key FROM voto_confirmaciones WHERE persona_id = ?")
            .bind(id.to_string())
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM personas WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Persona {} deleted by {}", id, principal.username);
    Ok(keys)
}
