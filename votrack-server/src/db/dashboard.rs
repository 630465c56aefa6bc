//! Aggregate counts for the dashboards
//!
//! Every aggregate is restricted to the caller's scope. Estado maps are
//! zero-filled so clients always receive every estado key.

use serde::Serialize;
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;
use votrack_common::{Estado, Result, Scope};

use super::personas::push_scope;
use super::{opt_uuid_col, uuid_col};

pub type EstadoCounts = BTreeMap<&'static str, i64>;

fn zero_filled() -> EstadoCounts {
    Estado::ALL.iter().map(|e| (e.as_str(), 0)).collect()
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total: i64,
    pub por_estado: EstadoCounts,
    pub novedades_abiertas: i64,
    pub confirmaciones_activas: i64,
}

#[derive(Debug, Serialize)]
pub struct LiderStats {
    pub lider_id: Uuid,
    pub lider_nombre: String,
    pub coordinador_id: Option<Uuid>,
    pub total: i64,
    pub por_estado: EstadoCounts,
}

#[derive(Debug, Serialize)]
pub struct CoordinadorStats {
    pub coordinador_id: Uuid,
    pub coordinador_nombre: String,
    pub lideres: i64,
    pub total: i64,
    pub por_estado: EstadoCounts,
}

pub async fn summary(pool: &SqlitePool, scope: Scope) -> Result<DashboardSummary> {
    let mut qb = QueryBuilder::new(
        "SELECT p.estado AS estado, COUNT(*) AS n \
         FROM personas p JOIN users l ON l.id = p.lider_id WHERE 1=1",
    );
    push_scope(&mut qb, scope);
    qb.push(" GROUP BY p.estado");
    let rows = qb.build().fetch_all(pool).await?;

    let mut por_estado = zero_filled();
    let mut total = 0;
    for row in &rows {
        let estado: String = row.try_get("estado")?;
        let n: i64 = row.try_get("n")?;
        por_estado.insert(estado.parse::<Estado>()?.as_str(), n);
        total += n;
    }

    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM novedades n \
         JOIN personas p ON p.id = n.persona_id \
         JOIN users l ON l.id = p.lider_id \
         WHERE n.resolved_at IS NULL",
    );
    push_scope(&mut qb, scope);
    let novedades_abiertas = qb.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM voto_confirmaciones c \
         JOIN personas p ON p.id = c.persona_id \
         JOIN users l ON l.id = p.lider_id \
         WHERE c.reverted_at IS NULL",
    );
    push_scope(&mut qb, scope);
    let confirmaciones_activas = qb.build_query_scalar::<i64>().fetch_one(pool).await?;

    Ok(DashboardSummary {
        total,
        por_estado,
        novedades_abiertas,
        confirmaciones_activas,
    })
}

/// Per-líder counts, largest first
///
/// Inactive líderes are listed only while they still own personas.
pub async fn por_lider(pool: &SqlitePool, scope: Scope) -> Result<Vec<LiderStats>> {
    let mut qb = QueryBuilder::new(
        "SELECT l.id AS lider_id, l.display_name AS lider_nombre, l.coordinador_id AS coordinador_id, \
                p.estado AS estado, COUNT(p.id) AS n \
         FROM users l LEFT JOIN personas p ON p.lider_id = l.id \
         WHERE l.role = 'LIDER' AND (l.active = 1 OR p.id IS NOT NULL)",
    );
    // Scope on the líder row itself so líderes without personas still show
    match scope {
        Scope::All => {}
        Scope::Coordinador(id) => {
            qb.push(" AND l.coordinador_id = ").push_bind(id.to_string());
        }
        Scope::Lider(id) => {
            qb.push(" AND l.id = ").push_bind(id.to_string());
        }
    }
    qb.push(" GROUP BY l.id, p.estado");
    let rows = qb.build().fetch_all(pool).await?;

    let mut stats: Vec<LiderStats> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for row in &rows {
        let lider_id = uuid_col(row, "lider_id")?;
        let i = match index.get(&lider_id) {
            Some(i) => *i,
            None => {
                stats.push(LiderStats {
                    lider_id,
                    lider_nombre: row.try_get("lider_nombre")?,
                    coordinador_id: opt_uuid_col(row, "coordinador_id")?,
                    total: 0,
                    por_estado: zero_filled(),
                });
                index.insert(lider_id, stats.len() - 1);
                stats.len() - 1
            }
        };

        let estado: Option<String> = row.try_get("estado")?;
        if let Some(estado) = estado {
            let n: i64 = row.try_get("n")?;
            stats[i].por_estado.insert(estado.parse::<Estado>()?.as_str(), n);
            stats[i].total += n;
        }
    }

    stats.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.lider_nombre.cmp(&b.lider_nombre))
    });
    Ok(stats)
}

/// Per-coordinador counts, largest first (unscoped)
pub async fn por_coordinador(pool: &SqlitePool) -> Result<Vec<CoordinadorStats>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id AS id, c.display_name AS nombre,
               (SELECT COUNT(*) FROM users l WHERE l.coordinador_id = c.id) AS lideres
        FROM users c
        WHERE c.role = 'COORDINADOR'
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut stats = Vec::with_capacity(rows.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for row in &rows {
        let id = uuid_col(row, "id")?;
        index.insert(id, stats.len());
        stats.push(CoordinadorStats {
            coordinador_id: id,
            coordinador_nombre: row.try_get("nombre")?,
            lideres: row.try_get("lideres")?,
            total: 0,
            por_estado: zero_filled(),
        });
    }

    let counts = sqlx::query(
        r#"
        SELECT l.coordinador_id AS coordinador_id, p.estado AS estado, COUNT(*) AS n
        FROM personas p JOIN users l ON l.id = p.lider_id
        WHERE l.coordinador_id IS NOT NULL
        GROUP BY l.coordinador_id, p.estado
        "#,
    )
    .fetch_all(pool)
    .await?;

    for row in &counts {
        let id = uuid_col(row, "coordinador_id")?;
        let Some(&i) = index.get(&id) else {
            continue;
        };
        let estado: String = row.try_get("estado")?;
        let n: i64 = row.try_get("n")?;
        stats[i].por_estado.insert(estado.parse::<Estado>()?.as_str(), n);
        stats[i].total += n;
    }

    stats.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.coordinador_nombre.cmp(&b.coordinador_nombre))
    });
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_filled_has_every_estado() {
        let counts = zero_filled();
        assert_eq!(counts.len(), Estado::ALL.len());
        assert!(counts.values().all(|n| *n == 0));
        assert!(counts.contains_key("CON_NOVEDAD"));
    }
}
