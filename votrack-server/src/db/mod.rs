//! Database access layer for votrack-server
//!
//! Repository functions over the schema created by
//! `votrack_common::db::init_database`. Every persona read goes through a
//! [`Scope`](votrack_common::Scope); a row outside the caller's scope is
//! reported as not found.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;
use votrack_common::{time, uuid_utils, Result};

pub mod confirmaciones;
pub mod dashboard;
pub mod historial;
pub mod novedades;
pub mod personas;
pub mod sessions;
pub mod users;
pub mod workflow;

/// Start a transaction that takes the write lock up front
///
/// Repository mutations read before they write. A deferred transaction whose
/// snapshot predates another connection's commit fails its first write with
/// SQLITE_BUSY without honouring the busy timeout.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

pub(crate) fn uuid_col(row: &SqliteRow, col: &str) -> Result<Uuid> {
    let s: String = row.try_get(col)?;
    uuid_utils::from_db(&s)
}

pub(crate) fn opt_uuid_col(row: &SqliteRow, col: &str) -> Result<Option<Uuid>> {
    let s: Option<String> = row.try_get(col)?;
    s.as_deref().map(uuid_utils::from_db).transpose()
}

pub(crate) fn time_col(row: &SqliteRow, col: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let s: String = row.try_get(col)?;
    time::from_db(&s)
}

pub(crate) fn opt_time_col(
    row: &SqliteRow,
    col: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    let s: Option<String> = row.try_get(col)?;
    s.as_deref().map(time::from_db).transpose()
}
