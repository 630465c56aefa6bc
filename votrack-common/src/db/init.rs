//! Database initialization
//!
//! Startup sequence:
//! 1. Create the database file if missing
//! 2. Create tables (idempotent `CREATE TABLE IF NOT EXISTS`)
//! 3. Run versioned migrations
//! 4. Ensure default settings exist

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::settings::{
    ensure_setting, DEFAULT_EVIDENCE_MAX_BYTES, DEFAULT_PAGE_SIZE, DEFAULT_SESSION_TIMEOUT_SECONDS,
    EVIDENCE_MAX_BYTES, PAGE_SIZE, SESSION_TIMEOUT_SECONDS,
};

/// Open (creating if needed) the database and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys and busy timeout are per-connection settings, so they go
    // in the connect options rather than a one-off PRAGMA
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables, run migrations and ensure default settings
///
/// Safe to call repeatedly against the same pool.
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_personas_table(pool).await?;
    create_novedades_table(pool).await?;
    create_voto_confirmaciones_table(pool).await?;
    create_persona_historial_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime tunables as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Accounts of every role. `coordinador_id` is only set on líderes.
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'COORDINADOR', 'LIDER', 'VALIDADOR', 'CONFIRMADOR', 'CONSULTOR')),
            coordinador_id TEXT REFERENCES users(id),
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (coordinador_id IS NULL OR role = 'LIDER')
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_digest TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_personas_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS personas (
            id TEXT PRIMARY KEY,
            documento TEXT NOT NULL UNIQUE,
            nombres TEXT NOT NULL,
            apellidos TEXT NOT NULL,
            telefono TEXT,
            direccion TEXT,
            barrio TEXT,
            municipio TEXT,
            puesto_votacion TEXT,
            mesa TEXT,
            lider_id TEXT NOT NULL REFERENCES users(id),
            estado TEXT NOT NULL DEFAULT 'DATOS_PENDIENTES'
                CHECK (estado IN ('DATOS_PENDIENTES', 'VERIFICADO', 'CON_NOVEDAD', 'CONFIRMADO')),
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_novedades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS novedades (
            id TEXT PRIMARY KEY,
            persona_id TEXT NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
            descripcion TEXT NOT NULL,
            opened_by TEXT NOT NULL REFERENCES users(id),
            opened_at TEXT NOT NULL,
            resolved_by TEXT REFERENCES users(id),
            resolved_at TEXT,
            resolution TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Vote evidence. At most one row per persona has `reverted_at IS NULL`
/// (enforced by a partial unique index created in migration v1).
async fn create_voto_confirmaciones_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voto_confirmaciones (
            id TEXT PRIMARY KEY,
            persona_id TEXT NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
            evidence_key TEXT NOT NULL,
            content_type TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size_bytes INTEGER NOT NULL CHECK (size_bytes > 0),
            note TEXT,
            confirmed_by TEXT NOT NULL REFERENCES users(id),
            confirmed_at TEXT NOT NULL,
            reverted_by TEXT REFERENCES users(id),
            reverted_at TEXT,
            revert_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_persona_historial_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS persona_historial (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            persona_id TEXT NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
            action TEXT NOT NULL,
            from_estado TEXT NOT NULL,
            to_estado TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(id),
            note TEXT,
            at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure every runtime setting exists with its default value
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(
        pool,
        SESSION_TIMEOUT_SECONDS,
        &DEFAULT_SESSION_TIMEOUT_SECONDS.to_string(),
    )
    .await?;
    ensure_setting(
        pool,
        EVIDENCE_MAX_BYTES,
        &DEFAULT_EVIDENCE_MAX_BYTES.to_string(),
    )
    .await?;
    ensure_setting(pool, PAGE_SIZE, &DEFAULT_PAGE_SIZE.to_string()).await?;

    info!("Default settings initialized");
    Ok(())
}
