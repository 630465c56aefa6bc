//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Every
//! migration is idempotent so a partially applied upgrade can be re-run.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Prefer ALTER TABLE / CREATE ... IF NOT EXISTS** - preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: lookup indexes and the one-active-confirmation rule
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_users_coordinador ON users(coordinador_id)",
        "CREATE INDEX IF NOT EXISTS idx_personas_lider ON personas(lider_id)",
        "CREATE INDEX IF NOT EXISTS idx_personas_estado ON personas(estado)",
        "CREATE INDEX IF NOT EXISTS idx_personas_created ON personas(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_novedades_persona ON novedades(persona_id, resolved_at)",
        "CREATE INDEX IF NOT EXISTS idx_historial_persona ON persona_historial(persona_id, seq)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        // At most one active (non-reverted) confirmation per persona
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_confirmacion_activa
            ON voto_confirmaciones(persona_id) WHERE reverted_at IS NULL",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}
