//! Runtime settings stored in the `settings` table

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub const SESSION_TIMEOUT_SECONDS: &str = "session_timeout_seconds";
pub const EVIDENCE_MAX_BYTES: &str = "evidence_max_bytes";
pub const PAGE_SIZE: &str = "page_size";

/// 12 hours
pub const DEFAULT_SESSION_TIMEOUT_SECONDS: i64 = 43_200;
/// 5 MiB
pub const DEFAULT_EVIDENCE_MAX_BYTES: i64 = 5 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // INSERT OR IGNORE: concurrent initializers may both get here
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query(
                "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            )
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Read a setting as text
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Read a positive integer setting, falling back to `default` when missing
/// or unparseable
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value = get_setting(pool, key).await?;
    match value.as_deref().map(|v| v.trim().parse::<i64>()) {
        Some(Ok(v)) if v > 0 => Ok(v),
        Some(_) => {
            warn!("Setting '{}' has invalid value, using default {}", key, default);
            Ok(default)
        }
        None => Ok(default),
    }
}

/// Insert or replace a setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
