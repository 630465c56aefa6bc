//! Tests for database initialization
//!
//! Covers automatic database creation, re-opening an existing database,
//! default settings and the schema constraints the service relies on.

use sqlx::SqlitePool;
use tempfile::TempDir;
use votrack_common::db::init::init_database;
use votrack_common::db::settings::{get_setting_i64, PAGE_SIZE, SESSION_TIMEOUT_SECONDS};

async fn fresh_db(dir: &TempDir) -> SqlitePool {
    init_database(&dir.path().join("votrack.db")).await.unwrap()
}

async fn insert_user(pool: &SqlitePool, id: &str, username: &str, role: &str) {
    sqlx::query(
        "INSERT INTO users (id, username, display_name, role, password_hash, password_salt, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'h', 's', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
    )
    .bind(id)
    .bind(username)
    .bind(username)
    .bind(role)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sub").join("votrack.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("votrack.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_db(&dir).await;

    assert_eq!(get_setting_i64(&pool, SESSION_TIMEOUT_SECONDS, 0).await.unwrap(), 43_200);
    assert_eq!(get_setting_i64(&pool, PAGE_SIZE, 0).await.unwrap(), 50);
}

#[tokio::test]
async fn test_role_check_constraint() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_db(&dir).await;

    let result = sqlx::query(
        "INSERT INTO users (id, username, display_name, role, password_hash, password_salt, created_at, updated_at)
         VALUES ('x', 'x', 'x', 'SUPERVISOR', 'h', 's', 'now', 'now')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "unknown role must be rejected");
}

#[tokio::test]
async fn test_foreign_keys_enforced_on_every_connection() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_db(&dir).await;

    // Run several statements so more than one pooled connection is exercised
    for i in 0..5 {
        let result = sqlx::query(
            "INSERT INTO personas (id, documento, nombres, apellidos, lider_id, created_by, created_at, updated_at)
             VALUES (?, ?, 'A', 'B', 'missing-lider', 'missing-lider', 'now', 'now')",
        )
        .bind(format!("p{}", i))
        .bind(format!("1000{}", i))
        .execute(&pool)
        .await;
        assert!(result.is_err(), "dangling lider_id must be rejected");
    }
}

#[tokio::test]
async fn test_only_one_active_confirmation_per_persona() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_db(&dir).await;

    insert_user(&pool, "l1", "lider1", "LIDER").await;
    sqlx::query(
        "INSERT INTO personas (id, documento, nombres, apellidos, lider_id, created_by, created_at, updated_at)
         VALUES ('p1', '123456', 'A', 'B', 'l1', 'l1', 'now', 'now')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = |id: &'static str| {
        sqlx::query(
            "INSERT INTO voto_confirmaciones (id, persona_id, evidence_key, content_type, sha256, size_bytes, confirmed_by, confirmed_at)
             VALUES (?, 'p1', 'k', 'image/jpeg', 'h', 10, 'l1', 'now')",
        )
        .bind(id)
    };

    insert("c1").execute(&pool).await.unwrap();
    assert!(insert("c2").execute(&pool).await.is_err());

    sqlx::query("UPDATE voto_confirmaciones SET reverted_at = 'now', reverted_by = 'l1' WHERE id = 'c1'")
        .execute(&pool)
        .await
        .unwrap();
    insert("c2").execute(&pool).await.unwrap();
}

#[tokio::test]
async fn test_coordinador_only_on_lideres() {
    let dir = TempDir::new().unwrap();
    let pool = fresh_db(&dir).await;

    insert_user(&pool, "c1", "coord1", "COORDINADOR").await;
    let result = sqlx::query(
        "INSERT INTO users (id, username, display_name, role, coordinador_id, password_hash, password_salt, created_at, updated_at)
         VALUES ('v1', 'valid1', 'V', 'VALIDADOR', 'c1', 'h', 's', 'now', 'now')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
