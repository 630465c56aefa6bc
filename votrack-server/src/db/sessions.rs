//! Login sessions
//!
//! Only the SHA-256 digest of a session token is stored.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;
use votrack_common::auth::{generate_session_token, token_digest};
use votrack_common::{time, Principal, Result};

use super::{opt_uuid_col, uuid_col};

/// Start a session for `user_id`; returns the bearer token and its expiry
pub async fn create_session(
    pool: &SqlitePool,
    user_id: Uuid,
    timeout_seconds: i64,
) -> Result<(String, DateTime<Utc>)> {
    let token = generate_session_token();
    let now = time::now();
    let expires_at = time::seconds_from_now(timeout_seconds);

    sqlx::query(
        "INSERT INTO sessions (token_digest, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_digest(&token))
    .bind(user_id.to_string())
    .bind(time::to_db(&now))
    .bind(time::to_db(&expires_at))
    .execute(pool)
    .await?;

    Ok((token, expires_at))
}

/// Resolve a bearer token to its active, unexpired user
pub async fn find_principal(pool: &SqlitePool, token: &str) -> Result<Option<Principal>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.display_name, u.role, u.coordinador_id
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_digest = ? AND s.expires_at > ? AND u.active = 1
        "#,
    )
    .bind(token_digest(token))
    .bind(time::to_db(&time::now()))
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let role: String = row.try_get("role")?;
    Ok(Some(Principal {
        id: uuid_col(&row, "id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        role: role.parse()?,
        coordinador_id: opt_uuid_col(&row, "coordinador_id")?,
    }))
}

/// End one session by token digest
pub async fn delete_session(pool: &SqlitePool, digest: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_digest = ?")
        .bind(digest)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_user_sessions(conn: &mut SqliteConnection, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Remove sessions past their expiry
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::to_db(&time::now()))
        .execute(pool)
        .await?;
    debug!("Purged {} expired session(s)", result.rows_affected());
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{create_user, update_user, NewUser, UserUpdate};
    use sqlx::sqlite::SqlitePoolOptions;
    use votrack_common::Role;

    async fn setup() -> (SqlitePool, Uuid) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        votrack_common::db::prepare_schema(&pool).await.unwrap();
        // Keep an admin around so the lider can be deactivated freely
        create_user(
            &pool,
            NewUser {
                username: "root".to_string(),
                display_name: "Root".to_string(),
                role: Role::Admin,
                coordinador_id: None,
                password: "password123".to_string(),
            },
        )
        .await
        .unwrap();
        let user = create_user(
            &pool,
            NewUser {
                username: "lider".to_string(),
                display_name: "Lider".to_string(),
                role: Role::Lider,
                coordinador_id: None,
                password: "password123".to_string(),
            },
        )
        .await
        .unwrap();
        (pool, user.id)
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (pool, user_id) = setup().await;
        let (token, _) = create_session(&pool, user_id, 60).await.unwrap();

        let principal = find_principal(&pool, &token).await.unwrap().unwrap();
        assert_eq!(principal.id, user_id);
        assert_eq!(principal.role, Role::Lider);

        delete_session(&pool, &token_digest(&token)).await.unwrap();
        assert!(find_principal(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_purged() {
        let (pool, user_id) = setup().await;
        let (token, _) = create_session(&pool, user_id, -1).await.unwrap();

        assert!(find_principal(&pool, &token).await.unwrap().is_none());
        assert_eq!(purge_expired(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deactivation_invalidates_sessions() {
        let (pool, user_id) = setup().await;
        let (token, _) = create_session(&pool, user_id, 60).await.unwrap();

        update_user(
            &pool,
            user_id,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(find_principal(&pool, &token).await.unwrap().is_none());
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (pool, _) = setup().await;
        assert!(find_principal(&pool, "deadbeef").await.unwrap().is_none());
    }
}
