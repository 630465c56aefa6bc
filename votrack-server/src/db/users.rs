//! User accounts

use serde::{Deserialize, Deserializer};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;
use votrack_common::auth::{
    generate_salt, hash_password, normalize_username, validate_password,
};
use votrack_common::db::User;
use votrack_common::validation::require_text;
use votrack_common::{time, uuid_utils, Error, Result, Role, Scope};

use super::{begin_write, opt_uuid_col, time_col, uuid_col};

const USER_COLUMNS: &str =
    "id, username, display_name, role, coordinador_id, active, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: uuid_col(row, "id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        role: role.parse()?,
        coordinador_id: opt_uuid_col(row, "coordinador_id")?,
        active: row.try_get("active")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

/// Fields for a new account
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub coordinador_id: Option<Uuid>,
    pub password: String,
}

/// Partial update; absent fields are left unchanged
///
/// `coordinador_id: null` clears the assignment, omitting it keeps it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "present")]
    pub coordinador_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub password: Option<String>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

/// Stored credentials for login
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

/// Líderes may only report to an active coordinador; nobody else has one
async fn check_coordinador_assignment(
    conn: &mut SqliteConnection,
    role: Role,
    coordinador_id: Option<Uuid>,
) -> Result<()> {
    let Some(coordinador_id) = coordinador_id else {
        return Ok(());
    };
    if role != Role::Lider {
        return Err(Error::InvalidInput(
            "coordinador_id is only valid for LIDER users".to_string(),
        ));
    }

    let ok: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND role = 'COORDINADOR' AND active = 1)",
    )
    .bind(coordinador_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    if ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "coordinador_id must reference an active COORDINADOR".to_string(),
        ))
    }
}

pub async fn create_user(pool: &SqlitePool, new: NewUser) -> Result<User> {
    let username = normalize_username(&new.username)?;
    let display_name = require_text("display_name", &new.display_name)?;
    validate_password(&new.password)?;

    let mut tx = begin_write(pool).await?;
    check_coordinador_assignment(&mut tx, new.role, new.coordinador_id).await?;

    let id = uuid_utils::generate();
    let now = time::to_db(&time::now());
    let salt = generate_salt();
    let hash = hash_password(&salt, &new.password);

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, username, display_name, role, coordinador_id,
                           password_hash, password_salt, active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&username)
    .bind(&display_name)
    .bind(new.role.as_str())
    .bind(new.coordinador_id.map(|c| c.to_string()))
    .bind(&hash)
    .bind(&salt)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(Error::from);

    match inserted {
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(format!("username '{}' already exists", username)))
        }
        other => {
            other?;
        }
    }

    let user = fetch_user(&mut tx, id)
        .await?
        .ok_or_else(|| Error::Internal("created user not found".to_string()))?;
    tx.commit().await?;

    info!("Created user {} ({})", user.username, user.role);
    Ok(user)
}

async fn fetch_user(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let mut conn = pool.acquire().await?;
    fetch_user(&mut conn, id).await
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(user_from_row).collect()
}

pub async fn find_credentials(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserCredentials>> {
    let sql = format!(
        "SELECT {}, password_hash, password_salt FROM users WHERE username = ?",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(username.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(UserCredentials {
            user: user_from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
        })),
        None => Ok(None),
    }
}

async fn count_active_admins(conn: &mut SqliteConnection) -> Result<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'ADMIN' AND active = 1")
        .fetch_one(&mut *conn)
        .await?;
    Ok(n)
}

/// Apply a partial update
///
/// A coordinador with líderes, or a líder owning personas, cannot change
/// role. The last active admin cannot be demoted or deactivated.
/// Deactivation drops the user's sessions.
pub async fn update_user(pool: &SqlitePool, id: Uuid, update: UserUpdate) -> Result<User> {
    let mut tx = begin_write(pool).await?;
    let current = fetch_user(&mut tx, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

    let role = update.role.unwrap_or(current.role);
    let active = update.active.unwrap_or(current.active);

    if role != current.role {
        match current.role {
            Role::Coordinador => {
                let lideres: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE coordinador_id = ?")
                        .bind(id.to_string())
                        .fetch_one(&mut *tx)
                        .await?;
                if lideres > 0 {
                    return Err(Error::Conflict(format!(
                        "coordinador still has {} líder(es) assigned",
                        lideres
                    )));
                }
            }
            Role::Lider => {
                let personas: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM personas WHERE lider_id = ?")
                        .bind(id.to_string())
                        .fetch_one(&mut *tx)
                        .await?;
                if personas > 0 {
                    return Err(Error::Conflict(format!(
                        "líder still owns {} persona(s)",
                        personas
                    )));
                }
            }
            _ => {}
        }
    }

    if current.role == Role::Admin
        && current.active
        && (role != Role::Admin || !active)
        && count_active_admins(&mut tx).await? <= 1
    {
        return Err(Error::Conflict(
            "cannot demote or deactivate the last active admin".to_string(),
        ));
    }

    let coordinador_id = match update.coordinador_id {
        Some(explicit) => explicit,
        None if role == Role::Lider => current.coordinador_id,
        None => None,
    };
    if update.coordinador_id.is_some() || role != current.role {
        check_coordinador_assignment(&mut tx, role, coordinador_id).await?;
    }

    let display_name = match update.display_name.as_deref() {
        Some(name) => require_text("display_name", name)?,
        None => current.display_name.clone(),
    };

    let now = time::to_db(&time::now());
    sqlx::query(
        r#"
        UPDATE users
        SET display_name = ?, role = ?, coordinador_id = ?, active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&display_name)
    .bind(role.as_str())
    .bind(coordinador_id.map(|c| c.to_string()))
    .bind(active)
    .bind(&now)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    if let Some(password) = update.password.as_deref() {
        validate_password(password)?;
        let salt = generate_salt();
        sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE id = ?")
            .bind(hash_password(&salt, password))
            .bind(&salt)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    if !active {
        super::sessions::delete_user_sessions(&mut tx, id).await?;
    }

    let user = fetch_user(&mut tx, id)
        .await?
        .ok_or_else(|| Error::Internal("updated user not found".to_string()))?;
    tx.commit().await?;

    info!(
        "Updated user {} (role {}, active {})",
        user.username, user.role, user.active
    );
    Ok(user)
}

/// Active líder by id, with its coordinador
pub async fn find_lider(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = ? AND role = 'LIDER' AND active = 1",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Active líderes visible in `scope`
pub async fn list_lideres(pool: &SqlitePool, scope: Scope) -> Result<Vec<User>> {
    let mut sql = format!(
        "SELECT {} FROM users WHERE role = 'LIDER' AND active = 1",
        USER_COLUMNS
    );
    let filter = match scope {
        Scope::All => None,
        Scope::Coordinador(id) => {
            sql.push_str(" AND coordinador_id = ?");
            Some(id)
        }
        Scope::Lider(id) => {
            sql.push_str(" AND id = ?");
            Some(id)
        }
    };
    sql.push_str(" ORDER BY display_name");

    let mut query = sqlx::query(&sql);
    if let Some(id) = filter {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(pool).await?;
    rows.iter().map(user_from_row).collect()
}

/// Make sure an active admin exists
///
/// When none does, creates `username` with `password` (or a generated one).
/// Returns the password when it was generated here so the caller can show
/// it once.
pub async fn ensure_bootstrap_admin(
    pool: &SqlitePool,
    username: &str,
    password: Option<String>,
) -> Result<Option<String>> {
    let mut conn = pool.acquire().await?;
    if count_active_admins(&mut conn).await? > 0 {
        return Ok(None);
    }
    drop(conn);

    let username = normalize_username(username)?;
    if find_credentials(pool, &username).await?.is_some() {
        return Err(Error::Conflict(format!(
            "no active admin exists and username '{}' is taken by another account",
            username
        )));
    }

    let (password, generated) = match password.filter(|p| !p.is_empty()) {
        Some(p) => (p, false),
        None => (votrack_common::auth::generate_password(), true),
    };

    create_user(
        pool,
        NewUser {
            username: username.clone(),
            display_name: "Administrador".to_string(),
            role: Role::Admin,
            coordinador_id: None,
            password: password.clone(),
        },
    )
    .await?;

    warn!("No active admin found; created bootstrap admin '{}'", username);
    Ok(generated.then_some(password))
}
