//! User account queries.
//!
//! Emails are never stored or queried in plaintext: callers pass the
//! encrypted record and the lookup hash from the crypto vault.

use sqlx::PgPool;

use super::AuthError;
use crate::models::auth::{Role, UserAccount};

type UserRow = (String, String, String, Option<String>, Option<String>, String);

fn from_row(row: UserRow) -> Result<UserAccount, AuthError> {
    let (id, email_encrypted, email_hash, name, password_hash, role) = row;
    let role = role
        .parse::<Role>()
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(UserAccount {
        id,
        email_encrypted,
        email_hash,
        name,
        password_hash,
        role,
    })
}

/// Fetch a user by email lookup hash.
pub async fn find_user_by_email_hash(
    pool: &PgPool,
    email_hash: &str,
) -> Result<Option<UserAccount>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id::text, email_encrypted, email_hash, name, password_hash, role \
         FROM users WHERE email_hash = $1",
    )
    .bind(email_hash)
    .fetch_optional(pool)
    .await?;
    row.map(from_row).transpose()
}

/// Fetch a user by id.
pub async fn find_user_by_id(pool: &PgPool, user_id: &str) -> Result<Option<UserAccount>, AuthError> {
    let Ok(id) = user_id.parse::<uuid::Uuid>() else {
        return Ok(None);
    };
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id::text, email_encrypted, email_hash, name, password_hash, role \
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(from_row).transpose()
}

/// Advisory lock key serializing account creation while the bootstrap role
/// is decided.
const CREATE_USER_LOCK: i64 = 0x6165_6769_735f_7573;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Create a new user, returning the stored account.
///
/// With `bootstrap` set the account becomes superadmin when the table is
/// empty. The emptiness check and the insert run in one transaction under an
/// advisory lock, so concurrent first registrations cannot both win. A
/// duplicate lookup hash is a `ValidationError`.
pub async fn create_user(
    pool: &PgPool,
    email_encrypted: &str,
    email_hash: &str,
    name: Option<&str>,
    password_hash: &str,
    role: Role,
    bootstrap: bool,
) -> Result<UserAccount, AuthError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(CREATE_USER_LOCK)
        .execute(&mut *tx)
        .await?;

    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (email_encrypted, email_hash, name, password_hash, role) \
         SELECT $1, $2, $3, $4, \
                CASE WHEN $6 AND NOT EXISTS (SELECT 1 FROM users) THEN 'superadmin' ELSE $5 END \
         RETURNING id::text, email_encrypted, email_hash, name, password_hash, role",
    )
    .bind(email_encrypted)
    .bind(email_hash)
    .bind(name)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(bootstrap)
    .fetch_one(&mut *tx)
    .await
    .map_err(duplicate_email)?;

    tx.commit().await?;
    from_row(row)
}

fn duplicate_email(e: sqlx::Error) -> AuthError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AuthError::ValidationError("email already registered".into())
        }
        _ => AuthError::DbError(e),
    }
}

/// Replace a stored password hash (transparent rehash on login).
pub async fn update_password_hash(
    pool: &PgPool,
    user_id: &str,
    password_hash: &str,
) -> Result<(), AuthError> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1::uuid")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}
