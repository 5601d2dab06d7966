//! Refresh-token sessions.
//!
//! Only the SHA-256 hash of a refresh token is stored.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Session;

/// Create a session valid for `ttl_secs`.
pub async fn create_session(pool: &SqlitePool, token_hash: &str, user_id: &str, ttl_secs: u64) -> Result<()> {
    let modifier = format!("+{} seconds", ttl_secs);
    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, expires_at)
        VALUES (?, ?, datetime('now', ?))
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(modifier)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Session", "refresh token"))?;

    Ok(())
}

/// Remove a session and return it if it had not expired.
///
/// Refresh tokens rotate: the caller issues a new session on success.
pub async fn consume_session(pool: &SqlitePool, token_hash: &str) -> Result<Option<Session>> {
    let record = sqlx::query_as::<_, (String, String, String, String, bool)>(
        r#"
        DELETE FROM sessions
        WHERE token_hash = ?
        RETURNING token_hash, user_id, expires_at, created_at, expires_at > datetime('now')
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(record.and_then(|(token_hash, user_id, expires_at, created_at, active)| {
        active.then_some(Session {
            token_hash,
            user_id,
            expires_at,
            created_at,
        })
    }))
}

/// Delete one session (logout).
pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM sessions WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete expired sessions.
pub async fn prune_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM sessions WHERE expires_at <= datetime('now')
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
