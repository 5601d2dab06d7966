//! Single-use OAuth CSRF states.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::OAuthState;

/// Persist a freshly generated state for a user.
pub async fn create_state(
    pool: &SqlitePool,
    state: &str,
    user_id: &str,
    provider: &str,
    account_id: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, user_id, provider, account_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(state)
    .bind(user_id)
    .bind(provider)
    .bind(account_id)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "OAuthState", state))?;

    Ok(())
}

/// Look up and delete a state in one statement.
///
/// Returns `None` for unknown, already-redeemed, or other-provider states,
/// so a replayed callback can never verify twice.
pub async fn take_state(pool: &SqlitePool, state: &str, provider: &str) -> Result<Option<OAuthState>> {
    let record = sqlx::query_as::<_, OAuthState>(
        r#"
        DELETE FROM oauth_states
        WHERE state = ? AND provider = ?
        RETURNING state, user_id, provider, account_id, created_at
        "#,
    )
    .bind(state)
    .bind(provider)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Delete states that were never redeemed.
pub async fn purge_older_than(pool: &SqlitePool, ttl: Duration) -> Result<u64> {
    let modifier = format!("-{} seconds", ttl.as_secs());
    let result = sqlx::query(
        r#"
        DELETE FROM oauth_states
        WHERE created_at < datetime('now', ?)
        "#,
    )
    .bind(modifier)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
