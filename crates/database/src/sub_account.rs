//! CRM sub-account (location) operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::SubAccount;

/// Import a sub-account, or reconnect a previously disconnected one.
///
/// Returns `AlreadyExists` without modifying anything if the sub-account is
/// currently connected.
pub async fn import_sub_account(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    name: &str,
    refresh_token: &str,
    expires_in_secs: i64,
) -> Result<()> {
    let modifier = format!("+{} seconds", expires_in_secs.max(0));
    let result = sqlx::query(
        r#"
        INSERT INTO sub_accounts (user_id, account_id, name, refresh_token, token_expires_at, connected)
        VALUES (?, ?, ?, ?, datetime('now', ?), 1)
        ON CONFLICT (user_id, account_id) DO UPDATE SET
            name = excluded.name,
            refresh_token = excluded.refresh_token,
            token_expires_at = excluded.token_expires_at,
            connected = 1,
            updated_at = datetime('now')
        WHERE sub_accounts.connected = 0
        "#,
    )
    .bind(user_id)
    .bind(account_id)
    .bind(name)
    .bind(refresh_token)
    .bind(modifier)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::AlreadyExists {
            entity: "SubAccount",
            id: account_id.to_string(),
        });
    }

    Ok(())
}

/// Find a sub-account regardless of its connection state.
pub async fn find_sub_account(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
) -> Result<Option<SubAccount>> {
    let record = sqlx::query_as::<_, SubAccount>(
        r#"
        SELECT user_id, account_id, name, refresh_token, token_expires_at, connected, created_at, updated_at
        FROM sub_accounts
        WHERE user_id = ? AND account_id = ?
        "#,
    )
    .bind(user_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Get a connected sub-account. Disconnected ones are reported as not found.
pub async fn get_connected_sub_account(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
) -> Result<SubAccount> {
    match find_sub_account(pool, user_id, account_id).await? {
        Some(sub) if sub.connected => Ok(sub),
        _ => Err(DatabaseError::NotFound {
            entity: "SubAccount",
            id: account_id.to_string(),
        }),
    }
}

/// List a user's sub-accounts, connected first.
pub async fn list_sub_accounts(pool: &SqlitePool, user_id: &str) -> Result<Vec<SubAccount>> {
    let rows = sqlx::query_as::<_, SubAccount>(
        r#"
        SELECT user_id, account_id, name, refresh_token, token_expires_at, connected, created_at, updated_at
        FROM sub_accounts
        WHERE user_id = ?
        ORDER BY connected DESC, name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite a sub-account's rotated refresh token.
pub async fn store_sub_account_tokens(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    refresh_token: &str,
    expires_in_secs: i64,
) -> Result<()> {
    let modifier = format!("+{} seconds", expires_in_secs.max(0));
    let result = sqlx::query(
        r#"
        UPDATE sub_accounts
        SET refresh_token = ?, token_expires_at = datetime('now', ?), updated_at = datetime('now')
        WHERE user_id = ? AND account_id = ?
        "#,
    )
    .bind(refresh_token)
    .bind(modifier)
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "SubAccount",
            id: account_id.to_string(),
        });
    }

    Ok(())
}

/// Mark a sub-account disconnected and drop its token.
///
/// Assistants and numbers stay linked so a later re-import restores them.
pub async fn disconnect_sub_account(pool: &SqlitePool, user_id: &str, account_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sub_accounts
        SET connected = 0, refresh_token = NULL, updated_at = datetime('now')
        WHERE user_id = ? AND account_id = ? AND connected = 1
        "#,
    )
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "SubAccount",
            id: account_id.to_string(),
        });
    }

    Ok(())
}
