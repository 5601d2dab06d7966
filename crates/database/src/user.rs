//! User (tenant) operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = r#"
    id, email, name, password_hash, wallet_balance,
    stripe_account_id, stripe_access_token, openai_api_key,
    ghl_company_id, ghl_refresh_token, ghl_token_expires_at,
    created_at, updated_at
"#;

/// Outcome of pinning the CRM agency id to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyPin {
    /// First connection; the id is now pinned.
    Pinned,
    /// Same agency as the pinned one.
    Matches,
    /// A different agency is already pinned.
    Mismatch,
}

/// Create a new user with an empty wallet.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "User", user.email.clone()))?;

    Ok(())
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        })
}

/// Get a user by login email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<User> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
    sqlx::query_as::<_, User>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "User",
            id: email.to_string(),
        })
}

/// Overwrite the agency-level CRM refresh token.
///
/// The CRM rotates refresh tokens on every use, so this must be called with
/// the token returned by the latest exchange.
pub async fn store_ghl_tokens(
    pool: &SqlitePool,
    user_id: &str,
    refresh_token: &str,
    expires_in_secs: i64,
) -> Result<()> {
    let modifier = format!("+{} seconds", expires_in_secs.max(0));
    let result = sqlx::query(
        r#"
        UPDATE users
        SET ghl_refresh_token = ?,
            ghl_token_expires_at = datetime('now', ?),
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(refresh_token)
    .bind(modifier)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: user_id.to_string(),
        });
    }

    Ok(())
}

/// Pin the CRM agency id on first connection, or compare with the pinned one.
pub async fn pin_ghl_company(pool: &SqlitePool, user_id: &str, company_id: &str) -> Result<CompanyPin> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET ghl_company_id = ?, updated_at = datetime('now')
        WHERE id = ? AND ghl_company_id IS NULL
        "#,
    )
    .bind(company_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(CompanyPin::Pinned);
    }

    let user = get_user(pool, user_id).await?;
    if user.ghl_company_id.as_deref() == Some(company_id) {
        Ok(CompanyPin::Matches)
    } else {
        Ok(CompanyPin::Mismatch)
    }
}

/// Store the connected payments account.
pub async fn store_stripe_connection(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    access_token: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET stripe_account_id = ?, stripe_access_token = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(account_id)
    .bind(access_token)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: user_id.to_string(),
        });
    }

    Ok(())
}

/// Store (or clear) the user's own LLM provider key.
pub async fn set_openai_key(pool: &SqlitePool, user_id: &str, key: Option<&str>) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET openai_api_key = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(key)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: user_id.to_string(),
        });
    }

    Ok(())
}

/// Current wallet balance.
pub async fn wallet_balance(pool: &SqlitePool, user_id: &str) -> Result<f64> {
    sqlx::query_scalar::<_, f64>(
        r#"
        SELECT wallet_balance FROM users WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: user_id.to_string(),
    })
}
