//! Saved contacts: local CRUD per sub-account, no CRM sync.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{ContactFields, SavedContact};

const CONTACT_COLUMNS: &str = r#"
    id, user_id, account_id, first_name, last_name, email, phone,
    company_name, notes, created_at, updated_at
"#;

fn not_found(id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "SavedContact",
        id: id.to_string(),
    }
}

/// Save a contact under a connected sub-account. Returns the new id.
pub async fn create_contact(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    fields: &ContactFields,
) -> Result<i64> {
    crate::sub_account::get_connected_sub_account(pool, user_id, account_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO saved_contacts (user_id, account_id, first_name, last_name, email, phone, company_name, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(account_id)
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.company_name)
    .bind(&fields.notes)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get one saved contact.
pub async fn get_contact(pool: &SqlitePool, user_id: &str, account_id: &str, id: i64) -> Result<SavedContact> {
    let query = format!(
        "SELECT {CONTACT_COLUMNS} FROM saved_contacts WHERE id = ? AND user_id = ? AND account_id = ?"
    );
    sqlx::query_as::<_, SavedContact>(&query)
        .bind(id)
        .bind(user_id)
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(id))
}

/// List saved contacts of a sub-account.
pub async fn list_contacts(pool: &SqlitePool, user_id: &str, account_id: &str) -> Result<Vec<SavedContact>> {
    let query = format!(
        "SELECT {CONTACT_COLUMNS} FROM saved_contacts WHERE user_id = ? AND account_id = ? ORDER BY last_name, first_name"
    );
    let rows = sqlx::query_as::<_, SavedContact>(&query)
        .bind(user_id)
        .bind(account_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Replace all fields of a saved contact.
pub async fn update_contact(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    id: i64,
    fields: &ContactFields,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE saved_contacts
        SET first_name = ?, last_name = ?, email = ?, phone = ?, company_name = ?, notes = ?,
            updated_at = datetime('now')
        WHERE id = ? AND user_id = ? AND account_id = ?
        "#,
    )
    .bind(&fields.first_name)
    .bind(&fields.last_name)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.company_name)
    .bind(&fields.notes)
    .bind(id)
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }

    Ok(())
}

/// Delete a saved contact.
pub async fn delete_contact(pool: &SqlitePool, user_id: &str, account_id: &str, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM saved_contacts WHERE id = ? AND user_id = ? AND account_id = ?
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }

    Ok(())
}
