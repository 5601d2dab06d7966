//! Phone numbers attached to assistants.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::NumberDetail;

/// Attach a purchased or imported number to an assistant.
pub async fn add_number(
    pool: &SqlitePool,
    assistant_id: &str,
    phone_num: &str,
    vapi_phone_num_id: &str,
    phone_sid: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO number_details (phone_num, assistant_id, vapi_phone_num_id, phone_sid)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(phone_num)
    .bind(assistant_id)
    .bind(vapi_phone_num_id)
    .bind(phone_sid)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "NumberDetail", phone_num))?;

    Ok(())
}

/// Get a number attached to a specific assistant.
pub async fn get_number(pool: &SqlitePool, assistant_id: &str, phone_num: &str) -> Result<NumberDetail> {
    sqlx::query_as::<_, NumberDetail>(
        r#"
        SELECT phone_num, assistant_id, vapi_phone_num_id, phone_sid, created_at
        FROM number_details
        WHERE assistant_id = ? AND phone_num = ?
        "#,
    )
    .bind(assistant_id)
    .bind(phone_num)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "NumberDetail",
        id: phone_num.to_string(),
    })
}

/// Whether a number is attached to any assistant.
pub async fn number_exists(pool: &SqlitePool, phone_num: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM number_details WHERE phone_num = ?
        "#,
    )
    .bind(phone_num)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Numbers attached to an assistant.
pub async fn list_numbers(pool: &SqlitePool, assistant_id: &str) -> Result<Vec<NumberDetail>> {
    let rows = sqlx::query_as::<_, NumberDetail>(
        r#"
        SELECT phone_num, assistant_id, vapi_phone_num_id, phone_sid, created_at
        FROM number_details
        WHERE assistant_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(assistant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Detach a number.
pub async fn delete_number(pool: &SqlitePool, assistant_id: &str, phone_num: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM number_details
        WHERE assistant_id = ? AND phone_num = ?
        "#,
    )
    .bind(assistant_id)
    .bind(phone_num)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "NumberDetail",
            id: phone_num.to_string(),
        });
    }

    Ok(())
}
