//! Assistant linkage: knowledge-base tools, connected tools and team notes.
//!
//! Every lookup is scoped to a connected sub-account of the requesting user,
//! so one tenant can never address another tenant's assistant by id.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Assistant, AssistantChanges, ConnectedTool, KnowledgeBaseTool, TeamNote};

const ASSISTANT_COLUMNS: &str = r#"
    a.assistant_id, a.user_id, a.account_id, a.name, a.calendar_id,
    a.dynamic_greeting, a.timezone, a.version, a.created_at, a.updated_at
"#;

/// Fields required to link a newly created assistant.
#[derive(Debug, Clone, Default)]
pub struct NewAssistant {
    pub assistant_id: String,
    pub user_id: String,
    pub account_id: String,
    pub name: String,
    pub calendar_id: Option<String>,
    pub dynamic_greeting: Option<String>,
    pub timezone: Option<String>,
}

fn not_found(assistant_id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "Assistant",
        id: assistant_id.to_string(),
    }
}

/// Link an assistant to a connected sub-account.
pub async fn create_assistant(pool: &SqlitePool, new: &NewAssistant) -> Result<Assistant> {
    crate::sub_account::get_connected_sub_account(pool, &new.user_id, &new.account_id).await?;

    sqlx::query(
        r#"
        INSERT INTO assistants (assistant_id, user_id, account_id, name, calendar_id, dynamic_greeting, timezone)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.assistant_id)
    .bind(&new.user_id)
    .bind(&new.account_id)
    .bind(&new.name)
    .bind(&new.calendar_id)
    .bind(&new.dynamic_greeting)
    .bind(&new.timezone)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Assistant", new.assistant_id.clone()))?;

    get_assistant(pool, &new.user_id, &new.account_id, &new.assistant_id).await
}

/// Get an assistant within a connected sub-account of the user.
pub async fn get_assistant(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    assistant_id: &str,
) -> Result<Assistant> {
    let query = format!(
        r#"
        SELECT {ASSISTANT_COLUMNS}
        FROM assistants a
        JOIN sub_accounts s ON s.user_id = a.user_id AND s.account_id = a.account_id
        WHERE a.user_id = ? AND a.account_id = ? AND a.assistant_id = ? AND s.connected = 1
        "#
    );
    sqlx::query_as::<_, Assistant>(&query)
        .bind(user_id)
        .bind(account_id)
        .bind(assistant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(assistant_id))
}

/// Find an assistant by its AI-platform id alone.
///
/// Used by webhooks, where the AI platform only tells us the assistant id.
/// The returned row carries the owning user and sub-account.
pub async fn find_assistant(pool: &SqlitePool, assistant_id: &str) -> Result<Option<Assistant>> {
    let query = format!(
        r#"
        SELECT {ASSISTANT_COLUMNS}
        FROM assistants a
        WHERE a.assistant_id = ?
        "#
    );
    let record = sqlx::query_as::<_, Assistant>(&query)
        .bind(assistant_id)
        .fetch_optional(pool)
        .await?;

    Ok(record)
}

/// List assistants of a connected sub-account.
pub async fn list_assistants(pool: &SqlitePool, user_id: &str, account_id: &str) -> Result<Vec<Assistant>> {
    crate::sub_account::get_connected_sub_account(pool, user_id, account_id).await?;

    let query = format!(
        r#"
        SELECT {ASSISTANT_COLUMNS}
        FROM assistants a
        WHERE a.user_id = ? AND a.account_id = ?
        ORDER BY a.created_at
        "#
    );
    let rows = sqlx::query_as::<_, Assistant>(&query)
        .bind(user_id)
        .bind(account_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Apply linkage changes if the row is still at `expected_version`.
///
/// Returns the updated row. A concurrent writer that bumped the version
/// first causes `Conflict`.
pub async fn update_assistant(
    pool: &SqlitePool,
    user_id: &str,
    account_id: &str,
    assistant_id: &str,
    expected_version: i64,
    changes: &AssistantChanges,
) -> Result<Assistant> {
    get_assistant(pool, user_id, account_id, assistant_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE assistants
        SET name = COALESCE(?, name),
            calendar_id = COALESCE(?, calendar_id),
            dynamic_greeting = COALESCE(?, dynamic_greeting),
            timezone = COALESCE(?, timezone),
            version = version + 1,
            updated_at = datetime('now')
        WHERE assistant_id = ? AND user_id = ? AND account_id = ? AND version = ?
        "#,
    )
    .bind(&changes.name)
    .bind(&changes.calendar_id)
    .bind(&changes.dynamic_greeting)
    .bind(&changes.timezone)
    .bind(assistant_id)
    .bind(user_id)
    .bind(account_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::Conflict {
            entity: "Assistant",
            id: assistant_id.to_string(),
        });
    }

    get_assistant(pool, user_id, account_id, assistant_id).await
}

/// Remove an assistant and everything linked to it.
pub async fn delete_assistant(pool: &SqlitePool, user_id: &str, account_id: &str, assistant_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM assistants
        WHERE assistant_id = ? AND user_id = ? AND account_id = ?
        "#,
    )
    .bind(assistant_id)
    .bind(user_id)
    .bind(account_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(assistant_id));
    }

    Ok(())
}

/// Link a knowledge-base query tool.
pub async fn link_kb_tool(
    pool: &SqlitePool,
    assistant_id: &str,
    tool_id: &str,
    file_id: Option<&str>,
    name: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assistant_kb_tools (assistant_id, tool_id, file_id, name)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(assistant_id)
    .bind(tool_id)
    .bind(file_id)
    .bind(name)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "KnowledgeBaseTool", tool_id))?;

    Ok(())
}

/// Unlink a knowledge-base tool.
pub async fn unlink_kb_tool(pool: &SqlitePool, assistant_id: &str, tool_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM assistant_kb_tools
        WHERE assistant_id = ? AND tool_id = ?
        "#,
    )
    .bind(assistant_id)
    .bind(tool_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "KnowledgeBaseTool",
            id: tool_id.to_string(),
        });
    }

    Ok(())
}

/// Knowledge-base tools of an assistant.
pub async fn list_kb_tools(pool: &SqlitePool, assistant_id: &str) -> Result<Vec<KnowledgeBaseTool>> {
    let rows = sqlx::query_as::<_, KnowledgeBaseTool>(
        r#"
        SELECT assistant_id, tool_id, file_id, name, created_at
        FROM assistant_kb_tools
        WHERE assistant_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(assistant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Link a function tool.
pub async fn link_tool(pool: &SqlitePool, assistant_id: &str, tool_id: &str, tool_name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assistant_tools (assistant_id, tool_id, tool_name)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(assistant_id)
    .bind(tool_id)
    .bind(tool_name)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "ConnectedTool", tool_id))?;

    Ok(())
}

/// Unlink a function tool.
pub async fn unlink_tool(pool: &SqlitePool, assistant_id: &str, tool_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM assistant_tools
        WHERE assistant_id = ? AND tool_id = ?
        "#,
    )
    .bind(assistant_id)
    .bind(tool_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ConnectedTool",
            id: tool_id.to_string(),
        });
    }

    Ok(())
}

/// Function tools of an assistant.
pub async fn list_tools(pool: &SqlitePool, assistant_id: &str) -> Result<Vec<ConnectedTool>> {
    let rows = sqlx::query_as::<_, ConnectedTool>(
        r#"
        SELECT assistant_id, tool_id, tool_name, created_at
        FROM assistant_tools
        WHERE assistant_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(assistant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Append a team note.
pub async fn add_team_note(
    pool: &SqlitePool,
    assistant_id: &str,
    note: &str,
    call_id: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO team_notes (assistant_id, note, call_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(assistant_id)
    .bind(note)
    .bind(call_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Team notes of an assistant, newest first.
pub async fn list_team_notes(pool: &SqlitePool, assistant_id: &str, limit: i64) -> Result<Vec<TeamNote>> {
    let rows = sqlx::query_as::<_, TeamNote>(
        r#"
        SELECT id, assistant_id, note, call_id, created_at
        FROM team_notes
        WHERE assistant_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(assistant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
