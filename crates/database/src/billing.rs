//! Billing ledger: call charges and wallet top-ups.
//!
//! Charges are keyed by `(call_id, event_type)`. The AI platform may deliver
//! several billable lifecycle events for one call, each carrying the running
//! total cost, so a new event only deducts what has not already been charged
//! for that call. Reported costs are trusted as-is.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{BillingEvent, Payment};

/// Outcome of recording a call charge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeOutcome {
    /// Event recorded; `amount` was deducted from the wallet.
    Applied { amount: f64, balance: f64 },
    /// The `(call_id, event_type)` pair was already recorded. Nothing changed.
    Duplicate,
}

/// Outcome of recording a payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentOutcome {
    /// Payment recorded (and credited if it succeeded).
    Recorded { balance: f64 },
    /// Already recorded with this status.
    Duplicate,
}

/// Record a billable call event and deduct its cost from the user's wallet.
pub async fn record_call_charge(
    pool: &SqlitePool,
    user_id: &str,
    call_id: &str,
    event_type: &str,
    reported_cost: f64,
) -> Result<ChargeOutcome> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO billing_events (user_id, call_id, event_type, reported_cost, amount)
        VALUES (?, ?, ?, ?, 0)
        ON CONFLICT (call_id, event_type) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(call_id)
    .bind(event_type)
    .bind(reported_cost)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(ChargeOutcome::Duplicate);
    }
    let event_id = inserted.last_insert_rowid();

    let already_charged = sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(amount), 0.0)
        FROM billing_events
        WHERE call_id = ? AND id != ?
        "#,
    )
    .bind(call_id)
    .bind(event_id)
    .fetch_one(&mut *tx)
    .await?;

    let amount = (reported_cost - already_charged).max(0.0);

    sqlx::query(
        r#"
        UPDATE billing_events SET amount = ? WHERE id = ?
        "#,
    )
    .bind(amount)
    .bind(event_id)
    .execute(&mut *tx)
    .await?;

    let balance = sqlx::query_scalar::<_, f64>(
        r#"
        UPDATE users
        SET wallet_balance = wallet_balance - ?, updated_at = datetime('now')
        WHERE id = ?
        RETURNING wallet_balance
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(user_id, call_id, event_type, amount, balance, "Call charge recorded");
    Ok(ChargeOutcome::Applied { amount, balance })
}

/// Recent billing events of a user.
pub async fn list_billing_events(pool: &SqlitePool, user_id: &str, limit: i64) -> Result<Vec<BillingEvent>> {
    let rows = sqlx::query_as::<_, BillingEvent>(
        r#"
        SELECT id, user_id, call_id, event_type, reported_cost, amount, created_at
        FROM billing_events
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record a payment. Succeeded payments credit the wallet exactly once.
pub async fn record_payment(
    pool: &SqlitePool,
    user_id: &str,
    intent_id: &str,
    amount: f64,
    currency: &str,
    status: &str,
) -> Result<PaymentOutcome> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO payments (user_id, intent_id, amount, currency, status)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (intent_id, status) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(intent_id)
    .bind(amount)
    .bind(currency)
    .bind(status)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(PaymentOutcome::Duplicate);
    }

    let credit = if status == "succeeded" { amount } else { 0.0 };
    let balance = sqlx::query_scalar::<_, f64>(
        r#"
        UPDATE users
        SET wallet_balance = wallet_balance + ?, updated_at = datetime('now')
        WHERE id = ?
        RETURNING wallet_balance
        "#,
    )
    .bind(credit)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PaymentOutcome::Recorded { balance })
}

/// Recent payments of a user.
pub async fn list_payments(pool: &SqlitePool, user_id: &str, limit: i64) -> Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, user_id, intent_id, amount, currency, status, created_at
        FROM payments
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
