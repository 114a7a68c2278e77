//! Webhook idempotency ledger
//!
//! INSERT first, check rows_affected — no TOCTOU window between a
//! "have we seen this?" read and the write.

use sqlx::PgPool;

/// Returns true if the event is new (and now recorded), false on a duplicate.
pub async fn try_record(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
         VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(inserted > 0)
}
