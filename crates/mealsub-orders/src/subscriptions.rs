//! `subscriptions` rows for DB-backed kinds (`customMeal`, `addon`).

use chrono::Utc;
use mealsub_core::sql::text_column;
use mealsub_core::Mutation;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{OrderItem, PauseStamp, SubscriptionRecord, SubscriptionStatus};

/// Create the row for a DB-backed line if it does not exist yet.
///
/// Returns `true` when a row was inserted. Non-DB-backed kinds are ignored.
pub fn ensure_subscription(conn: &Connection, item: &OrderItem) -> Result<bool> {
    if !item.kind.is_db_backed() {
        return Ok(false);
    }
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "INSERT OR IGNORE INTO subscriptions
            (id, user_id, kind, plan, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
        params![
            item.cart_item_id,
            item.user_id,
            item.kind.as_str(),
            item.plan.as_str(),
            now
        ],
    )?;
    if n > 0 {
        info!(subscription_id = %item.cart_item_id, kind = %item.kind, "subscription row created");
    } else {
        debug!(subscription_id = %item.cart_item_id, "subscription row already present");
    }
    Ok(n > 0)
}

pub fn get_subscription(conn: &Connection, id: &str) -> Result<Option<SubscriptionRecord>> {
    let record = conn
        .query_row(
            &format!("{SUBSCRIPTION_SELECT_SQL} WHERE id = ?1"),
            params![id],
            row_to_subscription,
        )
        .optional()?;
    Ok(record)
}

/// Every DB-backed subscription, optionally restricted to one user.
pub fn list_subscriptions(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<Vec<SubscriptionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{SUBSCRIPTION_SELECT_SQL} WHERE (?1 IS NULL OR user_id = ?1) ORDER BY created_at"
    ))?;
    let rows = stmt
        .query_map(params![user_id], row_to_subscription)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record an approved pause on the row; flips status to `paused` when the
/// window is already in effect.
pub fn stamp_pause(
    conn: &Connection,
    id: &str,
    stamp: &PauseStamp,
    in_effect: bool,
) -> Result<Mutation<SubscriptionRecord>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE subscriptions
         SET pause_start_date = ?2, pause_end_date = ?3, pause_reason = ?4,
             pause_request_id = ?5,
             status = CASE WHEN ?6 THEN 'paused' ELSE status END,
             updated_at = ?7
         WHERE id = ?1 AND status != 'cancelled'",
        params![
            id,
            stamp.start,
            stamp.end,
            stamp.reason,
            stamp.request_id,
            in_effect,
            now
        ],
    )?;
    finish_update(conn, id, n, "pause stamped")
}

/// Drop pause metadata and return the row to `active`.
pub fn clear_pause(conn: &Connection, id: &str) -> Result<Mutation<SubscriptionRecord>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE subscriptions
         SET pause_start_date = NULL, pause_end_date = NULL, pause_reason = NULL,
             pause_request_id = NULL, status = 'active', updated_at = ?2
         WHERE id = ?1 AND status != 'cancelled'",
        params![id, now],
    )?;
    finish_update(conn, id, n, "pause cleared")
}

pub fn set_status(
    conn: &Connection,
    id: &str,
    status: SubscriptionStatus,
) -> Result<Mutation<SubscriptionRecord>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE subscriptions SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), now],
    )?;
    finish_update(conn, id, n, "subscription status set")
}

// ── private helpers ───────────────────────────────────────────────────────────

const SUBSCRIPTION_SELECT_SQL: &str =
    "SELECT id, user_id, kind, plan, status, pause_start_date, pause_end_date,
            pause_reason, pause_request_id, created_at, updated_at
     FROM subscriptions";

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRecord> {
    Ok(SubscriptionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: text_column(row, 2)?,
        plan: text_column(row, 3)?,
        status: text_column(row, 4)?,
        pause_start_date: row.get(5)?,
        pause_end_date: row.get(6)?,
        pause_reason: row.get(7)?,
        pause_request_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn finish_update(
    conn: &Connection,
    id: &str,
    changed: usize,
    what: &str,
) -> Result<Mutation<SubscriptionRecord>> {
    let current = get_subscription(conn, id)?;
    Ok(match (changed, current) {
        (0, None) => Mutation::NotFound,
        (0, Some(_)) => Mutation::Conflict,
        (_, Some(record)) => {
            info!(subscription_id = id, status = %record.status, "{what}");
            Mutation::Applied(record)
        }
        (_, None) => Mutation::NotFound,
    })
}
