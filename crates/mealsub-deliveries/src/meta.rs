use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;

/// Aggregate view of one subscription's persisted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMeta {
    pub user_id: String,
    pub subscription_id: String,
    /// Latest scheduled date of any status.
    pub schedule_end_date: Option<NaiveDate>,
    /// Earliest date on or after today that still owes a serving.
    pub next_serving_date: Option<NaiveDate>,
    pub delivered_count: u32,
    pub skipped_count: u32,
    /// Every row, whatever its status.
    pub scheduled_count: u32,
}

/// Schedule aggregates for a batch of `(user_id, subscription_id)` pairs.
///
/// Pairs with no deliveries at all are absent from the map.
pub fn schedule_meta(
    conn: &Connection,
    pairs: &[(String, String)],
    today: NaiveDate,
) -> Result<HashMap<(String, String), ScheduleMeta>> {
    let mut totals = conn.prepare_cached(
        "SELECT MAX(date),
                COALESCE(SUM(status = 'DELIVERED'), 0),
                COALESCE(SUM(status = 'SKIPPED'), 0),
                COUNT(*)
         FROM deliveries
         WHERE user_id = ?1 AND subscription_id = ?2",
    )?;
    let mut next = conn.prepare_cached(
        "SELECT MIN(date) FROM deliveries
         WHERE user_id = ?1 AND subscription_id = ?2 AND date >= ?3
           AND status IN ('PENDING', 'COOKING', 'PACKED', 'OUT_FOR_DELIVERY')",
    )?;

    let mut out = HashMap::with_capacity(pairs.len());
    for (user_id, subscription_id) in pairs {
        if out.contains_key(&(user_id.clone(), subscription_id.clone())) {
            continue;
        }
        let (end, delivered, skipped, scheduled): (Option<NaiveDate>, u32, u32, u32) =
            totals.query_row(params![user_id, subscription_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
        if scheduled == 0 {
            continue;
        }
        let next_serving_date: Option<NaiveDate> = next
            .query_row(params![user_id, subscription_id, today], |row| row.get(0))
            .optional()?
            .flatten();

        out.insert(
            (user_id.clone(), subscription_id.clone()),
            ScheduleMeta {
                user_id: user_id.clone(),
                subscription_id: subscription_id.clone(),
                schedule_end_date: end,
                next_serving_date,
                delivered_count: delivered,
                skipped_count: skipped,
                scheduled_count: scheduled,
            },
        );
    }
    Ok(out)
}
