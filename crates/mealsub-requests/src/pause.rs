//! Effective pause windows.
//!
//! Each APPROVED PAUSE `[S, E]` contributes one window. When a linked
//! WITHDRAW_PAUSE was approved on day `D` the window ends at
//! `min(E, max(S - 1, D - 1))`, so a withdrawal approved before the pause
//! began leaves nothing and one approved mid-pause keeps the days already
//! paused.

use std::collections::HashMap;

use chrono::NaiveDate;
use mealsub_core::calendar::add_days;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PauseWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Effective window of an approved pause, or `None` once a withdrawal has
/// shrunk it to nothing.
pub fn effective_window(
    start: NaiveDate,
    end: NaiveDate,
    withdrawn_on: Option<NaiveDate>,
) -> Option<PauseWindow> {
    let end = match withdrawn_on {
        Some(decided) => end.min(add_days(start, -1).max(add_days(decided, -1))),
        None => end,
    };
    (end >= start).then_some(PauseWindow { start, end })
}

/// All effective windows of one subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PauseWindows(Vec<PauseWindow>);

impl PauseWindows {
    pub fn new(mut windows: Vec<PauseWindow>) -> Self {
        windows.sort_by_key(|w| (w.start, w.end));
        Self(windows)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.iter().any(|w| w.contains(date))
    }

    /// The window that starts last.
    pub fn latest(&self) -> Option<PauseWindow> {
        self.0.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PauseWindow> {
        self.0.iter()
    }
}

/// Effective windows for one (user, subscription).
pub fn load_pause_windows(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
) -> Result<PauseWindows> {
    let mut all = query_windows(conn, Some(user_id), Some(subscription_id))?;
    Ok(all
        .remove(&(user_id.to_string(), subscription_id.to_string()))
        .unwrap_or_default())
}

/// Effective windows of every subscription, optionally for one user, keyed
/// by `(user_id, subscription_id)`.
pub fn load_all_pause_windows(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<HashMap<(String, String), PauseWindows>> {
    query_windows(conn, user_id, None)
}

fn query_windows(
    conn: &Connection,
    user_id: Option<&str>,
    subscription_id: Option<&str>,
) -> Result<HashMap<(String, String), PauseWindows>> {
    // earliest approved withdrawal wins; there is at most one in practice
    let mut stmt = conn.prepare_cached(
        "SELECT p.user_id, p.subscription_id, p.pause_start_date, p.pause_end_date,
                MIN(w.decision_date)
         FROM pause_skip_requests p
         LEFT JOIN pause_skip_requests w
                ON w.linked_to = p.id
               AND w.request_type = 'WITHDRAW_PAUSE'
               AND w.status = 'APPROVED'
         WHERE p.request_type = 'PAUSE' AND p.status = 'APPROVED'
           AND p.subscription_id IS NOT NULL
           AND p.pause_start_date IS NOT NULL AND p.pause_end_date IS NOT NULL
           AND (?1 IS NULL OR p.user_id = ?1)
           AND (?2 IS NULL OR p.subscription_id = ?2)
         GROUP BY p.id",
    )?;
    let rows = stmt
        .query_map(params![user_id, subscription_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, NaiveDate>(2)?,
                row.get::<_, NaiveDate>(3)?,
                row.get::<_, Option<NaiveDate>>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<(String, String), Vec<PauseWindow>> = HashMap::new();
    for (user, sub, start, end, withdrawn_on) in rows {
        if let Some(window) = effective_window(start, end, withdrawn_on) {
            grouped.entry((user, sub)).or_default().push(window);
        }
    }
    Ok(grouped
        .into_iter()
        .map(|(key, windows)| (key, PauseWindows::new(windows)))
        .collect())
}
