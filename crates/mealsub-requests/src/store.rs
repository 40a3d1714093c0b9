use chrono::{NaiveDate, Utc};
use mealsub_core::sql::{is_unique_violation, text_column};
use mealsub_core::Mutation;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{RequestError, Result};
use crate::types::{
    Decision, NewRequest, PauseSkipRequest, RequestFilter, RequestStatus, RequestType,
};

/// Persist a new PENDING request.
///
/// Duplicate guards are partial UNIQUE indexes; a hit is reported as
/// [`RequestError::Duplicate`] with a message naming what already exists.
#[instrument(skip(conn, new), fields(user_id = %new.user_id, request_type = %new.request_type))]
pub fn insert_request(conn: &Connection, new: &NewRequest) -> Result<PauseSkipRequest> {
    if let (Some(start), Some(end)) = (new.pause_start_date, new.pause_end_date) {
        if end < start {
            return Err(RequestError::Invalid(mealsub_core::CoreError::InvalidValue {
                field: "pauseEndDate",
                value: format!("{end} is before {start}"),
            }));
        }
    }

    let now = Utc::now().to_rfc3339();
    let id = Uuid::now_v7().to_string();
    let result = conn.execute(
        "INSERT INTO pause_skip_requests
            (id, request_type, status, kind, subscription_id, delivery_id, user_id, reason,
             pause_start_date, pause_end_date, skip_date, linked_to, created_at, updated_at)
         VALUES (?1,?2,'PENDING',?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?12)",
        params![
            id,
            new.request_type.as_str(),
            new.kind.as_str(),
            new.subscription_id,
            new.delivery_id,
            new.user_id,
            new.reason,
            new.pause_start_date,
            new.pause_end_date,
            new.skip_date,
            new.linked_to,
            now,
        ],
    );
    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(RequestError::Duplicate(duplicate_message(new.request_type)));
        }
        Err(e) => return Err(RequestError::Database(e)),
    }

    info!(request_id = %id, "request created");
    Ok(PauseSkipRequest {
        id,
        request_type: new.request_type,
        status: RequestStatus::Pending,
        kind: new.kind,
        subscription_id: new.subscription_id.clone(),
        delivery_id: new.delivery_id.clone(),
        user_id: new.user_id.clone(),
        reason: new.reason.clone(),
        pause_start_date: new.pause_start_date,
        pause_end_date: new.pause_end_date,
        skip_date: new.skip_date,
        linked_to: new.linked_to.clone(),
        decided_by: None,
        decided_at: None,
        decision_date: None,
        admin_note: None,
        removed_count: None,
        compensated_count: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn get_request(conn: &Connection, id: &str) -> Result<Option<PauseSkipRequest>> {
    let request = conn
        .query_row(
            &format!("{REQUEST_SELECT_SQL} WHERE id = ?1"),
            params![id],
            row_to_request,
        )
        .optional()?;
    Ok(request)
}

/// A user's requests, newest first.
pub fn list_for_user(
    conn: &Connection,
    user_id: &str,
    filter: RequestFilter,
) -> Result<Vec<PauseSkipRequest>> {
    query_list(
        conn,
        &format!(
            "{REQUEST_SELECT_SQL}
             WHERE user_id = ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR request_type = ?3)
             ORDER BY created_at DESC, id DESC"
        ),
        params![
            user_id,
            filter.status.map(|s| s.as_str()),
            filter.request_type.map(|t| t.as_str())
        ],
    )
}

/// Every user's requests (admin queue), oldest first.
pub fn list_requests(conn: &Connection, filter: RequestFilter) -> Result<Vec<PauseSkipRequest>> {
    query_list(
        conn,
        &format!(
            "{REQUEST_SELECT_SQL}
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR request_type = ?2)
             ORDER BY created_at, id"
        ),
        params![
            filter.status.map(|s| s.as_str()),
            filter.request_type.map(|t| t.as_str())
        ],
    )
}

pub fn pending_pause_for(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
) -> Result<Option<PauseSkipRequest>> {
    let request = conn
        .query_row(
            &format!(
                "{REQUEST_SELECT_SQL}
                 WHERE user_id = ?1 AND subscription_id = ?2
                   AND request_type = 'PAUSE' AND status = 'PENDING'"
            ),
            params![user_id, subscription_id],
            row_to_request,
        )
        .optional()?;
    Ok(request)
}

/// The PENDING or APPROVED skip for a delivery, if any.
pub fn active_skip_for(conn: &Connection, delivery_id: &str) -> Result<Option<PauseSkipRequest>> {
    let request = conn
        .query_row(
            &format!(
                "{REQUEST_SELECT_SQL}
                 WHERE delivery_id = ?1 AND request_type = 'SKIP'
                   AND status IN ('PENDING', 'APPROVED')"
            ),
            params![delivery_id],
            row_to_request,
        )
        .optional()?;
    Ok(request)
}

/// WITHDRAW_PAUSE requests linked to `pause_id`, any status.
pub fn withdrawals_of(conn: &Connection, pause_id: &str) -> Result<Vec<PauseSkipRequest>> {
    query_list(
        conn,
        &format!(
            "{REQUEST_SELECT_SQL}
             WHERE linked_to = ?1 AND request_type = 'WITHDRAW_PAUSE'
             ORDER BY created_at"
        ),
        params![pause_id],
    )
}

/// Record an admin decision on a PENDING request.
///
/// `Conflict` when the request was already decided or withdrawn.
pub fn decide(
    conn: &Connection,
    id: &str,
    decision: Decision,
    decided_by: &str,
    decision_date: NaiveDate,
    admin_note: Option<&str>,
) -> Result<Mutation<PauseSkipRequest>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE pause_skip_requests
         SET status = ?2, decided_by = ?3, decided_at = ?4, decision_date = ?5,
             admin_note = ?6, updated_at = ?4
         WHERE id = ?1 AND status = 'PENDING'",
        params![
            id,
            decision.status().as_str(),
            decided_by,
            now,
            decision_date,
            admin_note
        ],
    )?;
    if n == 0 {
        return missing_or_conflict(conn, id);
    }
    info!(request_id = id, status = %decision.status(), decided_by, "request decided");
    reload(conn, id)
}

/// Owner withdrawal of their own PENDING request.
///
/// A request owned by someone else reads as `NotFound`.
pub fn withdraw(conn: &Connection, id: &str, user_id: &str) -> Result<Mutation<PauseSkipRequest>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "UPDATE pause_skip_requests SET status = 'WITHDRAWN', updated_at = ?3
         WHERE id = ?1 AND user_id = ?2 AND status = 'PENDING'",
        params![id, user_id, now],
    )?;
    if n == 0 {
        return match get_request(conn, id)? {
            Some(r) if r.user_id == user_id => Ok(Mutation::Conflict),
            _ => Ok(Mutation::NotFound),
        };
    }
    info!(request_id = id, user_id, "request withdrawn");
    reload(conn, id)
}

/// Store how many deliveries a PAUSE approval removed and appended back.
pub fn record_compensation(
    conn: &Connection,
    id: &str,
    removed: u32,
    compensated: u32,
) -> Result<()> {
    let n = conn.execute(
        "UPDATE pause_skip_requests
         SET removed_count = ?2, compensated_count = ?3, updated_at = ?4
         WHERE id = ?1",
        params![id, removed, compensated, Utc::now().to_rfc3339()],
    )?;
    if n == 0 {
        return Err(RequestError::NotFound { id: id.to_string() });
    }
    Ok(())
}

// ── private helpers ───────────────────────────────────────────────────────────

const REQUEST_SELECT_SQL: &str =
    "SELECT id, request_type, status, kind, subscription_id, delivery_id, user_id, reason,
            pause_start_date, pause_end_date, skip_date, linked_to, decided_by, decided_at,
            decision_date, admin_note, removed_count, compensated_count, created_at, updated_at
     FROM pause_skip_requests";

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<PauseSkipRequest> {
    Ok(PauseSkipRequest {
        id: row.get(0)?,
        request_type: text_column(row, 1)?,
        status: text_column(row, 2)?,
        kind: text_column(row, 3)?,
        subscription_id: row.get(4)?,
        delivery_id: row.get(5)?,
        user_id: row.get(6)?,
        reason: row.get(7)?,
        pause_start_date: row.get(8)?,
        pause_end_date: row.get(9)?,
        skip_date: row.get(10)?,
        linked_to: row.get(11)?,
        decided_by: row.get(12)?,
        decided_at: row.get(13)?,
        decision_date: row.get(14)?,
        admin_note: row.get(15)?,
        removed_count: row.get(16)?,
        compensated_count: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn query_list(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PauseSkipRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, row_to_request)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn reload(conn: &Connection, id: &str) -> Result<Mutation<PauseSkipRequest>> {
    Ok(match get_request(conn, id)? {
        Some(r) => Mutation::Applied(r),
        None => Mutation::NotFound,
    })
}

fn missing_or_conflict(conn: &Connection, id: &str) -> Result<Mutation<PauseSkipRequest>> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT status FROM pause_skip_requests WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(if exists.is_some() {
        Mutation::Conflict
    } else {
        Mutation::NotFound
    })
}

fn duplicate_message(request_type: RequestType) -> String {
    match request_type {
        RequestType::Pause => "A pause request is already pending for this subscription",
        RequestType::Skip => "A skip request already exists for this delivery",
        RequestType::WithdrawPause => "A withdrawal is already pending for this pause",
    }
    .to_string()
}
