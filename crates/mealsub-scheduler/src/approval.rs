//! Side effects of an admin decision.
//!
//! The decision itself is recorded first with a conditional update and is
//! never rolled back. Each side effect then runs in its own transaction;
//! a failure is logged and leaves the schedule as it was before that effect.
//!
//! Approving a pause or skip never lowers the number of servings owed:
//! every removed or skipped delivery is appended again after the tail.

use chrono::NaiveDate;
use mealsub_core::calendar::{add_days, is_serving_day};
use mealsub_core::Mutation;
use mealsub_deliveries::{store as deliveries, DeliveryStatus};
use mealsub_orders::{subscriptions, PauseStamp};
use mealsub_requests::pause::load_pause_windows;
use mealsub_requests::{store as requests, Decision, PauseSkipRequest, RequestStatus, RequestType};
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::error::{Result, SchedulerError};
use crate::generator::{
    append_after_last, SCHEDULE_LOOKAHEAD_DAYS, SKIP_LOOKAHEAD_DAYS, TOP_UP_HORIZON_DAYS,
};

/// Record `decision` on a PENDING request and apply its schedule effects.
///
/// Returns the request as stored after the effects ran.
#[instrument(skip(conn, admin_note))]
pub fn decide_request(
    conn: &Connection,
    request_id: &str,
    decision: Decision,
    admin_id: &str,
    admin_note: Option<&str>,
    today: NaiveDate,
) -> Result<PauseSkipRequest> {
    let request = match requests::decide(conn, request_id, decision, admin_id, today, admin_note)? {
        Mutation::Applied(r) => r,
        Mutation::Conflict => {
            return Err(SchedulerError::Conflict(
                "Request has already been decided or withdrawn".to_string(),
            ))
        }
        Mutation::NotFound => return Err(SchedulerError::not_found("Request", request_id)),
    };

    if decision == Decision::Approved {
        let outcome = match request.request_type {
            RequestType::Pause => in_transaction(conn, |c| apply_pause(c, &request, today)),
            RequestType::Skip => in_transaction(conn, |c| apply_skip(c, &request, admin_id)),
            RequestType::WithdrawPause => {
                in_transaction(conn, |c| apply_withdrawal(c, &request, today))
            }
        };
        if let Err(e) = outcome {
            warn!(
                request_id,
                request_type = %request.request_type,
                error = %e,
                "approval side effects failed; decision kept"
            );
        }
    }

    requests::get_request(conn, request_id)?
        .ok_or_else(|| SchedulerError::not_found("Request", request_id))
}

// ── side effects ─────────────────────────────────────────────────────────────

/// Remove PENDING deliveries inside the pause and append as many after the
/// tail, then stamp DB-backed subscription rows.
fn apply_pause(conn: &Connection, pause: &PauseSkipRequest, today: NaiveDate) -> Result<()> {
    let (Some(subscription_id), Some((start, end))) =
        (pause.subscription_id.as_deref(), pause.pause_range())
    else {
        warn!(request_id = %pause.id, "pause without subscription or dates; nothing to apply");
        return Ok(());
    };
    let user_id = pause.user_id.as_str();
    let actor = format!("system:pause:{}", pause.id);

    let removed = deliveries::delete_pending_in_range(conn, user_id, subscription_id, start, end)?;
    let compensated = append_after_last(
        conn,
        user_id,
        subscription_id,
        removed,
        SCHEDULE_LOOKAHEAD_DAYS,
        &actor,
    )?;
    requests::record_compensation(conn, &pause.id, removed as u32, compensated as u32)?;

    if pause.kind.subscription_kind().is_some_and(|k| k.is_db_backed()) {
        let stamp = PauseStamp {
            start,
            end,
            reason: pause.reason.clone(),
            request_id: pause.id.clone(),
        };
        let in_effect = start <= today && today <= end;
        let outcome = subscriptions::stamp_pause(conn, subscription_id, &stamp, in_effect)?;
        if !outcome.is_applied() {
            warn!(subscription_id, outcome = outcome.label(), "pause stamp not applied");
        }
    }

    info!(
        request_id = %pause.id,
        subscription_id,
        removed,
        compensated,
        "pause applied"
    );
    Ok(())
}

/// Mark the delivery SKIPPED and append one replacement serving.
fn apply_skip(conn: &Connection, skip: &PauseSkipRequest, admin_id: &str) -> Result<()> {
    let Some(delivery_id) = skip.delivery_id.as_deref() else {
        warn!(request_id = %skip.id, "skip without delivery; nothing to apply");
        return Ok(());
    };

    let delivery = match deliveries::transition_status(
        conn,
        delivery_id,
        DeliveryStatus::Pending,
        DeliveryStatus::Skipped,
        admin_id,
    )? {
        Mutation::Applied(d) => d,
        other => {
            warn!(
                request_id = %skip.id,
                delivery_id,
                outcome = other.label(),
                "delivery no longer pending; skip not applied"
            );
            return Ok(());
        }
    };

    let Some(subscription_id) = delivery.subscription_id.as_deref() else {
        // combined one-off deliveries have no schedule to extend
        info!(delivery_id, "one-off delivery skipped");
        return Ok(());
    };
    let actor = format!("system:skip:{}", skip.id);
    let appended = append_after_last(
        conn,
        &delivery.user_id,
        subscription_id,
        1,
        SKIP_LOOKAHEAD_DAYS,
        &actor,
    )?;
    info!(request_id = %skip.id, delivery_id, appended, "skip applied");
    Ok(())
}

/// Pull deliveries back into the days a withdrawn pause no longer covers,
/// then top up whatever the pause failed to compensate.
fn apply_withdrawal(
    conn: &Connection,
    withdrawal: &PauseSkipRequest,
    decided_on: NaiveDate,
) -> Result<()> {
    let Some(pause_id) = withdrawal.linked_to.as_deref() else {
        warn!(request_id = %withdrawal.id, "withdrawal without linked pause");
        return Ok(());
    };
    let pause = match requests::get_request(conn, pause_id)? {
        Some(p) if p.request_type == RequestType::Pause && p.status == RequestStatus::Approved => p,
        other => {
            warn!(
                request_id = %withdrawal.id,
                pause_id,
                pause_status = ?other.map(|p| p.status),
                "linked pause is not approved; withdrawal has nothing to undo"
            );
            return Ok(());
        }
    };
    let (Some(subscription_id), Some((start, end))) =
        (pause.subscription_id.as_deref(), pause.pause_range())
    else {
        warn!(pause_id, "pause without subscription or dates");
        return Ok(());
    };
    let user_id = pause.user_id.as_str();

    let resume_from = decided_on.max(start);
    let mut moved = 0usize;
    if resume_from <= end {
        let windows = load_pause_windows(conn, user_id, subscription_id)?;
        let mut occupied = deliveries::scheduled_dates(conn, user_id, subscription_id)?;
        let mut donors = deliveries::pending_after(conn, user_id, subscription_id, end)?.into_iter();

        let mut day = resume_from;
        'days: while day <= end {
            if is_serving_day(day) && !windows.contains(day) && !occupied.contains(&day) {
                loop {
                    let Some(donor) = donors.next() else {
                        warn!(pause_id, date = %day, "no donor delivery left to pull back");
                        break 'days;
                    };
                    match deliveries::reassign_delivery_date(conn, &donor.id, day)? {
                        Mutation::Applied(_) => {
                            occupied.remove(&donor.date);
                            occupied.insert(day);
                            moved += 1;
                            break;
                        }
                        other => {
                            warn!(delivery_id = %donor.id, outcome = other.label(), "donor not moved");
                        }
                    }
                }
            }
            day = add_days(day, 1);
        }
    }

    if pause.kind.subscription_kind().is_some_and(|k| k.is_db_backed()) {
        let outcome = subscriptions::clear_pause(conn, subscription_id)?;
        if !outcome.is_applied() {
            warn!(subscription_id, outcome = outcome.label(), "pause metadata not cleared");
        }
    }

    let deficit = pause.compensation_deficit() as usize;
    if deficit > 0 {
        let actor = format!("system:withdraw:{}", withdrawal.id);
        let added = append_after_last(
            conn,
            user_id,
            subscription_id,
            deficit,
            TOP_UP_HORIZON_DAYS,
            &actor,
        )?;
        let removed = pause.removed_count.unwrap_or(0);
        let compensated = pause.compensated_count.unwrap_or(0) + added as u32;
        requests::record_compensation(conn, &pause.id, removed, compensated)?;
        info!(pause_id, deficit, added, "withdrawal top-up");
    }

    info!(
        request_id = %withdrawal.id,
        pause_id,
        subscription_id,
        resume_from = %resume_from,
        moved,
        "pause withdrawn"
    );
    Ok(())
}

fn in_transaction<F>(conn: &Connection, effect: F) -> Result<()>
where
    F: FnOnce(&Connection) -> Result<()>,
{
    let tx = conn.unchecked_transaction()?;
    effect(&*tx)?;
    tx.commit()?;
    Ok(())
}
