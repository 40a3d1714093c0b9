//! Preconditions a customer request must meet before it is stored.

use chrono::NaiveDateTime;
use mealsub_core::calendar::{is_within_cutoff, lead_time_label, parse_hhmm};
use mealsub_core::config::PolicyConfig;
use mealsub_core::Mutation;
use mealsub_deliveries::{store as deliveries, DeliveryStatus};
use mealsub_orders::{orders, subscriptions};
use mealsub_requests::pause::load_pause_windows;
use mealsub_requests::{
    store as requests, NewRequest, PauseSkipRequest, RequestKind, RequestStatus, RequestType,
};
use rusqlite::Connection;
use tracing::instrument;

use crate::error::{Result, SchedulerError};
use crate::projection::record_state;
use crate::types::{PauseInput, SubscriptionState};

/// Validate and store a PAUSE request for one of the caller's subscriptions.
#[instrument(skip(conn, policy, input), fields(subscription_id = %input.subscription_id))]
pub fn create_pause_request(
    conn: &Connection,
    policy: PolicyConfig,
    user_id: &str,
    input: PauseInput,
    now: NaiveDateTime,
) -> Result<PauseSkipRequest> {
    let kind = match input.kind {
        RequestKind::MealPack | RequestKind::CustomMeal | RequestKind::Addon => input.kind,
        other => {
            return Err(SchedulerError::Validation(format!(
                "Subscriptions of kind {other} cannot be paused"
            )))
        }
    };
    if input.pause_end_date < input.pause_start_date {
        return Err(SchedulerError::Validation(
            "pauseEndDate must not be before pauseStartDate".to_string(),
        ));
    }
    if input.pause_start_date < now.date() {
        return Err(SchedulerError::Validation(
            "pauseStartDate must be today or later".to_string(),
        ));
    }

    let item = orders::find_item(conn, &input.subscription_id)?
        .filter(|i| i.user_id == user_id)
        .ok_or_else(|| SchedulerError::not_found("Subscription", &input.subscription_id))?;
    if RequestKind::from(item.kind) != kind {
        return Err(SchedulerError::Validation(format!(
            "Subscription {} is a {} subscription, not {kind}",
            item.cart_item_id, item.kind
        )));
    }

    if item.kind.is_db_backed() {
        let windows = load_pause_windows(conn, user_id, &item.cart_item_id)?;
        let active = subscriptions::get_subscription(conn, &item.cart_item_id)?.is_some_and(|s| {
            record_state(s.status, &windows, now.date()) == SubscriptionState::Active
        });
        if !active {
            return Err(SchedulerError::Policy(
                "Only active subscriptions can be paused".to_string(),
            ));
        }
    }

    if let Some(next) = deliveries::next_pending(conn, user_id, &item.cart_item_id, now)? {
        let time = parse_hhmm(&next.time)?;
        if is_within_cutoff(now, next.date, time, policy.pause_cutoff_minutes) {
            return Err(SchedulerError::Policy(format!(
                "Pause requests must be submitted at least {} before the next delivery",
                lead_time_label(policy.pause_cutoff_minutes)
            )));
        }
    }

    if requests::pending_pause_for(conn, user_id, &item.cart_item_id)?.is_some() {
        return Err(SchedulerError::Policy(
            "A pause request is already pending for this subscription".to_string(),
        ));
    }

    let new = NewRequest::pause(
        user_id,
        item.kind,
        &item.cart_item_id,
        input.pause_start_date,
        input.pause_end_date,
        input.reason,
    );
    Ok(requests::insert_request(conn, &new)?)
}

/// Validate and store a SKIP request for one of today's deliveries.
#[instrument(skip(conn, policy, reason))]
pub fn create_skip_request(
    conn: &Connection,
    policy: PolicyConfig,
    user_id: &str,
    delivery_id: &str,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<PauseSkipRequest> {
    let delivery = deliveries::get_delivery(conn, delivery_id)?
        .filter(|d| d.user_id == user_id)
        .ok_or_else(|| SchedulerError::not_found("Delivery", delivery_id))?;

    if delivery.date != now.date() {
        return Err(SchedulerError::Policy(
            "Only today's delivery can be skipped".to_string(),
        ));
    }
    if delivery.status != DeliveryStatus::Pending {
        return Err(SchedulerError::Policy(format!(
            "Delivery is already {} and can no longer be skipped",
            delivery.status
        )));
    }
    if let Some(subscription_id) = delivery.subscription_id.as_deref() {
        if load_pause_windows(conn, user_id, subscription_id)?.contains(delivery.date) {
            return Err(SchedulerError::Policy(
                "Delivery falls inside a pause window".to_string(),
            ));
        }
    }
    let time = parse_hhmm(&delivery.time)?;
    if is_within_cutoff(now, delivery.date, time, policy.skip_cutoff_minutes) {
        return Err(SchedulerError::Policy(format!(
            "Skip requests must be submitted at least {} before delivery",
            lead_time_label(policy.skip_cutoff_minutes)
        )));
    }
    if requests::active_skip_for(conn, delivery_id)?.is_some() {
        return Err(SchedulerError::Policy(
            "A skip request already exists for this delivery".to_string(),
        ));
    }

    let new = NewRequest::skip(
        user_id,
        delivery_id,
        delivery.subscription_id.clone(),
        delivery.date,
        reason,
    );
    Ok(requests::insert_request(conn, &new)?)
}

/// Validate and store a WITHDRAW_PAUSE request for an approved pause.
#[instrument(skip(conn))]
pub fn create_withdraw_request(
    conn: &Connection,
    user_id: &str,
    pause_request_id: &str,
) -> Result<PauseSkipRequest> {
    let pause = requests::get_request(conn, pause_request_id)?
        .filter(|r| r.user_id == user_id && r.request_type == RequestType::Pause)
        .ok_or_else(|| SchedulerError::not_found("Pause request", pause_request_id))?;
    if pause.status != RequestStatus::Approved {
        return Err(SchedulerError::Policy(
            "Only approved pauses can be withdrawn".to_string(),
        ));
    }

    let withdrawals = requests::withdrawals_of(conn, &pause.id)?;
    if withdrawals.iter().any(|w| w.status == RequestStatus::Approved) {
        return Err(SchedulerError::Policy(
            "This pause has already been withdrawn".to_string(),
        ));
    }
    if withdrawals.iter().any(|w| w.status == RequestStatus::Pending) {
        return Err(SchedulerError::Policy(
            "A withdrawal is already pending for this pause".to_string(),
        ));
    }

    Ok(requests::insert_request(conn, &NewRequest::withdraw_pause(&pause))?)
}

/// Owner withdrawal of a request that has not been decided yet.
pub fn withdraw_own_request(
    conn: &Connection,
    user_id: &str,
    request_id: &str,
) -> Result<PauseSkipRequest> {
    match requests::withdraw(conn, request_id, user_id)? {
        Mutation::Applied(r) => Ok(r),
        Mutation::Conflict => Err(SchedulerError::Conflict(
            "Only pending requests can be withdrawn".to_string(),
        )),
        Mutation::NotFound => Err(SchedulerError::not_found("Request", request_id)),
    }
}
