//! Expands activated order lines into weekday deliveries and appends
//! replacement servings at the tail of a schedule.

use chrono::NaiveDate;
use mealsub_core::calendar::{add_days, is_serving_day, next_serving_day_after};
use mealsub_core::Mutation;
use mealsub_deliveries::{store as deliveries, DeliveryItem, InsertOutcome, NewDelivery};
use mealsub_orders::{orders, subscriptions, Order, OrderItem, OrderStatus, PaymentStatus};
use mealsub_requests::pause::load_pause_windows;
use mealsub_requests::PauseWindows;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SchedulerError};
use crate::types::ActivationReport;

/// How far activation and pause compensation search for free weekdays.
pub const SCHEDULE_LOOKAHEAD_DAYS: i64 = 366;
/// How far a skip replacement searches past the current tail.
pub const SKIP_LOOKAHEAD_DAYS: i64 = 120;
/// How far a withdrawal top-up searches past the current tail.
pub const TOP_UP_HORIZON_DAYS: i64 = 14;

/// Move a paid, confirmed order to the kitchen and create its deliveries.
///
/// Deliveries are written first; the order only becomes `in_kitchen` once
/// they are in place. Calling this again on an `in_kitchen` order re-runs
/// generation, which finds every slot already taken and creates nothing.
#[instrument(skip(conn))]
pub fn activate_order(
    conn: &Connection,
    order_id: &str,
    actor: &str,
    today: NaiveDate,
) -> Result<ActivationReport> {
    let order = orders::get_order(conn, order_id)?
        .ok_or_else(|| SchedulerError::not_found("Order", order_id))?;

    let already_in_kitchen = order.status == OrderStatus::InKitchen;
    if !already_in_kitchen {
        if order.status != OrderStatus::Confirmed {
            return Err(SchedulerError::Validation(format!(
                "Order must be confirmed before it moves to the kitchen (status is {})",
                order.status
            )));
        }
        if order.payment_status != PaymentStatus::Paid {
            return Err(SchedulerError::Policy(
                "Order must be paid before it moves to the kitchen".to_string(),
            ));
        }
    }

    let tx = conn.unchecked_transaction()?;
    let mut report = generate_for_order(&tx, &order, actor, today)?;
    tx.commit()?;

    if !already_in_kitchen {
        match orders::transition_status(conn, order_id, OrderStatus::Confirmed, OrderStatus::InKitchen)? {
            Mutation::Applied(_) => report.transitioned = true,
            Mutation::Conflict => {
                return Err(SchedulerError::Conflict(
                    "Order status changed while moving it to the kitchen; retry".to_string(),
                ))
            }
            Mutation::NotFound => return Err(SchedulerError::not_found("Order", order_id)),
        }
    }

    info!(
        order_id,
        created = report.created,
        duplicates = report.duplicates,
        transitioned = report.transitioned,
        "order activated"
    );
    Ok(report)
}

/// Create every delivery an order is owed. Idempotent.
pub fn generate_for_order(
    conn: &Connection,
    order: &Order,
    actor: &str,
    today: NaiveDate,
) -> Result<ActivationReport> {
    let mut report = ActivationReport {
        order_id: order.id.clone(),
        created: 0,
        duplicates: 0,
        subscriptions_created: 0,
        transitioned: false,
    };
    let Some(first) = order.items.first() else {
        warn!(order_id = %order.id, "order has no lines, nothing to schedule");
        return Ok(report);
    };

    if order.is_one_off_only() {
        let chosen = if order.immediate {
            today
        } else {
            order.delivery_date.unwrap_or(first.start_date)
        };
        // weekends carry no deliveries; roll forward to Monday
        let date = if is_serving_day(chosen) {
            chosen
        } else {
            next_serving_day_after(chosen)
        };
        if date != chosen {
            debug!(order_id = %order.id, chosen = %chosen, date = %date, "one-off moved off weekend");
        }
        let new = NewDelivery {
            user_id: order.user_id.clone(),
            subscription_id: None,
            date,
            time: order
                .delivery_time
                .clone()
                .unwrap_or_else(|| first.delivery_time.clone()),
            items: order.items.iter().map(delivery_item).collect(),
            source_order_id: order.id.clone(),
            source_cart_item_id: None,
            created_by: actor.to_string(),
        };
        match deliveries::insert_delivery(conn, &new)? {
            InsertOutcome::Inserted(_) => report.created += 1,
            InsertOutcome::Duplicate => report.duplicates += 1,
        }
        return Ok(report);
    }

    for item in &order.items {
        if subscriptions::ensure_subscription(conn, item)? {
            report.subscriptions_created += 1;
        }
        let start = if item.immediate || order.immediate {
            today
        } else {
            item.start_date
        };
        let windows = load_pause_windows(conn, &item.user_id, &item.cart_item_id)?;
        let (created, duplicates) = fill_schedule(
            conn,
            &line_template(item, start, actor),
            item.plan.default_total_servings() as usize,
            &windows,
        )?;
        report.created += created;
        report.duplicates += duplicates;
    }
    Ok(report)
}

/// Append up to `count` deliveries after the subscription's last scheduled
/// date, using that delivery as the template and skipping weekends, pause
/// windows and taken slots. Returns how many were appended.
///
/// A subscription with nothing scheduled has no template; that is logged and
/// treated as nothing to do.
pub fn append_after_last(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
    count: usize,
    lookahead_days: i64,
    actor: &str,
) -> Result<usize> {
    if count == 0 {
        return Ok(0);
    }
    let Some(last) = deliveries::last_scheduled(conn, user_id, subscription_id)? else {
        warn!(user_id, subscription_id, "no scheduled delivery to extend from");
        return Ok(0);
    };
    let windows = load_pause_windows(conn, user_id, subscription_id)?;

    let mut appended = 0;
    for offset in 1..=lookahead_days {
        if appended == count {
            break;
        }
        let date = add_days(last.date, offset);
        if !is_serving_day(date) || windows.contains(date) {
            continue;
        }
        let new = NewDelivery::from_template(&last, date, actor);
        if deliveries::insert_delivery(conn, &new)?.is_inserted() {
            appended += 1;
        }
    }

    if appended < count {
        warn!(
            user_id,
            subscription_id,
            wanted = count,
            appended,
            lookahead_days,
            "ran out of lookahead while appending deliveries"
        );
    } else {
        debug!(user_id, subscription_id, appended, "deliveries appended");
    }
    Ok(appended)
}

// ── private helpers ───────────────────────────────────────────────────────────

/// Walk forward from the template's date creating one delivery per free
/// weekday until `target` deliveries exist. Returns (created, duplicates).
fn fill_schedule(
    conn: &Connection,
    template: &NewDelivery,
    target: usize,
    windows: &PauseWindows,
) -> Result<(usize, usize)> {
    let Some(subscription_id) = template.subscription_id.as_deref() else {
        return Ok((0, 0));
    };
    let existing = deliveries::scheduled_dates(conn, &template.user_id, subscription_id)?;
    let mut have = existing.len();
    let (mut created, mut duplicates) = (0, 0);

    for offset in 0..SCHEDULE_LOOKAHEAD_DAYS {
        if have >= target {
            break;
        }
        let date = add_days(template.date, offset);
        if !is_serving_day(date) || windows.contains(date) || existing.contains(&date) {
            continue;
        }
        let new = NewDelivery {
            date,
            ..template.clone()
        };
        match deliveries::insert_delivery(conn, &new)? {
            InsertOutcome::Inserted(_) => created += 1,
            InsertOutcome::Duplicate => duplicates += 1,
        }
        have += 1;
    }

    duplicates += existing.len().min(target);
    if have < target {
        warn!(
            subscription_id,
            target, have, "schedule lookahead exhausted before reaching target"
        );
    }
    Ok((created, duplicates))
}

fn delivery_item(item: &OrderItem) -> DeliveryItem {
    DeliveryItem {
        cart_item_id: item.cart_item_id.clone(),
        name: item.name.clone(),
        kind: item.kind,
        plan: item.plan,
        quantity: item.quantity,
    }
}

fn line_template(item: &OrderItem, start: NaiveDate, actor: &str) -> NewDelivery {
    NewDelivery {
        user_id: item.user_id.clone(),
        subscription_id: Some(item.cart_item_id.clone()),
        date: start,
        time: item.delivery_time.clone(),
        items: vec![delivery_item(item)],
        source_order_id: item.order_id.clone(),
        source_cart_item_id: Some(item.cart_item_id.clone()),
        created_by: actor.to_string(),
    }
}
