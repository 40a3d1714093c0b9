//! Read-through subscription projection.
//!
//! Subscriptions are not stored as such: a view is assembled from the order
//! line, its deliveries, the schedule aggregates, the effective pause windows
//! and (for DB-backed kinds) the subscription row. Every listing goes through
//! [`project_subscription`] so they cannot disagree.

use std::collections::HashMap;

use chrono::NaiveDate;
use mealsub_core::progress::{project_progress, ServingRecord};
use mealsub_deliveries::{schedule_meta, store as deliveries, Delivery, ScheduleMeta};
use mealsub_orders::{orders, subscriptions, OrderItem, SubscriptionRecord, SubscriptionStatus};
use mealsub_requests::pause::load_all_pause_windows;
use mealsub_requests::PauseWindows;
use rusqlite::Connection;

use crate::error::Result;
use crate::types::{SubscriptionFilter, SubscriptionState, SubscriptionView};

/// Assemble the view of one subscription line.
pub fn project_subscription(
    item: &OrderItem,
    history: &[Delivery],
    meta: Option<&ScheduleMeta>,
    windows: &PauseWindows,
    record: Option<&SubscriptionRecord>,
    today: NaiveDate,
) -> SubscriptionView {
    let base_start = if item.immediate {
        history.iter().map(|d| d.date).min().unwrap_or(item.start_date)
    } else {
        item.start_date
    };
    let records: Vec<ServingRecord> = history.iter().map(Delivery::serving_record).collect();
    let progress = project_progress(item.plan, base_start, today, &records);

    let status = match record.map(|r| r.status) {
        Some(stored) => record_state(stored, windows, today),
        None if windows.contains(today) => SubscriptionState::Paused,
        None if history.iter().any(|d| d.status.is_serving_bearing()) => {
            SubscriptionState::Active
        }
        None => SubscriptionState::Completed,
    };

    SubscriptionView {
        subscription_id: item.cart_item_id.clone(),
        user_id: item.user_id.clone(),
        order_id: item.order_id.clone(),
        kind: item.kind,
        plan: item.plan,
        name: item.name.clone(),
        status,
        base_start_date: base_start,
        delivery_time: item.delivery_time.clone(),
        cycle_start_date: progress.cycle_start_date,
        cycle_end_date: progress.cycle_end_date,
        delivered: progress.delivered,
        total: progress.total,
        remaining: progress.remaining,
        progress: progress.progress,
        schedule_end_date: meta.and_then(|m| m.schedule_end_date),
        next_serving_date: meta.and_then(|m| m.next_serving_date),
        skipped: meta.map_or(progress.skipped, |m| m.skipped_count),
        scheduled: meta.map_or(0, |m| m.scheduled_count),
        pause: windows.latest(),
    }
}

/// State of a DB-backed subscription row on `today`.
///
/// The stored `paused` / `active` stamp only changes on approval and
/// withdrawal, so pause status is read from the effective windows instead.
pub fn record_state(
    stored: SubscriptionStatus,
    windows: &PauseWindows,
    today: NaiveDate,
) -> SubscriptionState {
    match stored {
        SubscriptionStatus::Cancelled => SubscriptionState::Cancelled,
        SubscriptionStatus::Active | SubscriptionStatus::Paused if windows.contains(today) => {
            SubscriptionState::Paused
        }
        SubscriptionStatus::Active | SubscriptionStatus::Paused => SubscriptionState::Active,
    }
}

/// Views of every activated subscription line, optionally for one user.
///
/// One-off lines that were folded into a combined delivery are not
/// subscriptions and are left out.
pub fn list_subscription_views(
    conn: &Connection,
    user_id: Option<&str>,
    filter: SubscriptionFilter,
    today: NaiveDate,
) -> Result<Vec<SubscriptionView>> {
    let items = orders::list_activated_items(conn, user_id)?;
    let pairs: Vec<(String, String)> = items
        .iter()
        .map(|i| (i.user_id.clone(), i.cart_item_id.clone()))
        .collect();
    let meta = schedule_meta(conn, &pairs, today)?;
    let windows = load_all_pause_windows(conn, user_id)?;
    let records: HashMap<String, SubscriptionRecord> =
        subscriptions::list_subscriptions(conn, user_id)?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

    let empty = PauseWindows::default();
    let mut views = Vec::new();
    for item in &items {
        let key = (item.user_id.clone(), item.cart_item_id.clone());
        let item_meta = meta.get(&key);
        if item_meta.is_none() && !item.plan.is_recurring() {
            continue;
        }
        let history = deliveries::list_for_subscription(conn, &item.user_id, &item.cart_item_id)?;
        let view = project_subscription(
            item,
            &history,
            item_meta,
            windows.get(&key).unwrap_or(&empty),
            records.get(&item.cart_item_id),
            today,
        );
        if filter.matches(&view) {
            views.push(view);
        }
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealsub_core::{Plan, SubscriptionKind};
    use mealsub_deliveries::{DeliveryStatus, StatusChange};
    use mealsub_requests::PauseWindow;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn item() -> OrderItem {
        OrderItem {
            cart_item_id: "ci-1".to_string(),
            order_id: "o-1".to_string(),
            user_id: "u1".to_string(),
            name: "Protein Pack".to_string(),
            plan: Plan::Weekly,
            kind: SubscriptionKind::MealPack,
            quantity: 1,
            start_date: d("2024-01-01"),
            delivery_time: "12:30".to_string(),
            immediate: false,
        }
    }

    fn delivery(date: &str, status: DeliveryStatus) -> Delivery {
        Delivery {
            id: format!("dl-{date}"),
            user_id: "u1".to_string(),
            subscription_id: Some("ci-1".to_string()),
            date: d(date),
            time: "12:30".to_string(),
            status,
            status_history: vec![StatusChange {
                from: None,
                to: DeliveryStatus::Pending,
                at: String::new(),
                by: "test".to_string(),
            }],
            items: vec![],
            source_order_id: "o-1".to_string(),
            source_cart_item_id: Some("ci-1".to_string()),
            group_key: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn progress_and_status_from_history() {
        let history = vec![
            delivery("2024-01-01", DeliveryStatus::Delivered),
            delivery("2024-01-02", DeliveryStatus::Delivered),
            delivery("2024-01-03", DeliveryStatus::Skipped),
            delivery("2024-01-04", DeliveryStatus::Pending),
        ];
        let view = project_subscription(
            &item(),
            &history,
            None,
            &PauseWindows::default(),
            None,
            d("2024-01-03"),
        );
        assert_eq!(view.status, SubscriptionState::Active);
        assert_eq!(view.delivered, 2);
        assert_eq!(view.total, 5);
        assert_eq!(view.remaining, 3);
        assert_eq!(view.progress, 40);
        assert_eq!(view.cycle_end_date, d("2024-01-08"));
    }

    #[test]
    fn pause_window_and_completion() {
        let windows = PauseWindows::new(vec![PauseWindow {
            start: d("2024-01-03"),
            end: d("2024-01-04"),
        }]);
        let history = vec![delivery("2024-01-02", DeliveryStatus::Pending)];
        let paused =
            project_subscription(&item(), &history, None, &windows, None, d("2024-01-03"));
        assert_eq!(paused.status, SubscriptionState::Paused);
        assert_eq!(paused.pause.map(|w| w.end), Some(d("2024-01-04")));

        let done = vec![delivery("2024-01-02", DeliveryStatus::Delivered)];
        let view = project_subscription(
            &item(),
            &done,
            None,
            &PauseWindows::default(),
            None,
            d("2024-01-10"),
        );
        assert_eq!(view.status, SubscriptionState::Completed);
    }

    #[test]
    fn stored_row_status_follows_pause_window() {
        let windows = PauseWindows::new(vec![PauseWindow {
            start: d("2024-01-08"),
            end: d("2024-01-09"),
        }]);
        use SubscriptionStatus::{Active, Cancelled, Paused};
        assert_eq!(record_state(Active, &windows, d("2024-01-05")), SubscriptionState::Active);
        assert_eq!(record_state(Active, &windows, d("2024-01-08")), SubscriptionState::Paused);
        assert_eq!(record_state(Paused, &windows, d("2024-01-10")), SubscriptionState::Active);
        assert_eq!(record_state(Cancelled, &windows, d("2024-01-08")), SubscriptionState::Cancelled);
    }
}
