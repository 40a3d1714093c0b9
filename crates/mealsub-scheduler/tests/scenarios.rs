//! End-to-end schedule scenarios against an in-memory database.
//!
//! January 2024 starts on a Monday, which keeps the weekday arithmetic below
//! easy to follow.

use chrono::{NaiveDate, NaiveDateTime};
use mealsub_core::calendar::is_serving_day;
use mealsub_core::config::PolicyConfig;
use mealsub_core::{Plan, SubscriptionKind};
use mealsub_deliveries::{store as deliveries, Delivery, DeliveryStatus};
use mealsub_orders::{orders, NewOrder, NewOrderItem, Order, OrderStatus, PaymentStatus};
use mealsub_requests::{Decision, RequestFilter, RequestKind, RequestStatus};
use mealsub_scheduler::{PauseInput, SchedulerError, SchedulerHandle, SubscriptionState};
use rusqlite::Connection;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn at(date: &str, hh: u32, mm: u32) -> NaiveDateTime {
    d(date).and_hms_opt(hh, mm, 0).unwrap()
}

fn handle() -> SchedulerHandle {
    SchedulerHandle::new(Connection::open_in_memory().unwrap(), PolicyConfig::default()).unwrap()
}

fn place_order(h: &SchedulerHandle, plan: Plan, kind: SubscriptionKind, start: &str) -> Order {
    let new = NewOrder {
        user_id: "u1".to_string(),
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        delivery_date: None,
        delivery_time: None,
        immediate: false,
        items: vec![NewOrderItem {
            name: "Protein Pack".to_string(),
            plan,
            kind,
            quantity: 1,
            start_date: d(start),
            delivery_time: "12:30".to_string(),
            immediate: false,
        }],
    };
    h.with_conn(|c| Ok(orders::create_order(c, new)?)).unwrap()
}

/// Activated weekly meal pack starting Monday 2024-01-01; returns its
/// subscription id.
fn weekly_subscription(h: &SchedulerHandle, kind: SubscriptionKind) -> String {
    let order = place_order(h, Plan::Weekly, kind, "2024-01-01");
    h.move_order_to_kitchen(&order.id, "admin-1", d("2023-12-31"))
        .unwrap();
    order.items[0].cart_item_id.clone()
}

fn schedule(h: &SchedulerHandle, sub: &str) -> Vec<Delivery> {
    h.with_conn(|c| Ok(deliveries::list_for_subscription(c, "u1", sub)?))
        .unwrap()
}

fn dates_with(rows: &[Delivery], status: DeliveryStatus) -> Vec<NaiveDate> {
    rows.iter()
        .filter(|r| r.status == status)
        .map(|r| r.date)
        .collect()
}

fn pause_input(kind: SubscriptionKind, sub: &str, start: &str, end: &str) -> PauseInput {
    PauseInput {
        kind: RequestKind::from(kind),
        subscription_id: sub.to_string(),
        pause_start_date: d(start),
        pause_end_date: d(end),
        reason: Some("travel".to_string()),
    }
}

#[test]
fn activation_creates_weekday_servings_once() {
    let h = handle();
    let order = place_order(&h, Plan::Weekly, SubscriptionKind::MealPack, "2024-01-05");
    let first = h
        .move_order_to_kitchen(&order.id, "admin-1", d("2024-01-04"))
        .unwrap();
    assert_eq!(first.created, 5);
    assert!(first.transitioned);

    let sub = &order.items[0].cart_item_id;
    let rows = schedule(&h, sub);
    assert!(rows.iter().all(|r| is_serving_day(r.date)));
    assert_eq!(
        rows.iter().map(|r| r.date).collect::<Vec<_>>(),
        vec![
            d("2024-01-05"),
            d("2024-01-08"),
            d("2024-01-09"),
            d("2024-01-10"),
            d("2024-01-11")
        ]
    );

    let again = h
        .move_order_to_kitchen(&order.id, "admin-1", d("2024-01-04"))
        .unwrap();
    assert_eq!(again.created, 0);
    assert!(!again.transitioned);
    assert_eq!(schedule(&h, sub).len(), 5);

    let stored = h
        .with_conn(|c| Ok(orders::get_order(c, &order.id)?))
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::InKitchen);
    assert!(stored.moved_to_kitchen_at.is_some());
}

#[test]
fn activation_requires_paid_confirmed_order() {
    let h = handle();
    let unpaid = NewOrder {
        user_id: "u1".to_string(),
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Unpaid,
        delivery_date: None,
        delivery_time: None,
        immediate: false,
        items: vec![],
    };
    let order = h
        .with_conn(|c| Ok(orders::create_order(c, unpaid)?))
        .unwrap();
    assert!(matches!(
        h.move_order_to_kitchen(&order.id, "admin-1", d("2024-01-01")),
        Err(SchedulerError::Policy(_))
    ));
    assert!(matches!(
        h.move_order_to_kitchen("missing", "admin-1", d("2024-01-01")),
        Err(SchedulerError::NotFound { .. })
    ));
}

#[test]
fn one_off_order_gets_a_single_combined_delivery() {
    let h = handle();
    let new = NewOrder {
        user_id: "u1".to_string(),
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        delivery_date: Some(d("2024-01-02")),
        delivery_time: Some("18:00".to_string()),
        immediate: false,
        items: vec![
            NewOrderItem {
                name: "Salad".to_string(),
                plan: Plan::Single,
                kind: SubscriptionKind::Byo,
                quantity: 1,
                start_date: d("2024-01-02"),
                delivery_time: "18:00".to_string(),
                immediate: false,
            },
            NewOrderItem {
                name: "Trial Box".to_string(),
                plan: Plan::Trial,
                kind: SubscriptionKind::MealPack,
                quantity: 2,
                start_date: d("2024-01-02"),
                delivery_time: "18:00".to_string(),
                immediate: false,
            },
        ],
    };
    let order = h.with_conn(|c| Ok(orders::create_order(c, new)?)).unwrap();

    let report = h
        .move_order_to_kitchen(&order.id, "admin-1", d("2024-01-01"))
        .unwrap();
    assert_eq!(report.created, 1);
    h.move_order_to_kitchen(&order.id, "admin-1", d("2024-01-01"))
        .unwrap();

    let day = h.kitchen_deliveries(d("2024-01-02"), None, None).unwrap();
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].subscription_id, None);
    assert_eq!(day[0].items.len(), 2);
    assert_eq!(day[0].time, "18:00");
}

#[test]
fn skipped_wednesday_is_replaced_on_following_monday() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let wednesday = schedule(&h, &sub)
        .into_iter()
        .find(|r| r.date == d("2024-01-03"))
        .unwrap();

    let request = h
        .create_skip_request("u1", &wednesday.id, None, at("2024-01-03", 8, 0))
        .unwrap();
    let decided = h
        .decide_request(&request.id, Decision::Approved, "admin-1", None, d("2024-01-03"))
        .unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);

    let rows = schedule(&h, &sub);
    assert_eq!(dates_with(&rows, DeliveryStatus::Skipped), vec![d("2024-01-03")]);
    assert_eq!(
        dates_with(&rows, DeliveryStatus::Pending),
        vec![
            d("2024-01-01"),
            d("2024-01-02"),
            d("2024-01-04"),
            d("2024-01-05"),
            d("2024-01-08")
        ]
    );

    let views = h.my_subscriptions("u1", d("2024-01-03")).unwrap();
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.status, SubscriptionState::Active);
    assert_eq!(view.schedule_end_date, Some(d("2024-01-08")));
    assert_eq!(view.next_serving_date, Some(d("2024-01-04")));
    assert_eq!(view.cycle_end_date, d("2024-01-08"));
    assert_eq!(view.skipped, 1);
}

#[test]
fn skip_inside_cutoff_names_the_lead_time() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let monday = schedule(&h, &sub).remove(0);

    let err = h
        .create_skip_request("u1", &monday.id, None, at("2024-01-01", 11, 0))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Policy(_)));
    assert!(err.to_string().contains("2 hours"));

    // not today
    let tuesday = schedule(&h, &sub).remove(1);
    assert!(matches!(
        h.create_skip_request("u1", &tuesday.id, None, at("2024-01-01", 8, 0)),
        Err(SchedulerError::Policy(_))
    ));
    // someone else's delivery
    assert!(matches!(
        h.create_skip_request("u2", &monday.id, None, at("2024-01-01", 8, 0)),
        Err(SchedulerError::NotFound { .. })
    ));
}

#[test]
fn duplicate_skip_is_refused_until_declined() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let monday = schedule(&h, &sub).remove(0);
    let now = at("2024-01-01", 8, 0);

    let first = h.create_skip_request("u1", &monday.id, None, now).unwrap();
    assert!(matches!(
        h.create_skip_request("u1", &monday.id, None, now),
        Err(SchedulerError::Policy(_))
    ));
    h.decide_request(&first.id, Decision::Declined, "admin-1", Some("no"), d("2024-01-01"))
        .unwrap();
    assert!(h.create_skip_request("u1", &monday.id, None, now).is_ok());

    // declined skip leaves the schedule alone
    assert_eq!(dates_with(&schedule(&h, &sub), DeliveryStatus::Skipped), vec![]);
}

#[test]
fn pause_approval_conserves_servings() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
            at("2024-01-01", 8, 0),
        )
        .unwrap();
    let approved = h
        .decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-01"))
        .unwrap();
    assert_eq!(approved.removed_count, Some(2));
    assert_eq!(approved.compensated_count, Some(2));

    let pending = dates_with(&schedule(&h, &sub), DeliveryStatus::Pending);
    assert_eq!(
        pending,
        vec![
            d("2024-01-01"),
            d("2024-01-02"),
            d("2024-01-05"),
            d("2024-01-08"),
            d("2024-01-09")
        ]
    );

    // paused days stay out of listings
    let mine = h.my_deliveries("u1", d("2024-01-01"), d("2024-01-12")).unwrap();
    assert_eq!(mine.len(), 5);
}

#[test]
fn same_day_withdrawal_pulls_appended_days_back() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let now = at("2024-01-01", 8, 0);

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
            now,
        )
        .unwrap();
    h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-01"))
        .unwrap();
    let appended: Vec<String> = schedule(&h, &sub)
        .into_iter()
        .filter(|r| r.date > d("2024-01-05"))
        .map(|r| r.id)
        .collect();
    assert_eq!(appended.len(), 2);

    let withdrawal = h.create_withdraw_request("u1", &pause.id).unwrap();
    h.decide_request(&withdrawal.id, Decision::Approved, "admin-1", None, d("2024-01-01"))
        .unwrap();

    let rows = schedule(&h, &sub);
    assert_eq!(
        rows.iter().map(|r| r.date).collect::<Vec<_>>(),
        vec![
            d("2024-01-01"),
            d("2024-01-02"),
            d("2024-01-03"),
            d("2024-01-04"),
            d("2024-01-05")
        ]
    );
    // the donors moved, they were not recreated
    for id in &appended {
        assert!(rows.iter().any(|r| &r.id == id));
    }

    // a second withdrawal of the same pause is refused
    assert!(matches!(
        h.create_withdraw_request("u1", &pause.id),
        Err(SchedulerError::Policy(_))
    ));
}

#[test]
fn mid_pause_withdrawal_keeps_elapsed_pause_days() {
    let h = handle();
    let order = place_order(&h, Plan::Monthly, SubscriptionKind::MealPack, "2024-01-01");
    h.move_order_to_kitchen(&order.id, "admin-1", d("2023-12-31"))
        .unwrap();
    let sub = order.items[0].cart_item_id.clone();
    assert_eq!(schedule(&h, &sub).len(), 20);

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-10", "2024-01-16"),
            at("2024-01-08", 8, 0),
        )
        .unwrap();
    h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-08"))
        .unwrap();
    assert_eq!(schedule(&h, &sub).last().unwrap().date, d("2024-02-02"));

    let withdrawal = h.create_withdraw_request("u1", &pause.id).unwrap();
    h.decide_request(&withdrawal.id, Decision::Approved, "admin-1", None, d("2024-01-12"))
        .unwrap();

    let dates: Vec<NaiveDate> = schedule(&h, &sub).into_iter().map(|r| r.date).collect();
    assert_eq!(dates.len(), 20);
    assert!(!dates.contains(&d("2024-01-10")));
    assert!(!dates.contains(&d("2024-01-11")));
    for day in ["2024-01-12", "2024-01-15", "2024-01-16"] {
        assert!(dates.contains(&d(day)), "{day} should be served again");
    }
    assert_eq!(dates.last(), Some(&d("2024-01-30")));
}

#[test]
fn pause_request_preconditions() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);

    // next delivery is 90 minutes away
    let err = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
            at("2024-01-01", 11, 0),
        )
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Policy(_)));
    assert!(err.to_string().contains("2 hours"));

    let now = at("2024-01-01", 8, 0);
    assert!(matches!(
        h.create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2023-12-29", "2024-01-04"),
            now
        ),
        Err(SchedulerError::Validation(_))
    ));
    assert!(matches!(
        h.create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-04", "2024-01-03"),
            now
        ),
        Err(SchedulerError::Validation(_))
    ));
    assert!(matches!(
        h.create_pause_request(
            "u1",
            pause_input(SubscriptionKind::Byo, &sub, "2024-01-03", "2024-01-04"),
            now
        ),
        Err(SchedulerError::Validation(_))
    ));
    assert!(matches!(
        h.create_pause_request(
            "u2",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
            now
        ),
        Err(SchedulerError::NotFound { .. })
    ));

    h.create_pause_request(
        "u1",
        pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
        now,
    )
    .unwrap();
    assert!(matches!(
        h.create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-08", "2024-01-09"),
            now
        ),
        Err(SchedulerError::Policy(_))
    ));
}

#[test]
fn db_backed_subscription_tracks_pause_status() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::CustomMeal);
    let now = at("2024-01-01", 8, 0);

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::CustomMeal, &sub, "2024-01-02", "2024-01-03"),
            now,
        )
        .unwrap();
    h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-02"))
        .unwrap();

    let view = h.my_subscriptions("u1", d("2024-01-02")).unwrap().remove(0);
    assert_eq!(view.status, SubscriptionState::Paused);
    assert_eq!(view.pause.map(|w| w.start), Some(d("2024-01-02")));

    // a paused row cannot be paused again
    assert!(matches!(
        h.create_pause_request(
            "u1",
            pause_input(SubscriptionKind::CustomMeal, &sub, "2024-01-08", "2024-01-09"),
            at("2024-01-02", 8, 0)
        ),
        Err(SchedulerError::Policy(_))
    ));

    let withdrawal = h.create_withdraw_request("u1", &pause.id).unwrap();
    h.decide_request(&withdrawal.id, Decision::Approved, "admin-1", None, d("2024-01-02"))
        .unwrap();
    let view = h.my_subscriptions("u1", d("2024-01-02")).unwrap().remove(0);
    assert_eq!(view.status, SubscriptionState::Active);
}

#[test]
fn decisions_and_withdrawals_are_single_shot() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let now = at("2024-01-01", 8, 0);

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-03", "2024-01-04"),
            now,
        )
        .unwrap();
    let withdrawn = h.withdraw_request("u1", &pause.id).unwrap();
    assert_eq!(withdrawn.status, RequestStatus::Withdrawn);

    assert!(matches!(
        h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-01")),
        Err(SchedulerError::Conflict(_))
    ));
    assert!(matches!(
        h.withdraw_request("u1", &pause.id),
        Err(SchedulerError::Conflict(_))
    ));
    // withdrawing an unapproved pause is not possible
    assert!(matches!(
        h.create_withdraw_request("u1", &pause.id),
        Err(SchedulerError::Policy(_))
    ));

    let mine = h.my_requests("u1", RequestFilter::default()).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(schedule(&h, &sub).len(), 5);
}

#[test]
fn kitchen_updates_move_forward_for_today_only() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let monday = schedule(&h, &sub).remove(0);
    let today = d("2024-01-01");

    let cooking = h
        .update_kitchen_status(&monday.id, DeliveryStatus::Cooking, "admin-1", today)
        .unwrap();
    assert_eq!(cooking.status, DeliveryStatus::Cooking);
    assert!(matches!(
        h.update_kitchen_status(&monday.id, DeliveryStatus::Pending, "admin-1", today),
        Err(SchedulerError::Validation(_))
    ));
    assert!(matches!(
        h.update_kitchen_status(&monday.id, DeliveryStatus::Skipped, "admin-1", today),
        Err(SchedulerError::Validation(_))
    ));

    let queue = h
        .kitchen_deliveries(today, Some(DeliveryStatus::Cooking), None)
        .unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn delivery_range_is_bounded() {
    let h = handle();
    assert!(matches!(
        h.my_deliveries("u1", d("2024-01-01"), d("2024-02-01")),
        Err(SchedulerError::Validation(_))
    ));
    assert!(matches!(
        h.my_deliveries("u1", d("2024-01-05"), d("2024-01-01")),
        Err(SchedulerError::Validation(_))
    ));
    assert!(h.my_deliveries("u1", d("2024-01-01"), d("2024-01-30")).is_ok());
}

fn one_off_order(delivery_date: Option<&str>, immediate: bool) -> NewOrder {
    NewOrder {
        user_id: "u1".to_string(),
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
        delivery_date: delivery_date.map(d),
        delivery_time: Some("18:00".to_string()),
        immediate,
        items: vec![NewOrderItem {
            name: "Salad".to_string(),
            plan: Plan::Single,
            kind: SubscriptionKind::Byo,
            quantity: 1,
            start_date: d("2024-01-06"),
            delivery_time: "18:00".to_string(),
            immediate,
        }],
    }
}

#[test]
fn weekend_one_off_rolls_forward_to_monday() {
    let h = handle();
    let saturday = one_off_order(Some("2024-01-06"), false);
    let saturday = h.with_conn(|c| Ok(orders::create_order(c, saturday)?)).unwrap();
    h.move_order_to_kitchen(&saturday.id, "admin-1", d("2024-01-04"))
        .unwrap();

    // ordered on a Sunday for immediate delivery
    let immediate = one_off_order(None, true);
    let immediate = h.with_conn(|c| Ok(orders::create_order(c, immediate)?)).unwrap();
    h.move_order_to_kitchen(&immediate.id, "admin-1", d("2024-01-07"))
        .unwrap();

    for weekend in ["2024-01-06", "2024-01-07"] {
        assert!(h.kitchen_deliveries(d(weekend), None, None).unwrap().is_empty());
    }
    let monday = h.kitchen_deliveries(d("2024-01-08"), None, None).unwrap();
    assert_eq!(monday.len(), 2);
    assert!(monday.iter().all(|r| r.subscription_id.is_none()));
}

#[test]
fn in_progress_delivery_inside_pause_stays_listed() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::MealPack);
    let tuesday = schedule(&h, &sub)
        .into_iter()
        .find(|r| r.date == d("2024-01-02"))
        .unwrap();
    h.update_kitchen_status(&tuesday.id, DeliveryStatus::Cooking, "admin-1", d("2024-01-02"))
        .unwrap();

    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::MealPack, &sub, "2024-01-02", "2024-01-03"),
            at("2024-01-02", 8, 0),
        )
        .unwrap();
    h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-02"))
        .unwrap();

    let queue = h.kitchen_deliveries(d("2024-01-02"), None, None).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].status, DeliveryStatus::Cooking);

    let mine = h
        .my_deliveries("u1", d("2024-01-01"), d("2024-01-12"))
        .unwrap();
    let dates: Vec<NaiveDate> = mine.iter().map(|r| r.date).collect();
    assert!(dates.contains(&d("2024-01-02")));
    assert!(!dates.contains(&d("2024-01-03")));
}

#[test]
fn db_backed_status_follows_the_pause_calendar() {
    let h = handle();
    let sub = weekly_subscription(&h, SubscriptionKind::CustomMeal);

    // approved before the window starts
    let pause = h
        .create_pause_request(
            "u1",
            pause_input(SubscriptionKind::CustomMeal, &sub, "2024-01-03", "2024-01-04"),
            at("2024-01-01", 8, 0),
        )
        .unwrap();
    h.decide_request(&pause.id, Decision::Approved, "admin-1", None, d("2024-01-01"))
        .unwrap();

    let status_on = |day: &str| h.my_subscriptions("u1", d(day)).unwrap().remove(0).status;
    assert_eq!(status_on("2024-01-02"), SubscriptionState::Active);
    assert_eq!(status_on("2024-01-03"), SubscriptionState::Paused);
    assert_eq!(status_on("2024-02-01"), SubscriptionState::Active);

    let again = h.create_pause_request(
        "u1",
        pause_input(SubscriptionKind::CustomMeal, &sub, "2024-02-05", "2024-02-06"),
        at("2024-02-01", 8, 0),
    );
    assert!(again.is_ok());
}
