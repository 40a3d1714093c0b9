use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use mealsub_core::calendar::{format_hhmm, parse_hhmm, to_iso};
use mealsub_core::sql::{is_unique_violation, json_column, text_column, to_json_text};
use mealsub_core::Mutation;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{DeliveryError, Result};
use crate::types::{group_key, Delivery, DeliveryStatus, InsertOutcome, NewDelivery, StatusChange};

/// Insert a PENDING delivery.
///
/// A UNIQUE violation on the group key means the slot is already scheduled
/// (typically a retried activation) and is reported as `Duplicate`.
#[instrument(skip(conn, new), fields(user_id = %new.user_id, date = %new.date))]
pub fn insert_delivery(conn: &Connection, new: &NewDelivery) -> Result<InsertOutcome> {
    let time = format_hhmm(parse_hhmm(&new.time)?);
    let now = Utc::now().to_rfc3339();
    let history = vec![StatusChange {
        from: None,
        to: DeliveryStatus::Pending,
        at: now.clone(),
        by: new.created_by.clone(),
    }];
    let delivery = Delivery {
        id: Uuid::now_v7().to_string(),
        user_id: new.user_id.clone(),
        subscription_id: new.subscription_id.clone(),
        date: new.date,
        time: time.clone(),
        status: DeliveryStatus::Pending,
        status_history: history,
        items: new.items.clone(),
        source_order_id: new.source_order_id.clone(),
        source_cart_item_id: new.source_cart_item_id.clone(),
        group_key: group_key(
            &new.user_id,
            new.subscription_id.as_deref(),
            &new.source_order_id,
            new.date,
            &time,
        ),
        created_at: now.clone(),
        updated_at: now,
    };

    let result = conn.execute(
        "INSERT INTO deliveries
            (id, user_id, subscription_id, date, time, status, status_history, items,
             source_order_id, source_cart_item_id, group_key, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?12)",
        params![
            delivery.id,
            delivery.user_id,
            delivery.subscription_id,
            delivery.date,
            delivery.time,
            delivery.status.as_str(),
            to_json_text(&delivery.status_history)?,
            to_json_text(&delivery.items)?,
            delivery.source_order_id,
            delivery.source_cart_item_id,
            delivery.group_key,
            delivery.created_at,
        ],
    );

    match result {
        Ok(_) => {
            debug!(delivery_id = %delivery.id, "delivery inserted");
            Ok(InsertOutcome::Inserted(delivery))
        }
        Err(e) if is_unique_violation(&e) => {
            debug!(group_key = %delivery.group_key, "delivery already scheduled");
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(DeliveryError::Database(e)),
    }
}

pub fn get_delivery(conn: &Connection, id: &str) -> Result<Option<Delivery>> {
    let delivery = conn
        .query_row(
            &format!("{DELIVERY_SELECT_SQL} WHERE id = ?1"),
            params![id],
            row_to_delivery,
        )
        .optional()?;
    Ok(delivery)
}

/// Every delivery of one subscription, oldest first.
pub fn list_for_subscription(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
) -> Result<Vec<Delivery>> {
    query_list(
        conn,
        &format!(
            "{DELIVERY_SELECT_SQL}
             WHERE user_id = ?1 AND subscription_id = ?2
             ORDER BY date, time"
        ),
        params![user_id, subscription_id],
    )
}

/// A user's deliveries dated within `[from, to]`.
pub fn list_for_user_range(
    conn: &Connection,
    user_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Delivery>> {
    query_list(
        conn,
        &format!(
            "{DELIVERY_SELECT_SQL}
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, time"
        ),
        params![user_id, from, to],
    )
}

/// Kitchen queue for one date with optional status / user filters.
pub fn list_for_date(
    conn: &Connection,
    date: NaiveDate,
    status: Option<DeliveryStatus>,
    user_id: Option<&str>,
) -> Result<Vec<Delivery>> {
    query_list(
        conn,
        &format!(
            "{DELIVERY_SELECT_SQL}
             WHERE date = ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR user_id = ?3)
             ORDER BY time, user_id"
        ),
        params![date, status.map(|s| s.as_str()), user_id],
    )
}

/// The latest-dated delivery of a subscription, whatever its status.
pub fn last_scheduled(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
) -> Result<Option<Delivery>> {
    let delivery = conn
        .query_row(
            &format!(
                "{DELIVERY_SELECT_SQL}
                 WHERE user_id = ?1 AND subscription_id = ?2
                 ORDER BY date DESC, time DESC LIMIT 1"
            ),
            params![user_id, subscription_id],
            row_to_delivery,
        )
        .optional()?;
    Ok(delivery)
}

/// Dates that already carry a delivery for this subscription.
pub fn scheduled_dates(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
) -> Result<BTreeSet<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT date FROM deliveries WHERE user_id = ?1 AND subscription_id = ?2",
    )?;
    let dates = stmt
        .query_map(params![user_id, subscription_id], |row| {
            row.get::<_, NaiveDate>(0)
        })?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(dates)
}

/// Delete PENDING deliveries dated within `[from, to]`; returns the count.
pub fn delete_pending_in_range(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM deliveries
         WHERE user_id = ?1 AND subscription_id = ?2
           AND date >= ?3 AND date <= ?4
           AND status = 'PENDING'",
        params![user_id, subscription_id, from, to],
    )?;
    if n > 0 {
        info!(
            user_id,
            subscription_id,
            from = %from,
            to = %to,
            removed = n,
            "pending deliveries removed"
        );
    }
    Ok(n)
}

/// PENDING deliveries dated strictly after `after`, latest first.
pub fn pending_after(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
    after: NaiveDate,
) -> Result<Vec<Delivery>> {
    query_list(
        conn,
        &format!(
            "{DELIVERY_SELECT_SQL}
             WHERE user_id = ?1 AND subscription_id = ?2
               AND date > ?3 AND status = 'PENDING'
             ORDER BY date DESC, time DESC"
        ),
        params![user_id, subscription_id, after],
    )
}

/// Earliest PENDING delivery scheduled at or after `now`.
pub fn next_pending(
    conn: &Connection,
    user_id: &str,
    subscription_id: &str,
    now: NaiveDateTime,
) -> Result<Option<Delivery>> {
    let delivery = conn
        .query_row(
            &format!(
                "{DELIVERY_SELECT_SQL}
                 WHERE user_id = ?1 AND subscription_id = ?2 AND status = 'PENDING'
                   AND (date > ?3 OR (date = ?3 AND time >= ?4))
                 ORDER BY date, time LIMIT 1"
            ),
            params![
                user_id,
                subscription_id,
                now.date(),
                format_hhmm(now.time())
            ],
            row_to_delivery,
        )
        .optional()?;
    Ok(delivery)
}

/// Move a delivery from `expected` to `next`, appending a history entry.
///
/// The UPDATE is conditional on the row still being in `expected`, so a
/// concurrent change surfaces as `Conflict` rather than being overwritten.
pub fn transition_status(
    conn: &Connection,
    id: &str,
    expected: DeliveryStatus,
    next: DeliveryStatus,
    actor: &str,
) -> Result<Mutation<Delivery>> {
    if !expected.can_transition_to(next) {
        return Err(DeliveryError::InvalidTransition {
            from: expected,
            to: next,
        });
    }
    let Some(mut delivery) = get_delivery(conn, id)? else {
        return Ok(Mutation::NotFound);
    };
    if delivery.status != expected {
        return Ok(Mutation::Conflict);
    }

    let now = Utc::now().to_rfc3339();
    delivery.status_history.push(StatusChange {
        from: Some(expected),
        to: next,
        at: now.clone(),
        by: actor.to_string(),
    });
    let n = conn.execute(
        "UPDATE deliveries SET status = ?1, status_history = ?2, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            next.as_str(),
            to_json_text(&delivery.status_history)?,
            now,
            id,
            expected.as_str()
        ],
    )?;
    if n == 0 {
        return Ok(Mutation::Conflict);
    }

    info!(delivery_id = id, from = %expected, to = %next, actor, "delivery status changed");
    delivery.status = next;
    delivery.updated_at = now;
    Ok(Mutation::Applied(delivery))
}

/// Kitchen-side status update: today's deliveries only, forward only, and
/// never to SKIPPED (that goes through an approved skip request).
pub fn update_kitchen_status(
    conn: &Connection,
    id: &str,
    next: DeliveryStatus,
    today: NaiveDate,
    actor: &str,
) -> Result<Delivery> {
    let delivery = get_delivery(conn, id)?.ok_or_else(|| DeliveryError::NotFound {
        id: id.to_string(),
    })?;
    if delivery.date != today {
        return Err(DeliveryError::NotToday {
            date: to_iso(delivery.date),
        });
    }
    if next == DeliveryStatus::Skipped || !delivery.status.can_transition_to(next) {
        return Err(DeliveryError::InvalidTransition {
            from: delivery.status,
            to: next,
        });
    }
    match transition_status(conn, id, delivery.status, next, actor)? {
        Mutation::Applied(updated) => Ok(updated),
        Mutation::NotFound => Err(DeliveryError::NotFound { id: id.to_string() }),
        Mutation::Conflict => {
            // someone moved it between our read and write; report what it is now
            let current = get_delivery(conn, id)?.map(|d| d.status).unwrap_or(next);
            Err(DeliveryError::InvalidTransition {
                from: current,
                to: next,
            })
        }
    }
}

/// Move a PENDING delivery to another date, keeping its id and history.
///
/// The target slot must be empty for this subscription; otherwise the
/// delivery is left untouched and `Conflict` is returned.
pub fn reassign_delivery_date(
    conn: &Connection,
    id: &str,
    new_date: NaiveDate,
) -> Result<Mutation<Delivery>> {
    let Some(mut delivery) = get_delivery(conn, id)? else {
        return Ok(Mutation::NotFound);
    };
    if delivery.status != DeliveryStatus::Pending {
        return Ok(Mutation::Conflict);
    }

    let occupied: bool = conn
        .query_row(
            "SELECT 1 FROM deliveries
             WHERE user_id = ?1 AND subscription_id IS ?2 AND date = ?3 AND id != ?4",
            params![delivery.user_id, delivery.subscription_id, new_date, id],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    if occupied {
        return Ok(Mutation::Conflict);
    }

    let old_date = delivery.date;
    let key = group_key(
        &delivery.user_id,
        delivery.subscription_id.as_deref(),
        &delivery.source_order_id,
        new_date,
        &delivery.time,
    );
    let now = Utc::now().to_rfc3339();
    let result = conn.execute(
        "UPDATE deliveries SET date = ?1, group_key = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'PENDING'",
        params![new_date, key, now, id],
    );
    match result {
        Ok(0) => return Ok(Mutation::Conflict),
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Ok(Mutation::Conflict),
        Err(e) => return Err(DeliveryError::Database(e)),
    }

    info!(delivery_id = id, from = %old_date, to = %new_date, "delivery date reassigned");
    delivery.date = new_date;
    delivery.group_key = key;
    delivery.updated_at = now;
    Ok(Mutation::Applied(delivery))
}

// ── private helpers ───────────────────────────────────────────────────────────

const DELIVERY_SELECT_SQL: &str =
    "SELECT id, user_id, subscription_id, date, time, status, status_history, items,
            source_order_id, source_cart_item_id, group_key, created_at, updated_at
     FROM deliveries";

fn row_to_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<Delivery> {
    Ok(Delivery {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subscription_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        status: text_column(row, 5)?,
        status_history: json_column(row, 6)?,
        items: json_column(row, 7)?,
        source_order_id: row.get(8)?,
        source_cart_item_id: row.get(9)?,
        group_key: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn query_list(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Delivery>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, row_to_delivery)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryItem;
    use mealsub_core::{Plan, SubscriptionKind};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_delivery(date: &str) -> NewDelivery {
        NewDelivery {
            user_id: "u1".to_string(),
            subscription_id: Some("ci-1".to_string()),
            date: d(date),
            time: "12:30".to_string(),
            items: vec![DeliveryItem {
                cart_item_id: "ci-1".to_string(),
                name: "Protein Pack".to_string(),
                kind: SubscriptionKind::MealPack,
                plan: Plan::Weekly,
                quantity: 1,
            }],
            source_order_id: "o-1".to_string(),
            source_cart_item_id: Some("ci-1".to_string()),
            created_by: "system:activation".to_string(),
        }
    }

    fn insert(conn: &Connection, date: &str) -> Delivery {
        match insert_delivery(conn, &new_delivery(date)).unwrap() {
            InsertOutcome::Inserted(d) => d,
            InsertOutcome::Duplicate => panic!("unexpected duplicate for {date}"),
        }
    }

    #[test]
    fn insert_records_creation_history() {
        let conn = conn();
        let delivery = insert(&conn, "2024-01-02");
        let loaded = get_delivery(&conn, &delivery.id).unwrap().unwrap();
        assert_eq!(loaded.status, DeliveryStatus::Pending);
        assert_eq!(loaded.status_history.len(), 1);
        assert_eq!(loaded.status_history[0].from, None);
        assert_eq!(loaded.status_history[0].by, "system:activation");
        assert_eq!(loaded.items[0].name, "Protein Pack");
        assert_eq!(loaded.group_key, "u1|sub:ci-1|2024-01-02");
    }

    #[test]
    fn second_insert_for_same_slot_is_duplicate() {
        let conn = conn();
        insert(&conn, "2024-01-02");
        let mut again = new_delivery("2024-01-02");
        again.time = "18:00".to_string();
        assert_eq!(
            insert_delivery(&conn, &again).unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(list_for_subscription(&conn, "u1", "ci-1").unwrap().len(), 1);
    }

    #[test]
    fn bad_time_is_rejected() {
        let conn = conn();
        let mut new = new_delivery("2024-01-02");
        new.time = "25:99".to_string();
        assert!(matches!(
            insert_delivery(&conn, &new),
            Err(DeliveryError::Invalid(_))
        ));
    }

    #[test]
    fn range_and_date_queries() {
        let conn = conn();
        for date in ["2024-01-02", "2024-01-03", "2024-01-04"] {
            insert(&conn, date);
        }
        let range = list_for_user_range(&conn, "u1", d("2024-01-03"), d("2024-01-10")).unwrap();
        assert_eq!(range.len(), 2);

        let day = list_for_date(&conn, d("2024-01-03"), Some(DeliveryStatus::Pending), None).unwrap();
        assert_eq!(day.len(), 1);
        let none = list_for_date(&conn, d("2024-01-03"), Some(DeliveryStatus::Cooking), None).unwrap();
        assert!(none.is_empty());
        let other_user = list_for_date(&conn, d("2024-01-03"), None, Some("u2")).unwrap();
        assert!(other_user.is_empty());

        assert_eq!(
            last_scheduled(&conn, "u1", "ci-1").unwrap().unwrap().date,
            d("2024-01-04")
        );
        assert_eq!(scheduled_dates(&conn, "u1", "ci-1").unwrap().len(), 3);
    }

    #[test]
    fn delete_pending_leaves_progressed_rows() {
        let conn = conn();
        let cooking = insert(&conn, "2024-01-02");
        insert(&conn, "2024-01-03");
        insert(&conn, "2024-01-04");
        transition_status(&conn, &cooking.id, DeliveryStatus::Pending, DeliveryStatus::Cooking, "k1")
            .unwrap();

        let removed =
            delete_pending_in_range(&conn, "u1", "ci-1", d("2024-01-02"), d("2024-01-03")).unwrap();
        assert_eq!(removed, 1);
        let left: Vec<_> = list_for_subscription(&conn, "u1", "ci-1")
            .unwrap()
            .into_iter()
            .map(|d| d.date)
            .collect();
        assert_eq!(left, vec![d("2024-01-02"), d("2024-01-04")]);
    }

    #[test]
    fn pending_after_is_latest_first() {
        let conn = conn();
        for date in ["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"] {
            insert(&conn, date);
        }
        let dates: Vec<_> = pending_after(&conn, "u1", "ci-1", d("2024-01-03"))
            .unwrap()
            .into_iter()
            .map(|d| d.date)
            .collect();
        assert_eq!(dates, vec![d("2024-01-05"), d("2024-01-04")]);
    }

    #[test]
    fn next_pending_respects_time_of_day() {
        let conn = conn();
        insert(&conn, "2024-01-02");
        insert(&conn, "2024-01-03");

        let before = d("2024-01-02").and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(
            next_pending(&conn, "u1", "ci-1", before).unwrap().unwrap().date,
            d("2024-01-02")
        );
        let after = d("2024-01-02").and_hms_opt(13, 0, 0).unwrap();
        assert_eq!(
            next_pending(&conn, "u1", "ci-1", after).unwrap().unwrap().date,
            d("2024-01-03")
        );
    }

    #[test]
    fn transition_is_conditional_on_expected_status() {
        let conn = conn();
        let delivery = insert(&conn, "2024-01-02");

        let moved = transition_status(
            &conn,
            &delivery.id,
            DeliveryStatus::Pending,
            DeliveryStatus::Skipped,
            "admin-1",
        )
        .unwrap();
        let moved = moved.applied().unwrap();
        assert_eq!(moved.status_history.len(), 2);
        assert_eq!(moved.status_history[1].from, Some(DeliveryStatus::Pending));

        // stale expectation loses
        let again = transition_status(
            &conn,
            &delivery.id,
            DeliveryStatus::Pending,
            DeliveryStatus::Cooking,
            "k1",
        )
        .unwrap();
        assert_eq!(again, Mutation::Conflict);

        let missing =
            transition_status(&conn, "nope", DeliveryStatus::Pending, DeliveryStatus::Cooking, "k1")
                .unwrap();
        assert_eq!(missing, Mutation::NotFound);
    }

    #[test]
    fn kitchen_update_rules() {
        let conn = conn();
        let today = d("2024-01-02");
        let delivery = insert(&conn, "2024-01-02");
        let tomorrow = insert(&conn, "2024-01-03");

        let packed =
            update_kitchen_status(&conn, &delivery.id, DeliveryStatus::Packed, today, "k1").unwrap();
        assert_eq!(packed.status, DeliveryStatus::Packed);

        assert!(matches!(
            update_kitchen_status(&conn, &delivery.id, DeliveryStatus::Cooking, today, "k1"),
            Err(DeliveryError::InvalidTransition { .. })
        ));
        assert!(matches!(
            update_kitchen_status(&conn, &tomorrow.id, DeliveryStatus::Cooking, today, "k1"),
            Err(DeliveryError::NotToday { .. })
        ));
        assert!(matches!(
            update_kitchen_status(&conn, &tomorrow.id, DeliveryStatus::Skipped, d("2024-01-03"), "k1"),
            Err(DeliveryError::InvalidTransition { .. })
        ));
        assert!(matches!(
            update_kitchen_status(&conn, "nope", DeliveryStatus::Cooking, today, "k1"),
            Err(DeliveryError::NotFound { .. })
        ));
    }

    #[test]
    fn reassign_requires_empty_pending_slot() {
        let conn = conn();
        let first = insert(&conn, "2024-01-02");
        let second = insert(&conn, "2024-01-03");

        assert_eq!(
            reassign_delivery_date(&conn, &second.id, d("2024-01-02")).unwrap(),
            Mutation::Conflict
        );

        let moved = reassign_delivery_date(&conn, &second.id, d("2024-01-10"))
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(moved.date, d("2024-01-10"));
        assert_eq!(moved.id, second.id);
        assert_eq!(moved.group_key, "u1|sub:ci-1|2024-01-10");
        // the freed slot can be filled again
        assert!(insert_delivery(&conn, &new_delivery("2024-01-03"))
            .unwrap()
            .is_inserted());

        transition_status(&conn, &first.id, DeliveryStatus::Pending, DeliveryStatus::Cooking, "k1")
            .unwrap();
        assert_eq!(
            reassign_delivery_date(&conn, &first.id, d("2024-01-20")).unwrap(),
            Mutation::Conflict
        );
    }
}
