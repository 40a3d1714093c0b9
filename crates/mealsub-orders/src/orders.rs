use chrono::Utc;
use mealsub_core::calendar::parse_hhmm;
use mealsub_core::sql::text_column;
use mealsub_core::Mutation;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::{OrderError, Result};
use crate::types::{NewOrder, Order, OrderItem, OrderStatus};

/// Insert an order and its lines in one transaction.
///
/// Used by seeding and tests; checkout itself lives outside this service.
pub fn create_order(conn: &Connection, new: NewOrder) -> Result<Order> {
    if let Some(ref t) = new.delivery_time {
        parse_hhmm(t)?;
    }
    for item in &new.items {
        parse_hhmm(&item.delivery_time)?;
    }

    let id = Uuid::now_v7().to_string();
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO orders
            (id, user_id, status, payment_status, delivery_date, delivery_time,
             immediate, moved_to_kitchen_at, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,NULL,?8,?8)",
        params![
            id,
            new.user_id,
            new.status.as_str(),
            new.payment_status.as_str(),
            new.delivery_date,
            new.delivery_time,
            new.immediate as i32,
            now,
        ],
    )?;
    for item in &new.items {
        tx.execute(
            "INSERT INTO order_items
                (cart_item_id, order_id, name, plan, kind, quantity, start_date,
                 delivery_time, immediate)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                Uuid::now_v7().to_string(),
                id,
                item.name,
                item.plan.as_str(),
                item.kind.as_str(),
                item.quantity,
                item.start_date,
                item.delivery_time,
                item.immediate as i32,
            ],
        )?;
    }
    tx.commit()?;

    info!(order_id = %id, user_id = %new.user_id, lines = new.items.len(), "order created");
    get_order(conn, &id)?.ok_or(OrderError::NotFound { id })
}

/// Load an order with its lines. `None` when absent.
pub fn get_order(conn: &Connection, order_id: &str) -> Result<Option<Order>> {
    let order = conn
        .query_row(
            "SELECT id, user_id, status, payment_status, delivery_date, delivery_time,
                    immediate, moved_to_kitchen_at, created_at, updated_at
             FROM orders WHERE id = ?1",
            params![order_id],
            |row| {
                Ok(Order {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    status: text_column(row, 2)?,
                    payment_status: text_column(row, 3)?,
                    delivery_date: row.get(4)?,
                    delivery_time: row.get(5)?,
                    immediate: row.get::<_, i32>(6)? != 0,
                    moved_to_kitchen_at: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                    items: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut order) = order else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL} WHERE i.order_id = ?1 ORDER BY i.rowid"
    ))?;
    order.items = stmt
        .query_map(params![order_id], row_to_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Some(order))
}

/// Look up a single order line by its cart-item (subscription) id.
pub fn find_item(conn: &Connection, cart_item_id: &str) -> Result<Option<OrderItem>> {
    let item = conn
        .query_row(
            &format!("{ITEM_SELECT_SQL} WHERE i.cart_item_id = ?1"),
            params![cart_item_id],
            row_to_item,
        )
        .optional()?;
    Ok(item)
}

/// Lines of every order that has reached the kitchen, optionally for one user.
pub fn list_activated_items(conn: &Connection, user_id: Option<&str>) -> Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE o.status IN ('in_kitchen', 'completed')
           AND (?1 IS NULL OR o.user_id = ?1)
         ORDER BY i.start_date, i.cart_item_id"
    ))?;
    let items = stmt
        .query_map(params![user_id], row_to_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Move an order from `expected` to `next`, only if it is still in `expected`.
///
/// Returns `Conflict` when another request changed the status first; the
/// caller should re-fetch and retry rather than overwrite.
pub fn transition_status(
    conn: &Connection,
    order_id: &str,
    expected: OrderStatus,
    next: OrderStatus,
) -> Result<Mutation<Order>> {
    let now = Utc::now().to_rfc3339();
    let moved_at = (next == OrderStatus::InKitchen).then(|| now.clone());
    let n = conn.execute(
        "UPDATE orders
         SET status = ?1,
             moved_to_kitchen_at = COALESCE(?2, moved_to_kitchen_at),
             updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![next.as_str(), moved_at, now, order_id, expected.as_str()],
    )?;

    if n == 0 {
        let exists: bool = conn
            .query_row("SELECT 1 FROM orders WHERE id = ?1", params![order_id], |_| {
                Ok(true)
            })
            .optional()?
            .unwrap_or(false);
        return Ok(if exists {
            Mutation::Conflict
        } else {
            Mutation::NotFound
        });
    }

    info!(order_id, from = %expected, to = %next, "order status changed");
    match get_order(conn, order_id)? {
        Some(order) => Ok(Mutation::Applied(order)),
        None => Ok(Mutation::NotFound),
    }
}

// ── private helpers ───────────────────────────────────────────────────────────

const ITEM_SELECT_SQL: &str =
    "SELECT i.cart_item_id, i.order_id, o.user_id, i.name, i.plan, i.kind, i.quantity,
            i.start_date, i.delivery_time, i.immediate
     FROM order_items i
     JOIN orders o ON o.id = i.order_id";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        cart_item_id: row.get(0)?,
        order_id: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        plan: text_column(row, 4)?,
        kind: text_column(row, 5)?,
        quantity: row.get(6)?,
        start_date: row.get(7)?,
        delivery_time: row.get(8)?,
        immediate: row.get::<_, i32>(9)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewOrderItem, PaymentStatus};
    use chrono::NaiveDate;
    use mealsub_core::{Plan, SubscriptionKind};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    fn weekly_order() -> NewOrder {
        NewOrder {
            user_id: "u1".to_string(),
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            delivery_date: None,
            delivery_time: None,
            immediate: false,
            items: vec![NewOrderItem {
                name: "Protein Pack".to_string(),
                plan: Plan::Weekly,
                kind: SubscriptionKind::MealPack,
                quantity: 1,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                delivery_time: "12:30".to_string(),
                immediate: false,
            }],
        }
    }

    #[test]
    fn create_and_reload_order() {
        let conn = conn();
        let order = create_order(&conn, weekly_order()).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].user_id, "u1");
        assert!(!order.is_one_off_only());

        let item = find_item(&conn, &order.items[0].cart_item_id)
            .unwrap()
            .unwrap();
        assert_eq!(item.plan, Plan::Weekly);
    }

    #[test]
    fn bad_delivery_time_is_rejected() {
        let conn = conn();
        let mut new = weekly_order();
        new.items[0].delivery_time = "noon".to_string();
        assert!(matches!(
            create_order(&conn, new),
            Err(OrderError::Invalid(_))
        ));
    }

    #[test]
    fn transition_is_guarded_by_current_status() {
        let conn = conn();
        let order = create_order(&conn, weekly_order()).unwrap();

        let moved = transition_status(
            &conn,
            &order.id,
            OrderStatus::Confirmed,
            OrderStatus::InKitchen,
        )
        .unwrap();
        let moved = moved.applied().unwrap();
        assert_eq!(moved.status, OrderStatus::InKitchen);
        assert!(moved.moved_to_kitchen_at.is_some());

        // a second, stale attempt conflicts instead of overwriting
        let again = transition_status(
            &conn,
            &order.id,
            OrderStatus::Confirmed,
            OrderStatus::InKitchen,
        )
        .unwrap();
        assert_eq!(again, Mutation::Conflict);

        let missing =
            transition_status(&conn, "nope", OrderStatus::Confirmed, OrderStatus::InKitchen)
                .unwrap();
        assert_eq!(missing, Mutation::NotFound);

        assert_eq!(list_activated_items(&conn, Some("u1")).unwrap().len(), 1);
        assert!(list_activated_items(&conn, Some("u2")).unwrap().is_empty());
    }
}
