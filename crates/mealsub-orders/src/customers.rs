use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::types::Customer;

/// Insert or refresh a customer's contact details.
pub fn upsert_customer(conn: &Connection, customer: &Customer) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO customers (id, name, email, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET name = ?2, email = ?3, phone = ?4",
        params![customer.id, customer.name, customer.email, customer.phone, now],
    )?;
    Ok(())
}

pub fn get_customer(conn: &Connection, id: &str) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name, email, phone FROM customers WHERE id = ?1",
            params![id],
            row_to_customer,
        )
        .optional()?;
    Ok(customer)
}

/// Batch lookup keyed by user id; unknown ids are simply absent.
pub fn get_customers(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, Customer>> {
    let mut out = HashMap::with_capacity(ids.len());
    let mut stmt = conn.prepare("SELECT id, name, email, phone FROM customers WHERE id = ?1")?;
    for id in ids {
        if out.contains_key(*id) {
            continue;
        }
        if let Some(c) = stmt.query_row(params![id], row_to_customer).optional()? {
            out.insert(c.id.clone(), c);
        }
    }
    Ok(out)
}

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
    })
}
