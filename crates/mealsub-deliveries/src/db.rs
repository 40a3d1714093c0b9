use rusqlite::{Connection, Result};

/// Initialise the delivery schema. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS deliveries (
            id                   TEXT NOT NULL PRIMARY KEY,
            user_id              TEXT NOT NULL,
            subscription_id      TEXT,             -- NULL for combined single/trial deliveries
            date                 TEXT NOT NULL,    -- YYYY-MM-DD local calendar date
            time                 TEXT NOT NULL,    -- HH:mm
            status               TEXT NOT NULL DEFAULT 'PENDING',
            status_history       TEXT NOT NULL DEFAULT '[]',  -- JSON array of StatusChange
            items                TEXT NOT NULL DEFAULT '[]',  -- JSON array of DeliveryItem
            source_order_id      TEXT NOT NULL,
            source_cart_item_id  TEXT,
            group_key            TEXT NOT NULL,
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        ) STRICT;

        -- one delivery per (user, subscription-or-order marker, date)
        CREATE UNIQUE INDEX IF NOT EXISTS ux_deliveries_group_key ON deliveries (group_key);
        CREATE INDEX IF NOT EXISTS idx_deliveries_subscription
            ON deliveries (user_id, subscription_id, date);
        CREATE INDEX IF NOT EXISTS idx_deliveries_date ON deliveries (date, status);
        ",
    )
}
