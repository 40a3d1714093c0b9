use rusqlite::{Connection, Result};

/// Initialise the order-side schema. Idempotent; safe on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS customers (
            id          TEXT NOT NULL PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT,
            phone       TEXT,
            created_at  TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS orders (
            id                   TEXT    NOT NULL PRIMARY KEY,
            user_id              TEXT    NOT NULL,
            status               TEXT    NOT NULL DEFAULT 'pending',
            payment_status       TEXT    NOT NULL DEFAULT 'unpaid',
            delivery_date        TEXT,               -- YYYY-MM-DD, single/trial orders
            delivery_time        TEXT,               -- HH:mm
            immediate            INTEGER NOT NULL DEFAULT 0,
            moved_to_kitchen_at  TEXT,
            created_at           TEXT    NOT NULL,
            updated_at           TEXT    NOT NULL
        ) STRICT;

        -- cart_item_id doubles as the subscription id for recurring lines
        CREATE TABLE IF NOT EXISTS order_items (
            cart_item_id   TEXT    NOT NULL PRIMARY KEY,
            order_id       TEXT    NOT NULL REFERENCES orders(id),
            name           TEXT    NOT NULL,
            plan           TEXT    NOT NULL,
            kind           TEXT    NOT NULL,
            quantity       INTEGER NOT NULL DEFAULT 1,
            start_date     TEXT    NOT NULL,
            delivery_time  TEXT    NOT NULL,
            immediate      INTEGER NOT NULL DEFAULT 0
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items (order_id);

        CREATE TABLE IF NOT EXISTS subscriptions (
            id                TEXT NOT NULL PRIMARY KEY,
            user_id           TEXT NOT NULL,
            kind              TEXT NOT NULL,
            plan              TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'active',
            pause_start_date  TEXT,
            pause_end_date    TEXT,
            pause_reason      TEXT,
            pause_request_id  TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions (user_id);
        ",
    )
}
