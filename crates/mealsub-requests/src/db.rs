use rusqlite::{Connection, Result};

/// Initialise the request schema. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pause_skip_requests (
            id                 TEXT NOT NULL PRIMARY KEY,
            request_type       TEXT NOT NULL,   -- PAUSE | SKIP | WITHDRAW_PAUSE
            status             TEXT NOT NULL DEFAULT 'PENDING',
            kind               TEXT NOT NULL,   -- subscription kind, or 'delivery'
            subscription_id    TEXT,
            delivery_id        TEXT,
            user_id            TEXT NOT NULL,
            reason             TEXT,
            pause_start_date   TEXT,
            pause_end_date     TEXT,
            skip_date          TEXT,
            linked_to          TEXT,            -- PAUSE id for WITHDRAW_PAUSE
            decided_by         TEXT,
            decided_at         TEXT,
            decision_date      TEXT,            -- local calendar date of the decision
            admin_note         TEXT,
            removed_count      INTEGER,
            compensated_count  INTEGER,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_requests_user
            ON pause_skip_requests(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_requests_subscription
            ON pause_skip_requests(user_id, subscription_id, request_type, status);
        CREATE INDEX IF NOT EXISTS idx_requests_linked
            ON pause_skip_requests(linked_to);

        CREATE UNIQUE INDEX IF NOT EXISTS ux_requests_active_skip
            ON pause_skip_requests(delivery_id)
            WHERE request_type = 'SKIP' AND status IN ('PENDING', 'APPROVED');
        CREATE UNIQUE INDEX IF NOT EXISTS ux_requests_pending_withdrawal
            ON pause_skip_requests(linked_to)
            WHERE request_type = 'WITHDRAW_PAUSE' AND status = 'PENDING';
        CREATE UNIQUE INDEX IF NOT EXISTS ux_requests_pending_pause
            ON pause_skip_requests(user_id, subscription_id)
            WHERE request_type = 'PAUSE' AND status = 'PENDING';
        ",
    )
}
