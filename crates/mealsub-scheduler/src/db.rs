use rusqlite::{Connection, Result};

/// Initialise every table the engine touches. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    mealsub_orders::db::init_db(conn)?;
    mealsub_deliveries::db::init_db(conn)?;
    mealsub_requests::db::init_db(conn)?;
    Ok(())
}
