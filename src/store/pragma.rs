//! Per-connection SQLite settings
//!
//! WAL lets readers keep a stable snapshot while a writer commits, which is
//! what makes the query layer lock-free against the ingestion jobs.

use rusqlite::Connection;
use std::time::Duration;

/// Pages between automatic WAL checkpoints
pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

pub fn apply_connection_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "wal_autocheckpoint", WAL_AUTOCHECKPOINT_PAGES)?;
    // Participation may arrive before its block or member row
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
