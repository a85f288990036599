//! SQLite schema bootstrap

use rusqlite::Connection;

/// Bumped whenever `SCHEMA` changes shape
pub const SCHEMA_VERSION: i64 = 1;

/// Create missing tables and record the schema version
pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        tracing::warn!(
            found = version,
            expected = SCHEMA_VERSION,
            "Database schema is newer than this build"
        );
    }

    conn.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        tracing::info!(from = version, to = SCHEMA_VERSION, "Database schema bootstrapped");
    }
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reservations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app TEXT NOT NULL,
    component TEXT NOT NULL,
    owner TEXT NOT NULL DEFAULT '',
    notify TEXT NOT NULL DEFAULT '',
    alert_msg TEXT NOT NULL DEFAULT '',
    frequency INTEGER NOT NULL,
    time_units TEXT NOT NULL,
    inserted_timestamp INTEGER NOT NULL,
    num_checkins INTEGER NOT NULL DEFAULT 0,
    last_checkin_timestamp INTEGER NOT NULL,
    UNIQUE (app, component)
);

CREATE TABLE IF NOT EXISTS housekeeping (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app TEXT NOT NULL,
    component TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    last_checkin_timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app TEXT NOT NULL,
    component TEXT NOT NULL,
    alert_time INTEGER NOT NULL,
    alerters TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS nodes (
    ip_address TEXT PRIMARY KEY,
    node_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS locks (
    name TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    acquired_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_housekeeping_time ON housekeeping(last_checkin_timestamp);
CREATE INDEX IF NOT EXISTS idx_alerts_time ON alerts(alert_time);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        // idempotent
        init_schema(&conn).unwrap();

        for table in ["reservations", "housekeeping", "alerts", "nodes", "locks"] {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
                .unwrap();
            assert!(stmt.exists([table]).unwrap(), "missing table {}", table);
        }

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
