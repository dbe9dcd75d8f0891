//! v001 -- Initial schema creation.
//!
//! Creates the two cache tables: `session` and `push_tokens`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Session (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    account_id TEXT NOT NULL,               -- opaque provider account id
    handle     TEXT,                        -- NULL until bootstrap completes
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Push registrations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS push_tokens (
    token         TEXT PRIMARY KEY NOT NULL,
    registered_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
