//! CRUD operations for the device's [`CachedSession`] row.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use magpie_shared::{AccountId, Handle};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::CachedSession;

impl Database {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Insert or replace the cached session.
    pub fn save_session(&self, session: &CachedSession) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO session (id, account_id, handle, created_at)
             VALUES (1, ?1, ?2, ?3)",
            params![
                session.account.as_str(),
                session.handle.as_ref().map(|h| h.as_str()),
                session.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record the handle once profile bootstrap has completed.
    pub fn update_session_handle(&self, handle: &Handle) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE session SET handle = ?1 WHERE id = 1",
            params![handle.as_str()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch the cached session, if this device has one.
    pub fn load_session(&self) -> Result<Option<CachedSession>> {
        self.conn()
            .query_row(
                "SELECT account_id, handle, created_at FROM session WHERE id = 1",
                [],
                row_to_session,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Forget the cached session (sign-out). Returns `true` if a row was
    /// deleted.
    pub fn clear_session(&self) -> Result<bool> {
        let affected = self.conn().execute("DELETE FROM session WHERE id = 1", [])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`CachedSession`].
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedSession> {
    let account: String = row.get(0)?;
    let handle: Option<String> = row.get(1)?;
    let created_str: String = row.get(2)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(CachedSession {
        account: AccountId(account),
        handle: handle.map(Handle::new),
        created_at,
    })
}
