//! CRUD operations for [`StoredPushToken`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use magpie_shared::PushToken;

use crate::database::Database;
use crate::error::Result;
use crate::models::StoredPushToken;

impl Database {
    /// Insert or refresh a push registration.
    pub fn save_push_token(&self, token: &StoredPushToken) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO push_tokens (token, registered_at)
             VALUES (?1, ?2)",
            params![token.token.as_str(), token.registered_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// List all push registrations, newest first.
    pub fn list_push_tokens(&self) -> Result<Vec<StoredPushToken>> {
        let mut stmt = self.conn().prepare(
            "SELECT token, registered_at
             FROM push_tokens
             ORDER BY registered_at DESC",
        )?;

        let rows = stmt.query_map([], row_to_push_token)?;

        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(row?);
        }
        Ok(tokens)
    }

    /// Remove all push registrations (sign-out). Returns the number removed.
    pub fn clear_push_tokens(&self) -> Result<usize> {
        let affected = self.conn().execute("DELETE FROM push_tokens", [])?;
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`StoredPushToken`].
fn row_to_push_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredPushToken> {
    let token: String = row.get(0)?;
    let registered_str: String = row.get(1)?;

    let registered_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&registered_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredPushToken {
        token: PushToken(token),
        registered_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::Duration;

    fn open_test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_push_token_round_trip() {
        let (_dir, db) = open_test_db();
        assert!(db.list_push_tokens().unwrap().is_empty());

        db.save_push_token(&StoredPushToken {
            token: PushToken("device-token-1".to_string()),
            registered_at: Utc::now(),
        })
        .unwrap();

        let tokens = db.list_push_tokens().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token.as_str(), "device-token-1");
    }

    #[test]
    fn test_push_tokens_newest_first() {
        let (_dir, db) = open_test_db();
        let now = Utc::now();

        db.save_push_token(&StoredPushToken {
            token: PushToken("older".to_string()),
            registered_at: now - Duration::hours(1),
        })
        .unwrap();
        db.save_push_token(&StoredPushToken {
            token: PushToken("newer".to_string()),
            registered_at: now,
        })
        .unwrap();

        let tokens = db.list_push_tokens().unwrap();
        assert_eq!(tokens[0].token.as_str(), "newer");
        assert_eq!(tokens[1].token.as_str(), "older");
    }

    #[test]
    fn test_save_same_token_twice_keeps_one_row() {
        let (_dir, db) = open_test_db();
        let token = PushToken("device-token-1".to_string());

        db.save_push_token(&StoredPushToken {
            token: token.clone(),
            registered_at: Utc::now(),
        })
        .unwrap();
        db.save_push_token(&StoredPushToken {
            token,
            registered_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(db.list_push_tokens().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_push_tokens() {
        let (_dir, db) = open_test_db();

        db.save_push_token(&StoredPushToken {
            token: PushToken("a".to_string()),
            registered_at: Utc::now(),
        })
        .unwrap();
        db.save_push_token(&StoredPushToken {
            token: PushToken("b".to_string()),
            registered_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(db.clear_push_tokens().unwrap(), 2);
        assert!(db.list_push_tokens().unwrap().is_empty());
    }
}
