//! Per-user context memory for `!remember_context`

use super::{now, Database, DatabaseError};
use rusqlite::params;

/// Number of contexts kept per user
pub const DEFAULT_MAX_MEMORY: u32 = 10;

impl Database {
    /// Store a context and return the user's newest memories, newest first.
    ///
    /// Older rows beyond `max_memory` are deleted in the same transaction.
    pub fn remember_context(
        &self,
        user_id: u64,
        context: &str,
        max_memory: u32,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversation_memory (user_id, context, timestamp) VALUES (?1, ?2, ?3)",
            params![user_id, context, now()],
        )?;

        let memories = {
            let mut stmt = tx.prepare(
                "SELECT context FROM conversation_memory
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, max_memory], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            rows
        };

        tx.execute(
            "DELETE FROM conversation_memory
             WHERE user_id = ?1
               AND id NOT IN (
                   SELECT id FROM conversation_memory
                   WHERE user_id = ?1
                   ORDER BY timestamp DESC, id DESC
                   LIMIT ?2
               )",
            params![user_id, max_memory],
        )?;

        tx.commit()?;
        Ok(memories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memories_are_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.remember_context(1, "first", DEFAULT_MAX_MEMORY).unwrap();
        let memories = db.remember_context(1, "second", DEFAULT_MAX_MEMORY).unwrap();
        assert_eq!(memories, vec!["second", "first"]);
    }

    #[test]
    fn test_old_memories_are_pruned() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.remember_context(1, &format!("note {}", i), 3).unwrap();
        }
        db.remember_context(2, "other user", 3).unwrap();

        let memories = db.remember_context(1, "latest", 3).unwrap();
        assert_eq!(memories, vec!["latest", "note 4", "note 3"]);

        let conn = db.conn().unwrap();
        let kept: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conversation_memory WHERE user_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(kept, 3);
        let other: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conversation_memory WHERE user_id = 2",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(other, 1);
    }
}
