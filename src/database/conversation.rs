//! Conversation history backing the AI chat

use super::{now, Database, DatabaseError};
use rusqlite::params;

/// Number of past exchanges used as chat context
pub const DEFAULT_HISTORY_LIMIT: u32 = 5;

/// One user message and the bot's answer to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub message: String,
    pub bot_response: String,
}

impl Database {
    pub fn store_conversation(
        &self,
        user_id: u64,
        channel_id: u64,
        message: &str,
        bot_response: &str,
        context_used: &[String],
    ) -> Result<(), DatabaseError> {
        let context_used = serde_json::to_string(context_used)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO gpt_conversation_history
             (user_id, channel_id, message, bot_response, timestamp, context_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, channel_id, message, bot_response, now(), context_used],
        )?;
        Ok(())
    }

    /// Most recent exchanges of a user in a channel, newest first
    pub fn recent_conversations(
        &self,
        user_id: u64,
        channel_id: u64,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT message, bot_response
             FROM gpt_conversation_history
             WHERE user_id = ?1 AND channel_id = ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;
        let turns = stmt
            .query_map(params![user_id, channel_id, limit], |row| {
                Ok(ConversationTurn {
                    message: row.get(0)?,
                    bot_response: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    /// Forget a user's history in one channel; returns the number of rows removed
    pub fn clear_user_history(&self, user_id: u64, channel_id: u64) -> Result<usize, DatabaseError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM gpt_conversation_history WHERE user_id = ?1 AND channel_id = ?2",
            params![user_id, channel_id],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_scoped_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        db.store_conversation(1, 10, "hi", "hello!", &[]).unwrap();
        db.store_conversation(1, 10, "how are you", "great", &["hi".into(), "hello!".into()])
            .unwrap();
        db.store_conversation(1, 11, "other channel", "ok", &[]).unwrap();
        db.store_conversation(2, 10, "other user", "ok", &[]).unwrap();

        let turns = db.recent_conversations(1, 10, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(
            turns,
            vec![
                ConversationTurn {
                    message: "how are you".into(),
                    bot_response: "great".into()
                },
                ConversationTurn {
                    message: "hi".into(),
                    bot_response: "hello!".into()
                },
            ]
        );
        assert_eq!(db.recent_conversations(1, 10, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_history() {
        let db = Database::open_in_memory().unwrap();
        db.store_conversation(1, 10, "a", "b", &[]).unwrap();
        db.store_conversation(1, 11, "c", "d", &[]).unwrap();

        assert_eq!(db.clear_user_history(1, 10).unwrap(), 1);
        assert!(db.recent_conversations(1, 10, 5).unwrap().is_empty());
        assert_eq!(db.recent_conversations(1, 11, 5).unwrap().len(), 1);
    }
}
