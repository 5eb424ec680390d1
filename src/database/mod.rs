//! Persistence layer
//!
//! Uses SQLite to store feedback, activity, rankings, reminders, content
//! categories and the conversation memory of the AI chat. Every table is a
//! flat, independent record set created when the database is opened.

mod activity;
mod categories;
mod conversation;
mod feedback;
mod memory;
mod reminders;

pub use activity::{ActivityPatterns, CommandUsage, HourActivity, UserRanking};
pub use categories::{categorize, Categorization};
pub use conversation::{ConversationTurn, DEFAULT_HISTORY_LIMIT};
pub use feedback::{FeedbackEntry, MAX_RATING, MIN_RATING};
pub use memory::DEFAULT_MAX_MEMORY;
pub use reminders::{Reminder, ReminderDelay};

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rating must be between 1 and 10, got {0}")]
    InvalidRating(i64),
    #[error("Lock error")]
    LockError,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS user_activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        command TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS conversation_memory (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        context TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS user_points (
        user_id INTEGER PRIMARY KEY,
        activity_points INTEGER NOT NULL DEFAULT 0,
        helpful_reactions INTEGER NOT NULL DEFAULT 0,
        streak_days INTEGER NOT NULL DEFAULT 0,
        last_active TEXT
    );
    CREATE TABLE IF NOT EXISTS smart_reminders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        channel_id INTEGER NOT NULL,
        reminder_text TEXT NOT NULL,
        created_at TEXT NOT NULL,
        scheduled_for TEXT NOT NULL,
        context TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending'
    );
    CREATE TABLE IF NOT EXISTS content_categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content TEXT NOT NULL,
        categories TEXT NOT NULL,
        keywords TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS gpt_conversation_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        channel_id INTEGER NOT NULL,
        message TEXT NOT NULL,
        bot_response TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        context_used TEXT NOT NULL DEFAULT '[]'
    );
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
        feedback_text TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
";

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    /// Initialize database tables
    fn init(&self) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockError)
    }

    /// Check that the connection still answers queries
    pub fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

/// Current UTC time as stored in every timestamp column
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        db.ping().unwrap();

        let conn = db.conn().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (
                    'user_activities', 'conversation_memory', 'user_points', 'smart_reminders',
                    'content_categories', 'gpt_conversation_history', 'feedback')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }

    #[test]
    fn test_init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db.ping().unwrap();
    }
}
