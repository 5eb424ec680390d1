//! Feedback collected through the feedback modal

use super::{now, Database, DatabaseError};
use chrono::NaiveDateTime;
use rusqlite::params;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub id: i64,
    pub user_id: String,
    pub rating: i64,
    pub feedback_text: String,
    pub timestamp: NaiveDateTime,
}

impl Database {
    /// Save a feedback entry; ratings outside 1..=10 are rejected
    pub fn save_feedback(&self, user: &str, rating: i64, feedback: &str) -> Result<i64, DatabaseError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(DatabaseError::InvalidRating(rating));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feedback (user_id, rating, feedback_text, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![user, rating, feedback, now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Feedback entries, newest first
    pub fn recent_feedback(&self, limit: Option<u32>) -> Result<Vec<FeedbackEntry>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, rating, feedback_text, timestamp
             FROM feedback
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(i64::from).unwrap_or(-1);
        let entries = stmt
            .query_map([limit], |row| {
                Ok(FeedbackEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    rating: row.get(2)?,
                    feedback_text: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Average of all ratings, `None` when nothing was rated yet
    pub fn average_rating(&self) -> Result<Option<f64>, DatabaseError> {
        let conn = self.conn()?;
        let average = conn.query_row("SELECT AVG(rating) FROM feedback", [], |row| {
            row.get::<_, Option<f64>>(0)
        })?;
        Ok(average)
    }
}
