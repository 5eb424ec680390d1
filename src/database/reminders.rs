//! Smart reminders scheduled around the user's busiest hour

use super::{now, Database, DatabaseError};
use chrono::{Duration, NaiveDateTime, Timelike};
use rusqlite::params;

/// How far in the future a reminder is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDelay {
    Urgent,
    Today,
    Tomorrow,
    Week,
}

impl ReminderDelay {
    pub const ALL: [ReminderDelay; 4] = [
        ReminderDelay::Urgent,
        ReminderDelay::Today,
        ReminderDelay::Tomorrow,
        ReminderDelay::Week,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderDelay::Urgent => "urgent",
            ReminderDelay::Today => "today",
            ReminderDelay::Tomorrow => "tomorrow",
            ReminderDelay::Week => "week",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    pub fn delay(&self) -> Duration {
        match self {
            ReminderDelay::Urgent => Duration::hours(1),
            ReminderDelay::Today => Duration::hours(3),
            ReminderDelay::Tomorrow => Duration::days(1),
            ReminderDelay::Week => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub user_id: u64,
    pub channel_id: u64,
    pub text: String,
    pub scheduled_for: NaiveDateTime,
    pub context: String,
}

/// Due time for a reminder created at `now`.
///
/// With a known peak hour the hour of the base time is replaced by it; a
/// result that is not in the future moves one day later.
pub fn schedule_time(now: NaiveDateTime, delay: ReminderDelay, peak_hour: Option<u32>) -> NaiveDateTime {
    let base = now + delay.delay();
    match peak_hour.and_then(|hour| base.with_hour(hour)) {
        Some(at_peak) if at_peak <= now => at_peak + Duration::days(1),
        Some(at_peak) => at_peak,
        None => base,
    }
}

impl Database {
    /// Create a reminder for a user, delivered later in `channel_id`
    pub fn create_reminder(
        &self,
        user_id: u64,
        channel_id: u64,
        text: &str,
        delay: ReminderDelay,
    ) -> Result<Reminder, DatabaseError> {
        let peak_hour = self.peak_hour(user_id)?;
        let created_at = now();
        let scheduled_for = schedule_time(created_at, delay, peak_hour);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO smart_reminders
             (user_id, channel_id, reminder_text, created_at, scheduled_for, context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, channel_id, text, created_at, scheduled_for, delay.as_str()],
        )?;

        Ok(Reminder {
            id: conn.last_insert_rowid(),
            user_id,
            channel_id,
            text: text.to_string(),
            scheduled_for,
            context: delay.as_str().to_string(),
        })
    }

    /// Pending reminders whose time has come, oldest first
    pub fn due_reminders(&self, at: NaiveDateTime) -> Result<Vec<Reminder>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, channel_id, reminder_text, scheduled_for, context
             FROM smart_reminders
             WHERE status = 'pending' AND julianday(scheduled_for) <= julianday(?1)
             ORDER BY julianday(scheduled_for) ASC, id ASC",
        )?;
        let reminders = stmt
            .query_map([at], |row| {
                Ok(Reminder {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    channel_id: row.get(2)?,
                    text: row.get(3)?,
                    scheduled_for: row.get(4)?,
                    context: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reminders)
    }

    pub fn mark_reminder_sent(&self, id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE smart_reminders SET status = 'sent' WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn test_delay_parsing() {
        assert_eq!(ReminderDelay::from_str("urgent"), Some(ReminderDelay::Urgent));
        assert_eq!(ReminderDelay::from_str("week"), Some(ReminderDelay::Week));
        assert_eq!(ReminderDelay::from_str("someday"), None);
    }

    #[test]
    fn test_schedule_without_activity() {
        let now = time(10, 8, 30);
        assert_eq!(schedule_time(now, ReminderDelay::Urgent, None), time(10, 9, 30));
        assert_eq!(schedule_time(now, ReminderDelay::Today, None), time(10, 11, 30));
        assert_eq!(schedule_time(now, ReminderDelay::Tomorrow, None), time(11, 8, 30));
        assert_eq!(schedule_time(now, ReminderDelay::Week, None), time(17, 8, 30));
    }

    #[test]
    fn test_schedule_moves_to_peak_hour() {
        let now = time(10, 8, 30);
        assert_eq!(schedule_time(now, ReminderDelay::Tomorrow, Some(20)), time(11, 20, 30));
        // Peak hour earlier than now on the same day rolls over
        assert_eq!(schedule_time(now, ReminderDelay::Urgent, Some(6)), time(11, 6, 30));
        assert_eq!(schedule_time(now, ReminderDelay::Today, Some(18)), time(10, 18, 30));
    }

    #[test]
    fn test_reminder_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let reminder = db
            .create_reminder(7, 99, "dentist", ReminderDelay::Urgent)
            .unwrap();
        assert_eq!(reminder.context, "urgent");
        assert_eq!(reminder.text, "dentist");

        assert!(db.due_reminders(now()).unwrap().is_empty());

        let later = reminder.scheduled_for + Duration::minutes(1);
        let due = db.due_reminders(later).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, reminder.id);
        assert_eq!(due[0].channel_id, 99);

        db.mark_reminder_sent(reminder.id).unwrap();
        assert!(db.due_reminders(later).unwrap().is_empty());
    }
}
