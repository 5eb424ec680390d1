//! Command activity tracking and user rankings

use super::{now, Database, DatabaseError};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, OptionalExtension};

/// Number of activities recorded during one hour of the day (UTC)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourActivity {
    pub hour: u32,
    pub count: i64,
}

/// How often a user ran one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUsage {
    pub command: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityPatterns {
    /// Up to three busiest hours, busiest first
    pub peak_hours: Vec<HourActivity>,
    /// Up to five most used commands, most used first
    pub popular_commands: Vec<CommandUsage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRanking {
    pub user_id: u64,
    pub activity_points: i64,
    pub helpful_reactions: i64,
    pub streak_days: i64,
    pub total_score: f64,
}

/// Streak after being active on `today`
fn next_streak(last_active: Option<NaiveDate>, streak: i64, today: NaiveDate) -> i64 {
    match last_active {
        Some(last) if last == today => streak.max(1),
        Some(last) if today.pred_opt() == Some(last) => streak + 1,
        _ => 1,
    }
}

impl Database {
    /// Record a command invocation and award the activity point for it
    pub fn record_activity(&self, user_id: u64, command: &str) -> Result<(), DatabaseError> {
        let at = now();
        self.record_activity_at(user_id, command, at)?;
        self.award_activity(user_id, at.date())
    }

    pub(crate) fn record_activity_at(
        &self,
        user_id: u64,
        command: &str,
        at: NaiveDateTime,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_activities (user_id, command, timestamp) VALUES (?1, ?2, ?3)",
            params![user_id, command, at],
        )?;
        Ok(())
    }

    /// Busiest hours and favourite commands of a user
    pub fn activity_patterns(&self, user_id: u64) -> Result<ActivityPatterns, DatabaseError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT CAST(strftime('%H', timestamp) AS INTEGER) AS hour, COUNT(*) AS activity_count
             FROM user_activities
             WHERE user_id = ?1
             GROUP BY hour
             ORDER BY activity_count DESC, hour ASC
             LIMIT 3",
        )?;
        let peak_hours = stmt
            .query_map([user_id], |row| {
                Ok(HourActivity {
                    hour: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT command, COUNT(*) AS usage_count
             FROM user_activities
             WHERE user_id = ?1
             GROUP BY command
             ORDER BY usage_count DESC, command ASC
             LIMIT 5",
        )?;
        let popular_commands = stmt
            .query_map([user_id], |row| {
                Ok(CommandUsage {
                    command: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ActivityPatterns {
            peak_hours,
            popular_commands,
        })
    }

    /// The single busiest hour of a user, if any activity was recorded
    pub fn peak_hour(&self, user_id: u64) -> Result<Option<u32>, DatabaseError> {
        Ok(self
            .activity_patterns(user_id)?
            .peak_hours
            .first()
            .map(|h| h.hour))
    }

    /// Add one activity point and keep the daily streak up to date
    pub fn award_activity(&self, user_id: u64, today: NaiveDate) -> Result<(), DatabaseError> {
        let conn = self.conn()?;

        let existing: Option<(i64, Option<NaiveDate>)> = conn
            .query_row(
                "SELECT streak_days, last_active FROM user_points WHERE user_id = ?1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let streak = match existing {
            Some((streak, last_active)) => next_streak(last_active, streak, today),
            None => 1,
        };

        conn.execute(
            "INSERT INTO user_points (user_id, activity_points, streak_days, last_active)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                activity_points = activity_points + 1,
                streak_days = excluded.streak_days,
                last_active = excluded.last_active",
            params![user_id, streak, today],
        )?;
        Ok(())
    }

    /// Credit a user for a reaction someone else left on their message
    pub fn award_helpful_reaction(&self, user_id: u64) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_points (user_id, helpful_reactions) VALUES (?1, 1)
             ON CONFLICT(user_id) DO UPDATE SET helpful_reactions = helpful_reactions + 1",
            [user_id],
        )?;
        Ok(())
    }

    /// Top ten users by weighted score
    pub fn user_rankings(&self) -> Result<Vec<UserRanking>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT
                user_id,
                activity_points,
                helpful_reactions,
                streak_days,
                (activity_points * 0.4 + helpful_reactions * 0.4 + streak_days * 0.2) AS total_score
             FROM user_points
             ORDER BY total_score DESC, user_id ASC
             LIMIT 10",
        )?;

        let rankings = stmt
            .query_map([], |row| {
                Ok(UserRanking {
                    user_id: row.get(0)?,
                    activity_points: row.get(1)?,
                    helpful_reactions: row.get(2)?,
                    streak_days: row.get(3)?,
                    total_score: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rankings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    #[test]
    fn test_activity_patterns() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..3 {
            db.record_activity_at(1, "play", at(20)).unwrap();
        }
        db.record_activity_at(1, "hello", at(9)).unwrap();
        db.record_activity_at(1, "play", at(9)).unwrap();
        db.record_activity_at(1, "queue", at(7)).unwrap();
        db.record_activity_at(1, "kick", at(3)).unwrap();
        db.record_activity_at(2, "ban", at(20)).unwrap();

        let patterns = db.activity_patterns(1).unwrap();
        assert_eq!(
            patterns.peak_hours,
            vec![
                HourActivity { hour: 20, count: 3 },
                HourActivity { hour: 9, count: 2 },
                HourActivity { hour: 3, count: 1 },
            ]
        );
        assert_eq!(patterns.popular_commands[0].command, "play");
        assert_eq!(patterns.popular_commands[0].count, 4);
        assert_eq!(patterns.popular_commands.len(), 4);
        assert_eq!(db.peak_hour(1).unwrap(), Some(20));
        assert_eq!(db.peak_hour(99).unwrap(), None);
    }

    #[test]
    fn test_streaks() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(next_streak(None, 0, day), 1);
        assert_eq!(next_streak(Some(day), 4, day), 4);
        assert_eq!(next_streak(day.pred_opt(), 4, day), 5);
        assert_eq!(next_streak(Some(day - chrono::Duration::days(3)), 4, day), 1);
    }

    #[test]
    fn test_rankings_use_weighted_score() {
        let db = Database::open_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        db.award_activity(1, day).unwrap();
        db.award_activity(1, day.succ_opt().unwrap()).unwrap();
        for _ in 0..5 {
            db.award_helpful_reaction(2).unwrap();
        }

        let rankings = db.user_rankings().unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].user_id, 2);
        assert!((rankings[0].total_score - 2.0).abs() < 1e-9);
        assert_eq!(rankings[1].user_id, 1);
        assert_eq!(rankings[1].activity_points, 2);
        assert_eq!(rankings[1].streak_days, 2);
        assert!((rankings[1].total_score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_rankings_limited_to_ten() {
        let db = Database::open_in_memory().unwrap();
        for user in 0..15 {
            db.award_helpful_reaction(user).unwrap();
        }
        assert_eq!(db.user_rankings().unwrap().len(), 10);
    }
}
