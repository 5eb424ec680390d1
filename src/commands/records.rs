//! Database-backed commands: activity, memory, rankings, reminders,
//! categorization, conversation history and feedback

use chrono::Utc;
use serenity::all::{ChannelId, Colour, Context, CreateEmbed, Message, Permissions, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{
    author_has, parse_user, say, send_embed, truncate, CommandResult, Invocation, EMBED_FIELD_LIMIT,
};
use crate::bot::BotState;
use crate::database::{
    ActivityPatterns, Categorization, ConversationTurn, Database, FeedbackEntry, Reminder,
    ReminderDelay, UserRanking, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_MEMORY,
};

const REMINDER_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const MEMORIES_SHOWN: usize = 5;
const PREVIEW_LENGTH: usize = 100;
/// Leaves room for the mention and "..." within Discord's 2000 characters
const DELIVERY_TEXT_LIMIT: usize = 1900;
/// Discord allows 25 fields per embed
const MAX_LISTED: u32 = 25;

pub fn activity_embed(display_name: &str, patterns: &ActivityPatterns) -> CreateEmbed {
    let hours: Vec<String> = patterns
        .peak_hours
        .iter()
        .map(|h| format!("Hour {}: {} activities", h.hour, h.count))
        .collect();
    let commands: Vec<String> = patterns
        .popular_commands
        .iter()
        .map(|c| format!("{}: used {} times", c.command, c.count))
        .collect();

    CreateEmbed::new()
        .title(format!("Activity Patterns for {}", display_name))
        .colour(Colour::BLUE)
        .field("Peak Activity Hours", or_placeholder(hours.join("\n"), "No data"), false)
        .field("Most Used Commands", or_placeholder(commands.join("\n"), "No data"), false)
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

pub fn memory_embed(memories: &[String]) -> CreateEmbed {
    let latest: Vec<&str> = memories.iter().take(MEMORIES_SHOWN).map(String::as_str).collect();
    CreateEmbed::new()
        .title("Memory Updated")
        .colour(Colour::DARK_GREEN)
        .field(
            "Latest Memories",
            or_placeholder(truncate(&latest.join("\n"), 1020), "No memories stored"),
            false,
        )
}

/// `names` holds the display name for each ranking, in order
pub fn rankings_embed(rankings: &[UserRanking], names: &[String]) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title("User Rankings").colour(Colour::GOLD);
    for (i, (rank, name)) in rankings.iter().zip(names).enumerate() {
        embed = embed.field(
            format!("#{} {}", i + 1, name),
            format!(
                "Score: {:.1}\nActivity: {}\nHelpful: {}\nStreak: {} days",
                rank.total_score, rank.activity_points, rank.helpful_reactions, rank.streak_days
            ),
            true,
        );
    }
    embed
}

pub fn reminder_embed(reminder: &Reminder) -> CreateEmbed {
    CreateEmbed::new()
        .title("Reminder Set")
        .colour(Colour::BLUE)
        .field("Text", truncate(&reminder.text, EMBED_FIELD_LIMIT - 3), false)
        .field(
            "When",
            format!("{} UTC", reminder.scheduled_for.format("%Y-%m-%d %H:%M:%S")),
            true,
        )
        .field("Type", &reminder.context, true)
}

pub fn reminder_delivery(reminder: &Reminder) -> String {
    format!(
        "⏰ <@{}> Reminder: {}",
        reminder.user_id,
        truncate(&reminder.text, DELIVERY_TEXT_LIMIT)
    )
}

pub fn categorization_embed(result: &Categorization) -> CreateEmbed {
    CreateEmbed::new()
        .title("Content Categorization")
        .colour(Colour::PURPLE)
        .field(
            "Categories",
            or_placeholder(result.categories.join("\n"), "No categories found"),
            false,
        )
        .field(
            "Keywords",
            or_placeholder(result.keywords.join(", "), "No keywords extracted"),
            false,
        )
}

pub fn conversations_embed(turns: &[ConversationTurn]) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Recent Conversations")
        .colour(Colour::BLUE);
    for (i, turn) in turns.iter().enumerate() {
        embed = embed.field(
            format!("Conversation {}", i + 1),
            format!(
                "You: {}\nBot: {}",
                truncate(&turn.message, PREVIEW_LENGTH),
                truncate(&turn.bot_response, PREVIEW_LENGTH)
            ),
            false,
        );
    }
    embed
}

pub fn average_rating_embed(average: f64) -> CreateEmbed {
    CreateEmbed::new()
        .title("Average Feedback Rating")
        .description(format!("⭐ {:.2} / 10", average))
        .colour(Colour::GOLD)
}

pub fn feedback_embed(entries: &[FeedbackEntry]) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title("Recent Feedback").colour(Colour::BLUE);
    for entry in entries {
        embed = embed.field(
            format!("User {} (Rating: {}/10)", entry.user_id, entry.rating),
            truncate(&entry.feedback_text, PREVIEW_LENGTH),
            false,
        );
    }
    embed
}

/// Optional count argument; `Err` when present but not a positive number
fn limit_arg(inv: &Invocation<'_>, default: u32) -> Result<u32, ()> {
    match inv.arg(0) {
        None => Ok(default),
        Some(arg) => arg
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_LISTED))
            .ok_or(()),
    }
}

/// Handle !dbstatus
pub async fn dbstatus(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    if !author_has(ctx, msg, Permissions::ADMINISTRATOR) {
        return say(ctx, msg.channel_id, "You don't have permission to use this command!").await;
    }
    let reply = match state.db.ping() {
        Ok(()) => "✅ Database connection successful!".to_string(),
        Err(e) => format!("❌ Database connection failed: {}", e),
    };
    say(ctx, msg.channel_id, reply).await
}

/// Handle !track_activity [@member]
pub async fn track_activity(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let (user_id, name) = match inv.arg(0) {
        None => (
            msg.author.id,
            msg.author_nick(&ctx.http)
                .await
                .unwrap_or_else(|| msg.author.display_name().to_string()),
        ),
        Some(arg) => {
            let member = match (parse_user(arg), msg.guild_id) {
                (Some(user_id), Some(guild_id)) => guild_id.member(ctx, user_id).await.ok(),
                _ => None,
            };
            match member {
                Some(member) => (member.user.id, member.display_name().to_string()),
                None => {
                    let reply = format!("Error tracking activity: Member \"{}\" not found.", arg);
                    return say(ctx, msg.channel_id, reply).await;
                }
            }
        }
    };

    match state.db.activity_patterns(user_id.get()) {
        Ok(patterns) => send_embed(ctx, msg.channel_id, activity_embed(&name, &patterns)).await,
        Err(e) => say(ctx, msg.channel_id, format!("Error tracking activity: {}", e)).await,
    }
}

/// Handle !remember_context text
pub async fn remember_context(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    if inv.rest.is_empty() {
        return say(ctx, msg.channel_id, "Please provide something to remember. Example: `!remember_context This is text`").await;
    }
    match state.db.remember_context(msg.author.id.get(), inv.rest, DEFAULT_MAX_MEMORY) {
        Ok(memories) => send_embed(ctx, msg.channel_id, memory_embed(&memories)).await,
        Err(e) => say(ctx, msg.channel_id, format!("Error storing memory: {}", e)).await,
    }
}

/// Handle !show_rankings
pub async fn show_rankings(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let rankings = match state.db.user_rankings() {
        Ok(rankings) => rankings,
        Err(e) => return say(ctx, msg.channel_id, format!("Error fetching rankings: {}", e)).await,
    };

    let names: Vec<String> = rankings
        .iter()
        .map(|r| {
            ctx.cache
                .user(UserId::new(r.user_id))
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| format!("User {}", r.user_id))
        })
        .collect();
    send_embed(ctx, msg.channel_id, rankings_embed(&rankings, &names)).await
}

/// Handle !set_reminder <urgent|today|tomorrow|week> text
pub async fn set_reminder(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let text = inv.text_after(1);
    let Some(delay_arg) = inv.arg(0).filter(|_| !text.is_empty()) else {
        return say(ctx, msg.channel_id, "Please provide a delay and a reminder. Example: `!set_reminder today I have appointment`").await;
    };
    let Some(delay) = ReminderDelay::from_str(delay_arg) else {
        return say(ctx, msg.channel_id, "Invalid delay! Use: urgent, today, tomorrow, or week").await;
    };

    match state
        .db
        .create_reminder(msg.author.id.get(), msg.channel_id.get(), text, delay)
    {
        Ok(reminder) => {
            info!("Reminder {} scheduled for {}", reminder.id, reminder.scheduled_for);
            send_embed(ctx, msg.channel_id, reminder_embed(&reminder)).await
        }
        Err(e) => say(ctx, msg.channel_id, format!("Error setting reminder: {}", e)).await,
    }
}

/// Handle !categorize_message text
pub async fn categorize_message(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    if inv.rest.is_empty() {
        return say(ctx, msg.channel_id, "Please provide a message to categorize.").await;
    }
    match state.db.categorize_content(inv.rest) {
        Ok(result) => send_embed(ctx, msg.channel_id, categorization_embed(&result)).await,
        Err(e) => say(ctx, msg.channel_id, format!("Error categorizing content: {}", e)).await,
    }
}

/// Handle !clear_context
pub async fn clear_context(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    match state
        .db
        .clear_user_history(msg.author.id.get(), msg.channel_id.get())
    {
        Ok(_) => say(ctx, msg.channel_id, "Your conversation history has been cleared!").await,
        Err(e) => {
            error!("Error clearing history: {}", e);
            say(ctx, msg.channel_id, "Failed to clear conversation history.").await
        }
    }
}

/// Handle !show_context [n]
pub async fn show_context(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let Ok(limit) = limit_arg(inv, DEFAULT_HISTORY_LIMIT) else {
        return say(ctx, msg.channel_id, "Please provide a valid number. Example: `!show_context 10`").await;
    };

    match state
        .db
        .recent_conversations(msg.author.id.get(), msg.channel_id.get(), limit)
    {
        Ok(turns) if turns.is_empty() => say(ctx, msg.channel_id, "No conversation history found.").await,
        Ok(turns) => send_embed(ctx, msg.channel_id, conversations_embed(&turns)).await,
        Err(e) => {
            error!("Error showing history: {}", e);
            say(ctx, msg.channel_id, "Failed to retrieve conversation history.").await
        }
    }
}

/// Handle !avg_rating
pub async fn avg_rating(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    match state.db.average_rating() {
        Ok(Some(average)) => send_embed(ctx, msg.channel_id, average_rating_embed(average)).await,
        Ok(None) => say(ctx, msg.channel_id, "No ratings have been recorded yet.").await,
        Err(e) => say(ctx, msg.channel_id, format!("Error retrieving average rating: {}", e)).await,
    }
}

/// Handle !recent_feedback [n]
pub async fn recent_feedback(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let Ok(limit) = limit_arg(inv, 5) else {
        return say(ctx, msg.channel_id, "Please provide a valid number. Example: `!recent_feedback 10`").await;
    };

    match state.db.recent_feedback(Some(limit)) {
        Ok(entries) if entries.is_empty() => say(ctx, msg.channel_id, "No feedback found.").await,
        Ok(entries) => send_embed(ctx, msg.channel_id, feedback_embed(&entries)).await,
        Err(e) => say(ctx, msg.channel_id, format!("Error retrieving feedback: {}", e)).await,
    }
}

/// Deliver due reminders every minute
pub fn start_reminder_loop(ctx: &Context, db: Arc<Database>) {
    let http = ctx.http.clone();
    tokio::spawn(async move {
        info!("Reminder delivery loop is starting");
        let mut ticker = tokio::time::interval(REMINDER_CHECK_INTERVAL);
        loop {
            ticker.tick().await;
            let due = match db.due_reminders(Utc::now().naive_utc()) {
                Ok(due) => due,
                Err(e) => {
                    error!("Failed to load due reminders: {}", e);
                    continue;
                }
            };

            for reminder in due {
                let channel_id = ChannelId::new(reminder.channel_id);
                if let Err(e) = channel_id.say(&http, reminder_delivery(&reminder)).await {
                    warn!("Failed to deliver reminder {}: {}", reminder.id, e);
                }
                // Marked even when sending failed, so a deleted channel is not retried forever
                if let Err(e) = db.mark_reminder_sent(reminder.id) {
                    error!("Failed to mark reminder {} as sent: {}", reminder.id, e);
                }
            }
        }
    });
}
