//! Bot presence: random rotation, hourly greetings and temporary statuses

use chrono::{Local, Timelike};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use serenity::all::{ActivityData, Context, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{say, CommandResult};

const GREETING_DURATION: Duration = Duration::from_secs(60);
const GREETING_INTERVAL: Duration = Duration::from_secs(3600);
pub const HELLO_DURATION: Duration = Duration::from_secs(30);
pub const TEMP_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
    Competing,
}

use ActivityKind::*;

pub const STATUSES: &[(&str, ActivityKind)] = &[
    ("cool beats", Listening),
    ("chess", Playing),
    ("tutorials", Watching),
    ("Coding bot features", Competing),
    ("GitHub repositories", Watching),
    ("Answering questions", Competing),
    ("Debugging code", Playing),
    ("new tricks", Listening),
    ("Exploring new APIs", Playing),
    ("voice chat", Listening),
    ("documentation", Watching),
    ("Compiling data", Competing),
    ("Optimizing performance", Playing),
    ("Discussing ideas", Watching),
    ("Solving algorithms", Competing),
    ("Testing new features", Playing),
    ("Tracking bugs", Watching),
    ("Chilling music", Listening),
    ("Contributing to open-source", Playing),
    ("Improving error handling", Watching),
    ("meme compilations", Watching),
    ("Review pull requests", Watching),
    ("Refactoring code", Competing),
    ("Running test cases", Playing),
    ("Building a project", Watching),
    ("Exploring new libraries", Listening),
    ("Tuning hyperparameters", Competing),
    ("data structures", Watching),
    ("Planning world domination", Playing),
    ("Syncing databases", Watching),
    ("Teaching other bots", Listening),
    ("Running simulations", Playing),
    ("server health", Watching),
    ("write clean code", Competing),
];

/// A status line; custom statuses have no activity kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub text: String,
    pub kind: Option<ActivityKind>,
}

impl Presence {
    pub fn custom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
        }
    }

    pub fn random() -> Self {
        let (text, kind) = STATUSES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(STATUSES[0]);
        Self {
            text: text.to_string(),
            kind: Some(kind),
        }
    }

    pub fn activity(&self) -> ActivityData {
        let text = self.text.as_str();
        match self.kind {
            None => ActivityData::custom(text),
            Some(Playing) => ActivityData::playing(text),
            Some(Listening) => ActivityData::listening(text),
            Some(Watching) => ActivityData::watching(text),
            Some(Competing) => ActivityData::competing(text),
        }
    }
}

pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        6..=11 => "Good morning!",
        12..=17 => "Good afternoon!",
        _ => "Good evening!",
    }
}

/// What is shown and who set it
///
/// Every change bumps `generation`, so a timed status only reverts when
/// nothing replaced it in the meantime.
#[derive(Debug, Default)]
pub struct StatusState {
    current: Option<Presence>,
    generation: u64,
    greeting: bool,
}

impl StatusState {
    /// Show `presence`; returns the new generation and what it replaced
    pub fn replace(&mut self, presence: Presence, greeting: bool) -> (u64, Option<Presence>) {
        self.generation += 1;
        self.greeting = greeting;
        (self.generation, self.current.replace(presence))
    }

    /// What to show once a timed status set at `generation` expires
    pub fn expire(&mut self, generation: u64, previous: Option<Presence>) -> Option<Presence> {
        if self.generation != generation {
            return None;
        }
        let next = previous.unwrap_or_else(Presence::random);
        self.replace(next.clone(), false);
        Some(next)
    }

    pub fn showing_greeting(&self) -> bool {
        self.greeting
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&Presence> {
        self.current.as_ref()
    }
}

pub struct StatusManager {
    state: Mutex<StatusState>,
    interval: Duration,
}

impl StatusManager {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(StatusState::default()),
            interval,
        }
    }

    fn show(&self, ctx: &Context, presence: Presence) {
        debug!("Status changed to: {}", presence.text);
        ctx.set_activity(Some(presence.activity()));
        self.state.lock().replace(presence, false);
    }

    /// Pick and show a random status
    pub fn randomize(&self, ctx: &Context) -> Presence {
        let presence = Presence::random();
        self.show(ctx, presence.clone());
        presence
    }

    /// Show a custom status for `duration`, then put back what it replaced
    pub fn temporary(self: &Arc<Self>, ctx: &Context, text: String, duration: Duration) {
        let presence = Presence::custom(text);
        ctx.set_activity(Some(presence.activity()));
        let (generation, previous) = self.state.lock().replace(presence, false);

        let manager = Arc::clone(self);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let next = manager.state.lock().expire(generation, previous);
            if let Some(next) = next {
                ctx.set_activity(Some(next.activity()));
            }
        });
    }

    /// Start the rotation and greeting loops
    pub fn start(self: &Arc<Self>, ctx: &Context) {
        let manager = Arc::clone(self);
        let rotation_ctx = ctx.clone();
        tokio::spawn(async move {
            info!("Status change loop is starting");
            let mut ticker = tokio::time::interval(manager.interval);
            loop {
                ticker.tick().await;
                if !manager.state.lock().showing_greeting() {
                    manager.randomize(&rotation_ctx);
                }
            }
        });

        let manager = Arc::clone(self);
        let greeting_ctx = ctx.clone();
        tokio::spawn(async move {
            info!("Time-based status loop is starting");
            let mut ticker = tokio::time::interval(GREETING_INTERVAL);
            loop {
                ticker.tick().await;
                let greeting = Presence::custom(greeting_for_hour(Local::now().hour()));
                info!("Time-based status updated to: {}", greeting.text);
                greeting_ctx.set_activity(Some(greeting.activity()));
                let (generation, _) = manager.state.lock().replace(greeting, true);

                tokio::time::sleep(GREETING_DURATION).await;
                let next = manager.state.lock().expire(generation, None);
                if let Some(next) = next {
                    greeting_ctx.set_activity(Some(next.activity()));
                }
            }
        });
    }
}

/// Handle !server_stats
pub async fn server_stats(ctx: &Context, msg: &Message, status: &Arc<StatusManager>) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let members = ctx
        .cache
        .guild(guild_id)
        .map(|g| g.member_count)
        .ok_or("Server is not cached yet.")?;
    status.temporary(ctx, format!("{} members", members), TEMP_DURATION);
    say(ctx, msg.channel_id, format!("Current server stats: {} members", members)).await
}

/// Handle !random_status
pub async fn random_status(ctx: &Context, msg: &Message, status: &StatusManager) -> CommandResult {
    let presence = status.randomize(ctx);
    say(ctx, msg.channel_id, format!("Changed status to: {}", presence.text)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_list() {
        assert_eq!(STATUSES.len(), 34);
        let random = Presence::random();
        assert!(STATUSES.iter().any(|(text, kind)| *text == random.text && Some(*kind) == random.kind));
    }

    #[test]
    fn test_greeting_for_hour() {
        assert_eq!(greeting_for_hour(6), "Good morning!");
        assert_eq!(greeting_for_hour(11), "Good morning!");
        assert_eq!(greeting_for_hour(12), "Good afternoon!");
        assert_eq!(greeting_for_hour(17), "Good afternoon!");
        assert_eq!(greeting_for_hour(18), "Good evening!");
        assert_eq!(greeting_for_hour(3), "Good evening!");
    }

    #[test]
    fn test_temporary_status_reverts() {
        let mut state = StatusState::default();
        let chess = Presence {
            text: "chess".to_string(),
            kind: Some(Playing),
        };
        state.replace(chess.clone(), false);

        let (generation, previous) = state.replace(Presence::custom("Welcoming bob"), false);
        assert_eq!(previous.as_ref(), Some(&chess));
        assert_eq!(state.expire(generation, previous), Some(chess.clone()));
        assert_eq!(state.current(), Some(&chess));
    }

    #[test]
    fn test_replaced_status_is_kept() {
        let mut state = StatusState::default();
        let (generation, previous) = state.replace(Presence::custom("Saying hello to bob"), false);
        state.replace(Presence::custom("42 members"), false);

        assert_eq!(state.expire(generation, previous), None);
        assert_eq!(state.current().map(|p| p.text.as_str()), Some("42 members"));
    }

    #[test]
    fn test_greeting_blocks_rotation_until_expired() {
        let mut state = StatusState::default();
        let (generation, _) = state.replace(Presence::custom("Good morning!"), true);
        assert!(state.showing_greeting());

        let next = state.expire(generation, None).unwrap();
        assert!(next.kind.is_some());
        assert!(!state.showing_greeting());
    }
}
