//! Suggestion board: !suggest with up/down vote buttons

use dashmap::DashMap;
use serenity::all::{
    ButtonStyle, ChannelId, Colour, ComponentInteraction, Context, CreateActionRow, CreateButton,
    CreateEmbed, CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, Message, MessageId, Permissions, Timestamp, UserId,
};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::embeds::EmbedAuthor;
use super::{author_has, http_status, say, send_embed, truncate, CommandResult, Invocation};

pub const UPVOTE_ID: &str = "upvote";
pub const DOWNVOTE_ID: &str = "downvote";

const PREVIEW_LENGTH: usize = 100;
const MAX_LISTED: usize = 25;
const MISSING_TEXT: &str = "Please provide a suggestion! Example: `!suggest Add a music channel`";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn from_button(custom_id: &str) -> Option<Self> {
        match custom_id {
            UPVOTE_ID => Some(Vote::Up),
            DOWNVOTE_ID => Some(Vote::Down),
            _ => None,
        }
    }
}

/// Voters of a single suggestion
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub channel_id: ChannelId,
    up: HashSet<UserId>,
    down: HashSet<UserId>,
}

impl Suggestion {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            up: HashSet::new(),
            down: HashSet::new(),
        }
    }

    /// Toggle the user's vote, dropping any vote the other way
    pub fn vote(&mut self, user: UserId, vote: Vote) {
        let (mine, other) = match vote {
            Vote::Up => (&mut self.up, &mut self.down),
            Vote::Down => (&mut self.down, &mut self.up),
        };
        other.remove(&user);
        if !mine.remove(&user) {
            mine.insert(user);
        }
    }

    /// (upvotes, downvotes)
    pub fn counts(&self) -> (usize, usize) {
        (self.up.len(), self.down.len())
    }
}

/// Every suggestion posted since startup, keyed by message
#[derive(Default)]
pub struct SuggestionBoard {
    suggestions: DashMap<MessageId, Suggestion>,
}

impl SuggestionBoard {
    pub fn add(&self, message_id: MessageId, channel_id: ChannelId) {
        self.suggestions.insert(message_id, Suggestion::new(channel_id));
    }

    pub fn vote(&self, message_id: MessageId, channel_id: ChannelId, user: UserId, vote: Vote) -> (usize, usize) {
        let mut entry = self
            .suggestions
            .entry(message_id)
            .or_insert_with(|| Suggestion::new(channel_id));
        entry.vote(user, vote);
        entry.counts()
    }

    /// Suggestions in posting order
    pub fn snapshot(&self) -> Vec<(MessageId, Suggestion)> {
        let mut all: Vec<(MessageId, Suggestion)> = self
            .suggestions
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn remove(&self, message_id: MessageId) {
        self.suggestions.remove(&message_id);
    }

    pub fn clear(&self) {
        self.suggestions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

pub fn vote_footer(up: usize, down: usize) -> String {
    format!("👍 {} | 👎 {}", up, down)
}

pub fn suggestion_embed(text: &str, author: &EmbedAuthor) -> CreateEmbed {
    CreateEmbed::new()
        .title("Suggestion")
        .description(text)
        .colour(Colour::BLUE)
        .timestamp(Timestamp::now())
        .author(author.build())
        .footer(CreateEmbedFooter::new(vote_footer(0, 0)))
}

fn vote_buttons() -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(UPVOTE_ID).emoji('👍').style(ButtonStyle::Secondary),
        CreateButton::new(DOWNVOTE_ID).emoji('👎').style(ButtonStyle::Secondary),
    ])]
}

/// One `!suggest list` line: (field name, field value)
pub fn list_entry(id: MessageId, text: &str, up: usize, down: usize) -> (String, String) {
    (
        format!("ID: {}", id),
        format!(
            "**Suggestion:** {}\n**Votes:** {}",
            truncate(text, PREVIEW_LENGTH),
            vote_footer(up, down)
        ),
    )
}

pub fn help_embed(is_admin: bool) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Suggestion System Help")
        .colour(Colour::BLUE)
        .description("Complete guide to using the suggestion system")
        .field(
            "Create a Suggestion",
            "```!suggest <your suggestion>```\nExample: !suggest Add a music channel",
            false,
        )
        .field(
            "List Suggestions",
            "```!suggest list```\nShows all active suggestions and votes.",
            false,
        )
        .field(
            "Voting",
            "• Click 👍 to upvote or 👎 to downvote\n• One vote per person\n• Can change your vote anytime",
            false,
        );
    if is_admin {
        embed.field(
            "Admin Commands",
            "```!suggest clear```\nRemoves all suggestions and votes",
            false,
        )
    } else {
        embed
    }
}

/// Handle !suggest and its list, clear and help subcommands
pub async fn suggest(ctx: &Context, msg: &Message, inv: &Invocation<'_>, board: &SuggestionBoard) -> CommandResult {
    match inv.arg(0) {
        None => say(ctx, msg.channel_id, MISSING_TEXT).await,
        Some("list") => list(ctx, msg, board).await,
        Some("clear") => {
            if !author_has(ctx, msg, Permissions::ADMINISTRATOR) {
                return say(ctx, msg.channel_id, "You don't have permission to use this command!").await;
            }
            board.clear();
            say(ctx, msg.channel_id, "All suggestions have been cleared!").await
        }
        Some("help") => {
            let is_admin = author_has(ctx, msg, Permissions::ADMINISTRATOR);
            send_embed(ctx, msg.channel_id, help_embed(is_admin)).await
        }
        Some(_) => {
            let embed = suggestion_embed(inv.rest, &EmbedAuthor::of(msg));
            let sent = msg
                .channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed).components(vote_buttons()))
                .await?;
            board.add(sent.id, sent.channel_id);
            debug!("Suggestion {} posted by {}", sent.id, msg.author.name);
            Ok(())
        }
    }
}

async fn list(ctx: &Context, msg: &Message, board: &SuggestionBoard) -> CommandResult {
    if board.is_empty() {
        return say(ctx, msg.channel_id, "No active suggestions!").await;
    }

    let mut embed = CreateEmbed::new()
        .title("Active Suggestions")
        .colour(Colour::BLUE);
    let mut listed = 0;
    for (id, suggestion) in board.snapshot() {
        let message = match suggestion.channel_id.message(&ctx.http, id).await {
            Ok(message) => message,
            Err(e) if http_status(&e) == Some(404) => {
                board.remove(id);
                continue;
            }
            Err(e) => {
                warn!("Could not fetch suggestion {}: {}", id, e);
                continue;
            }
        };
        if listed == MAX_LISTED {
            continue;
        }
        let text = message
            .embeds
            .first()
            .and_then(|e| e.description.clone())
            .unwrap_or_default();
        let (up, down) = suggestion.counts();
        let (name, value) = list_entry(id, &text, up, down);
        embed = embed.field(name, value, false);
        listed += 1;
    }

    if board.is_empty() {
        return say(ctx, msg.channel_id, "No active suggestions!").await;
    }
    send_embed(ctx, msg.channel_id, embed).await
}

/// Click on a vote button
pub async fn vote_button(
    ctx: &Context,
    interaction: &ComponentInteraction,
    board: &SuggestionBoard,
    vote: Vote,
) -> CommandResult {
    let message = &interaction.message;
    let (up, down) = board.vote(message.id, message.channel_id, interaction.user.id, vote);

    let Some(embed) = message.embeds.first() else {
        return Ok(interaction
            .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
            .await?);
    };
    let embed = CreateEmbed::from(embed.clone()).footer(CreateEmbedFooter::new(vote_footer(up, down)));
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::UpdateMessage(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    #[test]
    fn test_votes_toggle_and_switch() {
        let mut s = Suggestion::new(ChannelId::new(1));
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        s.vote(alice, Vote::Up);
        s.vote(bob, Vote::Up);
        assert_eq!(s.counts(), (2, 0));

        // Voting the same way again withdraws the vote
        s.vote(alice, Vote::Up);
        assert_eq!(s.counts(), (1, 0));

        // Switching sides removes the old vote
        s.vote(bob, Vote::Down);
        assert_eq!(s.counts(), (0, 1));
        s.vote(bob, Vote::Down);
        assert_eq!(s.counts(), (0, 0));
    }

    #[test]
    fn test_board_creates_missing_entries() {
        let board = SuggestionBoard::default();
        assert!(board.is_empty());

        let counts = board.vote(MessageId::new(9), ChannelId::new(1), UserId::new(1), Vote::Down);
        assert_eq!(counts, (0, 1));

        board.add(MessageId::new(3), ChannelId::new(1));
        let ids: Vec<MessageId> = board.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![MessageId::new(3), MessageId::new(9)]);

        board.remove(MessageId::new(9));
        board.clear();
        assert!(board.is_empty());
    }

    #[test]
    fn test_list_entry() {
        let (name, value) = list_entry(MessageId::new(42), &"x".repeat(150), 3, 1);
        assert_eq!(name, "ID: 42");
        assert_eq!(
            value,
            format!("**Suggestion:** {}...\n**Votes:** 👍 3 | 👎 1", "x".repeat(100))
        );

        let (_, value) = list_entry(MessageId::new(1), "short", 0, 0);
        assert_eq!(value, "**Suggestion:** short\n**Votes:** 👍 0 | 👎 0");
    }

    #[test]
    fn test_suggestion_embed() {
        let author = EmbedAuthor {
            name: "alice".to_string(),
            icon_url: "https://cdn.discordapp.com/embed/avatars/0.png".to_string(),
        };
        let json = embed_json(&suggestion_embed("Add a music channel", &author));
        assert_eq!(json["title"], "Suggestion");
        assert_eq!(json["description"], "Add a music channel");
        assert_eq!(json["footer"]["text"], "👍 0 | 👎 0");
        assert_eq!(json["author"]["name"], "alice");
    }

    #[test]
    fn test_help_embed_admin_section() {
        assert_eq!(field(&fields(&help_embed(false)), "Admin Commands"), None);
        assert!(field(&fields(&help_embed(true)), "Admin Commands").is_some());
    }
}
