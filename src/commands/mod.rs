//! Prefix commands, grouped by feature
//!
//! Messages starting with the configured prefix are parsed into an
//! [`Invocation`] and dispatched by name from [`crate::bot::Handler`].

pub mod embeds;
pub mod general;
pub mod help;
pub mod interactive;
pub mod moderation;
pub mod modals;
pub mod music;
pub mod records;
pub mod status;
pub mod suggestion;

use serenity::all::{
    ChannelId, Context, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, Message, Permissions, RoleId, UserId,
};

/// Result type for every command and interaction handler
pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Embed fields hold at most this many characters
pub const EMBED_FIELD_LIMIT: usize = 1024;

/// Green used by game and suggestion embeds
pub const GREEN: u32 = 0x2ECC71;

/// Whether a message is addressed to the command parser, valid command or not
pub fn has_prefix(content: &str, prefix: &str) -> bool {
    content.trim_start().starts_with(prefix)
}

/// A parsed `!name args...` message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: &'a str,
    pub rest: &'a str,
}

impl<'a> Invocation<'a> {
    /// Parse a message; `None` when it does not start with the prefix
    pub fn parse(content: &'a str, prefix: &str) -> Option<Self> {
        let body = content.trim_start().strip_prefix(prefix)?;
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return None;
        }
        let (name, rest) = match body.find(char::is_whitespace) {
            Some(i) => (&body[..i], body[i..].trim()),
            None => (body, ""),
        };
        Some(Self { name, rest })
    }

    /// Whitespace-separated argument at `index`
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.rest.split_whitespace().nth(index)
    }

    /// Everything after the first `skip` arguments, trimmed
    pub fn text_after(&self, skip: usize) -> &'a str {
        let mut remaining = self.rest.trim_start();
        for _ in 0..skip {
            match remaining.find(char::is_whitespace) {
                Some(i) => remaining = remaining[i..].trim_start(),
                None => return "",
            }
        }
        remaining.trim_end()
    }
}

/// Static description of a command, used for dispatch and help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub help: &'static str,
    pub group: &'static str,
}

const fn cmd(group: &'static str, name: &'static str, help: &'static str) -> CommandInfo {
    CommandInfo {
        name,
        aliases: &[],
        help,
        group,
    }
}

/// Every command the bot understands, in help order
pub const COMMANDS: &[CommandInfo] = &[
    cmd("General", "hello", "Greets the user"),
    cmd("General", "goodbye", "Gives the user a farewell"),
    cmd("Embeds", "create_embed", "Creates an embed by taking input from users"),
    cmd("Embeds", "server_info", "Creates an embed giving information about this server"),
    cmd("Embeds", "random_cat_image", "Creates an embed containing a cute cat image"),
    CommandInfo {
        name: "help_command",
        aliases: &["commands", "cmdhelp"],
        help: "Shows all available commands",
        group: "Help",
    },
    cmd("Help", "help_specific", "Get detailed help for a specific command"),
    cmd("Moderation", "kick", "Kick members"),
    cmd("Moderation", "ban", "Ban members"),
    cmd("Moderation", "unban", "Unban members"),
    cmd("Moderation", "add_role", "Adds a role to a user - example - !add_role @userName Role"),
    cmd("Moderation", "remove_role", "Removes a role from a user - example - !remove_role @userName Role"),
    cmd("Moderation", "roleinfo", "Display information about a role"),
    cmd("Moderation", "rolemembers", "List all members with a specific role"),
    cmd("Interactive", "menu", "Gives role selection menu"),
    cmd("Interactive", "colors", "Gives color selection menu"),
    cmd("Interactive", "game", "Starts a simple button clicking game"),
    cmd("Interactive", "memory", "Starts a memory matching game"),
    cmd("Forms", "feedback", "Opens a feedback form modal"),
    cmd("Forms", "bug_report", "Opens a bug report modal"),
    cmd("Forms", "suggestion", "Opens a suggestion modal"),
    cmd("Music", "join", "Bot joins the voice channel user is in"),
    cmd("Music", "leave", "Bot leave the voice channel."),
    cmd("Music", "play", "Plays the audio of a youtube url - example - !play url"),
    cmd("Music", "volume", "Sets the volume of the bot in the voice channel - example - !volume num(0-100)"),
    cmd("Music", "pause", "Pauses the audio being played by the bot"),
    cmd("Music", "resume", "Resumes the audio being played by the bot"),
    cmd("Music", "stop", "Stops the audio being played by the bot"),
    cmd("Music", "add", "Adds the audio of a youtube url to the queue - example - !add url"),
    cmd("Music", "play_queue", "Plays the audios in the queue"),
    cmd("Music", "play_playlist", "Plays a complete youtube playlist - example - !play_playlist url"),
    cmd("Music", "queue", "Displays the current queue"),
    cmd("Music", "song_info", "Display information about the currently playing song"),
    cmd("Music", "now_playing", "Display the current playback progress"),
    cmd("Status", "server_stats", "Displays the number of members in Bot status"),
    cmd("Status", "random_status", "Displays a random status"),
    cmd(
        "Suggestions",
        "suggest",
        "Create a new suggestion for the server - example - !suggest <suggestion>\n\
         Display all active suggestions and their votes - example - !suggest list\n\
         Clear all suggestions (Admin only) - example - !suggest clear\n\
         Show how to use the suggestion system - example - !suggest help",
    ),
    cmd("Records", "dbstatus", "Check if the database connection is working"),
    cmd("Records", "track_activity", "Track activity patterns for a user - example - !track_activity @User123"),
    cmd("Records", "remember_context", "Store a context in the bot's memory - example - !remember_context This is text"),
    cmd("Records", "show_rankings", "Display user rankings"),
    cmd("Records", "set_reminder", "Set a smart reminder (urgent, today, tomorrow, week) - example - !set_reminder today I have appointment"),
    cmd("Records", "categorize_message", "Categorize a message's content - example - !categorize_message Hello there is a bug in the x command"),
    cmd("Records", "clear_context", "Clear conversation history for the user"),
    cmd("Records", "show_context", "Show recent conversation history - example - !show_context 10"),
    cmd("Records", "avg_rating", "Get the average feedback rating"),
    cmd("Records", "recent_feedback", "Show recent feedback entries - example - !recent_feedback 10"),
];

/// Look a command up by name or alias
pub fn find(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS
        .iter()
        .find(|c| c.name == name || c.aliases.contains(&name))
}

/// Group names in help order, without duplicates
pub fn groups() -> Vec<&'static str> {
    let mut groups: Vec<&'static str> = Vec::new();
    for command in COMMANDS {
        if !groups.contains(&command.group) {
            groups.push(command.group);
        }
    }
    groups
}

/// Parse `<@id>`, `<@!id>` or a raw id
pub fn parse_user(arg: &str) -> Option<UserId> {
    serenity::utils::parse_user_mention(arg).or_else(|| {
        arg.parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(UserId::new)
    })
}

/// Parse `<@&id>` or a raw id
pub fn parse_role(arg: &str) -> Option<RoleId> {
    let trimmed = arg.trim_start_matches("<@&").trim_end_matches('>');
    trimmed
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(RoleId::new)
}

/// Pack lines into strings that fit an embed field
pub fn pack_lines<I, S>(lines: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in lines {
        let line: String = line.as_ref().chars().take(limit).collect();
        if !current.is_empty() && current.chars().count() + line.chars().count() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut text to `max` characters, appending `...` when something was cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// HTTP status code of a failed Discord request
pub fn http_status(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(e) => e.status_code().map(|s| s.as_u16()),
        _ => None,
    }
}

/// Whether a request failed because the bot lacks permissions
pub fn is_forbidden(err: &serenity::Error) -> bool {
    http_status(err) == Some(403)
}

/// Whether the author of a guild message holds `required` (administrators hold everything)
pub fn author_has(ctx: &Context, msg: &Message, required: Permissions) -> bool {
    msg.author_permissions(&ctx.cache)
        .map(|p| p.administrator() || p.contains(required))
        .unwrap_or(false)
}

/// Send a plain text reply in the message's channel
pub async fn say(ctx: &Context, channel_id: ChannelId, content: impl Into<String>) -> CommandResult {
    channel_id.say(&ctx.http, content).await?;
    Ok(())
}

/// Send an embed in the message's channel
pub async fn send_embed(ctx: &Context, channel_id: ChannelId, embed: CreateEmbed) -> CommandResult {
    channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Interaction reply only the clicking user can see
pub fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invocation() {
        let inv = Invocation::parse("!kick <@1> being rude  ", "!").unwrap();
        assert_eq!(inv.name, "kick");
        assert_eq!(inv.arg(0), Some("<@1>"));
        assert_eq!(inv.text_after(1), "being rude");
        assert_eq!(inv.text_after(3), "");

        let inv = Invocation::parse("!hello", "!").unwrap();
        assert_eq!(inv.name, "hello");
        assert_eq!(inv.rest, "");
        assert_eq!(inv.arg(0), None);

        assert!(Invocation::parse("hello", "!").is_none());
        assert!(Invocation::parse("!", "!").is_none());
        assert!(Invocation::parse("! hello", "!").is_none());
        assert_eq!(Invocation::parse("?? queue", "??").map(|i| i.name), None);
        assert_eq!(Invocation::parse("??queue", "??").map(|i| i.name), Some("queue"));
    }

    #[test]
    fn test_prefixed_messages_skip_chat() {
        assert!(Invocation::parse("! hey <@1>", "!").is_none());
        assert!(has_prefix("! hey <@1>", "!"));
        assert!(has_prefix("  !", "!"));
        assert!(!has_prefix("hey <@1>, what is !help?", "!"));
    }

    #[test]
    fn test_text_after_keeps_inner_spacing() {
        let inv = Invocation::parse("!add_role <@1> Very  Cool Role", "!").unwrap();
        assert_eq!(inv.text_after(1), "Very  Cool Role");
    }

    #[test]
    fn test_registry() {
        assert_eq!(find("cmdhelp").map(|c| c.name), Some("help_command"));
        assert_eq!(find("kick").map(|c| c.group), Some("Moderation"));
        assert!(find("nope").is_none());

        let mut names: Vec<&str> = COMMANDS.iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COMMANDS.len());

        let groups = groups();
        assert_eq!(groups.first(), Some(&"General"));
        assert_eq!(groups.last(), Some(&"Records"));
    }

    #[test]
    fn test_parse_mentions() {
        assert_eq!(parse_user("<@123>"), Some(UserId::new(123)));
        assert_eq!(parse_user("<@!123>"), Some(UserId::new(123)));
        assert_eq!(parse_user("123"), Some(UserId::new(123)));
        assert_eq!(parse_user("bob"), None);
        assert_eq!(parse_role("<@&55>"), Some(RoleId::new(55)));
        assert_eq!(parse_role("55"), Some(RoleId::new(55)));
        assert_eq!(parse_role("Admins"), None);
    }

    #[test]
    fn test_pack_lines() {
        let lines = vec!["a".repeat(600), "b".repeat(600), "c".repeat(10)];
        let packed = pack_lines(&lines, EMBED_FIELD_LIMIT);
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[1], format!("{}\n{}", "b".repeat(600), "c".repeat(10)));
        assert!(pack_lines(Vec::<String>::new(), 10).is_empty());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
