//! Help commands: !help_command and !help_specific

use serenity::all::{Colour, Context, CreateEmbed, CreateEmbedFooter, Message};

use super::{find, groups, CommandInfo, pack_lines, say, send_embed, CommandResult, COMMANDS, EMBED_FIELD_LIMIT};

const AI_FEATURES: &str = "I am an AI-powered bot that:\n\
    • Uses context to provide relevant responses\n\
    • Learns from conversations\n\
    • Provides personalized assistance\n\
    • Maintains conversation history for better understanding";

const OTHER_FEATURES: &str = "I can also:\n\
    • Tell jokes to lighten the mood\n\
    • React to your messages with emojis\n\
    • Filter out profanity\n\
    • Process natural language\n\
    • Understand context and intent\n\
    • And more!";

/// First line of a command's help
fn summary(command: &CommandInfo) -> &'static str {
    command
        .help
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("No description available")
}

/// Overview of every command, one field per group
pub fn help_embed(prefix: &str) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("Bot Commands and Features")
        .description("Here are all the available commands and features:")
        .colour(Colour::BLUE)
        .field("🤖 AI-Powered Assistant", AI_FEATURES, false);

    for group in groups() {
        let lines = COMMANDS
            .iter()
            .filter(|c| c.group == group)
            .map(|c| format!("**{}{}** - {}", prefix, c.name, summary(c)));
        for (i, chunk) in pack_lines(lines, EMBED_FIELD_LIMIT).into_iter().enumerate() {
            let name = if i == 0 {
                group.to_string()
            } else {
                format!("{} (cont.)", group)
            };
            embed = embed.field(name, chunk, false);
        }
    }

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Type {}help_command <command_name> for more details about a specific command.",
            prefix
        )))
        .field("Other Features", OTHER_FEATURES, false)
}

/// Details of one command, `None` when it does not exist
pub fn command_embed(prefix: &str, name: &str) -> Option<CreateEmbed> {
    let command = find(name)?;

    let mut embed = CreateEmbed::new()
        .title(format!("Command: {}", command.name))
        .description(summary(command))
        .colour(Colour::BLUE);
    if !command.aliases.is_empty() {
        embed = embed.field("Aliases", command.aliases.join(", "), false);
    }
    Some(embed.field("Usage", format!("{}{}", prefix, command.name), false))
}

/// Handle !help_command
pub async fn help_command(ctx: &Context, msg: &Message, prefix: &str) -> CommandResult {
    send_embed(ctx, msg.channel_id, help_embed(prefix)).await
}

/// Handle !help_specific [command]
pub async fn help_specific(ctx: &Context, msg: &Message, prefix: &str, name: Option<&str>) -> CommandResult {
    let Some(name) = name else {
        return help_command(ctx, msg, prefix).await;
    };

    let name = name.trim_start_matches(prefix);
    match command_embed(prefix, name) {
        Some(embed) => send_embed(ctx, msg.channel_id, embed).await,
        None => say(ctx, msg.channel_id, format!("Command '{}' not found.", name)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    #[test]
    fn test_help_embed_lists_every_group() {
        let embed = help_embed("!");
        let json = embed_json(&embed);
        assert_eq!(json["title"], "Bot Commands and Features");

        let fields = fields(&embed);
        assert_eq!(fields.first().map(|f| f.0.as_str()), Some("🤖 AI-Powered Assistant"));
        assert_eq!(fields.last().map(|f| f.0.as_str()), Some("Other Features"));
        for group in groups() {
            assert!(field(&fields, group).is_some(), "missing group {}", group);
        }
        assert!(field(&fields, "General")
            .unwrap()
            .contains("**!hello** - Greets the user"));
        assert!(fields.len() <= 25);
        assert!(fields.iter().all(|(_, v)| v.chars().count() <= EMBED_FIELD_LIMIT));
    }

    #[test]
    fn test_command_embed() {
        let embed = command_embed("!", "hello").unwrap();
        assert_eq!(embed_json(&embed)["title"], "Command: hello");
        let fields = fields(&embed);
        assert_eq!(field(&fields, "Usage"), Some("!hello"));
        assert_eq!(field(&fields, "Aliases"), None);

        let embed = command_embed("!", "cmdhelp").unwrap();
        let fields = crate::commands::test_support::fields(&embed);
        assert_eq!(field(&fields, "Aliases"), Some("commands, cmdhelp"));
        assert_eq!(field(&fields, "Usage"), Some("!help_command"));

        assert!(command_embed("!", "does_not_exist").is_none());
    }

    #[test]
    fn test_command_summary() {
        let embed = command_embed("!", "hello").unwrap();
        assert_eq!(embed_json(&embed)["description"], "Greets the user");

        let multi_line = CommandInfo {
            name: "x",
            aliases: &[],
            help: "\n  Short line\nLonger details",
            group: "General",
        };
        assert_eq!(summary(&multi_line), "Short line");
        let empty = CommandInfo { help: "", ..multi_line };
        assert_eq!(summary(&empty), "No description available");
        assert_eq!(
            embed_json(&help_embed("!"))["footer"]["text"],
            "Type !help_command <command_name> for more details about a specific command."
        );
    }
}
