//! General commands and listeners: greetings, welcome messages, profanity
//! filtering and keyword reactions

use serenity::all::{
    ChannelId, ChannelType, Context, GuildId, Member, Mentionable, Message, Reaction,
    ReactionType, User,
};
use rustrict::CensorStr;
use tracing::{debug, warn};

use super::{say, CommandResult};
use crate::bot::BotState;

pub const HELLO_REPLY: &str = "Hello! I am the Encourage Bot";
pub const GOODBYE_REPLY: &str = "Goodbye! I hope you have a good rest of the day";
pub const HELP_HINT: &str = "Use command !help_command to get information about the amazing things you can do using The Encourage Bot!";

const WORD_REACTIONS: &[(&str, &str)] = &[
    ("happy", "😊"),
    ("sad", "😢"),
    ("thumbs", "👍"),
    ("love", "❤️"),
    ("angry", "😡"),
    ("wow", "😮"),
    ("laugh", "😂"),
    ("cool", "😎"),
    ("fire", "🔥"),
    ("party", "🎉"),
    ("clap", "👏"),
    ("sleep", "😴"),
    ("scared", "😨"),
    ("pray", "🙏"),
    ("smile", "🙂"),
    ("music", "🎵"),
    ("money", "💰"),
    ("food", "🍕"),
    ("dog", "🐶"),
    ("cat", "🐱"),
    ("heart", "💖"),
    ("star", "⭐"),
    ("thinking", "🤔"),
    ("cry", "😭"),
    ("scream", "😱"),
    ("peace", "✌️"),
    ("fist", "✊"),
    ("victory", "✌️"),
    ("broken", "💔"),
    ("light", "💡"),
    ("gift", "🎁"),
    ("trophy", "🏆"),
    ("sun", "☀️"),
    ("moon", "🌙"),
    ("rain", "🌧️"),
    ("snow", "❄️"),
    ("wind", "💨"),
    ("coffee", "☕"),
    ("beer", "🍺"),
    ("wine", "🍷"),
    ("tea", "🍵"),
    ("cake", "🍰"),
    ("car", "🚗"),
    ("bicycle", "🚴"),
    ("airplane", "✈️"),
    ("rocket", "🚀"),
    ("house", "🏠"),
    ("school", "🏫"),
    ("book", "📚"),
    ("phone", "📱"),
    ("camera", "📷"),
    ("tv", "📺"),
    ("computer", "💻"),
    ("robot", "🤖"),
    ("alien", "👽"),
    ("ghost", "👻"),
    ("devil", "😈"),
    ("angel", "👼"),
    ("skull", "💀"),
    ("poop", "💩"),
    ("diamond", "💎"),
    ("ball", "⚽"),
    ("basketball", "🏀"),
    ("football", "🏈"),
    ("tennis", "🎾"),
    ("golf", "⛳"),
    ("medal", "🥇"),
    ("hourglass", "⏳"),
    ("bomb", "💣"),
    ("target", "🎯"),
    ("question", "❓"),
    ("exclamation", "❗"),
    ("check", "✔️"),
    ("cross", "❌"),
];

/// Whether a message contains profanity, including obfuscated spellings
pub fn has_profanity(content: &str) -> bool {
    content.is_inappropriate()
}

/// Emojis for every keyword contained in the message, in table order
pub fn keyword_reactions(content: &str) -> Vec<&'static str> {
    let lowered = content.to_lowercase();
    let mut emojis: Vec<&'static str> = Vec::new();
    for (word, emoji) in WORD_REACTIONS {
        if lowered.contains(word) && !emojis.contains(emoji) {
            emojis.push(emoji);
        }
    }
    emojis
}

pub fn welcome_message(mention: &str) -> String {
    format!("Welcome to the server, {}!", mention)
}

pub fn farewell_message(mention: &str) -> String {
    format!("Goodbye, {}!", mention)
}

pub fn reaction_announcement(user_name: &str, emoji: &str, added: bool) -> String {
    let verb = if added { "added" } else { "removed" };
    format!("{} {} {}", user_name, verb, emoji)
}

/// Handle !hello
pub async fn hello(ctx: &Context, msg: &Message) -> CommandResult {
    say(ctx, msg.channel_id, HELLO_REPLY).await
}

/// Handle !goodbye
pub async fn goodbye(ctx: &Context, msg: &Message) -> CommandResult {
    say(ctx, msg.channel_id, GOODBYE_REPLY).await
}

/// Find a text channel of a cached guild by name
pub fn find_text_channel(ctx: &Context, guild_id: GuildId, name: &str) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel_id = guild
        .channels
        .values()
        .find(|c| c.kind == ChannelType::Text && c.name == name)
        .map(|c| c.id);
    channel_id
}

/// Welcome a new member with a joke in the welcome channel
pub async fn on_member_join(ctx: &Context, state: &BotState, member: &Member) -> CommandResult {
    let Some(channel_id) = find_text_channel(ctx, member.guild_id, &state.config.welcome_channel)
    else {
        debug!("No '{}' channel in guild {}", state.config.welcome_channel, member.guild_id);
        return Ok(());
    };

    say(ctx, channel_id, welcome_message(&member.mention().to_string())).await?;

    match state.rapidapi.random_joke().await {
        Ok(joke) => say(ctx, channel_id, joke.render()).await?,
        Err(e) => warn!("Could not fetch a joke: {}", e),
    }

    say(ctx, channel_id, HELP_HINT).await
}

pub async fn on_member_remove(
    ctx: &Context,
    state: &BotState,
    guild_id: GuildId,
    user: &User,
) -> CommandResult {
    if let Some(channel_id) = find_text_channel(ctx, guild_id, &state.config.welcome_channel) {
        say(ctx, channel_id, farewell_message(&user.mention().to_string())).await?;
    }
    Ok(())
}

/// Delete profane messages. Returns true when the message was removed.
pub async fn filter_profanity(ctx: &Context, msg: &Message) -> Result<bool, serenity::Error> {
    if !has_profanity(&msg.content) {
        return Ok(false);
    }

    msg.delete(&ctx.http).await?;
    msg.channel_id
        .say(
            &ctx.http,
            format!("{} Please don't use that language.", msg.author.mention()),
        )
        .await?;
    Ok(true)
}

/// React to keywords in a message
pub async fn react_to_keywords(ctx: &Context, msg: &Message) -> CommandResult {
    for emoji in keyword_reactions(&msg.content) {
        msg.react(&ctx.http, ReactionType::Unicode(emoji.to_string()))
            .await?;
    }
    Ok(())
}

/// Announce reactions and credit message authors for reactions from others
pub async fn on_reaction(ctx: &Context, state: &BotState, reaction: &Reaction, added: bool) -> CommandResult {
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    let user = user_id.to_user(&ctx.http).await?;
    if user.bot {
        return Ok(());
    }

    if added {
        if let Some(author_id) = reaction.message_author_id.filter(|a| *a != user_id) {
            state.db.award_helpful_reaction(author_id.get())?;
        }
    }

    let announcement = reaction_announcement(&user.name, &reaction.emoji.to_string(), added);
    say(ctx, reaction.channel_id, announcement).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_replies() {
        assert_eq!(HELLO_REPLY, "Hello! I am the Encourage Bot");
        assert_eq!(GOODBYE_REPLY, "Goodbye! I hope you have a good rest of the day");
        assert_eq!(welcome_message("<@123456789>"), "Welcome to the server, <@123456789>!");
        assert_eq!(farewell_message("<@1>"), "Goodbye, <@1>!");
    }

    #[test]
    fn test_profanity_filter() {
        assert!(has_profanity("what the FUCK"));
        assert!(has_profanity("f u c k"));
        assert!(has_profanity("this is sh1t"));
        assert!(!has_profanity("have a nice day"));
        assert!(!has_profanity("thanks for the help with my code"));
    }

    #[test]
    fn test_keyword_reactions() {
        assert_eq!(keyword_reactions("I am so HAPPY"), vec!["😊"]);
        // Substring matches, like "cat" inside "category"
        assert_eq!(keyword_reactions("category"), vec!["🐱"]);
        // Duplicate emojis are only added once
        assert_eq!(keyword_reactions("peace and victory"), vec!["✌️"]);
        assert!(keyword_reactions("nothing here").is_empty());
    }

    #[test]
    fn test_reaction_announcement() {
        assert_eq!(reaction_announcement("alice", "🔥", true), "alice added 🔥");
        assert_eq!(reaction_announcement("bob", "🔥", false), "bob removed 🔥");
    }
}
