//! Embed commands: !create_embed, !server_info, !random_cat_image

use serenity::all::{
    Context, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Message, MessageCollector,
};
use std::time::Duration;
use tracing::warn;

use super::{say, send_embed, CommandResult};
use crate::bot::BotState;
use crate::rapidapi::random_colour;

pub const EMBED_COLOUR: u32 = 0xDA8359;
pub const THUMBNAIL_URL: &str = "https://getwallpapers.com/wallpaper/full/d/b/f/858360-free-scenery-images-wallpapers-1920x1080-for-4k-monitor.jpg";

const REPLY_TIMEOUT: Duration = Duration::from_secs(60);
const TOO_SLOW: &str = "You took too long to respond. Please try again.";
const MAX_FIELDS: usize = 25;

/// Author shown at the top of generated embeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: String,
}

impl EmbedAuthor {
    pub fn of(msg: &Message) -> Self {
        let name = msg
            .member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .unwrap_or_else(|| msg.author.display_name().to_string());
        Self {
            name,
            icon_url: msg.author.face(),
        }
    }

    pub fn build(&self) -> CreateEmbedAuthor {
        CreateEmbedAuthor::new(&self.name).icon_url(&self.icon_url)
    }
}

/// Everything collected by the !create_embed prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedDraft {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub fields: Vec<(String, String)>,
    pub author: EmbedAuthor,
}

impl EmbedDraft {
    pub fn build(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new()
            .title(&self.title)
            .colour(EMBED_COLOUR)
            .author(self.author.build())
            .thumbnail(THUMBNAIL_URL)
            .footer(CreateEmbedFooter::new(
                "This embed was created dynamically based on user input",
            ));
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        if let Some(url) = &self.url {
            embed = embed.url(url);
        }
        for (name, value) in &self.fields {
            embed = embed.field(name, value, true);
        }
        embed
    }
}

/// Interpret the URL answer: `NULL` (any case) or anything that is not a web URL means none
pub fn parse_url_answer(answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("null") {
        return None;
    }
    (answer.starts_with("http://") || answer.starts_with("https://")).then(|| answer.to_string())
}

/// Interpret the field count answer; negative counts mean no fields
pub fn parse_field_count(answer: &str) -> Option<usize> {
    answer
        .trim()
        .parse::<i64>()
        .ok()
        .map(|n| usize::try_from(n).unwrap_or(0))
}

/// Ask a question and wait for the author's next message in the channel
async fn ask(ctx: &Context, msg: &Message, question: &str) -> Result<Option<String>, serenity::Error> {
    msg.channel_id.say(&ctx.http, question).await?;
    let reply = MessageCollector::new(ctx)
        .author_id(msg.author.id)
        .channel_id(msg.channel_id)
        .timeout(REPLY_TIMEOUT)
        .await;
    Ok(reply.map(|m| m.content))
}

/// Handle !create_embed
pub async fn create_embed(ctx: &Context, msg: &Message) -> CommandResult {
    let Some(title) = ask(ctx, msg, "Please provide a title for the embed:").await? else {
        return say(ctx, msg.channel_id, TOO_SLOW).await;
    };

    let description = ask(ctx, msg, "Please provide a description for the embed:").await?;
    if description.is_none() {
        say(ctx, msg.channel_id, TOO_SLOW).await?;
    }

    let url = ask(
        ctx,
        msg,
        "Please provide a URL for the embed (or type 'NULL' for no URL):",
    )
    .await?
    .and_then(|answer| parse_url_answer(&answer));

    let field_count = match ask(ctx, msg, "Give the number of fields you want to add to the embed").await? {
        None => {
            say(ctx, msg.channel_id, "You took too long to respond.").await?;
            0
        }
        Some(answer) => match parse_field_count(&answer) {
            Some(n) if n > MAX_FIELDS => {
                return say(
                    ctx,
                    msg.channel_id,
                    format!("An embed can have at most {} fields.", MAX_FIELDS),
                )
                .await;
            }
            Some(n) => n,
            None => {
                return say(
                    ctx,
                    msg.channel_id,
                    "That's not a valid number. Please enter an integer.",
                )
                .await;
            }
        },
    };

    let mut fields = Vec::with_capacity(field_count);
    for i in 0..field_count {
        let question = format!("Please provide a field name for field {}:", i + 1);
        let Some(name) = ask(ctx, msg, &question).await? else {
            return say(ctx, msg.channel_id, TOO_SLOW).await;
        };

        let question = format!("Please provide a value for the field '{}':", name);
        let Some(value) = ask(ctx, msg, &question).await? else {
            return say(ctx, msg.channel_id, TOO_SLOW).await;
        };

        fields.push((name, value));
    }

    let draft = EmbedDraft {
        title,
        description,
        url,
        fields,
        author: EmbedAuthor::of(msg),
    };
    send_embed(ctx, msg.channel_id, draft.build()).await
}

/// Data shown by !server_info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_name: String,
    pub member_count: u64,
    pub channel_name: String,
    pub current_time: String,
    pub author: EmbedAuthor,
}

pub fn server_info_embed(info: &ServerInfo) -> CreateEmbed {
    CreateEmbed::new()
        .title("Server Info")
        .description(format!("Current time: {}", info.current_time))
        .colour(EMBED_COLOUR)
        .author(info.author.build())
        .field("Server", &info.server_name, true)
        .field("Member Count", info.member_count.to_string(), true)
        .field("Channel", &info.channel_name, true)
        .footer(CreateEmbedFooter::new("Data fetched in real-time"))
}

/// Handle !server_info
pub async fn server_info(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;

    let info = {
        let guild = ctx.cache.guild(guild_id).ok_or("Server is not cached yet.")?;
        ServerInfo {
            server_name: guild.name.clone(),
            member_count: guild.member_count,
            channel_name: guild
                .channels
                .get(&msg.channel_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            current_time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            author: EmbedAuthor::of(msg),
        }
    };

    send_embed(ctx, msg.channel_id, server_info_embed(&info)).await
}

pub fn cat_embed(image_url: &str, colour: u32) -> CreateEmbed {
    CreateEmbed::new()
        .title("Random Cat Picture")
        .description("Here's a cute cat for you!")
        .colour(colour)
        .image(image_url)
        .footer(CreateEmbedFooter::new("Powered by random-cat-picture API"))
}

/// Handle !random_cat_image
pub async fn random_cat_image(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    match state.rapidapi.random_cat().await {
        Ok(url) => send_embed(ctx, msg.channel_id, cat_embed(&url, random_colour())).await,
        Err(e) => {
            warn!("Cat picture request failed: {}", e);
            say(
                ctx,
                msg.channel_id,
                "Sorry, I couldn't fetch a cat picture at the moment.",
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    fn author() -> EmbedAuthor {
        EmbedAuthor {
            name: "Tester".to_string(),
            icon_url: "https://cdn.discordapp.com/embed/avatars/0.png".to_string(),
        }
    }

    #[test]
    fn test_server_info_embed() {
        let embed = server_info_embed(&ServerInfo {
            server_name: "Test Server".to_string(),
            member_count: 100,
            channel_name: "test-channel".to_string(),
            current_time: "2024-01-01 12:00:00".to_string(),
            author: author(),
        });

        let json = embed_json(&embed);
        assert_eq!(json["title"], "Server Info");
        assert_eq!(json["description"], "Current time: 2024-01-01 12:00:00");

        let fields = fields(&embed);
        assert_eq!(field(&fields, "Server"), Some("Test Server"));
        assert_eq!(field(&fields, "Member Count"), Some("100"));
        assert_eq!(field(&fields, "Channel"), Some("test-channel"));
    }

    #[test]
    fn test_draft_embed() {
        let draft = EmbedDraft {
            title: "Title".to_string(),
            description: None,
            url: Some("https://example.com".to_string()),
            fields: vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())],
            author: author(),
        };
        let embed = draft.build();
        let json = embed_json(&embed);
        assert_eq!(json["title"], "Title");
        assert_eq!(json["url"], "https://example.com");
        assert_eq!(json["color"], EMBED_COLOUR);
        assert_eq!(json["fields"][1]["inline"], true);
        assert_eq!(fields(&embed).len(), 2);
    }

    #[test]
    fn test_answers() {
        assert_eq!(parse_url_answer("NULL"), None);
        assert_eq!(parse_url_answer("null"), None);
        assert_eq!(parse_url_answer("not a url"), None);
        assert_eq!(
            parse_url_answer(" https://example.com "),
            Some("https://example.com".to_string())
        );

        assert_eq!(parse_field_count("3"), Some(3));
        assert_eq!(parse_field_count("-2"), Some(0));
        assert_eq!(parse_field_count("three"), None);
    }

    #[test]
    fn test_cat_embed() {
        let json = embed_json(&cat_embed("https://cats.example/1.jpg", 0x123456));
        assert_eq!(json["title"], "Random Cat Picture");
        assert_eq!(json["image"]["url"], "https://cats.example/1.jpg");
        assert_eq!(json["color"], 0x123456);
    }
}
