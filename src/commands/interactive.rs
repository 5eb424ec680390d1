//! Interactive components: role menu, colour buttons, click game and memory game
//!
//! Widgets are plain state keyed by the id of the message carrying them.
//! Component interactions are routed here by `custom_id` from the handler.

use dashmap::DashMap;
use rand::seq::SliceRandom;
use serenity::all::{
    ButtonStyle, Colour, ComponentInteraction, ComponentInteractionDataKind, Context,
    CreateActionRow, CreateButton, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage,
    CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, EditInteractionResponse,
    GuildId, Mentionable, Message, MessageId, RoleId, UserId,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ephemeral, is_forbidden, CommandResult, GREEN};

pub const ROLE_SELECT_ID: &str = "role_select";
pub const CLICK_BUTTON_ID: &str = "click_button";
pub const MEMORY_PREFIX: &str = "memory_";

const COLORS_TIMEOUT: Duration = Duration::from_secs(60);
const GAME_TIMEOUT: Duration = Duration::from_secs(180);
const MEMORY_TIMEOUT: Duration = Duration::from_secs(300);
const MISMATCH_DELAY: Duration = Duration::from_secs(1);
const EXPIRED: &str = "This interaction has expired.";

/// (label, description, emoji) of the self-assignable roles
const ROLE_OPTIONS: &[(&str, &str, char)] = &[
    ("Gamer", "Access to gaming channels", '🎮'),
    ("Artist", "Access to art channels", '🎨'),
    ("Musician", "Access to music channels", '🎵'),
    ("Developer", "Access to coding channels", '💻'),
];

/// Colour buttons: (custom_id, role name, reply)
const COLOR_BUTTONS: &[(&str, &str, &str)] = &[
    ("red_button", "Red", "🔴 Red color selected!"),
    ("green_button", "Green", "💚 Green color selected!"),
    ("blue_button", "Blue", "💙 Blue color selected!"),
];

pub fn is_color_button(custom_id: &str) -> bool {
    COLOR_BUTTONS.iter().any(|(id, _, _)| *id == custom_id)
}

/// State attached to messages until they sit idle for too long
struct WidgetEntry<T> {
    expires: Instant,
    ttl: Duration,
    value: T,
}

pub struct WidgetMap<T> {
    entries: DashMap<MessageId, WidgetEntry<T>>,
}

impl<T> Default for WidgetMap<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> WidgetMap<T> {
    pub fn insert(&self, id: MessageId, value: T, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires > now);
        self.entries.insert(
            id,
            WidgetEntry {
                expires: now + ttl,
                ttl,
                value,
            },
        );
    }

    /// Run `f` on a live entry and restart its timeout; `None` when it is missing or expired
    pub fn with<R>(&self, id: MessageId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut entry = self.entries.get_mut(&id)?;
        let now = Instant::now();
        if entry.expires <= now {
            drop(entry);
            self.entries.remove(&id);
            return None;
        }
        entry.expires = now + entry.ttl;
        Some(f(&mut entry.value))
    }
}

/// Every widget currently listening for clicks
#[derive(Default)]
pub struct Widgets {
    pub colors: WidgetMap<()>,
    pub clicks: WidgetMap<ClickGame>,
    pub memory: WidgetMap<MemoryGame>,
    pub forms: WidgetMap<()>,
}

/// Click counter race: first player to ten clicks wins
#[derive(Debug, Default)]
pub struct ClickGame {
    players: HashMap<UserId, u32>,
    over: bool,
}

pub const CLICKS_TO_WIN: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Score(u32),
    Won(u32),
    Finished,
}

impl ClickGame {
    pub fn click(&mut self, player: UserId) -> ClickOutcome {
        if self.over {
            return ClickOutcome::Finished;
        }
        let score = self.players.entry(player).or_insert(0);
        *score += 1;
        if *score >= CLICKS_TO_WIN {
            self.over = true;
            ClickOutcome::Won(*score)
        } else {
            ClickOutcome::Score(*score)
        }
    }

    #[cfg(test)]
    pub fn is_over(&self) -> bool {
        self.over
    }
}

fn click_components(over: bool) -> Vec<CreateActionRow> {
    let label = if over { "Game Over!" } else { "Click me!" };
    vec![CreateActionRow::Buttons(vec![CreateButton::new(CLICK_BUTTON_ID)
        .label(label)
        .style(ButtonStyle::Primary)
        .disabled(over)])]
}

pub const MEMORY_EMOJIS: [&str; 8] = ["🎮", "🎨", "🎵", "💻", "🎲", "🎭", "📚", "⚽"];
pub const MEMORY_CELLS: usize = 16;
const HIDDEN_LABEL: &str = "❔";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Hidden,
    Picked,
    Matched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMove {
    NotYourGame,
    Ignored,
    Revealed,
    Matched { won: bool },
    Mismatch { first: usize, second: usize },
}

/// Pair-matching game on a 4x4 grid, owned by whoever clicks first
#[derive(Debug, Clone)]
pub struct MemoryGame {
    layout: [&'static str; MEMORY_CELLS],
    cells: [Cell; MEMORY_CELLS],
    first_pick: Option<usize>,
    matches: usize,
    can_pick: bool,
    player: Option<UserId>,
}

impl MemoryGame {
    pub fn new() -> Self {
        let mut layout = [""; MEMORY_CELLS];
        for (i, slot) in layout.iter_mut().enumerate() {
            *slot = MEMORY_EMOJIS[i % MEMORY_EMOJIS.len()];
        }
        layout.shuffle(&mut rand::rng());
        Self::with_layout(layout)
    }

    pub fn with_layout(layout: [&'static str; MEMORY_CELLS]) -> Self {
        Self {
            layout,
            cells: [Cell::Hidden; MEMORY_CELLS],
            first_pick: None,
            matches: 0,
            can_pick: true,
            player: None,
        }
    }

    pub fn pick(&mut self, user: UserId, index: usize) -> MemoryMove {
        if *self.player.get_or_insert(user) != user {
            return MemoryMove::NotYourGame;
        }
        if !self.can_pick || index >= MEMORY_CELLS || self.cells[index] != Cell::Hidden {
            return MemoryMove::Ignored;
        }

        let Some(first) = self.first_pick.take() else {
            self.cells[index] = Cell::Picked;
            self.first_pick = Some(index);
            return MemoryMove::Revealed;
        };

        if self.layout[first] == self.layout[index] {
            self.cells[first] = Cell::Matched;
            self.cells[index] = Cell::Matched;
            self.matches += 1;
            MemoryMove::Matched {
                won: self.is_won(),
            }
        } else {
            self.cells[index] = Cell::Picked;
            self.can_pick = false;
            MemoryMove::Mismatch {
                first,
                second: index,
            }
        }
    }

    /// Turn a mismatched pair face down again
    pub fn hide(&mut self, first: usize, second: usize) {
        for i in [first, second] {
            if self.cells[i] == Cell::Picked {
                self.cells[i] = Cell::Hidden;
            }
        }
        self.can_pick = true;
    }

    pub fn is_won(&self) -> bool {
        self.matches == MEMORY_EMOJIS.len()
    }

    #[cfg(test)]
    pub fn cell(&self, index: usize) -> Cell {
        self.cells[index]
    }

    pub fn components(&self) -> Vec<CreateActionRow> {
        let won = self.is_won();
        (0..4)
            .map(|row| {
                let buttons = (row * 4..row * 4 + 4)
                    .map(|i| {
                        let (label, style) = match self.cells[i] {
                            Cell::Hidden => (HIDDEN_LABEL, ButtonStyle::Secondary),
                            Cell::Picked => (self.layout[i], ButtonStyle::Primary),
                            Cell::Matched => (self.layout[i], ButtonStyle::Success),
                        };
                        CreateButton::new(format!("{}{}", MEMORY_PREFIX, i))
                            .label(label)
                            .style(style)
                            .disabled(won)
                    })
                    .collect();
                CreateActionRow::Buttons(buttons)
            })
            .collect()
    }
}

impl Default for MemoryGame {
    fn default() -> Self {
        Self::new()
    }
}

pub fn role_menu() -> (CreateEmbed, Vec<CreateActionRow>) {
    let options = ROLE_OPTIONS
        .iter()
        .map(|(label, description, emoji)| {
            CreateSelectMenuOption::new(*label, *label)
                .description(*description)
                .emoji(*emoji)
        })
        .collect();
    let menu = CreateSelectMenu::new(ROLE_SELECT_ID, CreateSelectMenuKind::String { options })
        .placeholder("Choose your roles...")
        .min_values(0)
        .max_values(ROLE_OPTIONS.len() as u8);

    let embed = CreateEmbed::new()
        .title("Role Selection Menu")
        .description("Select your roles below to access different channels!")
        .colour(Colour::BLUE);
    (embed, vec![CreateActionRow::SelectMenu(menu)])
}

pub fn color_picker() -> (CreateEmbed, Vec<CreateActionRow>) {
    let styles = [ButtonStyle::Danger, ButtonStyle::Success, ButtonStyle::Primary];
    let buttons = COLOR_BUTTONS
        .iter()
        .zip(styles)
        .map(|((id, label, _), style)| CreateButton::new(*id).label(*label).style(style))
        .collect();

    let embed = CreateEmbed::new()
        .title("Color Selection")
        .description("Choose your name color:")
        .colour(Colour::BLUE);
    (embed, vec![CreateActionRow::Buttons(buttons)])
}

async fn send_widget(
    ctx: &Context,
    msg: &Message,
    (embed, components): (CreateEmbed, Vec<CreateActionRow>),
) -> Result<Message, serenity::Error> {
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed).components(components))
        .await
}

/// Handle !menu
pub async fn menu(ctx: &Context, msg: &Message) -> CommandResult {
    send_widget(ctx, msg, role_menu()).await?;
    Ok(())
}

/// Handle !colors
pub async fn colors(ctx: &Context, msg: &Message, widgets: &Widgets) -> CommandResult {
    let sent = send_widget(ctx, msg, color_picker()).await?;
    widgets.colors.insert(sent.id, (), COLORS_TIMEOUT);
    Ok(())
}

/// Handle !game
pub async fn game(ctx: &Context, msg: &Message, widgets: &Widgets) -> CommandResult {
    let embed = CreateEmbed::new()
        .title("Clicking Game")
        .description("Click the button 10 times to win!")
        .colour(GREEN);
    let sent = send_widget(ctx, msg, (embed, click_components(false))).await?;
    widgets.clicks.insert(sent.id, ClickGame::default(), GAME_TIMEOUT);
    Ok(())
}

/// Handle !memory
pub async fn memory(ctx: &Context, msg: &Message, widgets: &Widgets) -> CommandResult {
    let game = MemoryGame::new();
    let embed = CreateEmbed::new()
        .title("Memory Game")
        .description("Match all the pairs to win!")
        .colour(Colour::PURPLE);
    let sent = send_widget(ctx, msg, (embed, game.components())).await?;
    widgets.memory.insert(sent.id, game, MEMORY_TIMEOUT);
    Ok(())
}

/// Ids of the guild roles with the given names
fn roles_named(ctx: &Context, guild_id: GuildId, names: &[String]) -> Vec<RoleId> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    names
        .iter()
        .filter_map(|name| guild.role_by_name(name).map(|r| r.id))
        .collect()
}

/// Selection from the role menu
pub async fn role_select(ctx: &Context, interaction: &ComponentInteraction) -> CommandResult {
    let ComponentInteractionDataKind::StringSelect { values } = &interaction.data.kind else {
        return Ok(());
    };
    let (Some(guild_id), Some(member)) = (interaction.guild_id, interaction.member.as_ref()) else {
        return Ok(());
    };

    let roles = roles_named(ctx, guild_id, values);
    let reply = match member.add_roles(&ctx.http, &roles).await {
        Ok(()) => format!("Roles updated! Added: {}", values.join(", ")),
        Err(e) if is_forbidden(&e) => "I don't have permission to manage roles!".to_string(),
        Err(e) => format!("An error occurred: {}", e),
    };
    interaction.create_response(&ctx.http, ephemeral(reply)).await?;
    Ok(())
}

/// Click on one of the colour buttons
pub async fn color_button(ctx: &Context, interaction: &ComponentInteraction, widgets: &Widgets) -> CommandResult {
    if widgets.colors.with(interaction.message.id, |_| ()).is_none() {
        return Ok(interaction.create_response(&ctx.http, ephemeral(EXPIRED)).await?);
    }
    let Some((_, role_name, reply)) = COLOR_BUTTONS
        .iter()
        .find(|(id, _, _)| *id == interaction.data.custom_id)
    else {
        return Ok(());
    };

    let mut reply = reply.to_string();
    if let (Some(guild_id), Some(member)) = (interaction.guild_id, interaction.member.as_ref()) {
        if let Some(role) = roles_named(ctx, guild_id, &[role_name.to_string()]).first() {
            if let Err(e) = member.add_role(&ctx.http, *role).await {
                reply = format!("Error: {}", e);
            }
        }
    }
    interaction.create_response(&ctx.http, ephemeral(reply)).await?;
    Ok(())
}

/// Click on the click game button
pub async fn click_button(ctx: &Context, interaction: &ComponentInteraction, widgets: &Widgets) -> CommandResult {
    let user = &interaction.user;
    let Some(outcome) = widgets.clicks.with(interaction.message.id, |g| g.click(user.id)) else {
        return Ok(interaction.create_response(&ctx.http, ephemeral(EXPIRED)).await?);
    };

    let (content, over) = match outcome {
        ClickOutcome::Score(n) => (format!("{}'s clicks: {}", user.mention(), n), false),
        ClickOutcome::Won(n) => (format!("{} wins with {} clicks! 🎉", user.mention(), n), true),
        ClickOutcome::Finished => {
            return Ok(interaction
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await?)
        }
    };
    let update = CreateInteractionResponseMessage::new()
        .content(content)
        .components(click_components(over));
    interaction
        .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(update))
        .await?;
    Ok(())
}

/// Click on a memory game cell
pub async fn memory_button(ctx: &Context, interaction: &ComponentInteraction, widgets: &Widgets) -> CommandResult {
    let message_id = interaction.message.id;
    let Some(index) = interaction
        .data
        .custom_id
        .strip_prefix(MEMORY_PREFIX)
        .and_then(|i| i.parse::<usize>().ok())
    else {
        return Ok(());
    };

    let user = &interaction.user;
    let Some((step, components)) = widgets.memory.with(message_id, |game| {
        let step = game.pick(user.id, index);
        (step, game.components())
    }) else {
        return Ok(interaction.create_response(&ctx.http, ephemeral(EXPIRED)).await?);
    };

    match step {
        MemoryMove::NotYourGame => {
            interaction
                .create_response(&ctx.http, ephemeral("This isn't your game! Start your own with !memory"))
                .await?;
        }
        MemoryMove::Ignored => {
            interaction
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await?;
        }
        MemoryMove::Revealed | MemoryMove::Matched { .. } | MemoryMove::Mismatch { .. } => {
            let update = CreateInteractionResponseMessage::new().components(components);
            interaction
                .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(update))
                .await?;
        }
    }

    match step {
        MemoryMove::Matched { won: true } => {
            debug!("{} won the memory game on {}", user.name, message_id);
            let followup = CreateInteractionResponseFollowup::new()
                .content(format!("🎉 Congratulations {}! You've won!", user.mention()))
                .ephemeral(true);
            interaction.create_followup(&ctx.http, followup).await?;
        }
        MemoryMove::Mismatch { first, second } => {
            tokio::time::sleep(MISMATCH_DELAY).await;
            let hidden = widgets.memory.with(message_id, |game| {
                game.hide(first, second);
                game.components()
            });
            if let Some(components) = hidden {
                interaction
                    .edit_response(&ctx.http, EditInteractionResponse::new().components(components))
                    .await?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::embed_json;

    fn layout() -> [&'static str; MEMORY_CELLS] {
        let mut layout = [""; MEMORY_CELLS];
        for (i, slot) in layout.iter_mut().enumerate() {
            // Pairs sit next to each other: 0-1, 2-3, ...
            *slot = MEMORY_EMOJIS[i / 2];
        }
        layout
    }

    #[test]
    fn test_click_game() {
        let mut game = ClickGame::default();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        for expected in 1..CLICKS_TO_WIN {
            assert_eq!(game.click(alice), ClickOutcome::Score(expected));
        }
        assert_eq!(game.click(bob), ClickOutcome::Score(1));
        assert_eq!(game.click(alice), ClickOutcome::Won(10));
        assert!(game.is_over());
        assert_eq!(game.click(bob), ClickOutcome::Finished);
    }

    #[test]
    fn test_memory_owner_and_match() {
        let mut game = MemoryGame::with_layout(layout());
        let owner = UserId::new(1);

        assert_eq!(game.pick(owner, 0), MemoryMove::Revealed);
        assert_eq!(game.pick(UserId::new(2), 1), MemoryMove::NotYourGame);
        // Clicking a face-up cell does nothing
        assert_eq!(game.pick(owner, 0), MemoryMove::Ignored);
        assert_eq!(game.pick(owner, 1), MemoryMove::Matched { won: false });
        assert_eq!(game.cell(0), Cell::Matched);
        assert_eq!(game.cell(1), Cell::Matched);
    }

    #[test]
    fn test_memory_mismatch_hides_pair() {
        let mut game = MemoryGame::with_layout(layout());
        let owner = UserId::new(1);

        game.pick(owner, 0);
        assert_eq!(game.pick(owner, 2), MemoryMove::Mismatch { first: 0, second: 2 });
        // No picks while the pair is showing
        assert_eq!(game.pick(owner, 4), MemoryMove::Ignored);

        game.hide(0, 2);
        assert_eq!(game.cell(0), Cell::Hidden);
        assert_eq!(game.cell(2), Cell::Hidden);
        assert_eq!(game.pick(owner, 4), MemoryMove::Revealed);
    }

    #[test]
    fn test_memory_win() {
        let mut game = MemoryGame::with_layout(layout());
        let owner = UserId::new(1);
        for pair in 0..MEMORY_EMOJIS.len() {
            game.pick(owner, pair * 2);
            let step = game.pick(owner, pair * 2 + 1);
            assert_eq!(step, MemoryMove::Matched { won: pair == 7 });
        }
        assert!(game.is_won());

        let rows = serde_json::to_value(game.components()).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 4);
        assert_eq!(rows[0]["components"][0]["disabled"], true);
        assert_eq!(rows[3]["components"][3]["custom_id"], "memory_15");
    }

    #[test]
    fn test_new_memory_game_has_pairs() {
        let game = MemoryGame::new();
        for emoji in MEMORY_EMOJIS {
            assert_eq!(game.layout.iter().filter(|e| **e == emoji).count(), 2);
        }
    }

    #[test]
    fn test_widget_map_expiry() {
        let map: WidgetMap<u32> = WidgetMap::default();
        let id = MessageId::new(1);
        map.insert(id, 5, Duration::from_secs(60));
        assert_eq!(map.with(id, |v| { *v += 1; *v }), Some(6));

        map.insert(id, 5, Duration::ZERO);
        assert_eq!(map.with(id, |v| *v), None);
        assert_eq!(map.with(MessageId::new(2), |v| *v), None);
    }

    #[test]
    fn test_widget_timeout_restarts_on_use() {
        let map: WidgetMap<u32> = WidgetMap::default();
        let id = MessageId::new(1);
        map.insert(id, 0, Duration::from_millis(200));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(map.with(id, |v| { *v += 1; *v }), Some(1));

        // one full timeout after creation, but only 150ms since the last click
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(map.with(id, |v| { *v += 1; *v }), Some(2));

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(map.with(id, |v| *v), None);
    }

    #[test]
    fn test_widget_embeds() {
        let (embed, rows) = role_menu();
        assert_eq!(embed_json(&embed)["title"], "Role Selection Menu");
        let rows = serde_json::to_value(rows).unwrap();
        let menu = &rows[0]["components"][0];
        assert_eq!(menu["custom_id"], ROLE_SELECT_ID);
        assert_eq!(menu["min_values"], 0);
        assert_eq!(menu["max_values"], 4);
        assert_eq!(menu["options"][3]["label"], "Developer");

        let (embed, rows) = color_picker();
        assert_eq!(embed_json(&embed)["description"], "Choose your name color:");
        let rows = serde_json::to_value(rows).unwrap();
        assert_eq!(rows[0]["components"][2]["custom_id"], "blue_button");
        assert!(is_color_button("green_button"));
        assert!(!is_color_button(CLICK_BUTTON_ID));
    }
}
