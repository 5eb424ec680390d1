//! Discord event handler and command dispatch

use crate::audio::Extractor;
use crate::chat::{build_messages, split_message, strip_mentions, ChatClient, ChatError, DISCORD_MESSAGE_LIMIT};
use crate::commands::interactive::{self, Widgets, CLICK_BUTTON_ID, MEMORY_PREFIX, ROLE_SELECT_ID};
use crate::commands::modals::{self, Form};
use crate::commands::music::{self, Music};
use crate::commands::status::{self, StatusManager, HELLO_DURATION, TEMP_DURATION};
use crate::commands::suggestion::{self, SuggestionBoard, Vote};
use crate::commands::{
    embeds, find, general, help, moderation, records, say, CommandResult, Invocation,
};
use crate::config::Config;
use crate::database::{Database, DEFAULT_HISTORY_LIMIT};
use crate::rapidapi::RapidApi;
use serenity::all::{
    Client, ComponentInteraction, Context, EventHandler, GatewayIntents, GuildId, Interaction,
    Member, Message, Reaction, Ready, User,
};
use serenity::async_trait;
use songbird::SerenityInit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Bot state shared across handlers
pub struct BotState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub chat: ChatClient,
    pub rapidapi: RapidApi,
    pub widgets: Widgets,
    pub suggestions: SuggestionBoard,
    pub music: Arc<Music>,
    pub status: Arc<StatusManager>,
}

/// Main event handler for the bot
pub struct Handler {
    pub state: Arc<BotState>,
    loops_started: AtomicBool,
}

impl Handler {
    pub fn new(state: Arc<BotState>) -> Self {
        Self {
            state,
            loops_started: AtomicBool::new(false),
        }
    }

    async fn run_command(&self, ctx: &Context, msg: &Message, inv: &Invocation<'_>) {
        let Some(command) = find(inv.name) else {
            debug!("Unknown command: {}", inv.name);
            return;
        };
        let state = self.state.as_ref();
        if let Err(e) = state.db.record_activity(msg.author.id.get(), command.name) {
            warn!("Failed to record activity for {}: {}", msg.author.id, e);
        }
        debug!("{} ran !{}", msg.author.name, command.name);

        let prefix = state.config.command_prefix.as_str();
        let widgets = &state.widgets;
        let result: CommandResult = match command.name {
            "hello" => {
                state.status.temporary(ctx, format!("Saying hello to {}", msg.author.name), HELLO_DURATION);
                general::hello(ctx, msg).await
            }
            "goodbye" => general::goodbye(ctx, msg).await,

            "create_embed" => embeds::create_embed(ctx, msg).await,
            "server_info" => embeds::server_info(ctx, msg).await,
            "random_cat_image" => embeds::random_cat_image(ctx, msg, state).await,

            "help_command" => help::help_command(ctx, msg, prefix).await,
            "help_specific" => help::help_specific(ctx, msg, prefix, inv.arg(0)).await,

            "kick" => moderation::kick(ctx, msg, inv).await,
            "ban" => moderation::ban(ctx, msg, inv).await,
            "unban" => moderation::unban(ctx, msg, inv).await,
            "add_role" => moderation::add_role(ctx, msg, inv).await,
            "remove_role" => moderation::remove_role(ctx, msg, inv).await,
            "roleinfo" => moderation::roleinfo(ctx, msg, inv).await,
            "rolemembers" => moderation::rolemembers(ctx, msg, inv).await,

            "menu" => interactive::menu(ctx, msg).await,
            "colors" => interactive::colors(ctx, msg, widgets).await,
            "game" => interactive::game(ctx, msg, widgets).await,
            "memory" => interactive::memory(ctx, msg, widgets).await,

            "feedback" => modals::open_form(ctx, msg, widgets, Form::Feedback).await,
            "bug_report" => modals::open_form(ctx, msg, widgets, Form::BugReport).await,
            "suggestion" => modals::open_form(ctx, msg, widgets, Form::Suggestion).await,

            "join" => music::join(ctx, msg, state).await,
            "leave" => music::leave(ctx, msg, state).await,
            "play" => music::play(ctx, msg, state, inv).await,
            "volume" => music::volume(ctx, msg, state, inv).await,
            "pause" => music::pause(ctx, msg, state).await,
            "resume" => music::resume(ctx, msg, state).await,
            "stop" => music::stop(ctx, msg, state).await,
            "add" => music::add(ctx, msg, state, inv).await,
            "play_queue" => music::play_queue(ctx, msg, state).await,
            "play_playlist" => music::play_playlist(ctx, msg, state, inv).await,
            "queue" => music::queue(ctx, msg, state).await,
            "song_info" => music::song_info(ctx, msg, state).await,
            "now_playing" => music::now_playing(ctx, msg, state).await,

            "server_stats" => status::server_stats(ctx, msg, &state.status).await,
            "random_status" => status::random_status(ctx, msg, &state.status).await,

            "suggest" => suggestion::suggest(ctx, msg, inv, &state.suggestions).await,

            "dbstatus" => records::dbstatus(ctx, msg, state).await,
            "track_activity" => records::track_activity(ctx, msg, state, inv).await,
            "remember_context" => records::remember_context(ctx, msg, state, inv).await,
            "show_rankings" => records::show_rankings(ctx, msg, state).await,
            "set_reminder" => records::set_reminder(ctx, msg, state, inv).await,
            "categorize_message" => records::categorize_message(ctx, msg, state, inv).await,
            "clear_context" => records::clear_context(ctx, msg, state).await,
            "show_context" => records::show_context(ctx, msg, state, inv).await,
            "avg_rating" => records::avg_rating(ctx, msg, state).await,
            "recent_feedback" => records::recent_feedback(ctx, msg, state, inv).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Command {} failed: {}", command.name, e);
            if let Err(e) = say(ctx, msg.channel_id, format!("An error occurred: {}", e)).await {
                warn!("Failed to report command error: {}", e);
            }
        }
    }

    /// Answer a message that mentions the bot with the AI chat
    async fn chat(&self, ctx: &Context, msg: &Message) {
        let typing = msg.channel_id.start_typing(&ctx.http);
        let reply = match self.converse(ctx, msg).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("AI chat failed: {}", e);
                e.user_message().to_string()
            }
        };
        typing.stop();

        for chunk in split_message(&reply, DISCORD_MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                warn!("Failed to send chat reply: {}", e);
                break;
            }
        }
    }

    async fn converse(&self, ctx: &Context, msg: &Message) -> Result<String, ChatError> {
        let state = &self.state;
        if !state.chat.is_configured() {
            return Err(ChatError::MissingApiKey);
        }
        let user_id = msg.author.id.get();
        let channel_id = msg.channel_id.get();

        let history = state
            .db
            .recent_conversations(user_id, channel_id, DEFAULT_HISTORY_LIMIT)
            .unwrap_or_else(|e| {
                warn!("Could not load conversation history: {}", e);
                Vec::new()
            });

        let bot_id = ctx.cache.current_user().id.get();
        let prompt = strip_mentions(&msg.content, bot_id);
        let messages = build_messages(&history, &prompt);
        let reply = state.chat.complete(&messages).await?;

        let context_used: Vec<String> = messages[..messages.len() - 1]
            .iter()
            .map(|m| m.content.clone())
            .collect();
        if let Err(e) = state
            .db
            .store_conversation(user_id, channel_id, &prompt, &reply, &context_used)
        {
            warn!("Failed to store conversation: {}", e);
        }
        Ok(reply)
    }

    async fn component(&self, ctx: &Context, interaction: &ComponentInteraction) -> CommandResult {
        let state = &self.state;
        let widgets = &state.widgets;
        let custom_id = interaction.data.custom_id.as_str();

        match custom_id {
            ROLE_SELECT_ID => interactive::role_select(ctx, interaction).await,
            CLICK_BUTTON_ID => interactive::click_button(ctx, interaction, widgets).await,
            id if id.starts_with(MEMORY_PREFIX) => interactive::memory_button(ctx, interaction, widgets).await,
            id if interactive::is_color_button(id) => interactive::color_button(ctx, interaction, widgets).await,
            id => {
                if let Some(form) = Form::from_button(id) {
                    modals::form_button(ctx, interaction, widgets, form).await
                } else if let Some(vote) = Vote::from_button(id) {
                    suggestion::vote_button(ctx, interaction, &state.suggestions, vote).await
                } else {
                    debug!("Unhandled component: {}", id);
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        // Ready fires again after a reconnect
        if !self.loops_started.swap(true, Ordering::SeqCst) {
            self.state.status.start(&ctx);
            records::start_reminder_loop(&ctx, self.state.db.clone());
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        match general::filter_profanity(&ctx, &msg).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => warn!("Failed to filter message {}: {}", msg.id, e),
        }
        if let Err(e) = general::react_to_keywords(&ctx, &msg).await {
            warn!("Failed to add keyword reactions: {}", e);
        }

        match Invocation::parse(&msg.content, &self.state.config.command_prefix) {
            Some(inv) => self.run_command(&ctx, &msg, &inv).await,
            None if crate::commands::has_prefix(&msg.content, &self.state.config.command_prefix) => {}
            None => {
                let bot_id = ctx.cache.current_user().id;
                if msg.mentions_user_id(bot_id) {
                    self.chat(&ctx, &msg).await;
                }
            }
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        self.state
            .status
            .temporary(&ctx, format!("Welcoming {}", new_member.user.name), TEMP_DURATION);
        if let Err(e) = general::on_member_join(&ctx, &self.state, &new_member).await {
            error!("Failed to welcome {}: {}", new_member.user.name, e);
        }
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        self.state
            .status
            .temporary(&ctx, format!("{} left the server", user.name), TEMP_DURATION);
        if let Err(e) = general::on_member_remove(&ctx, &self.state, guild_id, &user).await {
            error!("Failed to say goodbye to {}: {}", user.name, e);
        }
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        if let Err(e) = general::on_reaction(&ctx, &self.state, &add_reaction, true).await {
            warn!("Failed to handle reaction: {}", e);
        }
    }

    async fn reaction_remove(&self, ctx: Context, removed_reaction: Reaction) {
        if let Err(e) = general::on_reaction(&ctx, &self.state, &removed_reaction, false).await {
            warn!("Failed to handle reaction removal: {}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let result = match &interaction {
            Interaction::Component(component) => self.component(&ctx, component).await,
            Interaction::Modal(modal) => modals::submit(&ctx, &self.state, modal).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!("Interaction error: {}", e);
        }
    }
}

/// Create and run the Discord bot
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Arc::new(config);

    let db = Arc::new(Database::open(&config.database_path)?);
    info!("Database opened at {:?}", config.database_path);

    let chat = ChatClient::new(config.openai_api_key.clone(), config.openai_model.clone())?;
    if !chat.is_configured() {
        warn!("OPENAI_API_KEY is not set; the AI chat will only answer with a notice");
    }
    let rapidapi = RapidApi::new(config.rapidapi_key.clone())?;

    let extractor = Extractor::new(config.ytdlp_path.clone(), config.temp_audio_dir.clone());
    let music = Arc::new(Music::new(extractor, config.greeting_audio.clone()));

    let state = Arc::new(BotState {
        config: config.clone(),
        db,
        chat,
        rapidapi,
        widgets: Widgets::default(),
        suggestions: SuggestionBoard::default(),
        music,
        status: Arc::new(StatusManager::new(config.status_interval)),
    });

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(state))
        .register_songbird()
        .await?;

    info!("Starting bot...");
    client.start().await?;

    Ok(())
}
