//! Music commands
//!
//! Songs are downloaded with yt-dlp and played through songbird. Each guild
//! has its own player; when a track ends, [`TrackEndNotifier`] announces it,
//! deletes the download and starts the next queued song if the queue is
//! being played.

use serenity::all::{
    ChannelId, Colour, Context, CreateEmbed, GuildId, Http, Message, UserId,
};
use serenity::async_trait;
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use songbird::input::File as FileInput;
use songbird::tracks::PlayMode;
use songbird::Songbird;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{say, send_embed, CommandResult, Invocation};
use crate::audio::{cleanup_file, Extractor, NowPlaying, Players, Song};
use crate::bot::BotState;

const PROGRESS_CELLS: usize = 20;
const SONGS_PER_FIELD: usize = 10;
const MAX_QUEUE_FIELDS: usize = 24;

const NOT_IN_VOICE: &str = "You need to be in a voice channel to use this command.";
const NOTHING_PLAYING: &str = "No song is currently playing.";
const QUEUE_EMPTY: &str = "The queue is empty.";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Music players plus the downloader they share
pub struct Music {
    pub players: Players,
    pub extractor: Extractor,
    pub greeting: Option<PathBuf>,
}

impl Music {
    pub fn new(extractor: Extractor, greeting: Option<PathBuf>) -> Self {
        Self {
            players: Players::default(),
            extractor,
            greeting,
        }
    }
}

/// `m:ss`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Twenty cells of `█` and `-`
pub fn progress_bar(elapsed: u64, total: u64) -> String {
    let filled = if total == 0 {
        0
    } else {
        (PROGRESS_CELLS as u64 * elapsed.min(total) / total) as usize
    };
    format!("{}{}", "█".repeat(filled), "-".repeat(PROGRESS_CELLS - filled))
}

pub fn now_playing_text(title: &str, elapsed: u64, total: u64) -> String {
    let elapsed = if total > 0 { elapsed.min(total) } else { elapsed };
    format!(
        "Playing: {}\n[{}] {}/{}",
        title,
        progress_bar(elapsed, total),
        format_duration(elapsed),
        format_duration(total)
    )
}

/// `1234567` -> `1,234,567`
pub fn format_views(views: u64) -> String {
    let digits = views.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn queue_embed(current: Option<&Song>, queue: &[Song]) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title("Music Queue").colour(Colour::BLUE);
    if let Some(song) = current {
        embed = embed.field(
            "Now Playing",
            format!("🎵 {} ({})", song.title, format_duration(song.duration)),
            false,
        );
    }

    for (chunk_index, chunk) in queue.chunks(SONGS_PER_FIELD).take(MAX_QUEUE_FIELDS).enumerate() {
        let start = chunk_index * SONGS_PER_FIELD + 1;
        let lines: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(i, song)| format!("{}. {} ({})", start + i, song.title, format_duration(song.duration)))
            .collect();
        embed = embed.field(
            format!("Queue {}-{}", start, start + chunk.len() - 1),
            super::truncate(&lines.join("\n"), super::EMBED_FIELD_LIMIT - 3),
            false,
        );
    }
    embed
}

pub fn song_info_embed(song: &Song) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Now Playing")
        .colour(Colour::BLUE)
        .field("Title", &song.title, false)
        .field("Channel", &song.channel, true)
        .field("Duration", format_duration(song.duration), true)
        .field("Views", format_views(song.views), true);
    if song.thumbnail.is_empty() {
        embed
    } else {
        embed.thumbnail(&song.thumbnail)
    }
}

/// Everything needed to drive one guild's playback outside a command
#[derive(Clone)]
struct Playback {
    music: Arc<Music>,
    manager: Arc<Songbird>,
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

impl Playback {
    async fn say(&self, content: impl Into<String>) {
        if let Err(e) = self.channel_id.say(&self.http, content).await {
            warn!("Failed to send music message in {}: {}", self.channel_id, e);
        }
    }

    /// Download `url` and start playing it
    async fn play_url(&self, url: &str) -> Result<Song, BoxError> {
        let (song, file) = self.music.extractor.download(url).await?;
        if let Err(e) = self.start(song.clone(), file.clone()).await {
            cleanup_file(&file);
            return Err(e);
        }
        Ok(song)
    }

    async fn start(&self, song: Song, file: PathBuf) -> Result<(), BoxError> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or("Not connected to a voice channel.")?;
        let volume = self.music.players.with(self.guild_id, |p| p.volume);

        let track = {
            let mut handler = call.lock().await;
            handler.play_input(FileInput::new(file.clone()).into())
        };
        track.set_volume(volume)?;
        let latch = ExitLatch::default();
        for (event, exit) in [(TrackEvent::End, TrackExit::Finished), (TrackEvent::Error, TrackExit::Failed)] {
            track.add_event(
                Event::Track(event),
                TrackEndNotifier {
                    playback: self.clone(),
                    file: file.clone(),
                    title: song.title.clone(),
                    exit,
                    latch: latch.clone(),
                },
            )?;
        }

        info!("[{}] Playing {}", self.guild_id, song.title);
        self.music.players.with(self.guild_id, |p| {
            p.current = Some(NowPlaying { song, file, track });
        });
        Ok(())
    }

    /// Start the next queued song while the queue is being played
    async fn advance(&self) {
        let guild_id = self.guild_id;
        let next = self.music.players.with(guild_id, |p| {
            if p.draining && p.current.is_none() {
                Some(p.next_song())
            } else {
                None
            }
        });

        match next {
            None => {}
            Some(None) => {
                self.music.players.with(guild_id, |p| p.draining = false);
                self.say("Queue finished playing.").await;
            }
            Some(Some(song)) => {
                if self.manager.get(guild_id).is_none() {
                    self.music.players.with(guild_id, |p| p.draining = false);
                    return;
                }
                match self.play_url(&song.url).await {
                    Ok(song) => self.say(format!("Now playing: {}", song.title)).await,
                    Err(e) => {
                        self.music.players.with(guild_id, |p| p.draining = false);
                        self.say(format!("Error playing queue: {}", e)).await;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackExit {
    Finished,
    Failed,
}

impl TrackExit {
    fn announcement(self, title: &str) -> String {
        match self {
            TrackExit::Finished => format!("Finished playing: {}", title),
            TrackExit::Failed => format!("Error playing {}: the track could not be played.", title),
        }
    }
}

/// Shared by the end and error handlers of one track so only the first one runs
#[derive(Debug, Clone, Default)]
struct ExitLatch(Arc<AtomicBool>);

impl ExitLatch {
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Announces finished or failed tracks and keeps the queue moving
struct TrackEndNotifier {
    playback: Playback,
    file: PathBuf,
    title: String,
    exit: TrackExit,
    latch: ExitLatch,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if !self.latch.claim() {
            return None;
        }
        let pb = &self.playback;
        cleanup_file(&self.file);
        let was_current = pb.music.players.with(pb.guild_id, |p| p.finish(&self.file));
        match self.exit {
            TrackExit::Finished => debug!("[{}] Track ended: {}", pb.guild_id, self.title),
            TrackExit::Failed => warn!("[{}] Track failed: {}", pb.guild_id, self.title),
        }

        pb.say(self.exit.announcement(&self.title)).await;
        if was_current {
            pb.advance().await;
        }
        None
    }
}

fn author_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel_id = guild.voice_states.get(&user_id)?.channel_id;
    channel_id
}

async fn manager(ctx: &Context) -> Result<Arc<Songbird>, BoxError> {
    Ok(songbird::get(ctx).await.ok_or("Songbird not registered")?)
}

fn playback(ctx: &Context, state: &BotState, manager: Arc<Songbird>, guild_id: GuildId, channel_id: ChannelId) -> Playback {
    Playback {
        music: state.music.clone(),
        manager,
        http: ctx.http.clone(),
        guild_id,
        channel_id,
    }
}

/// Join the author's voice channel and play the greeting clip, if any
async fn join_author(ctx: &Context, state: &BotState, msg: &Message, manager: &Songbird) -> Result<bool, BoxError> {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let Some(channel_id) = author_voice_channel(ctx, guild_id, msg.author.id) else {
        return Ok(false);
    };

    let call = manager.join(guild_id, channel_id).await?;
    info!("Joined voice channel {} in guild {}", channel_id, guild_id);

    if let Some(greeting) = state.music.greeting.as_ref().filter(|p| p.exists()) {
        let mut handler = call.lock().await;
        handler.play_input(FileInput::new(greeting.clone()).into());
    }
    Ok(true)
}

/// Playback for the message's guild, joining the author's channel when not connected
async fn connect(ctx: &Context, state: &BotState, msg: &Message) -> Result<Option<Playback>, BoxError> {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let manager = manager(ctx).await?;
    if manager.get(guild_id).is_none() && !join_author(ctx, state, msg, &manager).await? {
        return Ok(None);
    }
    Ok(Some(playback(ctx, state, manager, guild_id, msg.channel_id)))
}

/// Handle !join
pub async fn join(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let manager = manager(ctx).await?;
    if !join_author(ctx, state, msg, &manager).await? {
        return say(ctx, msg.channel_id, "You must be in a voice channel to use this command!").await;
    }
    Ok(())
}

/// Handle !leave
pub async fn leave(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let manager = manager(ctx).await?;
    if manager.get(guild_id).is_none() {
        return say(ctx, msg.channel_id, "I am not in a voice channel").await;
    }

    let current = state.music.players.with(guild_id, |p| {
        p.draining = false;
        p.current.take()
    });
    manager.remove(guild_id).await?;
    if let Some(current) = current {
        cleanup_file(&current.file);
    }
    say(ctx, msg.channel_id, "I left the voice channel").await
}

/// Handle !play url
pub async fn play(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let Some(url) = inv.arg(0) else {
        return say(ctx, msg.channel_id, "Please provide a URL. Example: `!play url`").await;
    };
    let Some(pb) = connect(ctx, state, msg).await? else {
        return say(ctx, msg.channel_id, NOT_IN_VOICE).await;
    };
    if state.music.players.current(pb.guild_id).is_some() {
        return say(ctx, msg.channel_id, "An error occurred: Already playing audio.").await;
    }

    say(ctx, msg.channel_id, "Downloading audio... This may take a moment.").await?;
    let reply = match pb.play_url(url).await {
        Ok(song) => format!("Now playing: {}", song.title),
        Err(e) => format!("An error occurred: {}", e),
    };
    say(ctx, msg.channel_id, reply).await
}

/// Handle !volume 0-100
pub async fn volume(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if manager(ctx).await?.get(guild_id).is_none() {
        return say(ctx, msg.channel_id, "Not connected to a voice channel.").await;
    }
    let Some(percent) = inv
        .arg(0)
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| (0.0..=100.0).contains(v))
    else {
        return say(ctx, msg.channel_id, "Please provide a volume between 0 and 100.").await;
    };

    let current = state.music.players.with(guild_id, |p| {
        p.volume = percent / 100.0;
        p.current.clone()
    });
    if let Some(current) = current {
        current.track.set_volume(percent / 100.0)?;
    }
    say(ctx, msg.channel_id, format!("Changed volume to {}%", percent)).await
}

async fn play_mode(now: &NowPlaying) -> Option<PlayMode> {
    now.track.get_info().await.ok().map(|s| s.playing)
}

/// Handle !pause
pub async fn pause(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if let Some(current) = state.music.players.current(guild_id) {
        if play_mode(&current).await == Some(PlayMode::Play) {
            current.track.pause()?;
            return Ok(());
        }
    }
    say(ctx, msg.channel_id, "Currently no audio is playing.").await
}

/// Handle !resume
pub async fn resume(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if let Some(current) = state.music.players.current(guild_id) {
        if play_mode(&current).await == Some(PlayMode::Pause) {
            current.track.play()?;
            return Ok(());
        }
    }
    say(ctx, msg.channel_id, "The audio is not paused.").await
}

/// Handle !stop; the queue stays but stops advancing
pub async fn stop(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let current = state.music.players.with(guild_id, |p| {
        p.draining = false;
        p.current.clone()
    });
    match current {
        Some(current) => {
            // A dead handle fires no end event, so release the player here
            if let Err(e) = current.track.stop() {
                warn!("[{}] Could not stop track: {}", guild_id, e);
                cleanup_file(&current.file);
                state.music.players.with(guild_id, |p| p.finish(&current.file));
            }
            Ok(())
        }
        None => say(ctx, msg.channel_id, "Currently no audio is playing.").await,
    }
}

/// Handle !add url
pub async fn add(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let Some(url) = inv.arg(0) else {
        return say(ctx, msg.channel_id, "Please provide a URL. Example: `!add url`").await;
    };

    let reply = match state.music.extractor.song(url).await {
        Ok(song) => {
            let reply = format!("Added to queue: {} ({})", song.title, format_duration(song.duration));
            state.music.players.with(guild_id, |p| p.enqueue(song));
            reply
        }
        Err(e) => format!("Error adding song to queue: {}", e),
    };
    say(ctx, msg.channel_id, reply).await
}

/// Handle !play_queue
pub async fn play_queue(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    if state.music.players.queue_is_empty(guild_id) {
        return say(ctx, msg.channel_id, QUEUE_EMPTY).await;
    }
    let Some(pb) = connect(ctx, state, msg).await? else {
        return say(ctx, msg.channel_id, NOT_IN_VOICE).await;
    };

    let already_running = state.music.players.with(guild_id, |p| {
        let running = p.draining;
        p.draining = true;
        running
    });
    if !already_running {
        pb.advance().await;
    }
    Ok(())
}

/// Handle !play_playlist url
pub async fn play_playlist(ctx: &Context, msg: &Message, state: &BotState, inv: &Invocation<'_>) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let Some(url) = inv.arg(0) else {
        return say(ctx, msg.channel_id, "Please provide a URL. Example: `!play_playlist url`").await;
    };

    say(ctx, msg.channel_id, "Processing playlist... This may take a moment.").await?;
    let playlist = match state.music.extractor.playlist(url).await {
        Ok(Some(playlist)) if !playlist.songs.is_empty() => playlist,
        Ok(_) => return say(ctx, msg.channel_id, "Could not find any videos in the playlist.").await,
        Err(e) => return say(ctx, msg.channel_id, format!("Error processing playlist: {}", e)).await,
    };

    let total = playlist.total;
    state.music.players.with(guild_id, |p| {
        for song in playlist.songs {
            p.enqueue(song);
        }
    });
    say(
        ctx,
        msg.channel_id,
        format!("Added {} songs to the queue from playlist: {}", total, playlist.title),
    )
    .await?;

    if state.music.players.current(guild_id).is_none() {
        play_queue(ctx, msg, state).await?;
    }
    Ok(())
}

/// Handle !queue
pub async fn queue(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let queued = state.music.players.queued(guild_id);
    if queued.is_empty() {
        return say(ctx, msg.channel_id, QUEUE_EMPTY).await;
    }
    let current = state.music.players.current(guild_id);
    send_embed(ctx, msg.channel_id, queue_embed(current.as_ref().map(|c| &c.song), &queued)).await
}

/// Handle !song_info
pub async fn song_info(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    match state.music.players.current(guild_id) {
        Some(current) => send_embed(ctx, msg.channel_id, song_info_embed(&current.song)).await,
        None => say(ctx, msg.channel_id, NOTHING_PLAYING).await,
    }
}

/// Handle !now_playing
pub async fn now_playing(ctx: &Context, msg: &Message, state: &BotState) -> CommandResult {
    let guild_id = msg.guild_id.ok_or("This command can only be used in a server.")?;
    let Some(current) = state.music.players.current(guild_id) else {
        return say(ctx, msg.channel_id, NOTHING_PLAYING).await;
    };
    let elapsed = current
        .track
        .get_info()
        .await
        .map(|s| s.position.as_secs())
        .unwrap_or(0);
    let text = now_playing_text(&current.song.title, elapsed, current.song.duration);
    say(ctx, msg.channel_id, text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    fn song(title: &str, duration: u64) -> Song {
        Song {
            url: format!("https://youtu.be/{}", title),
            title: title.to_string(),
            channel: "Channel".to_string(),
            duration,
            views: 1234567,
            thumbnail: String::new(),
        }
    }

    #[test]
    fn test_track_exit_runs_once() {
        let latch = ExitLatch::default();
        let error_handler = latch.clone();
        assert!(error_handler.claim());
        assert!(!latch.claim());
        assert!(ExitLatch::default().claim());

        assert_eq!(TrackExit::Finished.announcement("Song"), "Finished playing: Song");
        assert_eq!(
            TrackExit::Failed.announcement("Song"),
            "Error playing Song: the track could not be played."
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress_bar(30, 60), format!("{}{}", "█".repeat(10), "-".repeat(10)));
        assert_eq!(progress_bar(0, 0), "-".repeat(20));
        assert_eq!(
            now_playing_text("Song", 90, 60),
            format!("Playing: Song\n[{}] 1:00/1:00", "█".repeat(20))
        );
        assert_eq!(
            now_playing_text("Live", 75, 0),
            format!("Playing: Live\n[{}] 1:15/0:00", "-".repeat(20))
        );
    }

    #[test]
    fn test_format_views() {
        assert_eq!(format_views(0), "0");
        assert_eq!(format_views(999), "999");
        assert_eq!(format_views(1000), "1,000");
        assert_eq!(format_views(1234567), "1,234,567");
    }

    #[test]
    fn test_queue_embed_fields() {
        let queue: Vec<Song> = (1..=13).map(|i| song(&format!("s{}", i), 61)).collect();
        let current = song("now", 125);
        let embed = queue_embed(Some(&current), &queue);
        assert_eq!(embed_json(&embed)["title"], "Music Queue");

        let fields = fields(&embed);
        assert_eq!(field(&fields, "Now Playing"), Some("🎵 now (2:05)"));
        assert!(field(&fields, "Queue 1-10").unwrap().starts_with("1. s1 (1:01)\n2. s2 (1:01)"));
        assert_eq!(field(&fields, "Queue 11-13"), Some("11. s11 (1:01)\n12. s12 (1:01)\n13. s13 (1:01)"));
    }

    #[test]
    fn test_song_info_embed() {
        let mut s = song("Song", 245);
        let embed = song_info_embed(&s);
        let fields = fields(&embed);
        assert_eq!(field(&fields, "Title"), Some("Song"));
        assert_eq!(field(&fields, "Duration"), Some("4:05"));
        assert_eq!(field(&fields, "Views"), Some("1,234,567"));
        assert!(embed_json(&embed).get("thumbnail").is_none());

        s.thumbnail = "https://i.ytimg.com/vi/x/hq.jpg".to_string();
        assert_eq!(
            embed_json(&song_info_embed(&s))["thumbnail"]["url"],
            "https://i.ytimg.com/vi/x/hq.jpg"
        );
    }
}
