//! Per-guild music players
//!
//! Each guild has a FIFO queue, the song currently playing and a volume.
//! The track handle of the current song controls songbird playback.

use dashmap::DashMap;
use serenity::all::GuildId;
use songbird::tracks::TrackHandle;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::extractor::Song;

pub const DEFAULT_VOLUME: f32 = 0.5;

/// The song being played and where its audio lives
#[derive(Clone)]
pub struct NowPlaying {
    pub song: Song,
    pub file: PathBuf,
    pub track: TrackHandle,
}

pub struct GuildPlayer {
    pub queue: VecDeque<Song>,
    pub current: Option<NowPlaying>,
    /// 0.0 to 1.0
    pub volume: f32,
    /// Set while the queue is being played through
    pub draining: bool,
}

impl Default for GuildPlayer {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            volume: DEFAULT_VOLUME,
            draining: false,
        }
    }
}

impl GuildPlayer {
    pub fn enqueue(&mut self, song: Song) {
        self.queue.push_back(song);
    }

    pub fn next_song(&mut self) -> Option<Song> {
        self.queue.pop_front()
    }

    /// Forget the current song if `file` is what it plays. Returns whether it was.
    pub fn finish(&mut self, file: &Path) -> bool {
        if self.current.as_ref().is_some_and(|c| &c.file == file) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

/// Music players of every guild
#[derive(Default)]
pub struct Players {
    guilds: DashMap<GuildId, GuildPlayer>,
}

impl Players {
    /// Run `f` on the guild's player, creating it when missing
    pub fn with<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut GuildPlayer) -> R) -> R {
        let mut player = self.guilds.entry(guild_id).or_default();
        f(&mut player)
    }

    pub fn current(&self, guild_id: GuildId) -> Option<NowPlaying> {
        self.guilds.get(&guild_id).and_then(|p| p.current.clone())
    }

    pub fn queued(&self, guild_id: GuildId) -> Vec<Song> {
        self.guilds
            .get(&guild_id)
            .map(|p| p.queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn queue_is_empty(&self, guild_id: GuildId) -> bool {
        self.guilds.get(&guild_id).map_or(true, |p| p.queue.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str) -> Song {
        Song {
            url: format!("https://youtu.be/{}", title),
            title: title.to_string(),
            channel: "Unknown".to_string(),
            duration: 60,
            views: 0,
            thumbnail: String::new(),
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut player = GuildPlayer::default();
        assert_eq!(player.volume, DEFAULT_VOLUME);
        player.enqueue(song("a"));
        player.enqueue(song("b"));
        assert_eq!(player.next_song().map(|s| s.title), Some("a".to_string()));
        assert_eq!(player.next_song().map(|s| s.title), Some("b".to_string()));
        assert_eq!(player.next_song(), None);
    }

    #[test]
    fn test_players_are_per_guild() {
        let players = Players::default();
        let one = GuildId::new(1);
        let two = GuildId::new(2);

        players.with(one, |p| p.enqueue(song("a")));
        assert!(!players.queue_is_empty(one));
        assert!(players.queue_is_empty(two));
        assert_eq!(players.queued(one).len(), 1);
        assert!(players.current(one).is_none());
        assert!(!players.with(one, |p| p.finish(Path::new("x.mp3"))));
    }
}
