//! Audio module for music playback
//!
//! yt-dlp metadata and downloads plus per-guild player state

pub mod extractor;
pub mod player;

pub use extractor::{cleanup_file, Extractor, Song};
pub use player::{NowPlaying, Players};
