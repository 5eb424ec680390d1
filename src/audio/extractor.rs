//! yt-dlp wrapper for song metadata and downloads
//!
//! Metadata comes from yt-dlp's JSON dump; songs are downloaded as mp3
//! into the temp audio directory and removed once they finish playing.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid yt-dlp output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yt-dlp failed: {0}")]
    Failed(String),
    #[error("Downloaded file not found: {0}")]
    NotFound(PathBuf),
}

/// A playable song and the metadata shown by the music commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub url: String,
    pub title: String,
    pub channel: String,
    /// Length in seconds, 0 when unknown
    pub duration: u64,
    pub views: u64,
    pub thumbnail: String,
}

/// Entries of a playlist; `total` counts entries yt-dlp could not resolve too
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub title: String,
    pub songs: Vec<Song>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    entries: Option<Vec<Option<InfoJson>>>,
}

impl InfoJson {
    fn into_song(self, url: String) -> Song {
        Song {
            url,
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            channel: self
                .channel
                .or(self.uploader)
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: self.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            views: self.view_count.unwrap_or(0),
            thumbnail: self.thumbnail.unwrap_or_default(),
        }
    }
}

/// Parse the JSON dump of a single video requested as `url`
pub fn parse_video(json: &str, url: &str) -> Result<Song, ExtractError> {
    let info: InfoJson = serde_json::from_str(json)?;
    Ok(info.into_song(url.to_string()))
}

/// Parse a flat playlist dump; `None` when the URL is not a playlist
pub fn parse_playlist(json: &str) -> Result<Option<Playlist>, ExtractError> {
    let info: InfoJson = serde_json::from_str(json)?;
    let Some(entries) = info.entries else {
        return Ok(None);
    };

    let total = entries.len();
    let songs = entries
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let url = entry.url.clone().or_else(|| entry.webpage_url.clone())?;
            Some(entry.into_song(url))
        })
        .collect();

    Ok(Some(Playlist {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        songs,
        total,
    }))
}

/// Runs yt-dlp
pub struct Extractor {
    program: String,
    download_dir: PathBuf,
}

impl Extractor {
    pub fn new(program: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            download_dir: download_dir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ExtractError> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program).args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .trim()
                .to_string();
            return Err(ExtractError::Failed(message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Metadata of a single video, without downloading it
    pub async fn song(&self, url: &str) -> Result<Song, ExtractError> {
        let json = self
            .run(&["-J", "--no-playlist", "-f", "bestaudio/best", url])
            .await?;
        parse_video(&json, url)
    }

    /// Flat listing of a playlist
    pub async fn playlist(&self, url: &str) -> Result<Option<Playlist>, ExtractError> {
        let json = self.run(&["-J", "--flat-playlist", url]).await?;
        parse_playlist(&json)
    }

    /// Download a video as mp3 and return its metadata and file
    pub async fn download(&self, url: &str) -> Result<(Song, PathBuf), ExtractError> {
        fs::create_dir_all(&self.download_dir)?;
        let stem = format!("{:016x}", rand::random::<u64>());
        let template = self.download_dir.join(format!("{}.%(ext)s", stem));
        let template = template.to_string_lossy();

        let json = self
            .run(&[
                "-J",
                "--no-simulate",
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
                "-o",
                template.as_ref(),
                url,
            ])
            .await?;

        let song = parse_video(&json, url)?;
        let file = self.download_dir.join(format!("{}.mp3", stem));
        if !file.exists() {
            return Err(ExtractError::NotFound(file));
        }
        Ok((song, file))
    }
}

/// Delete a finished download
pub fn cleanup_file(path: &Path) {
    if path.exists() {
        match fs::remove_file(path) {
            Ok(_) => debug!("Removed temp file: {:?}", path),
            Err(e) => warn!("Failed to remove {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video() {
        let json = r#"{
            "title": "Song",
            "channel": "Artist",
            "duration": 245.0,
            "view_count": 1234567,
            "thumbnail": "https://i.ytimg.com/vi/x/hq.jpg"
        }"#;
        let song = parse_video(json, "https://youtu.be/x").unwrap();
        assert_eq!(song.title, "Song");
        assert_eq!(song.channel, "Artist");
        assert_eq!(song.duration, 245);
        assert_eq!(song.views, 1_234_567);
        assert_eq!(song.url, "https://youtu.be/x");
    }

    #[test]
    fn test_parse_video_defaults() {
        let song = parse_video(r#"{"uploader": "Someone"}"#, "u").unwrap();
        assert_eq!(song.title, "Unknown");
        assert_eq!(song.channel, "Someone");
        assert_eq!(song.duration, 0);
        assert_eq!(song.views, 0);
        assert_eq!(song.thumbnail, "");
    }

    #[test]
    fn test_parse_playlist() {
        let json = r#"{
            "title": "Mix",
            "entries": [
                {"title": "A", "url": "https://youtu.be/a", "duration": 60},
                null,
                {"title": "B", "webpage_url": "https://youtu.be/b"},
                {"title": "No link"}
            ]
        }"#;
        let playlist = parse_playlist(json).unwrap().unwrap();
        assert_eq!(playlist.title, "Mix");
        assert_eq!(playlist.total, 4);
        let urls: Vec<&str> = playlist.songs.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://youtu.be/a", "https://youtu.be/b"]);

        assert!(parse_playlist(r#"{"title": "Just a video"}"#).unwrap().is_none());
        assert!(parse_playlist("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let extractor = Extractor::new("definitely-not-a-real-yt-dlp", std::env::temp_dir());
        assert!(matches!(
            extractor.song("https://youtu.be/x").await,
            Err(ExtractError::Io(_))
        ));
    }
}
