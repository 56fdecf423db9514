//! Core type definitions for the application

use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// One quality variant of an image or an audio stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub quality: String,
    pub url: String,
}

impl MediaVariant {
    pub fn new(quality: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            quality: quality.into(),
            url: url.into(),
        }
    }
}

/// A song as held by the queue, favorites and downloads.
///
/// Defaults for missing catalog fields are resolved once when the track is
/// built, so consumers never need to re-check for empty artists or names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    /// Length in seconds as reported by the catalog
    #[serde(default)]
    pub duration: u32,
    /// Image variants, lowest to highest quality
    #[serde(default)]
    pub images: Vec<MediaVariant>,
    /// Stream URL variants, lowest to highest quality
    #[serde(default)]
    pub sources: Vec<MediaVariant>,
    #[serde(default)]
    pub has_lyrics: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: vec![UNKNOWN_ARTIST.to_string()],
            album: None,
            album_id: None,
            duration: 0,
            images: Vec::new(),
            sources: Vec::new(),
            has_lyrics: false,
        }
    }

    pub fn with_artists(mut self, artists: Vec<String>) -> Self {
        self.artists = if artists.is_empty() {
            vec![UNKNOWN_ARTIST.to_string()]
        } else {
            artists
        };
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_album(mut self, id: &str, name: &str) -> Self {
        self.album_id = Some(id.to_string()).filter(|id| !id.is_empty());
        self.album = Some(name.to_string()).filter(|n| !n.is_empty());
        self
    }

    pub fn with_source(mut self, quality: &str, url: &str) -> Self {
        self.sources.push(MediaVariant::new(quality, url));
        self
    }

    /// Highest-quality stream URL that is not empty
    pub fn best_source(&self) -> Option<&str> {
        self.sources
            .iter()
            .rev()
            .map(|s| s.url.as_str())
            .find(|url| !url.is_empty())
    }

    pub fn best_image(&self) -> Option<&str> {
        self.images
            .iter()
            .rev()
            .map(|i| i.url.as_str())
            .find(|url| !url.is_empty())
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    All,
    One,
}

impl RepeatState {
    pub fn next(self) -> Self {
        match self {
            RepeatState::Off => RepeatState::All,
            RepeatState::All => RepeatState::One,
            RepeatState::One => RepeatState::Off,
        }
    }
}

/// What the user asked for, as opposed to what the engine reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackIntent {
    pub is_playing: bool,
    pub is_shuffle: bool,
    /// True only while a load+play sequence is in flight
    pub is_loading: bool,
}
