//! Remote song catalog client
//!
//! The catalog is a black box to the rest of the application: searches that
//! fail for any reason come back as an empty list, lyrics lookups as `None`.

use std::time::Duration;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::types::{MediaVariant, Track, UNKNOWN_TITLE};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(&self, query: &str, page: u32, limit: u32) -> Vec<Track>;
    async fn lyrics(&self, track_id: &str) -> Option<String>;
}

#[derive(Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    async fn try_search(&self, query: &str, page: u32, limit: u32) -> Result<Vec<Track>> {
        let url = format!("{}/search/songs", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("query", query.to_string()), ("page", page.to_string()), ("limit", limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        Ok(body
            .data
            .map(|d| d.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawSong::into_track)
            .collect())
    }

    async fn try_lyrics(&self, track_id: &str) -> Result<Option<String>> {
        let url = format!("{}/songs/{}", self.base_url, track_id);
        let body: SongResponse = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(body
            .data
            .into_iter()
            .next()
            .and_then(|s| s.lyrics)
            .filter(|l| !l.trim().is_empty()))
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search(&self, query: &str, page: u32, limit: u32) -> Vec<Track> {
        crate::log_api_request!("search", query, page, limit);
        let result = self.try_search(query, page, limit).await;
        crate::log_api_result!("search", result);
        result.unwrap_or_default()
    }

    async fn lyrics(&self, track_id: &str) -> Option<String> {
        crate::log_api_request!("lyrics", track_id);
        let result = self.try_lyrics(track_id).await;
        crate::log_api_result!("lyrics", result);
        result.ok().flatten()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    results: Vec<RawSong>,
}

#[derive(Deserialize)]
struct SongResponse {
    #[serde(default)]
    data: Vec<RawLyrics>,
}

#[derive(Deserialize)]
struct RawLyrics {
    #[serde(default)]
    lyrics: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSong {
    id: Option<String>,
    name: Option<String>,
    duration: Value,
    has_lyrics: bool,
    album: Option<RawNamed>,
    artists: Option<RawArtists>,
    image: Vec<RawVariant>,
    download_url: Vec<RawVariant>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawNamed {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawArtists {
    primary: Vec<RawNamed>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawVariant {
    quality: String,
    url: String,
}

impl RawSong {
    /// Resolve every optional field once. Records without an id are dropped.
    fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let artists = self
            .artists
            .map(|a| a.primary.into_iter().filter_map(|n| n.name).collect())
            .unwrap_or_default();

        let duration = match &self.duration {
            Value::Number(n) => n.as_f64().map(|d| d.max(0.0) as u32).unwrap_or(0),
            Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
            _ => 0,
        };

        let variants = |raw: Vec<RawVariant>| -> Vec<MediaVariant> {
            raw.into_iter()
                .map(|v| MediaVariant::new(v.quality, v.url))
                .collect()
        };

        let (album_id, album_name) = self
            .album
            .map(|a| (a.id.unwrap_or_default(), a.name.unwrap_or_default()))
            .unwrap_or_default();

        let mut track = Track::new(id, name)
            .with_artists(artists)
            .with_duration(duration)
            .with_album(&album_id, &album_name);
        track.images = variants(self.image);
        track.sources = variants(self.download_url);
        track.has_lyrics = self.has_lyrics;
        Some(track)
    }
}
