//! Offline copies of songs and the index that tracks them

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, mpsc};

use crate::audio::LocalResolver;
use super::storage::KeyValueStore;
use super::types::Track;

const DOWNLOADS_KEY: &str = "downloaded_songs";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadedSong {
    pub id: String,
    pub local_path: PathBuf,
    pub downloaded_at: DateTime<Utc>,
    pub track: Track,
}

#[derive(Clone)]
pub struct Downloads {
    dir: PathBuf,
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
    entries: Arc<RwLock<Vec<DownloadedSong>>>,
}

impl Downloads {
    pub fn new(dir: impl Into<PathBuf>, store: Arc<dyn KeyValueStore>, http: reqwest::Client) -> Self {
        Self {
            dir: dir.into(),
            store,
            http,
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn load(&self) -> Result<()> {
        let Some(bytes) = self.store.get(DOWNLOADS_KEY).await? else {
            return Ok(());
        };
        let loaded: Vec<DownloadedSong> = serde_json::from_slice(&bytes)?;
        tracing::debug!(count = loaded.len(), "Download index loaded");
        *self.entries.write().await = loaded;
        Ok(())
    }

    pub async fn list(&self) -> Vec<DownloadedSong> {
        self.entries.read().await.clone()
    }

    /// Path of the local copy, if it is recorded and still on disk
    pub async fn local_path(&self, track_id: &str) -> Option<PathBuf> {
        let path = {
            let entries = self.entries.read().await;
            entries.iter().find(|e| e.id == track_id)?.local_path.clone()
        };
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    pub async fn is_downloaded(&self, track_id: &str) -> bool {
        self.local_path(track_id).await.is_some()
    }

    /// Fetch the highest-quality source of `track` into the downloads
    /// directory. Progress in `0.0..=1.0` is sent on `progress` when the
    /// server reports a content length.
    pub async fn download(
        &self,
        track: &Track,
        progress: Option<mpsc::UnboundedSender<f32>>,
    ) -> Result<PathBuf> {
        let url = track
            .best_source()
            .ok_or_else(|| anyhow!("No download URL available for {}", track.id))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.file_path(&track.id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(track_id = %track.id, "Already on disk, skipping download");
            self.record(track, &path).await;
            return Ok(path);
        }

        tracing::info!(track_id = %track.id, url, "Downloading track");
        let response = self.http.get(url).send().await?.error_for_status()?;
        let total = response.content_length();

        let partial = path.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let (Some(tx), Some(total)) = (&progress, total) {
                if total > 0 {
                    let _ = tx.send(written as f32 / total as f32);
                }
            }
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, &path).await?;

        tracing::info!(track_id = %track.id, bytes = written, "Download finished");
        self.record(track, &path).await;
        Ok(path)
    }

    pub async fn delete(&self, track_id: &str) -> Result<bool> {
        let removed = {
            let mut entries = self.entries.write().await;
            let Some(pos) = entries.iter().position(|e| e.id == track_id) else {
                return Ok(false);
            };
            entries.remove(pos)
        };

        match tokio::fs::remove_file(&removed.local_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(track_id, "Deleted download");
        self.persist().await;
        Ok(true)
    }

    pub async fn delete_all(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.dir).await?;
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        self.entries.write().await.clear();
        if let Err(e) = self.store.remove(DOWNLOADS_KEY).await {
            tracing::warn!(error = %e, "Failed to clear download index");
        }
        tracing::info!("Deleted all downloads");
        Ok(())
    }

    /// Bytes on disk across all recorded downloads
    pub async fn total_size(&self) -> u64 {
        let paths: Vec<PathBuf> = self
            .entries
            .read()
            .await
            .iter()
            .map(|e| e.local_path.clone())
            .collect();

        let mut total = 0;
        for path in paths {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                total += meta.len();
            }
        }
        total
    }

    fn file_path(&self, track_id: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", file_stem(track_id)))
    }

    async fn record(&self, track: &Track, path: &Path) {
        {
            let mut entries = self.entries.write().await;
            if entries.iter().any(|e| e.id == track.id) {
                return;
            }
            entries.push(DownloadedSong {
                id: track.id.clone(),
                local_path: path.to_path_buf(),
                downloaded_at: Utc::now(),
                track: track.clone(),
            });
        }
        self.persist().await;
    }

    async fn persist(&self) {
        let bytes = {
            let entries = self.entries.read().await;
            match serde_json::to_vec(&*entries) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode download index");
                    return;
                }
            }
        };
        if let Err(e) = self.store.set(DOWNLOADS_KEY, bytes).await {
            tracing::warn!(error = %e, "Failed to save download index");
        }
    }
}

#[async_trait]
impl LocalResolver for Downloads {
    async fn resolve_local(&self, track_id: &str) -> Option<String> {
        self.local_path(track_id)
            .await
            .map(|p| p.to_string_lossy().into_owned())
    }
}

/// Ids made of ASCII letters, digits and '-' are used as they are. Anything
/// else becomes '_' followed by the hex of its bytes. Plain stems never
/// contain '_', so two ids never share a file.
fn file_stem(track_id: &str) -> String {
    let plain = !track_id.is_empty()
        && track_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if plain {
        return track_id.to_string();
    }
    let mut stem = String::with_capacity(1 + track_id.len() * 2);
    stem.push('_');
    for byte in track_id.bytes() {
        stem.push_str(&format!("{byte:02x}"));
    }
    stem
}
