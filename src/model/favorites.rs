//! Favorite songs, kept in memory for fast lookup and persisted after every change

use std::sync::Arc;
use anyhow::Result;
use tokio::sync::RwLock;

use super::storage::KeyValueStore;
use super::types::Track;

const FAVORITES_KEY: &str = "favorites";

#[derive(Clone)]
pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
    tracks: Arc<RwLock<Vec<Track>>>,
}

impl Favorites {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            tracks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Read the persisted list. A missing entry is an empty list.
    pub async fn load(&self) -> Result<()> {
        let Some(bytes) = self.store.get(FAVORITES_KEY).await? else {
            return Ok(());
        };
        let mut loaded: Vec<Track> = serde_json::from_slice(&bytes)?;

        // Older files may carry duplicates; keep the first of each id
        let mut seen = std::collections::HashSet::new();
        loaded.retain(|t| seen.insert(t.id.clone()));

        tracing::debug!(count = loaded.len(), "Favorites loaded");
        *self.tracks.write().await = loaded;
        Ok(())
    }

    pub async fn is_favorite(&self, track_id: &str) -> bool {
        self.tracks.read().await.iter().any(|t| t.id == track_id)
    }

    pub async fn list(&self) -> Vec<Track> {
        self.tracks.read().await.clone()
    }

    /// Returns false if the track was already a favorite
    pub async fn add(&self, track: Track) -> bool {
        {
            let mut tracks = self.tracks.write().await;
            if tracks.iter().any(|t| t.id == track.id) {
                return false;
            }
            tracing::info!(track_id = %track.id, "Added to favorites");
            tracks.push(track);
        }
        self.persist().await;
        true
    }

    pub async fn remove(&self, track_id: &str) -> bool {
        {
            let mut tracks = self.tracks.write().await;
            let before = tracks.len();
            tracks.retain(|t| t.id != track_id);
            if tracks.len() == before {
                return false;
            }
            tracing::info!(track_id, "Removed from favorites");
        }
        self.persist().await;
        true
    }

    /// Flip membership; returns the new state
    pub async fn toggle(&self, track: Track) -> bool {
        if self.is_favorite(&track.id).await {
            self.remove(&track.id).await;
            false
        } else {
            self.add(track).await;
            true
        }
    }

    async fn persist(&self) {
        let bytes = {
            let tracks = self.tracks.read().await;
            match serde_json::to_vec(&*tracks) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode favorites");
                    return;
                }
            }
        };
        if let Err(e) = self.store.set(FAVORITES_KEY, bytes).await {
            tracing::warn!(error = %e, "Failed to save favorites");
        }
    }
}
