//! Library operations: search, lyrics, favorites, downloads and queue editing

use std::path::PathBuf;
use anyhow::{Result, anyhow};
use tokio::sync::mpsc;

use crate::model::browse::{album_collection, artist_collection};
use crate::model::{AlbumSummary, Collection, DownloadedSong, QueueError, Track};
use super::PlayerController;

/// How many songs a detail lookup asks the catalog for
const DETAIL_LIMIT: u32 = 50;

impl PlayerController {
    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn search(&self, query: &str, page: u32) -> Vec<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let results = self.catalog.search(query, page, self.page_limit).await;
        tracing::debug!(query, page, count = results.len(), "Search finished");
        results
    }

    pub async fn lyrics_for_current(&self) -> Option<String> {
        let track = self.current_track().await?;
        if !track.has_lyrics {
            return None;
        }
        self.catalog.lyrics(&track.id).await
    }

    /// Songs of `album`: the already known results plus whatever a catalog
    /// search for the album name adds
    pub async fn album_detail(&self, album: &AlbumSummary, known: &[Track]) -> Collection {
        let found = self.catalog.search(&album.name, 0, DETAIL_LIMIT).await;
        let detail = album_collection(album, &merge(known, found));
        tracing::debug!(album = %album.name, songs = detail.tracks.len(), "Album detail");
        detail
    }

    /// Songs by `artist`, looked up the same way as `album_detail`
    pub async fn artist_detail(&self, artist: &str, known: &[Track]) -> Collection {
        let found = self.catalog.search(artist, 0, DETAIL_LIMIT).await;
        let detail = artist_collection(artist, &merge(known, found));
        tracing::debug!(artist, songs = detail.tracks.len(), "Artist detail");
        detail
    }

    // ========================================================================
    // Queue editing
    // ========================================================================

    pub async fn current_track(&self) -> Option<Track> {
        self.queue.lock().await.current_track().cloned()
    }

    pub async fn queue_snapshot(&self) -> Vec<Track> {
        self.queue.lock().await.tracks().to_vec()
    }

    pub async fn enqueue(&self, track: Track) -> bool {
        self.queue.lock().await.add_to_queue(track)
    }

    pub async fn enqueue_next(&self, track: Track) -> bool {
        self.queue.lock().await.add_next(track)
    }

    /// Removing the current track leaves the loaded sound alone; it keeps
    /// playing until it finishes or the user skips.
    pub async fn remove_from_queue(&self, index: usize) -> Result<Track, QueueError> {
        let removed = self.queue.lock().await.remove_at(index)?;
        tracing::debug!(index, track_id = %removed.id, "Removed from queue");
        Ok(removed)
    }

    pub async fn move_in_queue(&self, from: usize, to: usize) -> Result<(), QueueError> {
        self.queue.lock().await.reorder(from, to)
    }

    pub async fn clear_queue(&self) {
        self.stop().await;
        self.queue.lock().await.clear();
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    /// Returns the new favorite state, or `None` when nothing is current
    pub async fn toggle_favorite_current(&self) -> Option<bool> {
        let track = self.current_track().await?;
        Some(self.favorites.toggle(track).await)
    }

    pub async fn is_favorite(&self, track_id: &str) -> bool {
        self.favorites.is_favorite(track_id).await
    }

    pub async fn favorites(&self) -> Vec<Track> {
        self.favorites.list().await
    }

    /// Replace the queue with the favorites list and play from `start`
    pub async fn play_favorites(&self, start: usize) -> super::SkipOutcome {
        let tracks = self.favorites.list().await;
        self.play_tracks(tracks, start).await
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    pub async fn download_current(&self, progress: Option<mpsc::UnboundedSender<f32>>) -> Result<PathBuf> {
        let track = self
            .current_track()
            .await
            .ok_or_else(|| anyhow!("Nothing is playing"))?;
        self.downloads.download(&track, progress).await
    }

    pub async fn is_downloaded(&self, track_id: &str) -> bool {
        self.downloads.is_downloaded(track_id).await
    }

    pub async fn downloads(&self) -> Vec<DownloadedSong> {
        self.downloads.list().await
    }

    pub async fn delete_download(&self, track_id: &str) -> Result<bool> {
        self.downloads.delete(track_id).await
    }

    pub async fn delete_all_downloads(&self) -> Result<()> {
        self.downloads.delete_all().await
    }

    pub async fn downloads_size(&self) -> u64 {
        self.downloads.total_size().await
    }
}

/// `known` followed by the tracks of `found` not already in it
fn merge(known: &[Track], found: Vec<Track>) -> Vec<Track> {
    let mut all = known.to_vec();
    for track in found {
        if !all.iter().any(|t| t.id == track.id) {
            all.push(track);
        }
    }
    all
}
