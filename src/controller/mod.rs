//! Controller module - Playback orchestration and user intents
//!
//! This module keeps the queue store and the transport controller consistent.
//! It is organized into submodules by responsibility:
//!
//! - `playback`: Skip/select sequencing, play/pause, shuffle, repeat, seeking
//! - `library`: Search, lyrics, favorites, downloads and queue editing
//! - `player_events`: Transport event listener driving auto-advance

mod playback;
mod library;
mod player_events;

use std::sync::Arc;
use tokio::sync::{Mutex, watch};

use crate::audio::{Progress, TransportController};
use crate::model::{Catalog, Downloads, Favorites, NowPlaying, QueueStore};

pub use playback::SkipOutcome;

#[derive(Clone)]
pub struct PlayerController {
    pub(crate) queue: Arc<Mutex<QueueStore>>,
    pub(crate) transport: Arc<TransportController>,
    pub(crate) favorites: Favorites,
    pub(crate) downloads: Downloads,
    pub(crate) catalog: Arc<dyn Catalog>,
    seek_step_secs: f64,
    page_limit: u32,
    event_listener_started: Arc<Mutex<bool>>,
}

impl PlayerController {
    pub fn new(
        queue: Arc<Mutex<QueueStore>>,
        transport: Arc<TransportController>,
        favorites: Favorites,
        downloads: Downloads,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            queue,
            transport,
            favorites,
            downloads,
            catalog,
            seek_step_secs: 5.0,
            page_limit: 10,
            event_listener_started: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_seek_step(mut self, secs: f64) -> Self {
        self.seek_step_secs = secs;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn seek_step(&self) -> f64 {
        self.seek_step_secs
    }

    /// Start the transport event listener once
    pub async fn try_start_event_listener(&self) {
        let mut started = self.event_listener_started.lock().await;
        if *started {
            return;
        }
        *started = true;
        let events = self.transport.subscribe();
        drop(started);
        self.start_player_event_listener(events);
    }

    /// Position updates pushed by the transport as the engine reports them
    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        self.transport.watch_progress()
    }

    pub async fn now_playing(&self) -> NowPlaying {
        let progress = self.transport.progress();
        let queue = self.queue.lock().await;
        let intent = queue.intent();

        NowPlaying {
            track: queue.current_track().cloned(),
            index: queue.current_index(),
            queue_len: queue.len(),
            position_secs: progress.position_secs,
            duration_secs: progress.duration_secs,
            is_playing: intent.is_playing,
            is_loading: intent.is_loading,
            is_shuffle: intent.is_shuffle,
            repeat: queue.repeat(),
        }
    }
}

#[cfg(test)]
mod tests;
