//! Playback control methods
//!
//! Every move to another track runs the same sequence: claim the loading
//! gate, move the queue pointer, load, play, then release the gate. The
//! pointer moves before any I/O so the new track is visible immediately;
//! `is_playing` only turns true after the engine confirms playback.

use crate::model::{QueueStore, RepeatState, Track};

use super::PlayerController;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Another sequence was in flight; nothing changed
    Dropped,
    /// There was no track to move to
    NoTrack,
    /// Already at the first track, so it was restarted instead
    Restarted,
    LoadFailed,
    PlayFailed,
    Playing,
}

impl PlayerController {
    /// Replace the queue with `tracks` and start playing at `start`
    pub async fn play_tracks(&self, tracks: Vec<Track>, start: usize) -> SkipOutcome {
        if start >= tracks.len() {
            return SkipOutcome::NoTrack;
        }
        self.move_to(move |queue| {
            queue.set_queue(tracks);
            Some(start)
        })
        .await
    }

    /// Select the queue entry at `index` and play it
    pub async fn play_index(&self, index: usize) -> SkipOutcome {
        self.move_to(|queue| Some(index).filter(|i| *i < queue.len()))
            .await
    }

    pub async fn next_track(&self) -> SkipOutcome {
        tracing::debug!("Skipping to next track");
        self.move_to(|queue| queue.next_index()).await
    }

    /// Go back one track, or restart the current one when at the front
    pub async fn previous_track(&self) -> SkipOutcome {
        let restart = {
            let queue = self.queue.lock().await;
            if queue.is_loading() {
                return SkipOutcome::Dropped;
            }
            queue.previous_index().is_none() && queue.current_index().is_some()
        };
        if restart {
            self.transport.seek(0.0).await;
            return SkipOutcome::Restarted;
        }
        self.move_to(|queue| queue.previous_index()).await
    }

    pub async fn toggle_playback(&self) -> bool {
        let (is_playing, current) = {
            let queue = self.queue.lock().await;
            if queue.is_loading() {
                return queue.is_playing();
            }
            let current = queue.current_index().zip(queue.current_track().map(|t| t.id.clone()));
            (queue.is_playing(), current)
        };
        tracing::debug!(is_playing, "Toggling playback");

        if is_playing {
            if self.transport.pause().await {
                self.queue.lock().await.set_playing(false);
                tracing::info!(action = "paused", "Playback toggled");
                return false;
            }
            return true;
        }

        let Some((current_index, current_id)) = current else {
            return false;
        };

        // The loaded sound may belong to a track that has since been replaced
        if self.transport.loaded_track_id().await.as_deref() != Some(current_id.as_str()) {
            return self.play_index(current_index).await == SkipOutcome::Playing;
        }

        if self.transport.resume().await {
            self.queue.lock().await.set_playing(true);
            tracing::info!(action = "resumed", "Playback toggled");
            true
        } else {
            false
        }
    }

    /// Bring `is_playing` in line with the engine after changes made outside
    /// the app, such as an OS audio interruption
    pub async fn sync_playing_state(&self) -> bool {
        let engine_playing = self.transport.is_playing().await;
        let mut queue = self.queue.lock().await;
        if !queue.is_loading() && queue.is_playing() != engine_playing {
            tracing::debug!(engine_playing, "Playback state changed outside the app");
            queue.set_playing(engine_playing);
        }
        queue.is_playing()
    }

    /// Turning shuffle on reorders the queue; turning it off keeps the order
    pub async fn toggle_shuffle(&self) -> bool {
        let mut queue = self.queue.lock().await;
        let shuffle = !queue.is_shuffle();
        if shuffle {
            queue.shuffle_in_place();
        }
        queue.set_shuffle(shuffle);
        tracing::info!(shuffle, "Shuffle toggled");
        shuffle
    }

    pub async fn cycle_repeat(&self) -> RepeatState {
        let repeat = self.queue.lock().await.cycle_repeat();
        tracing::info!(?repeat, "Repeat mode changed");
        repeat
    }

    pub async fn seek_forward(&self) -> bool {
        self.transport.seek_forward(self.seek_step()).await
    }

    pub async fn seek_backward(&self) -> bool {
        self.transport.seek_backward(self.seek_step()).await
    }

    /// Seek to a fraction of the track, as a progress-bar drag does
    pub async fn seek_to_fraction(&self, fraction: f64) -> bool {
        let duration = self.transport.duration();
        if duration <= 0.0 || !fraction.is_finite() {
            return false;
        }
        self.transport.seek(duration * fraction.clamp(0.0, 1.0)).await
    }

    pub async fn stop(&self) {
        self.transport.unload().await;
        self.queue.lock().await.set_playing(false);
    }

    /// Claim the gate, pick the target under the same lock, and run the sequence
    pub(crate) async fn move_to<F>(&self, target: F) -> SkipOutcome
    where
        F: FnOnce(&mut QueueStore) -> Option<usize>,
    {
        let track = {
            let mut queue = self.queue.lock().await;
            if !queue.try_begin_loading() {
                tracing::debug!("Skip request dropped, load in flight");
                return SkipOutcome::Dropped;
            }
            let track = target(&mut queue).and_then(|i| Some((i, queue.track_at(i).cloned()?)));
            let Some((index, track)) = track else {
                queue.finish_loading();
                return SkipOutcome::NoTrack;
            };
            queue.set_current_index(Some(index));
            track
        };

        self.run_sequence(track).await
    }

    async fn run_sequence(&self, track: Track) -> SkipOutcome {
        tracing::debug!(track_id = %track.id, track = %track.name, "Loading track");

        let outcome = if !self.transport.load(&track).await {
            SkipOutcome::LoadFailed
        } else if !self.transport.play().await {
            SkipOutcome::PlayFailed
        } else {
            SkipOutcome::Playing
        };

        let mut queue = self.queue.lock().await;
        queue.set_playing(outcome == SkipOutcome::Playing);
        queue.finish_loading();
        drop(queue);

        match outcome {
            SkipOutcome::Playing => tracing::info!(track_id = %track.id, "Now playing"),
            other => tracing::warn!(track_id = %track.id, ?other, "Track did not start"),
        }
        outcome
    }
}
