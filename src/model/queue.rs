//! Playback queue state
//!
//! `QueueStore` is the single source of truth for the playback order and
//! which element is current. It performs no I/O; callers wrap it in a lock
//! and route every mutation through the methods below.

use rand::{rng, seq::SliceRandom};
use thiserror::Error;

use super::types::{PlaybackIntent, RepeatState, Track};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Default)]
pub struct QueueStore {
    tracks: Vec<Track>,
    current: Option<usize>,
    intent: PlaybackIntent,
    repeat: RepeatState,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Track list
    // ========================================================================

    /// Replace the queue wholesale. The current index is left for the caller.
    pub fn set_queue(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
    }

    /// Append `track` unless a track with the same id is already queued.
    /// Returns whether the queue changed.
    pub fn add_to_queue(&mut self, track: Track) -> bool {
        if self.contains(&track.id) {
            tracing::trace!(track_id = %track.id, "Track already queued, ignoring");
            return false;
        }
        self.tracks.push(track);
        true
    }

    /// Insert `track` right after the current one (or at the front).
    pub fn add_next(&mut self, track: Track) -> bool {
        if self.contains(&track.id) {
            tracing::trace!(track_id = %track.id, "Track already queued, ignoring");
            return false;
        }
        let at = self.current.map_or(0, |i| i + 1).min(self.tracks.len());
        self.tracks.insert(at, track);
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Track, QueueError> {
        self.check(index)?;
        let removed = self.tracks.remove(index);

        self.current = match self.current {
            Some(cur) if index < cur => Some(cur - 1),
            Some(cur) if index == cur => {
                if cur < self.tracks.len() {
                    Some(cur)
                } else if !self.tracks.is_empty() {
                    Some(self.tracks.len() - 1)
                } else {
                    None
                }
            }
            other => other,
        };

        Ok(removed)
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), QueueError> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Err(QueueError::OutOfRange {
                index: to,
                len: self.tracks.len(),
            });
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(cur) = self.current {
            self.current = Some(if cur == from {
                to
            } else if from < cur && cur <= to {
                cur - 1
            } else if to <= cur && cur < from {
                cur + 1
            } else {
                cur
            });
        }
        Ok(())
    }

    /// Shuffle the queue. The current track, if any, becomes entry 0 and the
    /// rest is uniformly permuted.
    pub fn shuffle_in_place(&mut self) {
        if self.tracks.len() <= 1 {
            return;
        }

        let mut rng = rng();
        match self.current {
            Some(cur) => {
                let current = self.tracks.remove(cur);
                self.tracks.shuffle(&mut rng);
                self.tracks.insert(0, current);
                self.current = Some(0);
            }
            None => self.tracks.shuffle(&mut rng),
        }
    }

    /// Direct pointer set. The index is not validated.
    pub fn set_current_index(&mut self, index: Option<usize>) {
        self.current = index;
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn track_at(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.position_of(track_id).is_some()
    }

    /// Index that skip-next or auto-advance should move to
    pub fn next_index(&self) -> Option<usize> {
        let cur = self.current?;
        if cur + 1 < self.tracks.len() {
            Some(cur + 1)
        } else if self.repeat == RepeatState::All && !self.tracks.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        match self.current? {
            0 => None,
            cur => Some(cur - 1),
        }
    }

    fn check(&self, index: usize) -> Result<(), QueueError> {
        if index < self.tracks.len() {
            Ok(())
        } else {
            Err(QueueError::OutOfRange {
                index,
                len: self.tracks.len(),
            })
        }
    }

    // ========================================================================
    // Playback intent
    // ========================================================================

    pub fn intent(&self) -> PlaybackIntent {
        self.intent
    }

    pub fn is_playing(&self) -> bool {
        self.intent.is_playing
    }

    pub fn set_playing(&mut self, is_playing: bool) {
        self.intent.is_playing = is_playing;
    }

    pub fn is_shuffle(&self) -> bool {
        self.intent.is_shuffle
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.intent.is_shuffle = shuffle;
    }

    pub fn is_loading(&self) -> bool {
        self.intent.is_loading
    }

    /// Claim the loading gate. Returns false if a sequence is already in flight.
    pub fn try_begin_loading(&mut self) -> bool {
        if self.intent.is_loading {
            return false;
        }
        self.intent.is_loading = true;
        true
    }

    pub fn finish_loading(&mut self) {
        self.intent.is_loading = false;
    }

    pub fn repeat(&self) -> RepeatState {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatState) {
        self.repeat = repeat;
    }

    pub fn cycle_repeat(&mut self) -> RepeatState {
        self.repeat = self.repeat.next();
        self.repeat
    }
}
