//! Transport controller
//!
//! Owns the single live audio handle. Every engine call goes through the
//! handle mutex, so no two operations ever touch the same sound at once.
//! Engine failures are logged here and reported to callers as `false`.

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::model::Track;
use super::engine::{AudioEngine, Sound, StatusReceiver};

const EVENT_CAPACITY: usize = 64;

/// Lookup for offline copies, preferred over network sources
#[async_trait]
pub trait LocalResolver: Send + Sync {
    async fn resolve_local(&self, track_id: &str) -> Option<String>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Loaded { track_id: String },
    /// Fires at most once per successful load
    Finished { track_id: String },
    Unloaded,
}

/// Latest position and duration in seconds
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    pub position_secs: f64,
    pub duration_secs: f64,
}

#[derive(Default)]
struct Clock {
    /// Bumped on every load/unload; stale status updates carry an older value
    generation: u64,
    position: f64,
    duration: f64,
    finished: bool,
}

struct LoadedSound {
    sound: Box<dyn Sound>,
    track_id: String,
    listener: JoinHandle<()>,
}

pub struct TransportController {
    engine: Arc<dyn AudioEngine>,
    resolver: Option<Arc<dyn LocalResolver>>,
    handle: AsyncMutex<Option<LoadedSound>>,
    clock: Arc<Mutex<Clock>>,
    progress: Arc<watch::Sender<Progress>>,
    events: broadcast::Sender<TransportEvent>,
}

impl TransportController {
    pub fn new(engine: Arc<dyn AudioEngine>, resolver: Option<Arc<dyn LocalResolver>>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            resolver,
            handle: AsyncMutex::new(None),
            clock: Arc::new(Mutex::new(Clock::default())),
            progress: Arc::new(progress),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Replace the current sound with `track`. Returns false if the track has
    /// no playable source or the engine rejects it. The previous sound is torn
    /// down in both cases, so nothing stays audible after a failed load.
    pub async fn load(&self, track: &Track) -> bool {
        let source = self.resolve_source(track).await;

        let mut handle = self.handle.lock().await;
        let generation = self.reset_clock();
        let replaced = handle.take();
        let had_previous = replaced.is_some();
        if let Some(previous) = replaced {
            Self::teardown(previous).await;
        }

        let Some(source) = source else {
            tracing::warn!(track_id = %track.id, track = %track.name, "No playable source for track");
            self.fail_load(had_previous);
            return false;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let sound = match self.engine.create(&source, tx).await {
            Ok(sound) => sound,
            Err(e) => {
                tracing::error!(track_id = %track.id, source = %source, error = %e, "Engine rejected track");
                self.fail_load(had_previous);
                return false;
            }
        };

        match sound.status().await {
            Ok(status) => {
                if let Some(duration) = status.duration_secs.filter(|d| *d > 0.0) {
                    let mut clock = lock(&self.clock);
                    if clock.generation == generation {
                        clock.duration = duration;
                    }
                }
                self.publish_progress();
            }
            Err(e) => tracing::debug!(error = %e, "Initial status unavailable"),
        }

        let listener = self.spawn_status_listener(rx, generation, track.id.clone());
        *handle = Some(LoadedSound {
            sound,
            track_id: track.id.clone(),
            listener,
        });
        drop(handle);

        tracing::info!(track_id = %track.id, track = %track.name, source = %source, "Track loaded");
        let _ = self.events.send(TransportEvent::Loaded {
            track_id: track.id.clone(),
        });
        true
    }

    pub async fn play(&self) -> bool {
        let handle = self.handle.lock().await;
        let Some(loaded) = handle.as_ref() else {
            tracing::debug!("play: nothing loaded");
            return false;
        };
        match loaded.sound.status().await {
            Ok(status) if status.is_loaded => {}
            Ok(_) => return false,
            Err(e) => {
                tracing::error!(error = %e, "play: status query failed");
                return false;
            }
        }
        match loaded.sound.play().await {
            Ok(()) => {
                tracing::debug!(track_id = %loaded.track_id, "Playback started");
                true
            }
            Err(e) => {
                tracing::error!(track_id = %loaded.track_id, error = %e, "Engine refused play");
                false
            }
        }
    }

    /// Same as `play`, for media that is loaded and paused
    pub async fn resume(&self) -> bool {
        self.play().await
    }

    pub async fn pause(&self) -> bool {
        let handle = self.handle.lock().await;
        let Some(loaded) = handle.as_ref() else {
            return false;
        };
        match loaded.sound.status().await {
            Ok(status) if status.is_loaded && status.is_playing => {}
            Ok(_) => return false,
            Err(e) => {
                tracing::error!(error = %e, "pause: status query failed");
                return false;
            }
        }
        match loaded.sound.pause().await {
            Ok(()) => {
                tracing::debug!(track_id = %loaded.track_id, "Playback paused");
                true
            }
            Err(e) => {
                tracing::error!(track_id = %loaded.track_id, error = %e, "Engine refused pause");
                false
            }
        }
    }

    pub async fn stop(&self) -> bool {
        let handle = self.handle.lock().await;
        let Some(loaded) = handle.as_ref() else {
            return false;
        };
        match loaded.sound.stop().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(track_id = %loaded.track_id, error = %e, "Engine refused stop");
                false
            }
        }
    }

    /// Absolute seek. The target is clamped to `[0, duration]` once the
    /// duration is known, and only to `>= 0` before that.
    pub async fn seek(&self, position_secs: f64) -> bool {
        if !position_secs.is_finite() {
            return false;
        }
        let duration = self.duration();
        let target = if duration > 0.0 {
            position_secs.clamp(0.0, duration)
        } else {
            position_secs.max(0.0)
        };

        let handle = self.handle.lock().await;
        let Some(loaded) = handle.as_ref() else {
            return false;
        };
        match loaded.sound.seek(target).await {
            Ok(()) => {
                lock(&self.clock).position = target;
                self.publish_progress();
                tracing::debug!(target, "Seeked");
                true
            }
            Err(e) => {
                tracing::warn!(target, error = %e, "Seek failed");
                false
            }
        }
    }

    pub async fn seek_forward(&self, delta_secs: f64) -> bool {
        self.seek_relative(delta_secs).await
    }

    pub async fn seek_backward(&self, delta_secs: f64) -> bool {
        self.seek_relative(-delta_secs).await
    }

    async fn seek_relative(&self, delta_secs: f64) -> bool {
        if !delta_secs.is_finite() {
            return false;
        }
        let target = (self.current_position() + delta_secs).max(0.0);
        self.seek(target).await
    }

    /// Last position reported by the engine, in seconds
    pub fn current_position(&self) -> f64 {
        lock(&self.clock).position
    }

    pub fn duration(&self) -> f64 {
        lock(&self.clock).duration
    }

    pub fn progress(&self) -> Progress {
        let clock = lock(&self.clock);
        Progress {
            position_secs: clock.position,
            duration_secs: clock.duration,
        }
    }

    /// Fresh engine query. Playback can change outside the app, so this does
    /// not use the cached state.
    pub async fn is_playing(&self) -> bool {
        let handle = self.handle.lock().await;
        let Some(loaded) = handle.as_ref() else {
            return false;
        };
        match loaded.sound.status().await {
            Ok(status) => status.is_loaded && status.is_playing,
            Err(e) => {
                tracing::warn!(error = %e, "Status query failed");
                false
            }
        }
    }

    pub async fn loaded_track_id(&self) -> Option<String> {
        self.handle.lock().await.as_ref().map(|l| l.track_id.clone())
    }

    /// Tear down the current sound without loading another
    pub async fn unload(&self) {
        let mut handle = self.handle.lock().await;
        self.reset_clock();
        self.publish_progress();
        if let Some(previous) = handle.take() {
            tracing::info!(track_id = %previous.track_id, "Unloading track");
            Self::teardown(previous).await;
            let _ = self.events.send(TransportEvent::Unloaded);
        }
    }

    async fn resolve_source(&self, track: &Track) -> Option<String> {
        if let Some(resolver) = &self.resolver {
            if let Some(local) = resolver.resolve_local(&track.id).await {
                tracing::debug!(track_id = %track.id, path = %local, "Using local copy");
                return Some(local);
            }
        }
        track.best_source().map(str::to_string)
    }

    /// Stop if playing, then release
    async fn teardown(previous: LoadedSound) {
        previous.listener.abort();
        let sound = previous.sound;
        match sound.status().await {
            Ok(status) if status.is_loaded && status.is_playing => {
                if let Err(e) = sound.stop().await {
                    tracing::warn!(track_id = %previous.track_id, error = %e, "Failed to stop previous sound");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(track_id = %previous.track_id, error = %e, "Previous sound status unavailable");
            }
        }
        if let Err(e) = sound.unload().await {
            tracing::warn!(track_id = %previous.track_id, error = %e, "Failed to release previous sound");
        }
    }

    /// A failed load leaves nothing loaded: watchers see the cleared clock
    fn fail_load(&self, had_previous: bool) {
        self.publish_progress();
        if had_previous {
            let _ = self.events.send(TransportEvent::Unloaded);
        }
    }

    fn reset_clock(&self) -> u64 {
        let mut clock = lock(&self.clock);
        clock.generation += 1;
        clock.position = 0.0;
        clock.duration = 0.0;
        clock.finished = false;
        clock.generation
    }

    fn publish_progress(&self) {
        self.progress.send_replace(self.progress());
    }

    fn spawn_status_listener(
        &self,
        mut updates: StatusReceiver,
        generation: u64,
        track_id: String,
    ) -> JoinHandle<()> {
        let clock = self.clock.clone();
        let progress = self.progress.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            while let Some(status) = updates.recv().await {
                if !status.is_loaded {
                    continue;
                }

                let (snapshot, finished_now) = {
                    let mut clock = lock(&clock);
                    if clock.generation != generation {
                        break;
                    }
                    clock.position = status.position_secs.max(0.0);
                    if let Some(duration) = status.duration_secs.filter(|d| *d > 0.0) {
                        clock.duration = duration;
                    }
                    let finished_now = status.did_just_finish && !clock.finished;
                    if finished_now {
                        clock.finished = true;
                    }
                    (
                        Progress {
                            position_secs: clock.position,
                            duration_secs: clock.duration,
                        },
                        finished_now,
                    )
                };

                progress.send_replace(snapshot);

                if finished_now {
                    tracing::info!(track_id = %track_id, "Track finished");
                    let _ = events.send(TransportEvent::Finished {
                        track_id: track_id.clone(),
                    });
                }
            }
            tracing::trace!(track_id = %track_id, "Status listener stopped");
        })
    }
}

fn lock(clock: &Mutex<Clock>) -> std::sync::MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(|e| e.into_inner())
}
