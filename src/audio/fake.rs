//! Scriptable engine for tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use tokio::sync::Notify;

use super::engine::{AudioEngine, EngineError, Sound, SoundStatus, StatusSender};

#[derive(Default)]
struct EngineState {
    calls: Vec<String>,
    rejected_sources: HashSet<String>,
    refuse_play: bool,
    duration_secs: Option<f64>,
    live: usize,
    max_live: usize,
    current: Option<Arc<Mutex<SoundState>>>,
    updates: Option<StatusSender>,
}

#[derive(Default)]
struct SoundState {
    loaded: bool,
    playing: bool,
    position: f64,
    duration: Option<f64>,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
    create_started: Arc<Notify>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.set_duration(Some(180.0));
        engine
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("create ").map(str::to_string))
            .collect()
    }

    pub fn reject_source(&self, source: &str) {
        self.state().rejected_sources.insert(source.to_string());
    }

    pub fn refuse_play(&self, refuse: bool) {
        self.state().refuse_play = refuse;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state().duration_secs = duration;
    }

    pub fn max_live(&self) -> usize {
        self.state().max_live
    }

    pub fn live(&self) -> usize {
        self.state().live
    }

    /// Hold every following `create` until the returned notify is signalled
    pub fn hold_creates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release_creates(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    /// Resolves once a `create` call has started
    pub async fn create_started(&self) {
        self.create_started.notified().await;
    }

    /// Set the externally observed play state, as an OS interruption would
    pub fn set_playing_externally(&self, playing: bool) {
        if let Some(sound) = &self.state().current {
            sound.lock().unwrap().playing = playing;
        }
    }

    /// Push a status update for the current sound
    pub fn emit(&self, position: f64, did_just_finish: bool) {
        let state = self.state();
        let Some(sound) = &state.current else { return };
        let status = {
            let mut sound = sound.lock().unwrap();
            sound.position = position;
            if did_just_finish {
                sound.playing = false;
            }
            SoundStatus {
                is_loaded: sound.loaded,
                is_playing: sound.playing,
                position_secs: position,
                duration_secs: sound.duration,
                did_just_finish,
            }
        };
        if let Some(tx) = &state.updates {
            let _ = tx.send(status);
        }
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn create(&self, source: &str, updates: StatusSender) -> Result<Box<dyn Sound>, EngineError> {
        self.state().calls.push(format!("create {source}"));
        self.create_started.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state();
        if state.rejected_sources.contains(source) {
            return Err(EngineError::Open {
                source_url: source.to_string(),
                reason: "rejected by test".to_string(),
            });
        }

        let sound = Arc::new(Mutex::new(SoundState {
            loaded: true,
            duration: state.duration_secs,
            ..Default::default()
        }));
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.current = Some(sound.clone());
        state.updates = Some(updates);

        Ok(Box::new(FakeSound {
            engine: self.state.clone(),
            sound,
        }))
    }
}

struct FakeSound {
    engine: Arc<Mutex<EngineState>>,
    sound: Arc<Mutex<SoundState>>,
}

impl FakeSound {
    fn record(&self, call: &str) {
        self.engine.lock().unwrap().calls.push(call.to_string());
    }

    fn loaded(&self) -> Result<std::sync::MutexGuard<'_, SoundState>, EngineError> {
        let sound = self.sound.lock().unwrap();
        if sound.loaded { Ok(sound) } else { Err(EngineError::NotLoaded) }
    }
}

#[async_trait]
impl Sound for FakeSound {
    async fn play(&self) -> Result<(), EngineError> {
        self.record("play");
        if self.engine.lock().unwrap().refuse_play {
            return Err(EngineError::Rejected("play refused by test".to_string()));
        }
        self.loaded()?.playing = true;
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.record("pause");
        self.loaded()?.playing = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.record("stop");
        let mut sound = self.loaded()?;
        sound.playing = false;
        sound.position = 0.0;
        Ok(())
    }

    async fn seek(&self, position_secs: f64) -> Result<(), EngineError> {
        self.record(&format!("seek {position_secs}"));
        self.loaded()?.position = position_secs;
        Ok(())
    }

    async fn status(&self) -> Result<SoundStatus, EngineError> {
        let sound = self.sound.lock().unwrap();
        Ok(SoundStatus {
            is_loaded: sound.loaded,
            is_playing: sound.playing,
            position_secs: sound.position,
            duration_secs: sound.duration,
            did_just_finish: false,
        })
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.record("unload");
        let mut sound = self.sound.lock().unwrap();
        if sound.loaded {
            sound.loaded = false;
            sound.playing = false;
            drop(sound);
            self.engine.lock().unwrap().live -= 1;
        }
        Ok(())
    }
}
