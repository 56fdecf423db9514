//! Audio engine seam
//!
//! The transport controller talks to the platform audio engine only through
//! these traits. An engine opens one `Sound` per source; each sound pushes
//! its status on the channel handed to `create`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no sound is loaded")]
    NotLoaded,
    #[error("cannot open {source_url}: {reason}")]
    Open { source_url: String, reason: String },
    #[error("cannot decode audio: {0}")]
    Decode(String),
    #[error("seek rejected: {0}")]
    Seek(String),
    #[error("audio engine is not running")]
    Disconnected,
    #[error("engine refused the request: {0}")]
    Rejected(String),
}

/// Snapshot of one sound as reported by the engine
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SoundStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_secs: f64,
    /// `None` until the engine knows the length
    pub duration_secs: Option<f64>,
    /// Set on the update that observes the end of the media
    pub did_just_finish: bool,
}

pub type StatusSender = mpsc::UnboundedSender<SoundStatus>;
pub type StatusReceiver = mpsc::UnboundedReceiver<SoundStatus>;

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Open `source` (URL or local path) paused at position zero.
    async fn create(&self, source: &str, updates: StatusSender) -> Result<Box<dyn Sound>, EngineError>;
}

#[async_trait]
pub trait Sound: Send + Sync {
    async fn play(&self) -> Result<(), EngineError>;
    async fn pause(&self) -> Result<(), EngineError>;
    async fn stop(&self) -> Result<(), EngineError>;
    async fn seek(&self, position_secs: f64) -> Result<(), EngineError>;
    async fn status(&self) -> Result<SoundStatus, EngineError>;
    /// Release the underlying resources. The sound is unusable afterwards.
    async fn unload(&self) -> Result<(), EngineError>;
}
