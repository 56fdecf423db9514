use std::path::PathBuf;
use serde::Deserialize;

use crate::model::RepeatState;
use super::load::default_data_dir;

/// Top-level application settings loaded from `config.toml`.
///
/// Default path: `$XDG_CONFIG_HOME/tempo/config.toml` or `~/.config/tempo/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `TEMPO__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub playback: PlaybackSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Root of the song catalog API, without a trailing slash.
    pub base_url: String,
    /// Results requested per search page.
    pub page_limit: u32,
    /// Request timeout for catalog calls (seconds).
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: "https://saavn.sumit.co/api".to_string(),
            page_limit: 10,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Seconds moved by seek forward / backward.
    pub seek_step_secs: f64,
    /// Repeat mode at startup.
    pub repeat: RepeatState,
    /// How often the audio engine reports position while playing (milliseconds).
    pub status_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            seek_step_secs: 5.0,
            repeat: RepeatState::Off,
            status_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Favorites, the download index and downloaded files live here.
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageSettings {
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for rolling log files.
    pub dir: PathBuf,
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".logs"),
            filter: "tempo=debug,reqwest=info,warn".to_string(),
        }
    }
}
