use std::{env, path::{Path, PathBuf}};

use super::schema::Settings;

impl Settings {
    /// Load settings from the resolved config path and the environment.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(resolve_config_path().as_deref())
    }

    /// Load settings from an explicit file (which may be missing) and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("TEMPO")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Reject values the player cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.catalog.base_url.trim().is_empty() {
            return Err("catalog.base_url must not be empty".to_string());
        }
        if self.catalog.page_limit == 0 {
            return Err("catalog.page_limit must be >= 1".to_string());
        }
        if self.catalog.timeout_secs == 0 {
            return Err("catalog.timeout_secs must be >= 1".to_string());
        }
        if !(self.playback.seek_step_secs.is_finite() && self.playback.seek_step_secs > 0.0) {
            return Err("playback.seek_step_secs must be > 0".to_string());
        }
        if self.playback.status_interval_ms == 0 {
            return Err("playback.status_interval_ms must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `TEMPO_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("TEMPO_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/tempo/config.toml`, or `~/.config/tempo/config.toml`
/// when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("tempo").join("config.toml"))
}

/// `$XDG_DATA_HOME/tempo`, or `~/.local/share/tempo`, or `./tempo-data`.
pub(super) fn default_data_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("tempo");
    }
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local").join("share").join("tempo"),
        None => PathBuf::from("tempo-data"),
    }
}
