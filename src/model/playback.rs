//! Now-playing snapshot for the presentation layer

use std::fmt;

use super::types::{RepeatState, Track};

/// Everything a now-playing surface needs, read in one go
#[derive(Clone, Debug, Default)]
pub struct NowPlaying {
    pub track: Option<Track>,
    pub index: Option<usize>,
    pub queue_len: usize,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub is_playing: bool,
    pub is_loading: bool,
    pub is_shuffle: bool,
    pub repeat: RepeatState,
}

impl NowPlaying {
    /// Fraction of the track already played, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
    }
}

pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0:00".to_string();
    }
    let total = secs as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

impl fmt::Display for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(track) = &self.track else {
            return write!(f, "No track playing");
        };

        let state = if self.is_loading {
            "loading"
        } else if self.is_playing {
            "playing"
        } else {
            "paused"
        };

        write!(
            f,
            "[{state}] {} - {} ({} / {})",
            track.name,
            track.artist_line(),
            format_time(self.position_secs),
            format_time(self.duration_secs),
        )?;

        if let Some(i) = self.index {
            write!(f, "  #{}/{}", i + 1, self.queue_len)?;
        }
        if self.is_shuffle {
            write!(f, "  shuffle")?;
        }
        match self.repeat {
            RepeatState::Off => Ok(()),
            RepeatState::All => write!(f, "  repeat:all"),
            RepeatState::One => write!(f, "  repeat:one"),
        }
    }
}
