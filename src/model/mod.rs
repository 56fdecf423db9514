//! Model module - Application state and data types
//!
//! This module contains the data structures and state management for the application.
//! It is organized into submodules by responsibility:
//!
//! - `types`: Core type definitions (tracks, repeat mode, playback intent)
//! - `queue`: Playback queue with current-track pointer
//! - `playback`: Now-playing snapshot handed to the presentation layer
//! - `storage`: Durable key-value persistence
//! - `favorites`: Favorite songs
//! - `downloads`: Offline copies and their index
//! - `catalog`: Remote song catalog client
//! - `browse`: Album and artist grouping of search results

mod types;
mod queue;
mod playback;
mod storage;
mod favorites;
mod downloads;
mod catalog;
pub mod browse;

pub use types::{RepeatState, Track};

pub use queue::{QueueError, QueueStore};

pub use playback::{NowPlaying, format_time};

pub use storage::{FileStore, KeyValueStore, MemoryStore};

pub use favorites::Favorites;

pub use downloads::{DownloadedSong, Downloads};

pub use catalog::{Catalog, HttpCatalog};

pub use browse::{AlbumSummary, ArtistSummary, Collection, SortOrder};
