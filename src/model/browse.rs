//! Album and artist views built from song search results

use std::collections::HashMap;
use std::str::FromStr;

use super::types::{Track, UNKNOWN_ARTIST};

pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// An album seen in a set of search results
#[derive(Clone, Debug, PartialEq)]
pub struct AlbumSummary {
    /// Catalog album id, or the album name when the catalog has none
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub song_count: usize,
}

/// An artist seen in a set of search results, keyed by name
#[derive(Clone, Debug, PartialEq)]
pub struct ArtistSummary {
    pub name: String,
    pub image: Option<String>,
    pub song_count: usize,
}

/// Songs of one album or artist, with the artists involved and the total length
#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub name: String,
    pub tracks: Vec<Track>,
    pub artists: Vec<String>,
    /// Sum of the song durations, in seconds
    pub total_duration: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most songs first
    #[default]
    Popular,
    AToZ,
    ZToA,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "popular" | "pop" => Ok(SortOrder::Popular),
            "az" | "a-z" | "asc" => Ok(SortOrder::AToZ),
            "za" | "z-a" | "desc" => Ok(SortOrder::ZToA),
            other => Err(format!("unknown sort '{other}', use popular, az or za")),
        }
    }
}

/// Anything listed in a browse view
pub trait Grouped {
    fn name(&self) -> &str;
    fn song_count(&self) -> usize;
}

impl Grouped for AlbumSummary {
    fn name(&self) -> &str {
        &self.name
    }

    fn song_count(&self) -> usize {
        self.song_count
    }
}

impl Grouped for ArtistSummary {
    fn name(&self) -> &str {
        &self.name
    }

    fn song_count(&self) -> usize {
        self.song_count
    }
}

/// Stable sort, so equal entries keep the order they were first seen in
pub fn sort_groups<T: Grouped>(items: &mut [T], order: SortOrder) {
    match order {
        SortOrder::Popular => items.sort_by(|a, b| b.song_count().cmp(&a.song_count())),
        SortOrder::AToZ => items.sort_by_key(|item| item.name().to_lowercase()),
        SortOrder::ZToA => items.sort_by(|a, b| b.name().to_lowercase().cmp(&a.name().to_lowercase())),
    }
}

fn album_key(track: &Track) -> (String, String) {
    let name = track.album.clone().unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
    let id = track.album_id.clone().unwrap_or_else(|| name.clone());
    (id, name)
}

fn lead_artist(track: &Track) -> &str {
    track.artists.first().map(String::as_str).unwrap_or(UNKNOWN_ARTIST)
}

/// Albums in order of first appearance; the first song seen supplies the cover
pub fn group_albums(tracks: &[Track]) -> Vec<AlbumSummary> {
    let mut albums: Vec<AlbumSummary> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for track in tracks {
        let (id, name) = album_key(track);
        match seen.get(&id) {
            Some(&slot) => albums[slot].song_count += 1,
            None => {
                seen.insert(id.clone(), albums.len());
                albums.push(AlbumSummary {
                    id,
                    name,
                    image: track.best_image().map(str::to_string),
                    song_count: 1,
                });
            }
        }
    }
    albums
}

/// Artists grouped by each song's lead artist
pub fn group_artists(tracks: &[Track]) -> Vec<ArtistSummary> {
    let mut artists: Vec<ArtistSummary> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for track in tracks {
        let name = lead_artist(track);
        match seen.get(name) {
            Some(&slot) => artists[slot].song_count += 1,
            None => {
                seen.insert(name.to_string(), artists.len());
                artists.push(ArtistSummary {
                    name: name.to_string(),
                    image: track.best_image().map(str::to_string),
                    song_count: 1,
                });
            }
        }
    }
    artists
}

/// Songs that belong to `album`, matched by id or by name
pub fn album_collection(album: &AlbumSummary, tracks: &[Track]) -> Collection {
    let songs = tracks
        .iter()
        .filter(|t| {
            let (id, name) = album_key(t);
            id == album.id || name == album.name
        })
        .cloned()
        .collect();
    collect(&album.name, songs)
}

/// Songs that list `artist` among their artists
pub fn artist_collection(artist: &str, tracks: &[Track]) -> Collection {
    let songs = tracks
        .iter()
        .filter(|t| t.artists.iter().any(|a| a == artist))
        .cloned()
        .collect();
    collect(artist, songs)
}

fn collect(name: &str, tracks: Vec<Track>) -> Collection {
    let mut artists: Vec<String> = Vec::new();
    for track in &tracks {
        let lead = lead_artist(track);
        if !artists.iter().any(|a| a == lead) {
            artists.push(lead.to_string());
        }
    }
    let total_duration = tracks.iter().map(|t| t.duration).sum();

    Collection {
        name: name.to_string(),
        tracks,
        artists,
        total_duration,
    }
}
