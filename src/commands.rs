//! Line-oriented command interface
//!
//! Each input line parses into a `Command`; `Session` runs it against the
//! controller and writes a short report to stdout.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::controller::{PlayerController, SkipOutcome};
use crate::model::browse::{group_albums, group_artists, sort_groups};
use crate::model::{AlbumSummary, ArtistSummary, Collection, SortOrder, Track, format_time};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    MoreResults,
    /// Group the current results into albums
    Albums(SortOrder),
    /// Show an album from the last album list (1-based); its songs become the results
    Album(usize),
    Artists(SortOrder),
    Artist(usize),
    /// Play a search result (1-based), replacing the queue with the results
    Play(usize),
    /// Append a search result to the queue
    Add(usize),
    /// Insert a search result right after the current track
    AddNext(usize),
    /// Play the queue entry at this position (1-based)
    Jump(usize),
    Next,
    Previous,
    Toggle,
    Forward,
    Back,
    /// Seek to a percentage of the track
    SeekPercent(f64),
    Shuffle,
    Repeat,
    Queue,
    Remove(usize),
    Move(usize, usize),
    Clear,
    Favorite,
    Favorites,
    PlayFavorites,
    Download,
    Downloads,
    DeleteDownload(usize),
    DeleteAllDownloads,
    Lyrics,
    Status,
    /// Print progress as it changes, for this many seconds
    Follow(u64),
    Help,
    Quit,
}

pub const HELP: &str = "\
search <text>    search the catalog      more          next page of results
albums [sort]    albums in the results   album <n>     show album n
artists [sort]   artists in the results  artist <n>    show artist n
                 sort: popular | az | za
play <n>         play result n           add <n>       queue result n
addnext <n>      play result n next      jump <n>      play queue entry n
next | prev      skip                    p             pause / resume
fwd | back       seek by the step        seek <pct>    seek to a percentage
shuffle          toggle shuffle          repeat        cycle repeat mode
queue            show the queue          rm <n>        remove queue entry n
mv <a> <b>       move queue entry        clear         stop and clear queue
fav              toggle favorite         favs          list favorites
playfavs         play favorites          dl            download current track
dls              list downloads          rmdl <n>      delete download n
rmdl all         delete all downloads    lyrics        show lyrics
status           now playing             follow [secs] watch progress
help             this text               quit          exit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "s" if !rest.is_empty() => Command::Search(rest.to_string()),
            "search" | "s" => return Err("usage: search <text>".to_string()),
            "more" => Command::MoreResults,
            "albums" => Command::Albums(rest.parse()?),
            "album" => Command::Album(position(rest)?),
            "artists" => Command::Artists(rest.parse()?),
            "artist" => Command::Artist(position(rest)?),
            "play" => Command::Play(position(rest)?),
            "add" => Command::Add(position(rest)?),
            "addnext" => Command::AddNext(position(rest)?),
            "jump" | "j" => Command::Jump(position(rest)?),
            "next" | "n" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "p" | "pause" | "toggle" => Command::Toggle,
            "fwd" | "f" => Command::Forward,
            "back" | "b" => Command::Back,
            "seek" => {
                let pct: f64 = rest
                    .trim_end_matches('%')
                    .parse()
                    .map_err(|_| "usage: seek <percent>".to_string())?;
                Command::SeekPercent(pct)
            }
            "shuffle" => Command::Shuffle,
            "repeat" => Command::Repeat,
            "queue" | "q" => Command::Queue,
            "rm" | "remove" => Command::Remove(position(rest)?),
            "mv" | "move" => {
                let mut parts = rest.split_whitespace();
                let from = position(parts.next().unwrap_or(""))?;
                let to = position(parts.next().unwrap_or(""))?;
                Command::Move(from, to)
            }
            "clear" => Command::Clear,
            "fav" => Command::Favorite,
            "favs" | "favorites" => Command::Favorites,
            "playfavs" => Command::PlayFavorites,
            "dl" | "download" => Command::Download,
            "dls" | "downloads" => Command::Downloads,
            "rmdl" if rest.eq_ignore_ascii_case("all") => Command::DeleteAllDownloads,
            "rmdl" => Command::DeleteDownload(position(rest)?),
            "lyrics" => Command::Lyrics,
            "status" | "st" | "" => Command::Status,
            "follow" if rest.is_empty() => Command::Follow(10),
            "follow" => Command::Follow(
                rest.parse()
                    .map_err(|_| "usage: follow [seconds]".to_string())?,
            ),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

/// 1-based position as typed by the user, returned 0-based
fn position(text: &str) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("expected a position starting at 1, got '{}'", text.trim())),
    }
}

pub struct Session {
    controller: PlayerController,
    query: String,
    page: u32,
    results: Vec<Track>,
    albums: Vec<AlbumSummary>,
    artists: Vec<ArtistSummary>,
}

impl Session {
    pub fn new(controller: PlayerController) -> Self {
        Self {
            controller,
            query: String::new(),
            page: 0,
            results: Vec::new(),
            albums: Vec::new(),
            artists: Vec::new(),
        }
    }

    /// Run one command. Returns false when the session should end.
    pub async fn run(&mut self, command: Command) -> bool {
        tracing::debug!(?command, "Running command");
        let controller = self.controller.clone();
        let c = &controller;

        match command {
            Command::Search(query) => {
                self.query = query;
                self.page = 0;
                self.results = c.search(&self.query, self.page).await;
                self.print_results().await;
            }
            Command::MoreResults => {
                if self.query.is_empty() {
                    println!("Search first");
                } else {
                    self.page += 1;
                    let more = c.search(&self.query, self.page).await;
                    if more.is_empty() {
                        println!("No more results");
                    }
                    self.results.extend(more);
                    self.print_results().await;
                }
            }
            Command::Albums(order) => {
                self.albums = group_albums(&self.results);
                sort_groups(&mut self.albums, order);
                println!("{} albums:", self.albums.len());
                for (i, album) in self.albums.iter().enumerate() {
                    println!("{:>3}. {} ({})", i + 1, album.name, songs(album.song_count));
                }
            }
            Command::Artists(order) => {
                self.artists = group_artists(&self.results);
                sort_groups(&mut self.artists, order);
                println!("{} artists:", self.artists.len());
                for (i, artist) in self.artists.iter().enumerate() {
                    println!("{:>3}. {} ({})", i + 1, artist.name, songs(artist.song_count));
                }
            }
            Command::Album(n) => match self.albums.get(n).cloned() {
                Some(album) => {
                    let detail = c.album_detail(&album, &self.results).await;
                    if let Some(cover) = &album.image {
                        println!("cover: {cover}");
                    }
                    self.show_collection(detail);
                }
                None => println!("No album {}, run 'albums' first", n + 1),
            },
            Command::Artist(n) => match self.artists.get(n).cloned() {
                Some(artist) => {
                    let detail = c.artist_detail(&artist.name, &self.results).await;
                    if let Some(picture) = &artist.image {
                        println!("picture: {picture}");
                    }
                    self.show_collection(detail);
                }
                None => println!("No artist {}, run 'artists' first", n + 1),
            },
            Command::Play(n) => {
                if n < self.results.len() {
                    report(c.play_tracks(self.results.clone(), n).await, c).await;
                } else {
                    println!("No result {}", n + 1);
                }
            }
            Command::Add(n) | Command::AddNext(n) => match self.results.get(n).cloned() {
                Some(track) => {
                    let name = track.name.clone();
                    let added = if matches!(command, Command::Add(_)) {
                        c.enqueue(track).await
                    } else {
                        c.enqueue_next(track).await
                    };
                    if added {
                        println!("Queued {name}");
                    } else {
                        println!("{name} is already queued");
                    }
                }
                None => println!("No result {}", n + 1),
            },
            Command::Jump(n) => report(c.play_index(n).await, c).await,
            Command::Next => report(c.next_track().await, c).await,
            Command::Previous => report(c.previous_track().await, c).await,
            Command::Toggle => {
                let playing = c.toggle_playback().await;
                println!("{}", if playing { "Playing" } else { "Paused" });
            }
            Command::Forward => {
                c.seek_forward().await;
                println!("{}", c.now_playing().await);
            }
            Command::Back => {
                c.seek_backward().await;
                println!("{}", c.now_playing().await);
            }
            Command::SeekPercent(pct) => {
                if c.seek_to_fraction(pct / 100.0).await {
                    println!("{}", c.now_playing().await);
                } else {
                    println!("Nothing to seek");
                }
            }
            Command::Shuffle => {
                let on = c.toggle_shuffle().await;
                println!("Shuffle {}", if on { "on" } else { "off" });
            }
            Command::Repeat => println!("Repeat {:?}", c.cycle_repeat().await),
            Command::Queue => {
                let now = c.now_playing().await;
                let tracks = c.queue_snapshot().await;
                if tracks.is_empty() {
                    println!("Queue is empty");
                }
                for (i, track) in tracks.iter().enumerate() {
                    let marker = if now.index == Some(i) { ">" } else { " " };
                    println!("{marker}{:>3}. {} - {}", i + 1, track.name, track.artist_line());
                }
            }
            Command::Remove(n) => match c.remove_from_queue(n).await {
                Ok(track) => println!("Removed {}", track.name),
                Err(e) => println!("{e}"),
            },
            Command::Move(from, to) => match c.move_in_queue(from, to).await {
                Ok(()) => println!("Moved {} to {}", from + 1, to + 1),
                Err(e) => println!("{e}"),
            },
            Command::Clear => {
                c.clear_queue().await;
                println!("Queue cleared");
            }
            Command::Favorite => match c.toggle_favorite_current().await {
                Some(true) => println!("Added to favorites"),
                Some(false) => println!("Removed from favorites"),
                None => println!("Nothing is playing"),
            },
            Command::Favorites => print_tracks("Favorites", &c.favorites().await),
            Command::PlayFavorites => report(c.play_favorites(0).await, c).await,
            Command::Download => self.download().await,
            Command::Downloads => {
                let downloads = c.downloads().await;
                for (i, song) in downloads.iter().enumerate() {
                    println!(
                        "{:>3}. {} - {} ({})",
                        i + 1,
                        song.track.name,
                        song.track.artist_line(),
                        song.downloaded_at.format("%Y-%m-%d")
                    );
                }
                let mib = c.downloads_size().await as f64 / (1024.0 * 1024.0);
                println!("{} downloads, {mib:.1} MiB on disk", downloads.len());
            }
            Command::DeleteDownload(n) => {
                let Some(song) = c.downloads().await.into_iter().nth(n) else {
                    println!("No download {}", n + 1);
                    return true;
                };
                match c.delete_download(&song.id).await {
                    Ok(_) => println!("Deleted {}", song.track.name),
                    Err(e) => println!("Delete failed: {e}"),
                }
            }
            Command::DeleteAllDownloads => match c.delete_all_downloads().await {
                Ok(()) => println!("All downloads deleted"),
                Err(e) => println!("Delete failed: {e}"),
            },
            Command::Lyrics => match c.lyrics_for_current().await {
                Some(lyrics) => println!("{lyrics}"),
                None => println!("No lyrics available"),
            },
            Command::Status => {
                c.sync_playing_state().await;
                let now = c.now_playing().await;
                println!("{now}");
                if let Some(cover) = now.track.as_ref().and_then(|t| t.best_image()) {
                    println!("cover: {cover}");
                }
            }
            Command::Follow(secs) => self.follow(Duration::from_secs(secs)).await,
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
        }
        true
    }

    async fn print_results(&self) {
        println!("Results:");
        if self.results.is_empty() {
            println!("  (none)");
        }
        for (i, track) in self.results.iter().enumerate() {
            let mut marks = String::new();
            if self.controller.is_favorite(&track.id).await {
                marks.push_str(" [fav]");
            }
            if self.controller.is_downloaded(&track.id).await {
                marks.push_str(" [dl]");
            }
            println!(
                "{:>3}. {} - {} [{}]{marks}",
                i + 1,
                track.name,
                track.artist_line(),
                format_time(f64::from(track.duration))
            );
        }
    }

    /// The collection's songs replace the results, so `play <n>` picks from them
    fn show_collection(&mut self, detail: Collection) {
        println!(
            "{} | {} | {} | {}",
            detail.name,
            detail.artists.join(", "),
            songs(detail.tracks.len()),
            format_time(f64::from(detail.total_duration))
        );
        print_tracks("Songs", &detail.tracks);
        self.results = detail.tracks;
    }

    async fn follow(&self, span: Duration) {
        let mut progress = self.controller.watch_progress();
        let watching = async {
            while progress.changed().await.is_ok() {
                let now = self.controller.now_playing().await;
                println!("{} {now}", progress_bar(now.progress(), 20));
            }
        };
        let _ = tokio::time::timeout(span, watching).await;
    }

    async fn download(&self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<f32>();
        let printer = tokio::spawn(async move {
            let mut last = 0;
            while let Some(fraction) = rx.recv().await {
                let pct = (fraction * 100.0) as u32;
                if pct >= last + 10 {
                    last = pct;
                    println!("  {pct}%");
                }
            }
        });

        match self.controller.download_current(Some(tx)).await {
            Ok(path) => println!("Saved to {}", path.display()),
            Err(e) => println!("Download failed: {e}"),
        }
        let _ = printer.await;
    }
}

async fn report(outcome: SkipOutcome, controller: &PlayerController) {
    match outcome {
        SkipOutcome::Playing | SkipOutcome::Restarted => println!("{}", controller.now_playing().await),
        SkipOutcome::Dropped => println!("Busy loading, try again"),
        SkipOutcome::NoTrack => println!("No track there"),
        SkipOutcome::LoadFailed => println!("Track could not be loaded"),
        SkipOutcome::PlayFailed => println!("Track could not be played"),
    }
}

fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn songs(count: usize) -> String {
    if count == 1 { "1 song".to_string() } else { format!("{count} songs") }
}

fn print_tracks(title: &str, tracks: &[Track]) {
    println!("{title}:");
    if tracks.is_empty() {
        println!("  (none)");
    }
    for (i, track) in tracks.iter().enumerate() {
        println!(
            "{:>3}. {} - {} [{}]",
            i + 1,
            track.name,
            track.artist_line(),
            format_time(f64::from(track.duration))
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::audio::TransportController;
    use crate::audio::fake::FakeEngine;
    use crate::model::{Catalog, Downloads, Favorites, KeyValueStore, MemoryStore, QueueStore};

    /// Catalog that remembers which pages it was asked for
    #[derive(Default)]
    struct PageLog {
        pages: StdMutex<Vec<u32>>,
    }

    #[async_trait]
    impl Catalog for PageLog {
        async fn search(&self, query: &str, page: u32, _limit: u32) -> Vec<Track> {
            self.pages.lock().unwrap().push(page);
            vec![
                Track::new(format!("{query}-{page}-a"), "A")
                    .with_artists(vec!["Asha".to_string()])
                    .with_album("al-1", "First"),
                Track::new(format!("{query}-{page}-b"), "B")
                    .with_artists(vec!["Kishore".to_string()])
                    .with_album("al-2", "Second"),
            ]
        }

        async fn lyrics(&self, _track_id: &str) -> Option<String> {
            None
        }
    }

    fn session(catalog: Arc<PageLog>, dir: &std::path::Path) -> Session {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let controller = PlayerController::new(
            Arc::new(Mutex::new(QueueStore::new())),
            Arc::new(TransportController::new(Arc::new(FakeEngine::new()), None)),
            Favorites::new(store.clone()),
            Downloads::new(dir.join("downloads"), store, reqwest::Client::new()),
            catalog,
        );
        Session::new(controller)
    }

    #[tokio::test]
    async fn search_starts_at_the_first_page() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Arc::new(PageLog::default());
        let mut session = session(catalog.clone(), tmp.path());

        assert!(session.run(Command::Search("love".to_string())).await);
        assert!(session.run(Command::MoreResults).await);
        assert_eq!(*catalog.pages.lock().unwrap(), vec![0, 1]);
        assert_eq!(session.results.len(), 4);

        session.run(Command::Search("rain".to_string())).await;
        assert_eq!(catalog.pages.lock().unwrap().last(), Some(&0));
        assert_eq!(session.results.len(), 2);
    }

    #[tokio::test]
    async fn album_view_replaces_results_with_album_songs() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Arc::new(PageLog::default());
        let mut session = session(catalog.clone(), tmp.path());

        session.run(Command::Search("love".to_string())).await;
        session.run(Command::MoreResults).await;
        session.run(Command::Albums(SortOrder::ZToA)).await;
        let names: Vec<_> = session.albums.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);

        session.run(Command::Album(1)).await;
        let ids: Vec<_> = session.results.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["love-0-a", "love-1-a", "First-0-a"]);

        session.run(Command::Artists(SortOrder::AToZ)).await;
        assert_eq!(session.artists.len(), 1);
        assert_eq!(session.artists[0].name, "Asha");

        assert!(session.run(Command::Album(5)).await);
    }

    #[test]
    fn parses_positions_as_zero_based() {
        assert_eq!(Command::parse("play 3"), Ok(Command::Play(2)));
        assert_eq!(Command::parse("mv 1 4"), Ok(Command::Move(0, 3)));
        assert_eq!(Command::parse("rmdl 2"), Ok(Command::DeleteDownload(1)));
        assert!(Command::parse("play 0").is_err());
        assert!(Command::parse("rm x").is_err());
        assert!(Command::parse("mv 2").is_err());
    }

    #[test]
    fn keeps_search_text_intact() {
        assert_eq!(
            Command::parse("  search   Kesariya Arijit  "),
            Ok(Command::Search("Kesariya Arijit".to_string()))
        );
        assert!(Command::parse("search").is_err());
    }

    #[test]
    fn parses_aliases_and_seek() {
        assert_eq!(Command::parse("P"), Ok(Command::Toggle));
        assert_eq!(Command::parse(""), Ok(Command::Status));
        assert_eq!(Command::parse("seek 25%"), Ok(Command::SeekPercent(25.0)));
        assert_eq!(Command::parse("rmdl ALL"), Ok(Command::DeleteAllDownloads));
        assert!(Command::parse("dance").unwrap_err().contains("dance"));
        assert_eq!(Command::parse("follow"), Ok(Command::Follow(10)));
        assert_eq!(Command::parse("follow 3"), Ok(Command::Follow(3)));
        assert_eq!(Command::parse("albums"), Ok(Command::Albums(SortOrder::Popular)));
        assert_eq!(Command::parse("artists za"), Ok(Command::Artists(SortOrder::ZToA)));
        assert_eq!(Command::parse("album 2"), Ok(Command::Album(1)));
        assert!(Command::parse("albums loud").is_err());
    }

    #[test]
    fn progress_bar_is_fixed_width() {
        assert_eq!(progress_bar(0.0, 4), "[----]");
        assert_eq!(progress_bar(0.5, 4), "[##--]");
        assert_eq!(progress_bar(3.0, 4), "[####]");
    }
}
