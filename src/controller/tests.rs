use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use super::{PlayerController, SkipOutcome};
use crate::audio::TransportController;
use crate::audio::fake::FakeEngine;
use crate::model::{Catalog, Downloads, Favorites, KeyValueStore, MemoryStore, QueueStore, RepeatState, Track};

fn song(id: &str) -> Track {
    Track::new(id, format!("Song {id}")).with_source("320kbps", &format!("https://cdn.test/{id}.mp3"))
}

#[derive(Default)]
struct StubCatalog {
    limits: StdMutex<Vec<u32>>,
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn search(&self, query: &str, _page: u32, limit: u32) -> Vec<Track> {
        self.limits.lock().unwrap().push(limit);
        [1, 2]
            .iter()
            .map(|n| song(&format!("{query}-{n}")).with_artists(vec![query.to_string()]))
            .collect()
    }

    async fn lyrics(&self, track_id: &str) -> Option<String> {
        Some(format!("words of {track_id}"))
    }
}

struct Harness {
    controller: PlayerController,
    engine: FakeEngine,
    catalog: Arc<StubCatalog>,
    _tmp: TempDir,
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let catalog = Arc::new(StubCatalog::default());

    let controller = PlayerController::new(
        Arc::new(Mutex::new(QueueStore::new())),
        Arc::new(TransportController::new(Arc::new(engine.clone()), None)),
        Favorites::new(store.clone()),
        Downloads::new(tmp.path().join("downloads"), store, reqwest::Client::new()),
        catalog.clone(),
    )
    .with_seek_step(10.0)
    .with_page_limit(7);

    Harness {
        controller,
        engine,
        catalog,
        _tmp: tmp,
    }
}

async fn seed(controller: &PlayerController, ids: &[&str], current: Option<usize>) {
    let mut queue = controller.queue.lock().await;
    queue.set_queue(ids.iter().map(|id| song(id)).collect());
    queue.set_current_index(current);
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn skip_moves_pointer_before_load_completes() {
    let h = harness();
    seed(&h.controller, &["t1", "t2", "t3"], Some(0)).await;
    h.engine.hold_creates();

    let controller = h.controller.clone();
    let skip = tokio::spawn(async move { controller.next_track().await });
    h.engine.create_started().await;

    {
        let queue = h.controller.queue.lock().await;
        assert_eq!(queue.current_index(), Some(1));
        assert!(queue.is_loading());
        assert!(!queue.is_playing());
    }

    h.engine.release_creates();
    assert_eq!(skip.await.unwrap(), SkipOutcome::Playing);

    let queue = h.controller.queue.lock().await;
    assert_eq!(queue.current_track().unwrap().id, "t2");
    assert!(queue.is_playing());
    assert!(!queue.is_loading());
}

#[tokio::test]
async fn unplayable_track_leaves_playback_stopped() {
    let h = harness();
    {
        let mut queue = h.controller.queue.lock().await;
        queue.set_queue(vec![Track::new("t1", "No Source")]);
        queue.set_current_index(Some(0));
    }

    assert_eq!(h.controller.play_index(0).await, SkipOutcome::LoadFailed);

    let queue = h.controller.queue.lock().await;
    assert!(!queue.is_playing());
    assert!(!queue.is_loading());
    assert!(h.engine.creates().is_empty());
}

#[tokio::test]
async fn refused_play_keeps_is_playing_false() {
    let h = harness();
    h.engine.refuse_play(true);
    seed(&h.controller, &["t1"], None).await;

    assert_eq!(h.controller.play_index(0).await, SkipOutcome::PlayFailed);
    let queue = h.controller.queue.lock().await;
    assert_eq!(queue.current_index(), Some(0));
    assert!(!queue.is_playing());
    assert!(!queue.is_loading());
}

#[tokio::test]
async fn finish_on_last_track_stops_without_repeat() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(1).await;

    assert_eq!(h.controller.on_track_finished("t2").await, SkipOutcome::NoTrack);

    let queue = h.controller.queue.lock().await;
    assert_eq!(queue.current_index(), Some(1));
    assert!(!queue.is_playing());
    assert!(!queue.is_loading());
    assert_eq!(h.engine.creates().len(), 1);
}

#[tokio::test]
async fn finish_on_last_track_wraps_with_repeat_all() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(1).await;
    h.controller.queue.lock().await.set_repeat(RepeatState::All);

    assert_eq!(h.controller.on_track_finished("t2").await, SkipOutcome::Playing);
    assert_eq!(h.controller.current_track().await.unwrap().id, "t1");
}

#[tokio::test]
async fn finish_with_repeat_one_replays_current() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(0).await;
    h.controller.queue.lock().await.set_repeat(RepeatState::One);

    assert_eq!(h.controller.on_track_finished("t1").await, SkipOutcome::Playing);
    assert_eq!(h.controller.current_track().await.unwrap().id, "t1");
    assert_eq!(
        h.engine.creates(),
        vec!["https://cdn.test/t1.mp3", "https://cdn.test/t1.mp3"]
    );
}

#[tokio::test]
async fn finish_for_replaced_track_is_ignored() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(1).await;

    assert_eq!(h.controller.on_track_finished("t1").await, SkipOutcome::Dropped);
    assert_eq!(h.controller.current_track().await.unwrap().id, "t2");
}

#[tokio::test]
async fn second_skip_during_load_is_dropped() {
    let h = harness();
    seed(&h.controller, &["t1", "t2", "t3"], Some(0)).await;
    h.engine.hold_creates();

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.next_track().await });
    h.engine.create_started().await;

    assert_eq!(h.controller.next_track().await, SkipOutcome::Dropped);
    assert_eq!(h.controller.queue.lock().await.current_index(), Some(1));

    h.engine.release_creates();
    assert_eq!(first.await.unwrap(), SkipOutcome::Playing);
    assert_eq!(h.controller.queue.lock().await.current_index(), Some(1));
    assert_eq!(h.engine.creates(), vec!["https://cdn.test/t2.mp3"]);
}

#[tokio::test]
async fn finished_event_advances_queue() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.try_start_event_listener().await;
    h.controller.try_start_event_listener().await;
    h.controller.play_index(0).await;

    h.engine.emit(180.0, true);

    let controller = h.controller.clone();
    wait_until(|| {
        let controller = controller.clone();
        async move {
            let now = controller.now_playing().await;
            now.index == Some(1) && now.is_playing && !now.is_loading
        }
    })
    .await;
    assert_eq!(h.engine.creates().len(), 2);
}

#[tokio::test]
async fn toggle_pauses_and_resumes() {
    let h = harness();
    seed(&h.controller, &["t1"], None).await;
    h.controller.play_index(0).await;

    assert!(!h.controller.toggle_playback().await);
    assert!(!h.controller.queue.lock().await.is_playing());
    assert!(h.controller.toggle_playback().await);
    assert!(h.controller.queue.lock().await.is_playing());

    let calls = h.engine.calls();
    assert_eq!(calls.iter().filter(|c| *c == "pause").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "play").count(), 2);
    assert_eq!(h.engine.creates().len(), 1);
}

#[tokio::test]
async fn toggle_loads_current_track_when_queue_was_replaced() {
    let h = harness();
    seed(&h.controller, &["t1"], None).await;
    h.controller.play_index(0).await;
    h.controller.toggle_playback().await;

    seed(&h.controller, &["t9"], Some(0)).await;
    assert!(h.controller.toggle_playback().await);
    assert_eq!(
        h.engine.creates(),
        vec!["https://cdn.test/t1.mp3", "https://cdn.test/t9.mp3"]
    );
}

#[tokio::test]
async fn previous_at_front_restarts_track() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(0).await;
    assert!(h.controller.seek_forward().await);

    assert_eq!(h.controller.previous_track().await, SkipOutcome::Restarted);
    assert!(h.engine.calls().contains(&"seek 0".to_string()));
    assert_eq!(h.controller.transport.current_position(), 0.0);

    h.controller.play_index(1).await;
    assert_eq!(h.controller.previous_track().await, SkipOutcome::Playing);
    assert_eq!(h.controller.current_track().await.unwrap().id, "t1");
}

#[tokio::test]
async fn external_pause_is_picked_up() {
    let h = harness();
    seed(&h.controller, &["t1"], None).await;
    h.controller.play_index(0).await;

    h.engine.set_playing_externally(false);
    assert!(!h.controller.sync_playing_state().await);
    assert!(!h.controller.now_playing().await.is_playing);
}

#[tokio::test]
async fn shuffle_keeps_current_track_first() {
    let h = harness();
    seed(&h.controller, &["t1", "t2", "t3", "t4"], None).await;
    h.controller.play_index(2).await;

    assert!(h.controller.toggle_shuffle().await);
    let queue = h.controller.queue_snapshot().await;
    assert_eq!(queue[0].id, "t3");
    assert_eq!(h.controller.queue.lock().await.current_index(), Some(0));

    assert!(!h.controller.toggle_shuffle().await);
    assert_eq!(h.controller.queue_snapshot().await, queue);
}

#[tokio::test]
async fn seek_to_fraction_scales_by_duration() {
    let h = harness();
    assert!(!h.controller.seek_to_fraction(0.5).await);

    seed(&h.controller, &["t1"], None).await;
    h.controller.play_index(0).await;
    assert!(h.controller.seek_to_fraction(0.5).await);
    assert_eq!(h.controller.transport.current_position(), 90.0);
    assert!(h.controller.seek_to_fraction(4.0).await);
    assert_eq!(h.controller.transport.current_position(), 180.0);
}

#[tokio::test]
async fn search_uses_configured_page_size() {
    let h = harness();
    assert!(h.controller.search("   ", 1).await.is_empty());

    let results = h.controller.search("jazz", 1).await;
    assert_eq!(results.len(), 2);
    assert_eq!(*h.catalog.limits.lock().unwrap(), vec![7]);

    assert_eq!(h.controller.play_tracks(results, 1).await, SkipOutcome::Playing);
    assert_eq!(h.controller.current_track().await.unwrap().id, "jazz-2");
}

#[tokio::test]
async fn album_detail_keeps_only_that_album() {
    let h = harness();
    let known = vec![
        song("k1").with_album("al-b", "Blue").with_duration(120),
        song("k2").with_album("al-r", "Red").with_duration(60),
        song("k3").with_album("al-b", "Blue").with_duration(30),
    ];
    let blue = crate::model::browse::group_albums(&known).remove(0);

    let detail = h.controller.album_detail(&blue, &known).await;
    let ids: Vec<_> = detail.tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["k1", "k3"]);
    assert_eq!(detail.total_duration, 150);
    assert_eq!(*h.catalog.limits.lock().unwrap(), vec![50]);
}

#[tokio::test]
async fn artist_detail_adds_catalog_songs_without_duplicates() {
    let h = harness();
    let known = vec![
        song("k1").with_artists(vec!["Asha".to_string()]),
        song("Asha-1").with_artists(vec!["Asha".to_string()]),
        song("k2"),
    ];

    let detail = h.controller.artist_detail("Asha", &known).await;
    let ids: Vec<_> = detail.tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["k1", "Asha-1", "Asha-2"]);
    assert_eq!(detail.artists, vec!["Asha".to_string()]);

    assert_eq!(h.controller.play_tracks(detail.tracks, 2).await, SkipOutcome::Playing);
    assert_eq!(h.controller.current_track().await.unwrap().id, "Asha-2");
}

#[tokio::test]
async fn lyrics_only_requested_when_available() {
    let h = harness();
    assert_eq!(h.controller.lyrics_for_current().await, None);

    let mut with_lyrics = song("t1");
    with_lyrics.has_lyrics = true;
    h.controller.play_tracks(vec![with_lyrics, song("t2")], 0).await;
    assert_eq!(h.controller.lyrics_for_current().await.as_deref(), Some("words of t1"));

    h.controller.next_track().await;
    assert_eq!(h.controller.lyrics_for_current().await, None);
}

#[tokio::test]
async fn favorite_toggle_follows_current_track() {
    let h = harness();
    assert_eq!(h.controller.toggle_favorite_current().await, None);

    seed(&h.controller, &["t1", "t2"], Some(1)).await;
    assert_eq!(h.controller.toggle_favorite_current().await, Some(true));
    assert_eq!(h.controller.favorites().await[0].id, "t2");

    assert_eq!(h.controller.play_favorites(0).await, SkipOutcome::Playing);
    assert_eq!(h.controller.queue_snapshot().await.len(), 1);

    assert_eq!(h.controller.toggle_favorite_current().await, Some(false));
    assert!(h.controller.favorites().await.is_empty());
}

#[tokio::test]
async fn queue_edits_keep_current_track() {
    let h = harness();
    seed(&h.controller, &["t1", "t2", "t3"], Some(1)).await;

    assert!(h.controller.enqueue(song("t4")).await);
    assert!(!h.controller.enqueue(song("t2")).await);
    assert!(h.controller.enqueue_next(song("t5")).await);
    h.controller.move_in_queue(0, 4).await.unwrap();
    assert_eq!(h.controller.remove_from_queue(0).await.unwrap().id, "t2");
    assert!(h.controller.remove_from_queue(42).await.is_err());

    // t2 was current and removed; the pointer stays at the same slot
    let ids: Vec<String> = h.controller.queue_snapshot().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec!["t5", "t3", "t4", "t1"]);
    assert_eq!(h.controller.current_track().await.unwrap().id, "t5");
}

#[tokio::test]
async fn now_playing_reflects_queue_and_clock() {
    let h = harness();
    seed(&h.controller, &["t1", "t2"], None).await;
    h.controller.play_index(1).await;

    let now = h.controller.now_playing().await;
    assert_eq!(now.track.map(|t| t.id).as_deref(), Some("t2"));
    assert_eq!(now.index, Some(1));
    assert_eq!(now.queue_len, 2);
    assert_eq!(now.duration_secs, 180.0);
    assert!(now.is_playing);

    h.controller.stop().await;
    let now = h.controller.now_playing().await;
    assert!(!now.is_playing);
    assert_eq!(now.duration_secs, 0.0);
}
