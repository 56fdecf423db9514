//! `rodio` implementation of the audio engine
//!
//! The output stream must stay on the thread that opened it, so a dedicated
//! audio thread owns the stream and every sink. Sounds talk to it over a
//! command channel and get their answers back on oneshot channels. Between
//! commands the thread reports status for each sink on a fixed tick.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tokio::sync::oneshot;

use super::engine::{AudioEngine, EngineError, Sound, SoundStatus, StatusSender};

type Reply = oneshot::Sender<Result<SoundStatus, EngineError>>;

#[derive(Debug, Clone, Copy)]
enum SoundOp {
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Status,
    Release,
}

enum EngineCmd {
    Open {
        id: u64,
        bytes: Vec<u8>,
        updates: StatusSender,
        reply: Reply,
    },
    Op {
        id: u64,
        op: SoundOp,
        reply: Reply,
    },
    Quit,
}

pub struct RodioEngine {
    tx: Sender<EngineCmd>,
    http: reqwest::Client,
    next_id: AtomicU64,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl RodioEngine {
    pub fn new(http: reqwest::Client, status_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<EngineCmd>();
        let join = thread::Builder::new()
            .name("tempo-audio".to_string())
            .spawn(move || run_audio_thread(rx, status_interval))
            .ok();
        if join.is_none() {
            tracing::error!("Failed to spawn audio thread");
        }

        Self {
            tx,
            http,
            next_id: AtomicU64::new(1),
            join: Mutex::new(join),
        }
    }

    /// Stop every sink and wait for the audio thread to exit
    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineCmd::Quit);
        let handle = self.join.lock().ok().and_then(|mut j| j.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    async fn fetch(&self, source: &str) -> Result<Vec<u8>, EngineError> {
        let open_err = |reason: String| EngineError::Open {
            source_url: source.to_string(),
            reason,
        };

        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .http
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| open_err(e.to_string()))?;
            let bytes = response.bytes().await.map_err(|e| open_err(e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            let path = source.strip_prefix("file://").unwrap_or(source);
            tokio::fs::read(path).await.map_err(|e| open_err(e.to_string()))
        }
    }
}

#[async_trait]
impl AudioEngine for RodioEngine {
    async fn create(&self, source: &str, updates: StatusSender) -> Result<Box<dyn Sound>, EngineError> {
        let bytes = self.fetch(source).await?;
        tracing::debug!(source, bytes = bytes.len(), "Source fetched");

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(EngineCmd::Open { id, bytes, updates, reply })
            .map_err(|_| EngineError::Disconnected)?;
        answer.await.map_err(|_| EngineError::Disconnected)??;

        Ok(Box::new(RodioSound {
            id,
            tx: self.tx.clone(),
        }))
    }
}

struct RodioSound {
    id: u64,
    tx: Sender<EngineCmd>,
}

impl RodioSound {
    async fn request(&self, op: SoundOp) -> Result<SoundStatus, EngineError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(EngineCmd::Op { id: self.id, op, reply })
            .map_err(|_| EngineError::Disconnected)?;
        answer.await.map_err(|_| EngineError::Disconnected)?
    }
}

#[async_trait]
impl Sound for RodioSound {
    async fn play(&self) -> Result<(), EngineError> {
        self.request(SoundOp::Play).await.map(|_| ())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.request(SoundOp::Pause).await.map(|_| ())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.request(SoundOp::Stop).await.map(|_| ())
    }

    async fn seek(&self, position_secs: f64) -> Result<(), EngineError> {
        let position = Duration::try_from_secs_f64(position_secs.max(0.0))
            .map_err(|e| EngineError::Seek(e.to_string()))?;
        self.request(SoundOp::Seek(position)).await.map(|_| ())
    }

    async fn status(&self) -> Result<SoundStatus, EngineError> {
        self.request(SoundOp::Status).await
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.request(SoundOp::Release).await.map(|_| ())
    }
}

impl Drop for RodioSound {
    fn drop(&mut self) {
        // Releasing an already released sound is answered with NotLoaded, which nobody reads
        let (reply, _) = oneshot::channel();
        let _ = self.tx.send(EngineCmd::Op {
            id: self.id,
            op: SoundOp::Release,
            reply,
        });
    }
}

/// What the periodic tick should send for a sound
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Report {
    Progress,
    Finished,
}

/// Play/stop bookkeeping of one sound, kept apart from the sink so the finish
/// rule can be checked without an output device
#[derive(Clone, Copy, Debug, Default)]
struct Lifecycle {
    started: bool,
    stopped: bool,
    finish_reported: bool,
}

impl Lifecycle {
    fn can_play(&self, sink_empty: bool) -> bool {
        !self.stopped && !sink_empty
    }

    fn mark_played(&mut self) {
        self.started = true;
    }

    fn mark_stopped(&mut self) {
        self.stopped = true;
    }

    /// An empty sink only means the media ended if it was started and not stopped
    fn finished(&self, sink_empty: bool) -> bool {
        self.started && !self.stopped && sink_empty
    }

    /// `Finished` is returned once. A stopped sound reports nothing.
    fn next_report(&mut self, sink_empty: bool, paused: bool) -> Option<Report> {
        if self.finished(sink_empty) {
            if self.finish_reported {
                return None;
            }
            self.finish_reported = true;
            Some(Report::Finished)
        } else if self.started && !self.stopped && !paused {
            Some(Report::Progress)
        } else {
            None
        }
    }
}

struct Slot {
    sink: Sink,
    duration: Option<Duration>,
    updates: StatusSender,
    lifecycle: Lifecycle,
}

impl Slot {
    fn open(stream: &OutputStream, bytes: Vec<u8>, updates: StatusSender) -> Result<Self, EngineError> {
        let source = Decoder::new(Cursor::new(bytes)).map_err(|e| EngineError::Decode(e.to_string()))?;
        let duration = source.total_duration();

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.append(source);

        Ok(Self {
            sink,
            duration,
            updates,
            lifecycle: Lifecycle::default(),
        })
    }

    fn status(&self) -> SoundStatus {
        SoundStatus {
            is_loaded: true,
            is_playing: !self.sink.is_paused() && !self.sink.empty(),
            position_secs: self.sink.get_pos().as_secs_f64(),
            duration_secs: self.duration.map(|d| d.as_secs_f64()),
            did_just_finish: false,
        }
    }

    fn apply(&mut self, op: SoundOp) -> Result<SoundStatus, EngineError> {
        match op {
            SoundOp::Play => {
                if !self.lifecycle.can_play(self.sink.empty()) {
                    return Err(EngineError::Rejected("media has ended".to_string()));
                }
                self.sink.play();
                self.lifecycle.mark_played();
            }
            SoundOp::Pause => self.sink.pause(),
            SoundOp::Stop => {
                self.sink.stop();
                self.lifecycle.mark_stopped();
            }
            SoundOp::Seek(position) => {
                self.sink
                    .try_seek(position)
                    .map_err(|e| EngineError::Seek(e.to_string()))?;
            }
            SoundOp::Status => {}
            SoundOp::Release => self.sink.stop(),
        }
        Ok(self.status())
    }

    /// Push a status update while playing, and once when the media ends
    fn report(&mut self) {
        match self.lifecycle.next_report(self.sink.empty(), self.sink.is_paused()) {
            Some(Report::Finished) => {
                let status = SoundStatus {
                    is_playing: false,
                    position_secs: self
                        .duration
                        .map(|d| d.as_secs_f64())
                        .unwrap_or_else(|| self.sink.get_pos().as_secs_f64()),
                    did_just_finish: true,
                    ..self.status()
                };
                let _ = self.updates.send(status);
            }
            Some(Report::Progress) => {
                let _ = self.updates.send(self.status());
            }
            None => {}
        }
    }
}

fn run_audio_thread(rx: Receiver<EngineCmd>, tick: Duration) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "No audio output device");
            refuse_all(rx);
            return;
        }
    };
    // rodio logs to stderr when the stream is dropped
    stream.log_on_drop(false);

    let mut sounds: HashMap<u64, Slot> = HashMap::new();

    loop {
        match rx.recv_timeout(tick) {
            Ok(EngineCmd::Open { id, bytes, updates, reply }) => {
                let result = Slot::open(&stream, bytes, updates).map(|slot| {
                    let status = slot.status();
                    sounds.insert(id, slot);
                    status
                });
                if let Err(e) = &result {
                    tracing::warn!(id, error = %e, "Failed to open sound");
                }
                let _ = reply.send(result);
            }
            Ok(EngineCmd::Op { id, op, reply }) => {
                let result = match sounds.get_mut(&id) {
                    Some(slot) => slot.apply(op),
                    None => Err(EngineError::NotLoaded),
                };
                if matches!(op, SoundOp::Release) {
                    sounds.remove(&id);
                }
                let _ = reply.send(result);
            }
            Ok(EngineCmd::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        for slot in sounds.values_mut() {
            slot.report();
        }
    }

    for slot in sounds.values() {
        slot.sink.stop();
    }
    tracing::debug!("Audio thread stopped");
}

/// Without an output device every request fails instead of hanging
fn refuse_all(rx: Receiver<EngineCmd>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            EngineCmd::Open { reply, .. } | EngineCmd::Op { reply, .. } => {
                let _ = reply.send(Err(EngineError::Disconnected));
            }
            EngineCmd::Quit => break,
        }
    }
}
