//! Transport event listener driving auto-advance

use tokio::sync::broadcast::{self, error::RecvError};

use crate::audio::TransportEvent;
use crate::model::RepeatState;
use super::{PlayerController, SkipOutcome};

impl PlayerController {
    pub(super) fn start_player_event_listener(&self, mut events: broadcast::Receiver<TransportEvent>) {
        let controller = self.clone();
        tracing::info!("Starting transport event listener");

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Transport event listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Transport event listener shutting down");
                        break;
                    }
                };

                match event {
                    TransportEvent::Loaded { track_id } => {
                        tracing::debug!(%track_id, "TransportEvent::Loaded");
                    }
                    TransportEvent::Unloaded => {
                        tracing::debug!("TransportEvent::Unloaded");
                    }
                    TransportEvent::Finished { track_id } => {
                        tracing::debug!(%track_id, "TransportEvent::Finished");
                        controller.on_track_finished(&track_id).await;
                    }
                }
            }
        });
    }

    /// Advance after the current track plays to its end
    pub(crate) async fn on_track_finished(&self, track_id: &str) -> SkipOutcome {
        let (repeat, current) = {
            let queue = self.queue.lock().await;
            if queue.current_track().map(|t| t.id.as_str()) != Some(track_id) {
                tracing::debug!(track_id, "Finished track is no longer current, ignoring");
                return SkipOutcome::Dropped;
            }
            (queue.repeat(), queue.current_index())
        };

        let outcome = match (repeat, current) {
            (RepeatState::One, Some(index)) => self.play_index(index).await,
            _ => self.next_track().await,
        };

        if outcome == SkipOutcome::NoTrack {
            tracing::info!("Reached the end of the queue");
            self.queue.lock().await.set_playing(false);
        }
        outcome
    }
}
