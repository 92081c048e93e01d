// Playback polling and queue auto-advance

use crate::app_state::{AppState, ControllerEvent};
use crate::client::PlaybackAction;
use crate::network::backend::BackendError;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Start the lifetime playback poll. The first tick fires immediately.
pub fn start_playback_poll(state: &Arc<AppState>) {
    let period = state.config.playback_poll_interval();
    let poll_state = state.clone();
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            poll_playback_once(&poll_state).await;
        }
    });
    state.timers.lock().set_playback_poll(handle);
}

pub async fn poll_playback_once(state: &Arc<AppState>) {
    match state.backend.playback_snapshot().await {
        Ok(snapshot) => {
            let head = state.client_state.queue.head();
            let (action, view) = {
                let mut tracker = state.client_state.playback.lock();
                let action = tracker.on_snapshot(&snapshot, head.as_ref());
                (action, tracker.view())
            };
            state.emit_event(ControllerEvent::PlaybackUpdated(view));
            if let PlaybackAction::AutoSkip(id) = action {
                let skip_state = state.clone();
                tokio::spawn(async move {
                    auto_skip(&skip_state, id).await;
                });
            }
        }
        Err(e) => {
            tracing::debug!("Playback poll failed: {}", e);
            let cleared = state.client_state.playback.lock().on_failure();
            if cleared {
                state.emit_event(ControllerEvent::PlaybackUpdated(
                    state.client_state.get_playback(),
                ));
            }
        }
    }
}

/// Advance the backend queue past `id`. The guard stays set on failure.
/// Results arriving after shutdown are dropped.
async fn auto_skip(state: &Arc<AppState>, id: String) {
    if state.is_shut_down() {
        return;
    }
    let result = state.backend.skip_song().await;
    if state.is_shut_down() {
        tracing::debug!("Dropping auto-skip result for {} after shutdown", id);
        return;
    }
    match result {
        Ok(()) => {
            if state.client_state.queue.remove_head_if(&id) {
                state.emit_event(ControllerEvent::QueueUpdated(
                    state.client_state.queue.get_items(),
                ));
            }
            let view = {
                let mut tracker = state.client_state.playback.lock();
                tracker.on_skip_succeeded(&id);
                tracker.view()
            };
            state.emit_event(ControllerEvent::PlaybackUpdated(view));
        }
        Err(e) => {
            tracing::warn!("Auto-skip for {} failed: {}", id, e);
            let message = match e {
                BackendError::Status { status, body } if body.is_empty() => {
                    format!("Auto-skip failed: {}", status)
                }
                BackendError::Status { status, body } => {
                    format!("Auto-skip failed: {} {}", status, body)
                }
                other => format!("Auto-skip failed: {}", other),
            };
            state.set_queue_error(Some(message));
        }
    }
}
