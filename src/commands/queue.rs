// Song queue commands with authentication preflight

use crate::app_state::{AppState, ControllerEvent};
use crate::client::{AuthHealth, AuthService};
use crate::network::backend::{BackendError, BackendResult};
use std::sync::Arc;

/// Result of a mutating queue action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueActionOutcome {
    Done,
    /// Refused before the mutation was sent; the service needs re-auth
    AuthRequired(AuthService),
    Failed(String),
}

pub fn not_authenticated_message(service: AuthService) -> String {
    format!(
        "{} not authenticated. Please re-auth and try again.",
        service.display_name()
    )
}

fn conflict_message(code: Option<&str>) -> &'static str {
    match code {
        Some("no_active_device") => "Open Spotify on any device and try again.",
        Some("not_matched") => "Song is not matched yet.",
        _ => "Playback not possible right now.",
    }
}

fn action_error(action: &str, err: &BackendError) -> String {
    match err {
        BackendError::Status { status, body } => format!("{} failed: {} {}", action, status, body),
        other => other.to_string(),
    }
}

pub async fn fetch_song_queue(state: &Arc<AppState>) {
    state.set_queue_error(None);
    match state.backend.song_queue().await {
        Ok(queue) => {
            state.client_state.queue.set_items(queue);
            state.emit_event(ControllerEvent::QueueUpdated(
                state.client_state.queue.get_items(),
            ));
        }
        Err(e) => {
            tracing::error!("Failed to fetch song queue: {}", e);
            state.set_queue_error(Some(e.to_string()));
        }
    }
}

pub fn dismiss_queue_error(state: &Arc<AppState>) {
    state.set_queue_error(None);
}

/// Status check with silent recovery. Returns whether the service ended up
/// authenticated.
async fn check_service(state: &Arc<AppState>, service: AuthService) -> BackendResult<bool> {
    let backend = &state.backend;

    match service {
        AuthService::Twitch => {
            let status = backend.twitch_status().await?;
            if status.authenticated {
                return Ok(true);
            }
            if status.has_token_fallback() {
                if let Err(e) = backend.twitch_bootstrap().await {
                    tracing::debug!("Twitch bootstrap failed: {}", e);
                }
                if backend.twitch_status().await?.authenticated {
                    return Ok(true);
                }
            }
            if let Err(e) = backend.twitch_refresh().await {
                tracing::debug!("Twitch refresh failed: {}", e);
            }
            Ok(backend.twitch_status().await?.authenticated)
        }
        AuthService::Spotify => {
            if backend.spotify_status().await?.authenticated {
                return Ok(true);
            }
            if backend.spotify_refresh().await? {
                return Ok(backend.spotify_status().await?.authenticated);
            }
            Ok(false)
        }
    }
}

/// Blocks queue actions guarded by `service` until it is authenticated.
///
/// Once a service is flagged the action is refused after a single status
/// check. Only re-authentication or clearing auth data lifts the flag.
async fn preflight(state: &Arc<AppState>, service: AuthService) -> Result<(), QueueActionOutcome> {
    if state.client_state.get_auth_health().flagged_service() == Some(service) {
        state.client_state.set_auth_syncing(true);
        let result = match service {
            AuthService::Twitch => state.backend.twitch_status().await,
            AuthService::Spotify => state.backend.spotify_status().await,
        };
        state.client_state.set_auth_syncing(false);
        if let Err(e) = result {
            tracing::debug!("{} status check failed: {}", service.display_name(), e);
        }
        tracing::warn!(
            "{} needs re-authentication, refusing queue action",
            service.display_name()
        );
        return Err(QueueActionOutcome::AuthRequired(service));
    }

    state.client_state.set_auth_syncing(true);
    let result = check_service(state, service).await;
    state.client_state.set_auth_syncing(false);

    match result {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!("{} is not authenticated, refusing queue action", service.display_name());
            state.set_auth_health(AuthHealth::needs(service));
            Err(QueueActionOutcome::AuthRequired(service))
        }
        Err(e) => {
            tracing::error!("{} status check failed: {}", service.display_name(), e);
            Err(QueueActionOutcome::Failed(e.to_string()))
        }
    }
}

fn begin_action(state: &Arc<AppState>) {
    state.client_state.queue.set_action_loading(true);
    state.set_queue_error(None);
}

fn finish_action(state: &Arc<AppState>, outcome: QueueActionOutcome) -> QueueActionOutcome {
    match &outcome {
        QueueActionOutcome::Done => {}
        QueueActionOutcome::AuthRequired(service) => {
            state.set_queue_error(Some(not_authenticated_message(*service)));
        }
        QueueActionOutcome::Failed(reason) => {
            state.set_queue_error(Some(reason.clone()));
        }
    }
    state.client_state.queue.set_action_loading(false);
    outcome
}

/// Remove the entry at a 1-based position. The backend broadcasts the new queue.
pub async fn remove_song(state: &Arc<AppState>, index: usize) -> QueueActionOutcome {
    if index < 1 {
        return QueueActionOutcome::Failed("Queue position must be at least 1".to_string());
    }
    begin_action(state);
    let outcome = match preflight(state, AuthService::Twitch).await {
        Err(outcome) => outcome,
        Ok(()) => match state.backend.remove_song(index).await {
            Ok(()) => {
                tracing::info!("Removed song at position {}", index);
                QueueActionOutcome::Done
            }
            Err(e) => {
                tracing::error!("Failed to remove song: {}", e);
                QueueActionOutcome::Failed(action_error("Remove", &e))
            }
        },
    };
    finish_action(state, outcome)
}

pub async fn skip_song(state: &Arc<AppState>) -> QueueActionOutcome {
    begin_action(state);
    let outcome = match preflight(state, AuthService::Twitch).await {
        Err(outcome) => outcome,
        Ok(()) => match state.backend.skip_song().await {
            Ok(()) => {
                tracing::info!("Skipped current song");
                QueueActionOutcome::Done
            }
            Err(e) => {
                tracing::error!("Failed to skip song: {}", e);
                QueueActionOutcome::Failed(action_error("Skip", &e))
            }
        },
    };
    finish_action(state, outcome)
}

/// Queue a matched request on the streamer's Spotify player
pub async fn play_song(state: &Arc<AppState>, item_id: &str) -> QueueActionOutcome {
    if item_id.is_empty() {
        return QueueActionOutcome::Failed("Missing queue item id".to_string());
    }
    begin_action(state);
    let outcome = match preflight(state, AuthService::Spotify).await {
        Err(outcome) => outcome,
        Ok(()) => match state.backend.queue_on_spotify(item_id).await {
            Ok(()) => {
                tracing::info!("Queued item {} on Spotify", item_id);
                QueueActionOutcome::Done
            }
            Err(BackendError::Conflict { code }) => {
                tracing::warn!("Spotify refused to queue {}: {:?}", item_id, code);
                QueueActionOutcome::Failed(conflict_message(code.as_deref()).to_string())
            }
            Err(e) => {
                tracing::error!("Failed to play song: {}", e);
                QueueActionOutcome::Failed(action_error("Play", &e))
            }
        },
    };
    finish_action(state, outcome)
}
