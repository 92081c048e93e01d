// Connection command handlers

use crate::app_state::{AppState, ControllerEvent, NotificationKind, OverlayNotification};
use crate::client::ConnectionState;
use crate::commands::obs::{fetch_current_scene, fetch_mic_status, fetch_scenes, set_current_scene};
use crate::commands::playback::start_playback_poll;
use crate::commands::queue::fetch_song_queue;
use crate::commands::settings::{load_settings, update_settings};
use crate::network::backend::BackendError;
use crate::network::messages::{OutboundMessage, PushEvent};
use crate::network::PushChannel;
use crate::utils::{describe_connect_failure, normalize_obs_url};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};

pub const PASSWORD_PROMPT_MESSAGE: &str = "Invalid password. Please try again.";
const DEFAULT_FOLLOWER_NAME: &str = "Follower";
const DEFAULT_SUBSCRIBER_NAME: &str = "Subscriber";

/// Load persisted settings, start the playback poll and schedule the
/// startup auto-connect
pub async fn start(state: &Arc<AppState>) {
    let has_saved_password = load_settings(state).await;
    start_playback_poll(state);

    let settings = state.settings();
    if !has_saved_password && settings.obs_password.is_empty() && !settings.password_prompted {
        tracing::info!("No OBS password saved, waiting for credentials");
        state.session.lock().status = ConnectionState::AwaitingCredentials { message: None };
        state.emit_connection_changed();
        return;
    }

    if settings.auto_connect {
        tracing::info!(
            "Auto-connect enabled, connecting in {:?}",
            state.config.startup_connect_delay()
        );
        spawn_pending_connect(state, state.config.startup_connect_delay(), false);
    }
}

/// Start a connect attempt. A no-op while connecting or connected.
pub async fn connect(state: &Arc<AppState>) {
    let generation = {
        let mut session = state.session.lock();
        if session.shut_down {
            return;
        }
        if !session.status.can_connect() {
            tracing::debug!("Already connected or connecting, skipping connection attempt");
            return;
        }
        session.generation += 1;
        session.status = ConnectionState::Connecting;
        session.actually_connected = false;
        session.connection_error = None;
        session.reconnect_scheduled = false;
        session.generation
    };
    state.timers.lock().cancel_pending_connect();
    state.emit_connection_changed();

    let (url, password) = {
        let settings = state.settings.lock();
        (normalize_obs_url(&settings.obs_url), settings.obs_password.clone())
    };
    tracing::info!("Connecting to OBS at {}", url);

    match state.backend.connect(&url, &password).await {
        Ok(()) => on_connected(state, generation).await,
        Err(e) if e.is_unauthorized() => on_bad_password(state, generation, &e),
        Err(e) => on_connect_failed(state, generation, &e),
    }
}

/// Boxed [`connect`] for the retry timer
pub fn connect_boxed(state: Arc<AppState>) -> BoxFuture<'static, ()> {
    async move { connect(&state).await }.boxed()
}

async fn on_connected(state: &Arc<AppState>, generation: u64) {
    {
        let mut session = state.session.lock();
        if session.generation != generation || session.shut_down {
            tracing::debug!("Discarding result of stale connect attempt");
            return;
        }
        session.actually_connected = true;
        session.status = ConnectionState::Connected;
    }
    tracing::info!("Connected to OBS");
    state.emit_connection_changed();

    sleep(state.config.post_connect_settle()).await;
    if !state.is_current(generation) {
        return;
    }

    match state.transport.open().await {
        Ok(channel) => attach_push(state, generation, channel),
        Err(e) => tracing::warn!("Push channel unavailable: {:#}", e),
    }

    // Failures are logged by each fetch and never end the session
    fetch_scenes(state).await;
    fetch_current_scene(state).await;
    fetch_mic_status(state).await;
    fetch_song_queue(state).await;

    start_scene_poll(state, generation);
}

fn mic_error_text(err: &BackendError) -> String {
    match err {
        BackendError::Status { body, .. } => body.clone(),
        other => other.to_string(),
    }
}

fn on_bad_password(state: &Arc<AppState>, generation: u64, err: &BackendError) {
    {
        let mut session = state.session.lock();
        if session.generation != generation || session.shut_down {
            return;
        }
        session.actually_connected = false;
        session.status = ConnectionState::AwaitingCredentials {
            message: Some(PASSWORD_PROMPT_MESSAGE.to_string()),
        };
        session.connection_error = Some(describe_connect_failure(err));
    }
    tracing::warn!("OBS rejected the password");
    state.client_state.reset_mic(Some(mic_error_text(err)));
    state.emit_mic();
    state.emit_connection_changed();
}

fn on_connect_failed(state: &Arc<AppState>, generation: u64, err: &BackendError) {
    let message = describe_connect_failure(err);
    {
        let mut session = state.session.lock();
        if session.generation != generation || session.shut_down {
            return;
        }
        session.actually_connected = false;
        session.status = ConnectionState::Disconnected;
        session.connection_error = Some(message.clone());
    }
    tracing::error!("{}", message);
    state.client_state.reset_mic(Some(mic_error_text(err)));
    state.emit_mic();
    state.emit_connection_changed();

    if state.settings.lock().auto_connect {
        schedule_reconnect(state);
    }
}

/// Schedule a single retry. Extra requests while one is pending are ignored.
pub(crate) fn schedule_reconnect(state: &Arc<AppState>) {
    {
        let mut session = state.session.lock();
        if session.shut_down || session.reconnect_scheduled {
            return;
        }
        session.reconnect_scheduled = true;
        session.status = ConnectionState::Reconnecting;
    }
    tracing::info!(
        "Auto-connect enabled, reconnecting in {:?}",
        state.config.reconnect_delay()
    );
    state.emit_connection_changed();
    spawn_pending_connect(state, state.config.reconnect_delay(), true);
}

fn spawn_pending_connect(state: &Arc<AppState>, delay: Duration, retry: bool) {
    let task_state = state.clone();
    let mut timers = state.timers.lock();
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        // Detach first so connect() does not abort this task
        task_state.timers.lock().pending_connect.take();
        if retry {
            let mut session = task_state.session.lock();
            if !session.reconnect_scheduled {
                return;
            }
            session.reconnect_scheduled = false;
        }
        connect_boxed(task_state).await;
    });
    timers.set_pending_connect(handle);
}

fn attach_push(state: &Arc<AppState>, generation: u64, mut channel: PushChannel) {
    let sender = channel.sender();
    let reader_state = state.clone();

    let session = state.session.lock();
    if session.generation != generation || session.shut_down {
        tracing::debug!("Dropping push channel of a stale session");
        return;
    }
    if let Err(e) = sender.send(&OutboundMessage::get_status()) {
        tracing::warn!("Failed to request status: {}", e);
    }
    let handle = tokio::spawn(async move {
        while let Some(text) = channel.inbound.recv().await {
            handle_push_text(&reader_state, generation, &text);
        }
        tracing::info!("Push channel closed");
    });
    *state.push.lock() = Some(sender);
    state.timers.lock().set_push_reader(handle);
}

fn start_scene_poll(state: &Arc<AppState>, generation: u64) {
    let period = state.config.scene_poll_interval();
    let poll_state = state.clone();

    let session = state.session.lock();
    if session.generation != generation || !session.status.is_connected() {
        return;
    }
    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !poll_state.is_current(generation) {
                break;
            }
            fetch_current_scene(&poll_state).await;
        }
    });
    state.timers.lock().set_scene_poll(handle);
    tracing::debug!("Scene polling started");
}

/// Apply one push frame. Frames from an older session are ignored.
pub(crate) fn handle_push_text(state: &Arc<AppState>, generation: u64, text: &str) {
    if !state.is_current(generation) {
        return;
    }
    let Some(event) = PushEvent::parse(text) else {
        tracing::debug!("Dropping malformed push frame");
        return;
    };

    match event {
        PushEvent::ObsConnectionStatus { connected: true } => {
            let changed = {
                let mut session = state.session.lock();
                let changed = !session.status.is_connected();
                session.actually_connected = true;
                session.status = ConnectionState::Connected;
                changed
            };
            if changed {
                state.emit_connection_changed();
            }
        }
        PushEvent::ObsConnectionStatus { connected: false } => {
            tracing::warn!("Backend reports OBS disconnected");
            handle_connection_lost(state);
        }
        PushEvent::SceneChanged { scene_name } => set_current_scene(state, scene_name),
        PushEvent::ChatMessage(message) => {
            if state.client_state.chat.push(message.clone()) {
                state.emit_event(ControllerEvent::ChatMessage(message));
            }
        }
        PushEvent::ChatConnectionStatus(status) => {
            state.client_state.set_chat_status(status.clone());
            state.emit_event(ControllerEvent::ChatStatus(status));
        }
        PushEvent::ChatError { message } => {
            let updated = {
                let mut session = state.session.lock();
                if session.connection_error.is_none() {
                    session.connection_error = Some(message);
                    true
                } else {
                    false
                }
            };
            if updated {
                state.emit_connection_changed();
            }
        }
        PushEvent::ChatSentMessage => {}
        PushEvent::SongQueueUpdated { queue } => {
            state.client_state.queue.set_items(queue);
            state.emit_event(ControllerEvent::QueueUpdated(
                state.client_state.queue.get_items(),
            ));
        }
        PushEvent::TwitchFollow { display_name } => {
            state.notify_overlay(OverlayNotification {
                kind: NotificationKind::Follow,
                name: display_name.unwrap_or_else(|| DEFAULT_FOLLOWER_NAME.to_string()),
            });
        }
        PushEvent::TwitchSubscribe { display_name } => {
            state.notify_overlay(OverlayNotification {
                kind: NotificationKind::Subscription,
                name: display_name.unwrap_or_else(|| DEFAULT_SUBSCRIBER_NAME.to_string()),
            });
        }
        PushEvent::Unknown(kind) => {
            tracing::debug!("Ignoring push event of type {}", kind);
        }
    }
}

/// Push-driven drop. Keeps the connection error and retries when enabled.
/// A retry that is already pending is kept as the single retry.
fn handle_connection_lost(state: &Arc<AppState>) {
    let retry_pending = {
        let mut session = state.session.lock();
        session.generation += 1;
        session.actually_connected = false;
        if !session.reconnect_scheduled {
            session.status = ConnectionState::Disconnected;
        }
        session.reconnect_scheduled
    };
    {
        let mut timers = state.timers.lock();
        timers.stop_live();
        if !retry_pending {
            timers.cancel_pending_connect();
        }
    }
    *state.push.lock() = None;
    state.client_state.reset_mic(None);
    state.emit_mic();
    state.emit_connection_changed();

    if !retry_pending && state.settings.lock().auto_connect {
        schedule_reconnect(state);
    }
}

pub fn disconnect(state: &Arc<AppState>) {
    tracing::info!("Disconnecting from OBS");
    {
        let mut session = state.session.lock();
        session.generation += 1;
        session.actually_connected = false;
        session.status = ConnectionState::Disconnected;
        session.connection_error = None;
        session.reconnect_scheduled = false;
    }
    state.timers.lock().stop_session();
    *state.push.lock() = None;
    state.client_state.reset_mic(None);
    state.emit_mic();
    state.emit_connection_changed();
}

/// Release every timer, close the push channel and flush pending settings
pub async fn shutdown(state: &Arc<AppState>) {
    tracing::info!("Shutting down");
    {
        let mut session = state.session.lock();
        session.shut_down = true;
        session.generation += 1;
        session.actually_connected = false;
        session.status = ConnectionState::Disconnected;
        session.reconnect_scheduled = false;
    }
    state.timers.lock().stop_all();
    *state.push.lock() = None;
    state.emit_connection_changed();

    if let Err(e) = state.settings_writer.flush_now().await {
        tracing::error!("Failed to save settings on shutdown: {}", e);
    }
}

pub async fn handle_password_save(state: &Arc<AppState>, password: &str, remember: bool) {
    let password = password.to_string();
    update_settings(state, |settings| {
        settings.obs_password = password;
        settings.remember_password = remember;
        settings.password_prompted = true;
    });
    leave_password_prompt(state);
    connect(state).await;
}

pub fn handle_password_cancel(state: &Arc<AppState>) {
    leave_password_prompt(state);
}

fn leave_password_prompt(state: &Arc<AppState>) {
    let changed = {
        let mut session = state.session.lock();
        if matches!(session.status, ConnectionState::AwaitingCredentials { .. }) {
            session.status = ConnectionState::Disconnected;
            true
        } else {
            false
        }
    };
    if changed {
        state.emit_connection_changed();
    }
}
