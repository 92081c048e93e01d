use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::client::{AuthHealth, ClientState, ConnectionState, MicState, PlaybackView, Scene};
use crate::config::{ClientConfig, ConnectionSettings, DebouncedWriter, SettingsStore};
use crate::network::messages::{ChatConnectionStatus, ChatMessage, SongQueueItem};
use crate::network::{ProxyBackend, PushSender, PushTransport};

const EVENT_CAPACITY: usize = 256;

/// Change notification published to UI subscribers
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    ConnectionChanged {
        state: ConnectionState,
        error: Option<String>,
    },
    ScenesUpdated(Vec<Scene>),
    CurrentSceneChanged(String),
    MicUpdated(MicState),
    ChatMessage(ChatMessage),
    ChatStatus(ChatConnectionStatus),
    QueueUpdated(Vec<SongQueueItem>),
    QueueErrorChanged(Option<String>),
    PlaybackUpdated(PlaybackView),
    AuthHealthChanged(AuthHealth),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Follow,
    Subscription,
}

/// Overlay popup for a Twitch follow or subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayNotification {
    pub kind: NotificationKind,
    pub name: String,
}

/// Connection bookkeeping guarded by a single lock
#[derive(Debug)]
pub struct SessionState {
    pub status: ConnectionState,
    pub actually_connected: bool,
    /// Bumped by every connect attempt, disconnect and shutdown
    pub generation: u64,
    pub reconnect_scheduled: bool,
    pub connection_error: Option<String>,
    pub shut_down: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: ConnectionState::Disconnected,
            actually_connected: false,
            generation: 0,
            reconnect_scheduled: false,
            connection_error: None,
            shut_down: false,
        }
    }
}

/// Background tasks owned by the controller
#[derive(Default)]
pub struct Timers {
    pub scene_poll: Option<JoinHandle<()>>,
    /// Startup auto-connect or reconnect retry
    pub pending_connect: Option<JoinHandle<()>>,
    pub playback_poll: Option<JoinHandle<()>>,
    pub push_reader: Option<JoinHandle<()>>,
}

impl Timers {
    fn replace(slot: &mut Option<JoinHandle<()>>, handle: Option<JoinHandle<()>>) {
        if let Some(old) = std::mem::replace(slot, handle) {
            old.abort();
        }
    }

    pub fn set_scene_poll(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.scene_poll, Some(handle));
    }

    pub fn set_pending_connect(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.pending_connect, Some(handle));
    }

    pub fn set_playback_poll(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.playback_poll, Some(handle));
    }

    pub fn set_push_reader(&mut self, handle: JoinHandle<()>) {
        Self::replace(&mut self.push_reader, Some(handle));
    }

    pub fn cancel_pending_connect(&mut self) {
        Self::replace(&mut self.pending_connect, None);
    }

    /// Stop the scene poll and push reader, leaving a pending connect alone
    pub fn stop_live(&mut self) {
        Self::replace(&mut self.scene_poll, None);
        Self::replace(&mut self.push_reader, None);
    }

    /// Stop everything tied to one backend session
    pub fn stop_session(&mut self) {
        self.stop_live();
        Self::replace(&mut self.pending_connect, None);
    }

    pub fn stop_all(&mut self) {
        self.stop_session();
        Self::replace(&mut self.playback_poll, None);
    }

    pub fn active_count(&self) -> usize {
        [
            &self.scene_poll,
            &self.pending_connect,
            &self.playback_poll,
            &self.push_reader,
        ]
        .iter()
        .filter(|slot| slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false))
        .count()
    }
}

pub struct AppState {
    pub config: ClientConfig,
    pub backend: Arc<dyn ProxyBackend>,
    pub transport: Arc<dyn PushTransport>,
    pub settings: Mutex<ConnectionSettings>,
    pub settings_writer: DebouncedWriter,
    pub session: Mutex<SessionState>,
    pub client_state: ClientState,
    pub push: Mutex<Option<PushSender>>,
    pub timers: Mutex<Timers>,
    events: broadcast::Sender<ControllerEvent>,
    notifications: broadcast::Sender<OverlayNotification>,
}

impl AppState {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn ProxyBackend>,
        transport: Arc<dyn PushTransport>,
        store: Arc<dyn SettingsStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (notifications, _) = broadcast::channel(EVENT_CAPACITY);
        let settings_writer = DebouncedWriter::new(store, config.settings_debounce());
        Arc::new(Self {
            settings: Mutex::new(ConnectionSettings::defaults(&config)),
            client_state: ClientState::new(config.end_grace_ms),
            config,
            backend,
            transport,
            settings_writer,
            session: Mutex::new(SessionState::default()),
            push: Mutex::new(None),
            timers: Mutex::new(Timers::default()),
            events,
            notifications,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<OverlayNotification> {
        self.notifications.subscribe()
    }

    pub fn emit_event(&self, event: ControllerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn notify_overlay(&self, notification: OverlayNotification) {
        tracing::info!("Overlay notification: {:?}", notification);
        let _ = self.notifications.send(notification);
    }

    pub fn emit_connection_changed(&self) {
        let (state, error) = {
            let session = self.session.lock();
            (session.status.clone(), session.connection_error.clone())
        };
        self.emit_event(ControllerEvent::ConnectionChanged { state, error });
    }

    pub fn emit_mic(&self) {
        self.emit_event(ControllerEvent::MicUpdated(self.client_state.get_mic()));
    }

    pub fn set_queue_error(&self, error: Option<String>) {
        self.client_state.queue.set_error(error.clone());
        self.emit_event(ControllerEvent::QueueErrorChanged(error));
    }

    pub fn set_auth_health(&self, health: AuthHealth) {
        if self.client_state.get_auth_health() != health {
            self.client_state.set_auth_health(health);
            self.emit_event(ControllerEvent::AuthHealthChanged(health));
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.lock().status.clone()
    }

    pub fn connection_error(&self) -> Option<String> {
        self.session.lock().connection_error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().status.is_connected()
    }

    pub fn is_actually_connected(&self) -> bool {
        self.session.lock().actually_connected
    }

    /// Whether `generation` is still the live session
    pub fn is_current(&self, generation: u64) -> bool {
        let session = self.session.lock();
        session.generation == generation && !session.shut_down
    }

    pub fn is_shut_down(&self) -> bool {
        self.session.lock().shut_down
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.settings.lock().clone()
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.lock().active_count()
    }
}
