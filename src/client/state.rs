use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;

use super::chat::ChatLog;
use super::playback::{PlaybackTracker, PlaybackView};
use super::queue::SongQueue;
use crate::network::messages::{ChatConnectionStatus, MicStatus, SceneEntry};

/// Externally visible connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A retry is scheduled
    Reconnecting,
    /// The backend rejected the password; retrying will not help
    AwaitingCredentials { message: Option<String> },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States from which `connect()` may start a new attempt
    pub fn can_connect(&self) -> bool {
        !matches!(self, Self::Connecting | Self::Connected)
    }
}

/// OBS scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scene {
    pub name: String,
    pub index: i64,
}

/// Microphone state. `muted == None` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MicState {
    pub muted: Option<bool>,
    pub input_name: Option<String>,
    pub loading: bool,
    pub last_error: Option<String>,
}

/// External service guarding queue actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthService {
    Spotify,
    Twitch,
}

impl AuthService {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Spotify => "Spotify",
            Self::Twitch => "Twitch",
        }
    }
}

/// Whether queue actions are blocked on re-authentication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthHealth {
    #[default]
    None,
    NeedsSpotify,
    NeedsTwitch,
}

impl AuthHealth {
    pub fn needs(service: AuthService) -> Self {
        match service {
            AuthService::Spotify => Self::NeedsSpotify,
            AuthService::Twitch => Self::NeedsTwitch,
        }
    }

    pub fn flagged_service(self) -> Option<AuthService> {
        match self {
            Self::None => None,
            Self::NeedsSpotify => Some(AuthService::Spotify),
            Self::NeedsTwitch => Some(AuthService::Twitch),
        }
    }
}

/// State reconciled from the backend
pub struct ClientState {
    scenes: RwLock<Vec<Scene>>,
    current_scene: RwLock<String>,
    mic: RwLock<MicState>,
    pub chat: ChatLog,
    chat_status: RwLock<Option<ChatConnectionStatus>>,
    pub queue: SongQueue,
    auth_health: RwLock<AuthHealth>,
    auth_syncing: RwLock<bool>,
    pub playback: Mutex<PlaybackTracker>,
}

impl ClientState {
    pub fn new(end_grace_ms: u64) -> Self {
        Self {
            scenes: RwLock::new(Vec::new()),
            current_scene: RwLock::new(String::new()),
            mic: RwLock::new(MicState::default()),
            chat: ChatLog::new(),
            chat_status: RwLock::new(None),
            queue: SongQueue::new(),
            auth_health: RwLock::new(AuthHealth::None),
            auth_syncing: RwLock::new(false),
            playback: Mutex::new(PlaybackTracker::with_grace(end_grace_ms)),
        }
    }

    // Scene methods
    pub fn get_scenes(&self) -> Vec<Scene> {
        self.scenes.read().clone()
    }

    /// Store scenes ordered by index, keeping the first entry per name
    pub fn set_scenes(&self, entries: Vec<SceneEntry>) {
        let mut seen = HashSet::new();
        let mut scenes: Vec<Scene> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.scene_name.clone()))
            .map(|entry| Scene {
                name: entry.scene_name,
                index: entry.scene_index,
            })
            .collect();
        scenes.sort_by_key(|scene| scene.index);
        *self.scenes.write() = scenes;
    }

    pub fn get_current_scene(&self) -> String {
        self.current_scene.read().clone()
    }

    pub fn set_current_scene(&self, name: String) {
        *self.current_scene.write() = name;
    }

    // Mic methods
    pub fn get_mic(&self) -> MicState {
        self.mic.read().clone()
    }

    pub fn set_mic_status(&self, status: MicStatus) {
        let mut mic = self.mic.write();
        mic.muted = status.input_muted;
        mic.input_name = status.input_name;
    }

    pub fn set_mic_loading(&self, loading: bool) {
        self.mic.write().loading = loading;
    }

    pub fn set_mic_error(&self, error: Option<String>) {
        self.mic.write().last_error = error;
    }

    /// Forget everything known about the mic, keeping `error`
    pub fn reset_mic(&self, error: Option<String>) {
        *self.mic.write() = MicState {
            last_error: error,
            ..MicState::default()
        };
    }

    // Chat status methods
    pub fn get_chat_status(&self) -> Option<ChatConnectionStatus> {
        self.chat_status.read().clone()
    }

    pub fn set_chat_status(&self, status: ChatConnectionStatus) {
        *self.chat_status.write() = Some(status);
    }

    // Auth methods
    pub fn get_auth_health(&self) -> AuthHealth {
        *self.auth_health.read()
    }

    pub fn set_auth_health(&self, health: AuthHealth) {
        *self.auth_health.write() = health;
    }

    pub fn is_auth_syncing(&self) -> bool {
        *self.auth_syncing.read()
    }

    pub fn set_auth_syncing(&self, syncing: bool) {
        *self.auth_syncing.write() = syncing;
    }

    // Playback methods
    pub fn get_playback(&self) -> PlaybackView {
        self.playback.lock().view()
    }
}
