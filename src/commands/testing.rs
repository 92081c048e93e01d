// In-process backend and push transport for command tests

use crate::app_state::AppState;
use crate::config::{ClientConfig, MemoryStore};
use crate::network::backend::{BackendError, BackendResult, ProxyBackend, TransportKind};
use crate::network::messages::{
    AuthStatus, MatchedTrack, MicStatus, PlaybackItem, PlaybackSnapshot, SceneEntry, SongQueueItem,
};
use crate::network::{PushChannel, PushTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Ok,
    Refused,
    Unauthorized,
}

pub struct MockBackend {
    calls: Mutex<Vec<String>>,
    pub connect_outcomes: Mutex<VecDeque<ConnectOutcome>>,
    pub connect_delay: Mutex<Duration>,
    pub twitch_statuses: Mutex<VecDeque<AuthStatus>>,
    pub spotify_statuses: Mutex<VecDeque<AuthStatus>>,
    pub spotify_refresh_ok: Mutex<bool>,
    pub playback: Mutex<VecDeque<Option<PlaybackSnapshot>>>,
    pub skip_failure: Mutex<Option<(u16, String)>>,
    pub skip_delay: Mutex<Duration>,
    pub play_conflict: Mutex<Option<Option<String>>>,
    pub clear_fails: Mutex<bool>,
    pub current_scene: Mutex<String>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            connect_outcomes: Mutex::new(VecDeque::new()),
            connect_delay: Mutex::new(Duration::ZERO),
            twitch_statuses: Mutex::new(VecDeque::new()),
            spotify_statuses: Mutex::new(VecDeque::new()),
            spotify_refresh_ok: Mutex::new(true),
            playback: Mutex::new(VecDeque::new()),
            skip_failure: Mutex::new(None),
            skip_delay: Mutex::new(Duration::ZERO),
            play_conflict: Mutex::new(None),
            clear_fails: Mutex::new(false),
            current_scene: Mutex::new("Main".to_string()),
        })
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn queue_connect(&self, outcomes: &[ConnectOutcome]) {
        self.connect_outcomes.lock().extend(outcomes.iter().cloned());
    }

    /// Statuses are consumed in order; an empty queue reports authenticated
    pub fn queue_twitch_status(&self, statuses: &[AuthStatus]) {
        self.twitch_statuses.lock().extend(statuses.iter().cloned());
    }

    pub fn queue_spotify_status(&self, statuses: &[AuthStatus]) {
        self.spotify_statuses.lock().extend(statuses.iter().cloned());
    }

    fn next_status(queue: &Mutex<VecDeque<AuthStatus>>) -> AuthStatus {
        queue.lock().pop_front().unwrap_or_else(|| authenticated(true))
    }
}

pub fn authenticated(value: bool) -> AuthStatus {
    AuthStatus {
        authenticated: value,
        method: None,
    }
}

pub fn token_fallback() -> AuthStatus {
    AuthStatus {
        authenticated: false,
        method: Some("token_fallback".to_string()),
    }
}

#[async_trait]
impl ProxyBackend for MockBackend {
    async fn connect(&self, host: &str, _password: &str) -> BackendResult<()> {
        self.record("connect");
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .connect_outcomes
            .lock()
            .pop_front()
            .unwrap_or(ConnectOutcome::Ok);
        match outcome {
            ConnectOutcome::Ok => {
                assert!(host.starts_with("ws://") || host.starts_with("wss://"));
                Ok(())
            }
            ConnectOutcome::Refused => Err(BackendError::Transport {
                kind: TransportKind::Refused,
                message: "connection refused".to_string(),
            }),
            ConnectOutcome::Unauthorized => Err(BackendError::Unauthorized {
                status: 401,
                body: "bad password".to_string(),
            }),
        }
    }

    async fn scenes(&self) -> BackendResult<Vec<SceneEntry>> {
        self.record("scenes");
        Ok(vec![
            SceneEntry {
                scene_name: "Main".to_string(),
                scene_index: 0,
            },
            SceneEntry {
                scene_name: "BRB".to_string(),
                scene_index: 1,
            },
        ])
    }

    async fn current_scene(&self) -> BackendResult<String> {
        self.record("current_scene");
        Ok(self.current_scene.lock().clone())
    }

    async fn change_scene(&self, scene_name: &str) -> BackendResult<()> {
        self.record(format!("change_scene:{}", scene_name));
        *self.current_scene.lock() = scene_name.to_string();
        Ok(())
    }

    async fn mic_status(&self) -> BackendResult<MicStatus> {
        self.record("mic_status");
        Ok(MicStatus {
            input_muted: Some(false),
            input_name: Some("Mic/Aux".to_string()),
        })
    }

    async fn toggle_mic(&self) -> BackendResult<MicStatus> {
        self.record("toggle_mic");
        Ok(MicStatus {
            input_muted: Some(true),
            input_name: Some("Mic/Aux".to_string()),
        })
    }

    async fn song_queue(&self) -> BackendResult<Vec<SongQueueItem>> {
        self.record("song_queue");
        Ok(Vec::new())
    }

    async fn remove_song(&self, index: usize) -> BackendResult<()> {
        self.record(format!("remove_song:{}", index));
        Ok(())
    }

    async fn skip_song(&self) -> BackendResult<()> {
        self.record("skip_song");
        let delay = *self.skip_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.skip_failure.lock().clone() {
            Some((status, body)) => Err(BackendError::Status { status, body }),
            None => Ok(()),
        }
    }

    async fn queue_on_spotify(&self, item_id: &str) -> BackendResult<()> {
        self.record(format!("queue_on_spotify:{}", item_id));
        match self.play_conflict.lock().clone() {
            Some(code) => Err(BackendError::Conflict { code }),
            None => Ok(()),
        }
    }

    async fn spotify_status(&self) -> BackendResult<AuthStatus> {
        self.record("spotify_status");
        Ok(Self::next_status(&self.spotify_statuses))
    }

    async fn spotify_refresh(&self) -> BackendResult<bool> {
        self.record("spotify_refresh");
        Ok(*self.spotify_refresh_ok.lock())
    }

    async fn playback_snapshot(&self) -> BackendResult<PlaybackSnapshot> {
        self.record("playback_snapshot");
        match self.playback.lock().pop_front() {
            Some(Some(snapshot)) => Ok(snapshot),
            Some(None) => Err(BackendError::Status {
                status: 500,
                body: "debug unavailable".to_string(),
            }),
            None => Ok(PlaybackSnapshot::default()),
        }
    }

    async fn spotify_exchange(
        &self,
        code: &str,
        code_verifier: &str,
        _redirect_uri: &str,
    ) -> BackendResult<()> {
        self.record(format!("spotify_exchange:{}:{}", code, code_verifier.len()));
        Ok(())
    }

    async fn spotify_clear_tokens(&self) -> BackendResult<()> {
        self.record("spotify_clear_tokens");
        if *self.clear_fails.lock() {
            return Err(BackendError::Transport {
                kind: TransportKind::Other,
                message: "offline".to_string(),
            });
        }
        Ok(())
    }

    async fn twitch_status(&self) -> BackendResult<AuthStatus> {
        self.record("twitch_status");
        Ok(Self::next_status(&self.twitch_statuses))
    }

    async fn twitch_refresh(&self) -> BackendResult<()> {
        self.record("twitch_refresh");
        Ok(())
    }

    async fn twitch_bootstrap(&self) -> BackendResult<()> {
        self.record("twitch_bootstrap");
        Ok(())
    }

    async fn twitch_logout(&self) -> BackendResult<()> {
        self.record("twitch_logout");
        Ok(())
    }
}

/// Push transport backed by in-memory channels
#[derive(Default)]
pub struct MockTransport {
    frames: Mutex<Option<mpsc::UnboundedSender<String>>>,
    sent: Mutex<Vec<mpsc::UnboundedReceiver<String>>>,
    opens: Mutex<usize>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a frame to the currently open channel
    pub fn push(&self, frame: &str) {
        if let Some(tx) = self.frames.lock().as_ref() {
            let _ = tx.send(frame.to_string());
        }
    }

    pub fn open_count(&self) -> usize {
        *self.opens.lock()
    }

    /// Everything written by the controller so far
    pub fn sent_frames(&self) -> Vec<String> {
        let mut frames = Vec::new();
        for rx in self.sent.lock().iter_mut() {
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }
        }
        frames
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn open(&self) -> anyhow::Result<PushChannel> {
        *self.opens.lock() += 1;
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        *self.frames.lock() = Some(in_tx);
        self.sent.lock().push(out_rx);
        Ok(PushChannel::new(out_tx, in_rx, None))
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub backend: Arc<MockBackend>,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
}

pub fn harness() -> Harness {
    harness_with_store(HashMap::new())
}

pub fn harness_with_store(values: HashMap<String, String>) -> Harness {
    let backend = MockBackend::new();
    let transport = MockTransport::new();
    let store = Arc::new(MemoryStore::with_values(values));
    let state = AppState::new(
        ClientConfig::default(),
        backend.clone(),
        transport.clone(),
        store.clone(),
    );
    Harness {
        state,
        backend,
        transport,
        store,
    }
}

pub fn queue_item(id: &str, uri: &str) -> SongQueueItem {
    SongQueueItem {
        id: id.to_string(),
        title: format!("Song {}", id),
        requested_by: "viewer".to_string(),
        requested_at: 0,
        match_status: None,
        matched_track: Some(MatchedTrack {
            id: format!("track-{}", id),
            uri: uri.to_string(),
            name: format!("Song {}", id),
            artists: vec!["Artist".to_string()],
            confidence: None,
        }),
        match_error: None,
    }
}

pub fn snapshot(uri: &str, duration_ms: u64, progress_ms: u64) -> PlaybackSnapshot {
    PlaybackSnapshot {
        progress_ms: Some(progress_ms),
        item: Some(PlaybackItem {
            name: "Song".to_string(),
            uri: uri.to_string(),
            artists: vec!["Artist".to_string()],
            duration_ms: Some(duration_ms),
        }),
    }
}
