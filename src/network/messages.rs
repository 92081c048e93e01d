use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scene entry as returned by `/api/obs/scenes`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    pub scene_name: String,
    #[serde(default)]
    pub scene_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneListResponse {
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSceneResponse {
    pub current_scene: String,
}

/// Microphone payload shared by the status and toggle endpoints.
/// Fields of the wrong type decode to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MicStatus {
    pub input_muted: Option<bool>,
    pub input_name: Option<String>,
}

impl MicStatus {
    pub fn from_value(value: &Value) -> Self {
        Self {
            input_muted: value.get("inputMuted").and_then(|v| v.as_bool()),
            input_name: value
                .get("inputName")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<ChatBadge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mod: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_subscriber: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_vip: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatBadge {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub channel: String,
    pub user: ChatUser,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_action: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_highlighted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Any additional metadata the backend attaches
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Matched,
    Error,
    /// Any status this client does not know yet
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedTrack {
    pub id: String,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SongQueueItem {
    pub id: String,
    pub title: String,
    pub requested_by: String,
    pub requested_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_status: Option<MatchStatus>,
    #[serde(
        default,
        rename = "spotify",
        alias = "matchedTrack",
        skip_serializing_if = "Option::is_none"
    )]
    pub matched_track: Option<MatchedTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_error: Option<String>,
}

impl SongQueueItem {
    pub fn matched_uri(&self) -> Option<&str> {
        self.matched_track.as_ref().map(|track| track.uri.as_str())
    }
}

/// Decode a queue array item by item. Items that fail to decode are dropped
/// so one bad entry does not hide the rest of the queue.
pub fn decode_queue(value: &Value) -> Option<Vec<SongQueueItem>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match SongQueueItem::deserialize(item) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!("Dropping malformed queue item: {}", e);
                    None
                }
            })
            .collect(),
    )
}

/// Status body of `/api/spotify/status` and `/api/twitch/status`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub method: Option<String>,
}

impl AuthStatus {
    pub fn has_token_fallback(&self) -> bool {
        self.method.as_deref() == Some("token_fallback")
    }
}

/// Track currently reported by the playback snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackItem {
    pub name: String,
    pub uri: String,
    pub artists: Vec<String>,
    pub duration_ms: Option<u64>,
}

/// Playback snapshot from `/api/spotify/debug`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub progress_ms: Option<u64>,
    pub item: Option<PlaybackItem>,
}

impl PlaybackSnapshot {
    /// Lenient decoding: missing or mistyped fields become `None`.
    pub fn from_value(value: &Value) -> Self {
        let Some(playback) = value.get("playback").filter(|v| v.is_object()) else {
            return Self::default();
        };
        let progress_ms = playback.get("progressMs").and_then(as_millis);
        let item = playback
            .get("item")
            .filter(|v| v.is_object())
            .map(|item| PlaybackItem {
                name: item
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                uri: item
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                artists: item
                    .get("artists")
                    .and_then(|v| v.as_array())
                    .map(|artists| {
                        artists
                            .iter()
                            .filter_map(|a| a.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default(),
                duration_ms: item.get("durationMs").and_then(as_millis),
            });
        Self { progress_ms, item }
    }
}

fn as_millis(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Body of a 409 from `/api/spotify/queue`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConflictBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Event pushed by the backend over the live channel
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    ObsConnectionStatus { connected: bool },
    SceneChanged { scene_name: String },
    ChatMessage(ChatMessage),
    ChatConnectionStatus(ChatConnectionStatus),
    ChatError { message: String },
    ChatSentMessage,
    SongQueueUpdated { queue: Vec<SongQueueItem> },
    TwitchFollow { display_name: Option<String> },
    TwitchSubscribe { display_name: Option<String> },
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl PushEvent {
    /// Decode a text frame. Returns `None` for frames that are not JSON, lack a
    /// string `type`, or carry a payload of the wrong shape for their type.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: PushEnvelope = serde_json::from_str(text).ok()?;
        let data = envelope.data;
        match envelope.kind.as_str() {
            "obsConnectionStatus" => {
                let connected = data.get("connected")?.as_bool()?;
                Some(Self::ObsConnectionStatus { connected })
            }
            "sceneChanged" => {
                let scene_name = data.get("sceneName")?.as_str()?;
                if scene_name.is_empty() {
                    return None;
                }
                Some(Self::SceneChanged {
                    scene_name: scene_name.to_string(),
                })
            }
            "chatMessage" => serde_json::from_value(data).ok().map(Self::ChatMessage),
            "chatConnectionStatus" => serde_json::from_value(data)
                .ok()
                .map(Self::ChatConnectionStatus),
            "chatError" => {
                let message = data.get("message")?.as_str()?;
                Some(Self::ChatError {
                    message: message.to_string(),
                })
            }
            "chatSentMessage" => Some(Self::ChatSentMessage),
            "songQueueUpdated" => {
                let queue = decode_queue(data.get("queue")?)?;
                Some(Self::SongQueueUpdated { queue })
            }
            "twitchFollow" => Some(Self::TwitchFollow {
                display_name: display_name(&data),
            }),
            "twitchSubscribe" => Some(Self::TwitchSubscribe {
                display_name: display_name(&data),
            }),
            other => Some(Self::Unknown(other.to_string())),
        }
    }
}

fn display_name(data: &Value) -> Option<String> {
    data.get("displayName")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Request sent to the backend over the live channel
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub v: u8,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: String,
}

impl OutboundMessage {
    pub fn get_status() -> Self {
        Self {
            v: 1,
            kind: "getStatus".to_string(),
            data: Value::Null,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
