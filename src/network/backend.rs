use super::messages::{
    decode_queue, AuthStatus, ConflictBody, CurrentSceneResponse, MicStatus, PlaybackSnapshot,
    SceneEntry, SceneListResponse, SongQueueItem,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Broad cause of a failed request that never produced an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Refused,
    TimedOut,
    InvalidUrl,
    Other,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Authentication failed")]
    Unauthorized { status: u16, body: String },
    #[error("HTTP error! status: {status}, body: {body}")]
    Status { status: u16, body: String },
    #[error("Conflict: {}", code.as_deref().unwrap_or("unknown"))]
    Conflict { code: Option<String> },
    #[error("{message}")]
    Transport { kind: TransportKind, message: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::TimedOut
        } else if err.is_connect() {
            TransportKind::Refused
        } else if err.is_builder() {
            TransportKind::InvalidUrl
        } else {
            TransportKind::Other
        };
        Self::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// HTTP contract of the backend proxy
#[async_trait]
pub trait ProxyBackend: Send + Sync {
    async fn connect(&self, host: &str, password: &str) -> BackendResult<()>;
    async fn scenes(&self) -> BackendResult<Vec<SceneEntry>>;
    async fn current_scene(&self) -> BackendResult<String>;
    async fn change_scene(&self, scene_name: &str) -> BackendResult<()>;
    async fn mic_status(&self) -> BackendResult<MicStatus>;
    async fn toggle_mic(&self) -> BackendResult<MicStatus>;

    async fn song_queue(&self) -> BackendResult<Vec<SongQueueItem>>;
    /// `index` is 1-based
    async fn remove_song(&self, index: usize) -> BackendResult<()>;
    async fn skip_song(&self) -> BackendResult<()>;
    /// A 409 surfaces as [`BackendError::Conflict`]
    async fn queue_on_spotify(&self, item_id: &str) -> BackendResult<()>;

    async fn spotify_status(&self) -> BackendResult<AuthStatus>;
    /// Returns whether the refresh endpoint answered with a success status
    async fn spotify_refresh(&self) -> BackendResult<bool>;
    async fn playback_snapshot(&self) -> BackendResult<PlaybackSnapshot>;
    async fn spotify_exchange(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> BackendResult<()>;
    async fn spotify_clear_tokens(&self) -> BackendResult<()>;

    async fn twitch_status(&self) -> BackendResult<AuthStatus>;
    async fn twitch_refresh(&self) -> BackendResult<()>;
    async fn twitch_bootstrap(&self) -> BackendResult<()>;
    async fn twitch_logout(&self) -> BackendResult<()>;
}

/// reqwest implementation of [`ProxyBackend`]
pub struct HttpProxyBackend {
    client: Client,
    base_url: String,
}

impl HttpProxyBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        builder.send().await.map_err(BackendError::from_reqwest)
    }

    /// Fails with [`BackendError::Status`] unless the response is 2xx
    async fn expect_success(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let response = self.send(builder).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }

    async fn json_value(&self, response: Response) -> BackendResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn auth_status(&self, path: &str) -> BackendResult<AuthStatus> {
        let response = self.send(self.request(Method::GET, path)).await?;
        // Bodies that fail to decode count as unauthenticated
        Ok(response.json::<AuthStatus>().await.unwrap_or_default())
    }
}

#[async_trait]
impl ProxyBackend for HttpProxyBackend {
    async fn connect(&self, host: &str, password: &str) -> BackendResult<()> {
        let response = self
            .send(
                self.request(Method::POST, "/api/obs/connect")
                    .json(&json!({ "host": host, "password": password })),
            )
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized {
                status: status.as_u16(),
                body,
            });
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body: format!("Connection failed: {}", body),
        })
    }

    async fn scenes(&self) -> BackendResult<Vec<SceneEntry>> {
        let response = self
            .expect_success(self.request(Method::GET, "/api/obs/scenes"))
            .await?;
        let list: SceneListResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(list.scenes)
    }

    async fn current_scene(&self) -> BackendResult<String> {
        let response = self
            .expect_success(self.request(Method::GET, "/api/obs/scene/current"))
            .await?;
        let current: CurrentSceneResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(current.current_scene)
    }

    async fn change_scene(&self, scene_name: &str) -> BackendResult<()> {
        self.expect_success(
            self.request(Method::POST, "/api/obs/scene/change")
                .json(&json!({ "sceneName": scene_name })),
        )
        .await?;
        Ok(())
    }

    async fn mic_status(&self) -> BackendResult<MicStatus> {
        let response = self
            .expect_success(self.request(Method::GET, "/api/obs/mic/status"))
            .await?;
        let value = self.json_value(response).await?;
        Ok(MicStatus::from_value(&value))
    }

    async fn toggle_mic(&self) -> BackendResult<MicStatus> {
        let response = self
            .expect_success(self.request(Method::POST, "/api/obs/mic/toggle"))
            .await?;
        let value = self.json_value(response).await?;
        Ok(MicStatus::from_value(&value))
    }

    async fn song_queue(&self) -> BackendResult<Vec<SongQueueItem>> {
        let response = self
            .expect_success(self.request(Method::GET, "/api/song-queue"))
            .await?;
        let value = self.json_value(response).await?;
        Ok(value.get("queue").and_then(decode_queue).unwrap_or_default())
    }

    async fn remove_song(&self, index: usize) -> BackendResult<()> {
        self.expect_success(self.request(Method::DELETE, &format!("/api/song-queue/{}", index)))
            .await?;
        Ok(())
    }

    async fn skip_song(&self) -> BackendResult<()> {
        self.expect_success(self.request(Method::POST, "/api/song-queue/skip"))
            .await?;
        Ok(())
    }

    async fn queue_on_spotify(&self, item_id: &str) -> BackendResult<()> {
        let response = self
            .send(
                self.request(Method::POST, "/api/spotify/queue")
                    .json(&json!({ "itemId": item_id })),
            )
            .await?;
        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body: ConflictBody = response.json().await.unwrap_or_default();
            return Err(BackendError::Conflict { code: body.error });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn spotify_status(&self) -> BackendResult<AuthStatus> {
        self.auth_status("/api/spotify/status").await
    }

    async fn spotify_refresh(&self) -> BackendResult<bool> {
        let response = self
            .send(self.request(Method::POST, "/api/spotify/refresh"))
            .await?;
        Ok(response.status().is_success())
    }

    async fn playback_snapshot(&self) -> BackendResult<PlaybackSnapshot> {
        let response = self
            .expect_success(self.request(Method::GET, "/api/spotify/debug"))
            .await?;
        let value = self.json_value(response).await?;
        Ok(PlaybackSnapshot::from_value(&value))
    }

    async fn spotify_exchange(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> BackendResult<()> {
        self.expect_success(
            self.request(Method::POST, "/api/spotify/auth/exchange")
                .json(&json!({
                    "code": code,
                    "codeVerifier": code_verifier,
                    "redirectUri": redirect_uri,
                })),
        )
        .await?;
        Ok(())
    }

    async fn spotify_clear_tokens(&self) -> BackendResult<()> {
        self.expect_success(self.request(Method::POST, "/api/spotify/clear-tokens"))
            .await?;
        Ok(())
    }

    async fn twitch_status(&self) -> BackendResult<AuthStatus> {
        self.auth_status("/api/twitch/status").await
    }

    async fn twitch_refresh(&self) -> BackendResult<()> {
        self.send(self.request(Method::POST, "/api/twitch/refresh"))
            .await?;
        Ok(())
    }

    async fn twitch_bootstrap(&self) -> BackendResult<()> {
        self.send(self.request(Method::POST, "/api/twitch/auth/bootstrap"))
            .await?;
        Ok(())
    }

    async fn twitch_logout(&self) -> BackendResult<()> {
        self.send(self.request(Method::GET, "/api/twitch/auth/logout"))
            .await?;
        Ok(())
    }
}
