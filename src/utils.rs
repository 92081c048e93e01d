use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use url::Url;

use crate::network::backend::{BackendError, TransportKind};

pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_SCOPES: [&str; 2] = ["user-modify-playback-state", "user-read-playback-state"];

const PKCE_VERIFIER_BYTES: usize = 64;
const PKCE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

const CONNECT_FAILURE_PREFIX: &str = "Failed to connect to OBS. ";

/// Random PKCE code verifier over the unreserved character set
pub fn pkce_verifier() -> String {
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    verifier_from_bytes(&bytes)
}

pub fn verifier_from_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| PKCE_CHARSET[*b as usize % PKCE_CHARSET.len()] as char)
        .collect()
}

/// S256 code challenge: base64url (no padding) of the SHA-256 digest
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub fn build_spotify_authorize_url(client_id: &str, redirect_uri: &str, challenge: &str) -> String {
    let scope = SPOTIFY_SCOPES.join(" ");
    match Url::parse_with_params(
        SPOTIFY_AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge),
            ("scope", scope.as_str()),
        ],
    ) {
        Ok(url) => url.to_string(),
        Err(_) => SPOTIFY_AUTHORIZE_URL.to_string(),
    }
}

/// Value of a query parameter in a redirect URL. Custom schemes are accepted.
pub fn extract_query_param(url: &str, name: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Prepend `ws://` unless the URL already names a WebSocket scheme
pub fn normalize_obs_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else {
        format!("ws://{}", url)
    }
}

const REFUSED_HINT: &str = "Please check if OBS is running and the WebSocket server is enabled.";
const TIMED_OUT_HINT: &str = "Connection timed out. Please check your network connection.";
const INVALID_URL_HINT: &str = "Invalid OBS WebSocket URL. Please check your settings.";

fn transport_hint(kind: TransportKind) -> Option<&'static str> {
    match kind {
        TransportKind::Refused => Some(REFUSED_HINT),
        TransportKind::TimedOut => Some(TIMED_OUT_HINT),
        TransportKind::InvalidUrl => Some(INVALID_URL_HINT),
        TransportKind::Other => None,
    }
}

/// The proxy relays OBS-side failures as text in an error body
fn classify_proxy_body(body: &str) -> Option<TransportKind> {
    if body.contains("ECONNREFUSED") {
        Some(TransportKind::Refused)
    } else if body.contains("ETIMEDOUT") {
        Some(TransportKind::TimedOut)
    } else if body.contains("Invalid URL") {
        Some(TransportKind::InvalidUrl)
    } else {
        None
    }
}

/// User-facing message for a failed connect
pub fn describe_connect_failure(err: &BackendError) -> String {
    let detail = match err {
        BackendError::Transport { kind, message } => transport_hint(*kind)
            .map(str::to_string)
            .unwrap_or_else(|| message.clone()),
        BackendError::Unauthorized { .. } => "Authentication failed".to_string(),
        BackendError::Status { body, .. } => classify_proxy_body(body)
            .and_then(transport_hint)
            .map(str::to_string)
            .unwrap_or_else(|| body.clone()),
        other => other.to_string(),
    };
    format!("{}{}", CONNECT_FAILURE_PREFIX, detail)
}
