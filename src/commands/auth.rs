// Spotify and Twitch re-authentication

use crate::app_state::AppState;
use crate::client::{AuthHealth, AuthService};
use crate::commands::queue::fetch_song_queue;
use crate::utils::{build_spotify_authorize_url, extract_query_param, pkce_challenge, pkce_verifier};
use std::sync::Arc;

/// In-flight Spotify authorization-code flow. The verifier must be kept
/// until the redirect comes back.
#[derive(Debug, Clone)]
pub struct SpotifyAuthRequest {
    pub authorize_url: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

pub fn begin_spotify_reauth(state: &Arc<AppState>) -> SpotifyAuthRequest {
    let code_verifier = pkce_verifier();
    let challenge = pkce_challenge(&code_verifier);
    let redirect_uri = state.config.spotify_redirect_uri.clone();
    let authorize_url =
        build_spotify_authorize_url(&state.config.spotify_client_id, &redirect_uri, &challenge);
    tracing::info!("Starting Spotify re-authentication");
    SpotifyAuthRequest {
        authorize_url,
        code_verifier,
        redirect_uri,
    }
}

/// Exchange the code carried by `callback_url` through the backend
pub async fn complete_spotify_reauth(
    state: &Arc<AppState>,
    request: &SpotifyAuthRequest,
    callback_url: &str,
) -> Result<(), String> {
    let code = extract_query_param(callback_url, "code")
        .ok_or_else(|| "Authorization code missing from redirect".to_string())?;
    state
        .backend
        .spotify_exchange(&code, &request.code_verifier, &request.redirect_uri)
        .await
        .map_err(|e| {
            tracing::error!("Spotify code exchange failed: {}", e);
            e.to_string()
        })?;
    tracing::info!("Spotify re-authentication complete");
    state.set_auth_health(AuthHealth::None);
    fetch_song_queue(state).await;
    Ok(())
}

/// Browser URL that starts the backend-driven Twitch login
pub fn twitch_auth_url(state: &Arc<AppState>) -> String {
    format!("{}/api/twitch/auth", state.config.proxy_base())
}

pub fn complete_twitch_reauth(state: &Arc<AppState>) {
    tracing::info!("Twitch re-authentication complete");
    state.set_auth_health(AuthHealth::None);
}

/// Drop stored tokens for `service`. The auth flag is cleared either way.
pub async fn clear_auth_data(state: &Arc<AppState>, service: AuthService) {
    let result = match service {
        AuthService::Spotify => state.backend.spotify_clear_tokens().await,
        AuthService::Twitch => state.backend.twitch_logout().await,
    };
    if let Err(e) = result {
        tracing::warn!("Failed to clear {} auth data: {}", service.display_name(), e);
    }
    state.set_auth_health(AuthHealth::None);
}
