// OBS scene and microphone commands

use crate::app_state::{AppState, ControllerEvent};
use std::sync::Arc;

pub async fn fetch_scenes(state: &Arc<AppState>) {
    if !state.is_actually_connected() {
        tracing::debug!("Not actually connected, skipping scene fetch");
        return;
    }
    match state.backend.scenes().await {
        Ok(scenes) => {
            tracing::info!("Fetched {} scenes", scenes.len());
            state.client_state.set_scenes(scenes);
            state.emit_event(ControllerEvent::ScenesUpdated(
                state.client_state.get_scenes(),
            ));
        }
        Err(e) => tracing::error!("Failed to fetch scenes: {}", e),
    }
}

pub async fn fetch_current_scene(state: &Arc<AppState>) {
    if !state.is_actually_connected() {
        tracing::debug!("Not actually connected, skipping current scene fetch");
        return;
    }
    match state.backend.current_scene().await {
        Ok(scene) => set_current_scene(state, scene),
        Err(e) => tracing::error!("Failed to fetch current scene: {}", e),
    }
}

/// Last write wins between the push channel and the poll
pub(crate) fn set_current_scene(state: &Arc<AppState>, scene: String) {
    if state.client_state.get_current_scene() == scene {
        return;
    }
    tracing::debug!("Current scene is now {}", scene);
    state.client_state.set_current_scene(scene.clone());
    state.emit_event(ControllerEvent::CurrentSceneChanged(scene));
}

pub async fn fetch_mic_status(state: &Arc<AppState>) {
    if !state.is_actually_connected() {
        tracing::debug!("Not actually connected, skipping mic status fetch");
        return;
    }
    state.client_state.set_mic_loading(true);
    state.client_state.set_mic_error(None);
    state.emit_mic();

    match state.backend.mic_status().await {
        Ok(status) => state.client_state.set_mic_status(status),
        Err(e) => {
            tracing::error!("Failed to fetch mic status: {}", e);
            state.client_state.set_mic_error(Some(e.to_string()));
        }
    }
    state.client_state.set_mic_loading(false);
    state.emit_mic();
}

pub async fn toggle_mic(state: &Arc<AppState>) -> Result<(), String> {
    if !state.is_actually_connected() {
        tracing::debug!("Not actually connected, skipping mic toggle");
        return Ok(());
    }
    state.client_state.set_mic_loading(true);
    state.client_state.set_mic_error(None);
    state.emit_mic();

    let result = match state.backend.toggle_mic().await {
        Ok(status) => {
            tracing::info!("Mic muted: {:?}", status.input_muted);
            state.client_state.set_mic_status(status);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to toggle mic: {}", e);
            state.client_state.set_mic_error(Some(e.to_string()));
            Err(e.to_string())
        }
    };
    state.client_state.set_mic_loading(false);
    state.emit_mic();
    result
}

pub async fn switch_scene(state: &Arc<AppState>, scene_name: &str) -> Result<(), String> {
    if !state.is_connected() {
        tracing::debug!("Not connected, skipping scene switch");
        return Ok(());
    }
    tracing::info!("Switching to scene {}", scene_name);
    state
        .backend
        .change_scene(scene_name)
        .await
        .map_err(|e| {
            tracing::error!("Failed to switch scene: {}", e);
            e.to_string()
        })?;
    fetch_current_scene(state).await;
    Ok(())
}
