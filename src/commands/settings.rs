// User-editable connection settings

use crate::app_state::AppState;
use crate::config::ConnectionSettings;
use std::sync::Arc;

/// Apply an edit in memory and schedule the debounced save
pub fn update_settings<F>(state: &Arc<AppState>, edit: F)
where
    F: FnOnce(&mut ConnectionSettings),
{
    let entries = {
        let mut settings = state.settings.lock();
        edit(&mut settings);
        settings.to_entries()
    };
    state.settings_writer.schedule(entries);
}

pub fn set_obs_url(state: &Arc<AppState>, url: &str) {
    let url = url.trim().to_string();
    update_settings(state, |settings| settings.obs_url = url);
}

pub fn set_obs_password(state: &Arc<AppState>, password: &str) {
    let password = password.to_string();
    update_settings(state, |settings| settings.obs_password = password);
}

pub fn set_auto_connect(state: &Arc<AppState>, enabled: bool) {
    tracing::info!("Auto-connect {}", if enabled { "enabled" } else { "disabled" });
    update_settings(state, |settings| settings.auto_connect = enabled);
}

pub fn set_remember_password(state: &Arc<AppState>, remember: bool) {
    update_settings(state, |settings| settings.remember_password = remember);
}

pub async fn load_settings(state: &Arc<AppState>) -> bool {
    let stored = match state.settings_writer.store().load().await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!("Failed to load settings: {}", e);
            Default::default()
        }
    };
    let (settings, has_saved_password) = ConnectionSettings::from_stored(&state.config, &stored);
    *state.settings.lock() = settings;
    has_saved_password
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::harness;
    use crate::config::settings::STORAGE_KEY_URL;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_writes_once() {
        let h = harness();
        set_obs_url(&h.state, "ws://10.0.0.1:4455");
        tokio::time::sleep(Duration::from_millis(100)).await;
        set_obs_url(&h.state, "ws://10.0.0.2:4455");
        tokio::time::sleep(Duration::from_millis(100)).await;
        set_obs_url(&h.state, "ws://10.0.0.3:4455");

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.store.get(STORAGE_KEY_URL).as_deref(), Some("ws://10.0.0.3:4455"));
    }

    #[tokio::test]
    async fn test_load_settings_reports_saved_password() {
        let h = harness();
        assert!(!load_settings(&h.state).await);
        assert_eq!(h.state.settings().obs_url, "ws://127.0.0.1:4456");
    }
}
