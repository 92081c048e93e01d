use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const STORAGE_KEY_URL: &str = "obs_websocket_url";
pub const STORAGE_KEY_PASSWORD: &str = "obs_websocket_password";
pub const STORAGE_KEY_AUTO_CONNECT: &str = "obs_websocket_auto_connect";
pub const STORAGE_KEY_PASSWORD_PROMPTED: &str = "obs_websocket_password_prompted";

/// Static client configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend proxy HTTP API
    pub proxy_base_url: String,
    /// Push channel URL. Derived from `proxy_base_url` when unset.
    pub push_url: Option<String>,
    pub proxy_token: Option<String>,
    pub default_obs_url: String,
    pub default_obs_password: String,
    pub spotify_client_id: String,
    pub spotify_redirect_uri: String,
    pub settings_path: PathBuf,
    pub request_timeout_ms: u64,
    pub scene_poll_interval_ms: u64,
    pub playback_poll_interval_ms: u64,
    pub end_grace_ms: u64,
    pub reconnect_delay_ms: u64,
    pub startup_connect_delay_ms: u64,
    pub post_connect_settle_ms: u64,
    pub settings_debounce_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_base_url: "http://localhost:3001".to_string(),
            push_url: None,
            proxy_token: None,
            default_obs_url: "ws://127.0.0.1:4456".to_string(),
            default_obs_password: String::new(),
            spotify_client_id: String::new(),
            spotify_redirect_uri: "obshelper://oauthredirect".to_string(),
            settings_path: PathBuf::from("obs-helper-settings.json"),
            request_timeout_ms: 10_000,
            scene_poll_interval_ms: 1000,
            playback_poll_interval_ms: 2000,
            end_grace_ms: 1500,
            reconnect_delay_ms: 3000,
            startup_connect_delay_ms: 1000,
            post_connect_settle_ms: 500,
            settings_debounce_ms: 500,
        }
    }
}

impl ClientConfig {
    pub fn proxy_base(&self) -> &str {
        self.proxy_base_url.trim_end_matches('/')
    }

    /// `http://` becomes `ws://`, `https://` becomes `wss://`
    pub fn push_url(&self) -> String {
        if let Some(url) = self.push_url.as_ref().filter(|u| !u.is_empty()) {
            return url.clone();
        }
        let base = self.proxy_base();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn scene_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scene_poll_interval_ms)
    }

    pub fn playback_poll_interval(&self) -> Duration {
        Duration::from_millis(self.playback_poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn startup_connect_delay(&self) -> Duration {
        Duration::from_millis(self.startup_connect_delay_ms)
    }

    pub fn post_connect_settle(&self) -> Duration {
        Duration::from_millis(self.post_connect_settle_ms)
    }

    pub fn settings_debounce(&self) -> Duration {
        Duration::from_millis(self.settings_debounce_ms)
    }
}

/// User-editable connection settings persisted in the key-value store
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub obs_url: String,
    pub obs_password: String,
    pub auto_connect: bool,
    pub password_prompted: bool,
    /// When false the password is kept in memory only
    pub remember_password: bool,
}

impl ConnectionSettings {
    pub fn defaults(config: &ClientConfig) -> Self {
        Self {
            obs_url: config.default_obs_url.clone(),
            obs_password: config.default_obs_password.clone(),
            auto_connect: true,
            password_prompted: false,
            remember_password: true,
        }
    }

    /// Overlay stored values on top of the defaults. Returns the settings and
    /// whether a non-empty password was found in the store.
    pub fn from_stored(config: &ClientConfig, stored: &HashMap<String, String>) -> (Self, bool) {
        let mut settings = Self::defaults(config);
        if let Some(url) = stored.get(STORAGE_KEY_URL).filter(|v| !v.is_empty()) {
            settings.obs_url = url.clone();
        }
        let saved_password = stored
            .get(STORAGE_KEY_PASSWORD)
            .filter(|v| !v.is_empty())
            .cloned();
        let has_saved_password = saved_password.is_some();
        if let Some(password) = saved_password {
            settings.obs_password = password;
        }
        if let Some(auto_connect) = stored.get(STORAGE_KEY_AUTO_CONNECT) {
            settings.auto_connect = auto_connect == "true";
        }
        settings.password_prompted = stored
            .get(STORAGE_KEY_PASSWORD_PROMPTED)
            .map(|v| v == "true")
            .unwrap_or(false);
        (settings, has_saved_password)
    }

    /// Entries written by the debounced settings save
    pub fn to_entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            (STORAGE_KEY_URL.to_string(), self.obs_url.clone()),
            (
                STORAGE_KEY_AUTO_CONNECT.to_string(),
                self.auto_connect.to_string(),
            ),
            (
                STORAGE_KEY_PASSWORD_PROMPTED.to_string(),
                self.password_prompted.to_string(),
            ),
        ];
        // Forgetting overwrites any previously saved password
        let password = if self.remember_password {
            self.obs_password.clone()
        } else {
            String::new()
        };
        entries.push((STORAGE_KEY_PASSWORD.to_string(), password));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_url_derived_from_base() {
        let mut config = ClientConfig::default();
        assert_eq!(config.push_url(), "ws://localhost:3001");
        config.proxy_base_url = "https://proxy.example:8443/".to_string();
        assert_eq!(config.push_url(), "wss://proxy.example:8443");
        config.push_url = Some("ws://other/ws".to_string());
        assert_eq!(config.push_url(), "ws://other/ws");
    }

    #[test]
    fn test_from_stored_overlays_defaults() {
        let config = ClientConfig::default();
        let mut stored = HashMap::new();
        stored.insert(STORAGE_KEY_URL.to_string(), "ws://10.0.0.2:4455".to_string());
        stored.insert(STORAGE_KEY_AUTO_CONNECT.to_string(), "false".to_string());
        let (settings, has_password) = ConnectionSettings::from_stored(&config, &stored);
        assert_eq!(settings.obs_url, "ws://10.0.0.2:4455");
        assert!(!settings.auto_connect);
        assert!(!settings.password_prompted);
        assert!(!has_password);
    }

    #[test]
    fn test_entries_blank_password_when_not_remembered() {
        let mut settings = ConnectionSettings::defaults(&ClientConfig::default());
        settings.obs_password = "secret".to_string();
        assert!(settings
            .to_entries()
            .iter()
            .any(|(k, v)| k == STORAGE_KEY_PASSWORD && v == "secret"));
        settings.remember_password = false;
        assert!(settings
            .to_entries()
            .iter()
            .any(|(k, v)| k == STORAGE_KEY_PASSWORD && v.is_empty()));
    }
}
