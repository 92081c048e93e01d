use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::settings::ClientConfig;

const DEFAULT_CONFIG_NAME: &str = "obs-helper";
const ENV_PREFIX: &str = "OBS_HELPER";

/// Load [`ClientConfig`] from an optional file layered under `OBS_HELPER_*`
/// environment variables. Without an explicit path, `obs-helper.{toml,json,..}`
/// in the working directory is used when present.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let builder = config::Config::builder();
    let builder = match path {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
    };
    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to read configuration")?;
    settings
        .try_deserialize::<ClientConfig>()
        .context("Invalid configuration")
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent key-value store for user settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<HashMap<String, String>, SettingsError>;
    /// Persist all entries as a single write
    async fn save(&self, entries: Vec<(String, String)>) -> Result<(), SettingsError>;
}

/// JSON object on disk, replaced atomically on every save
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<HashMap<String, String>, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: Vec<(String, String)>) -> Result<(), SettingsError> {
        let mut values = self.load().await?;
        values.extend(entries);
        let json = serde_json::to_string_pretty(&values)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// In-memory store. Counts writes so callers can observe debouncing.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            values: Mutex::new(values),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<HashMap<String, String>, SettingsError> {
        Ok(self.values.lock().clone())
    }

    async fn save(&self, entries: Vec<(String, String)>) -> Result<(), SettingsError> {
        self.values.lock().extend(entries);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Newest unsaved entries, tagged with the edit that produced them
#[derive(Default)]
struct PendingEdit {
    seq: u64,
    entries: Option<Vec<(String, String)>>,
}

struct WriterInner {
    store: Arc<dyn SettingsStore>,
    delay: Duration,
    pending: Mutex<PendingEdit>,
    write_lock: tokio::sync::Mutex<()>,
}

impl WriterInner {
    /// Entries are taken only after the write lock is held, so the newest
    /// edit is the one that reaches the store last.
    async fn flush(&self) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        let Some(entries) = self.pending.lock().entries.take() else {
            return Ok(());
        };
        self.store.save(entries).await
    }
}

/// Coalesces bursts of edits into one store write after a quiet period.
///
/// Every edit starts its own quiet period; when it ends, the write happens
/// only if no newer edit arrived meanwhile. Tasks are never aborted, so a
/// write that has started always completes and a newer edit queues behind it.
#[derive(Clone)]
pub struct DebouncedWriter {
    inner: Arc<WriterInner>,
}

impl DebouncedWriter {
    pub fn new(store: Arc<dyn SettingsStore>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                store,
                delay,
                pending: Mutex::new(PendingEdit::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> Arc<dyn SettingsStore> {
        self.inner.store.clone()
    }

    pub fn schedule(&self, entries: Vec<(String, String)>) {
        let seq = {
            let mut pending = self.inner.pending.lock();
            pending.seq += 1;
            pending.entries = Some(entries);
            pending.seq
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            if inner.pending.lock().seq != seq {
                return;
            }
            if let Err(e) = inner.flush().await {
                tracing::error!("Failed to save settings: {}", e);
            }
        });
    }

    pub fn has_pending(&self) -> bool {
        self.inner.pending.lock().entries.is_some()
    }

    /// Skip the quiet period and write any pending entries now
    pub async fn flush_now(&self) -> Result<(), SettingsError> {
        self.inner.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(key: &str, value: &str) -> Vec<(String, String)> {
        vec![(key.to_string(), value.to_string())]
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_to_last_edit() {
        let store = Arc::new(MemoryStore::new());
        let writer = DebouncedWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule(entry("url", "a"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.schedule(entry("url", "b"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.schedule(entry("url", "c"));
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get("url").as_deref(), Some("c"));
        assert!(!writer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_write_twice() {
        let store = Arc::new(MemoryStore::new());
        let writer = DebouncedWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule(entry("url", "a"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        writer.schedule(entry("url", "b"));
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get("url").as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_writes_pending() {
        let store = Arc::new(MemoryStore::new());
        let writer = DebouncedWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule(entry("url", "a"));
        writer.flush_now().await.unwrap();
        assert_eq!(store.write_count(), 1);

        // Nothing left to write
        writer.flush_now().await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    /// Store whose writes take a while, to overlap edits with a running save
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryStore,
        started: AtomicUsize,
    }

    #[async_trait]
    impl SettingsStore for SlowStore {
        async fn load(&self) -> Result<HashMap<String, String>, SettingsError> {
            self.inner.load().await
        }

        async fn save(&self, entries: Vec<(String, String)>) -> Result<(), SettingsError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.inner.save(entries).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_write_is_not_lost() {
        let store = Arc::new(SlowStore::default());
        let writer = DebouncedWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule(entry("url", "a"));
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(store.started.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.write_count(), 0);

        // Lands while "a" is being written
        writer.schedule(entry("url", "b"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.schedule(entry("url", "c"));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(store.inner.write_count(), 2);
        assert_eq!(store.inner.get("url").as_deref(), Some("c"));
        assert!(!writer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_then_quiet_period_writes_once() {
        let store = Arc::new(MemoryStore::new());
        let writer = DebouncedWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule(entry("url", "a"));
        writer.flush_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get("url").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_json_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("settings.json"));

        assert!(store.load().await.unwrap().is_empty());
        store.save(entry("a", "1")).await.unwrap();
        store.save(entry("b", "2")).await.unwrap();

        let values = store.load().await.unwrap();
        assert_eq!(values.get("a").map(String::as_str), Some("1"));
        assert_eq!(values.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "proxy_base_url = \"http://10.0.0.5:3001\"\nreconnect_delay_ms = 5000\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.proxy_base_url, "http://10.0.0.5:3001");
        assert_eq!(config.reconnect_delay_ms, 5000);
        assert_eq!(config.scene_poll_interval_ms, 1000);
    }
}
