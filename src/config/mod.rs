pub mod persistence;
pub mod settings;

pub use persistence::{
    load_config, DebouncedWriter, JsonFileStore, MemoryStore, SettingsError, SettingsStore,
};
pub use settings::{ClientConfig, ConnectionSettings};
