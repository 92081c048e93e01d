pub mod app_state;
pub mod client;
pub mod commands;
pub mod config;
pub mod network;
pub mod utils;

pub use app_state::{AppState, ControllerEvent, NotificationKind, OverlayNotification};
