use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use obs_helper::app_state::{AppState, ControllerEvent};
use obs_helper::commands;
use obs_helper::config::{load_config, JsonFileStore};
use obs_helper::network::{HttpProxyBackend, WsPushTransport};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obs_helper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    tracing::info!("Using backend proxy at {}", config.proxy_base());

    let backend = HttpProxyBackend::new(config.proxy_base(), config.request_timeout())
        .context("Failed to build HTTP client")?;
    let transport = WsPushTransport::new(config.push_url(), config.proxy_token.as_deref());
    let store = JsonFileStore::new(config.settings_path.clone());

    let state = AppState::new(config, Arc::new(backend), Arc::new(transport), Arc::new(store));
    spawn_event_logger(&state);
    spawn_notification_logger(&state);

    commands::start(&state).await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    commands::shutdown(&state).await;
    Ok(())
}

fn spawn_event_logger(state: &Arc<AppState>) {
    let mut events = state.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::ConnectionChanged { state, error }) => match error {
                    Some(error) => tracing::info!("Connection: {:?} ({})", state, error),
                    None => tracing::info!("Connection: {:?}", state),
                },
                Ok(ControllerEvent::CurrentSceneChanged(scene)) => {
                    tracing::info!("Current scene: {}", scene)
                }
                Ok(ControllerEvent::QueueErrorChanged(Some(error))) => {
                    tracing::warn!("Queue: {}", error)
                }
                Ok(ControllerEvent::AuthHealthChanged(health)) => {
                    tracing::info!("Auth health: {:?}", health)
                }
                Ok(event) => tracing::debug!("{:?}", event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event logger lagged by {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_notification_logger(state: &Arc<AppState>) {
    let mut notifications = state.subscribe_notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    tracing::info!("Overlay: {:?} from {}", notification.kind, notification.name)
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}
