use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::messages::OutboundMessage;

/// Open live channel to the backend.
///
/// Text frames arrive on `inbound`; dropping the channel (or calling
/// [`PushChannel::close`]) stops the I/O task.
pub struct PushChannel {
    outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
    io_task: Option<JoinHandle<()>>,
}

impl PushChannel {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
        io_task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            io_task,
        }
    }

    pub fn sender(&self) -> PushSender {
        PushSender {
            tx: self.outbound.clone(),
        }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cloneable handle for writing to a [`PushChannel`]
#[derive(Clone)]
pub struct PushSender {
    tx: mpsc::UnboundedSender<String>,
}

impl PushSender {
    pub fn send(&self, message: &OutboundMessage) -> Result<()> {
        let json = serde_json::to_string(message).context("Failed to serialize message")?;
        self.tx
            .send(json)
            .map_err(|_| anyhow::anyhow!("Push channel closed"))
    }
}

/// Opens the live channel. Abstracted so the controller can run against an
/// in-process transport.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self) -> Result<PushChannel>;
}

/// WebSocket transport over tokio-tungstenite
pub struct WsPushTransport {
    url: String,
}

impl WsPushTransport {
    pub fn new(url: impl Into<String>, token: Option<&str>) -> Self {
        let url = url.into();
        let url = match token.filter(|t| !t.is_empty()) {
            Some(token) => format!("{}?token={}", url, urlencoding::encode(token)),
            None => url,
        };
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn open(&self) -> Result<PushChannel> {
        info!("Opening push channel");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .context("Failed to open push channel")?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let io_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        let Some(text) = outgoing else { break };
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            error!("Failed to write to push channel: {}", e);
                            break;
                        }
                    }
                    incoming = source.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if inbound_tx.send(text).is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                debug!("Push channel closed by peer: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Push channel read error: {}", e);
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            let _ = sink.close().await;
            debug!("Push channel I/O task terminated");
        });

        Ok(PushChannel::new(outbound_tx, inbound_rx, Some(io_task)))
    }
}
