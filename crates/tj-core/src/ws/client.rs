//! Single WebSocket connection with auto-reconnect.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the feed's WebSocket endpoint (TLS).
//! 2. Optionally sends a subscription message.
//! 3. Reads text messages and forwards them to a callback.
//! 4. Replies to protocol-level pings with pongs.
//! 5. Automatically reconnects on disconnection with exponential backoff.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Callback invoked for each received text message.
pub type OnMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://stream.binance.com:9443/ws/btcusdt@trade`).
    pub url: String,
    /// Message to send immediately after connecting, if the feed requires
    /// an explicit subscription request.
    pub subscribe_msg: Option<String>,
    /// Human-readable label used in log lines (e.g. the symbol).
    pub label: String,
}

/// A single WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    /// Connection configuration.
    pub config: WsConnConfig,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: WsConnConfig) -> Self {
        Self { config, shutdown_tx: None, task: None }
    }

    /// Start the connection task. Text frames are forwarded to `on_text`.
    pub fn start(&mut self, on_text: OnMessageCallback) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, on_text, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Stop the connection and wait for the task to finish. After this
    /// returns, the callback is guaranteed not to fire again.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Main connection loop — connects, subscribes, reads, reconnects.
async fn connection_loop(
    config: WsConnConfig,
    on_text: OnMessageCallback,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Duration::from_millis(500);
    let max_backoff = Duration::from_secs(30);
    let label = config.label.clone();

    loop {
        // Check shutdown before connecting
        if *shutdown_rx.borrow() {
            info!("[ws-{label}] shutdown requested");
            return;
        }

        info!("[ws-{label}] connecting to {}", config.url);

        let ws_stream = match tokio_tungstenite::connect_async(config.url.as_str()).await {
            Ok((s, _response)) => {
                backoff = Duration::from_millis(500); // reset backoff on success
                info!("[ws-{label}] connected");
                s
            }
            Err(e) => {
                error!("[ws-{label}] connection failed: {e}, retrying in {backoff:?}");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {},
                    _ = shutdown_rx.changed() => return,
                }
                backoff = (backoff * 2).min(max_backoff);
                continue;
            }
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Send subscription message if the feed needs one
        if let Some(ref sub_msg) = config.subscribe_msg {
            debug!("[ws-{label}] subscribing: {sub_msg}");
            if let Err(e) = ws_write.send(Message::Text(sub_msg.clone().into())).await {
                error!("[ws-{label}] subscribe send failed: {e}");
                continue;
            }
        }

        // Main read loop
        loop {
            tokio::select! {
                // Shutdown signal
                _ = shutdown_rx.changed() => {
                    info!("[ws-{label}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                // Incoming message
                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            on_text(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("[ws-{label}] received close frame");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("[ws-{label}] read error: {e}");
                            break;
                        }
                        None => {
                            warn!("[ws-{label}] stream ended");
                            break;
                        }
                        _ => {} // Binary, Pong, Frame — ignore
                    }
                }
            }
        }

        // Disconnected — will reconnect at the top of the outer loop
        warn!("[ws-{label}] disconnected, reconnecting in {backoff:?}");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {},
            _ = shutdown_rx.changed() => return,
        }
        backoff = (backoff * 2).min(max_backoff);
    }
}
