//! # Fleet Channel - Live Update Channel
//!
//! Persistent WebSocket connection to the push-update source. Inbound
//! telemetry events are forwarded to the registry store; a single bad
//! event never kills the connection.
//!
//! The channel is a scoped resource: it is opened when the tracking view
//! becomes active with a valid session and MUST be released on every
//! exit path. [`ChannelGuard`] encodes that — dropping the guard tears
//! the connection down, so navigation away, logout and error paths all
//! release it without separate bookkeeping.

pub mod error;

pub use error::{ChannelError, ChannelResult};

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use fleet_registry::RegistryStore;

/// Channel connection configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL of the push-update source
    pub url: String,
    /// Bounded number of connection attempts before giving up
    pub max_attempts: u32,
    /// Per-attempt connection timeout
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_attempts: 3,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Live update channel. Owns the reader task; the store is the only
/// thing it writes to.
pub struct LiveChannel {
    config: ChannelConfig,
    store: Arc<RegistryStore>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LiveChannel {
    pub fn new(config: ChannelConfig, store: Arc<RegistryStore>) -> Self {
        Self {
            config,
            store,
            reader: Mutex::new(None),
        }
    }

    /// Whether a healthy connection is currently open
    pub fn is_connected(&self) -> bool {
        self.reader
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Establish the connection. Idempotent: a second call while a
    /// healthy connection exists is a no-op, and two calls racing each
    /// other leave exactly one reader task alive. Attempts are bounded
    /// with a per-attempt timeout; when they exhaust the caller gets the
    /// failure instead of an unbounded reconnection storm. A timed-out
    /// in-flight attempt is dropped (and with it its socket) before the
    /// next one starts.
    pub async fn connect(&self) -> ChannelResult<()> {
        if self.is_connected() {
            debug!("Channel already connected; connect() is a no-op");
            return Ok(());
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            debug!(attempt, url = %self.config.url, "Channel connection attempt");

            match timeout(self.config.connect_timeout, connect_async(&self.config.url)).await {
                Ok(Ok((ws_stream, _response))) => {
                    let store = self.store.clone();
                    let handle = tokio::spawn(read_loop(ws_stream, store));

                    // The slot is re-checked under the lock: a concurrent
                    // connect() may have stored its reader after our
                    // initial is_connected() check. First one in wins;
                    // the duplicate reader (and its socket) is torn down.
                    let mut reader = self.reader.lock();
                    if reader.as_ref().is_some_and(|existing| !existing.is_finished()) {
                        debug!("Concurrent connect already holds the channel; dropping duplicate");
                        handle.abort();
                    } else {
                        info!(url = %self.config.url, "Live update channel connected");
                        *reader = Some(handle);
                    }
                    return Ok(());
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "Channel connection attempt failed");
                    last_error = err.to_string();
                }
                Err(_elapsed) => {
                    warn!(attempt, "Channel connection attempt timed out");
                    last_error = "connection attempt timed out".to_string();
                }
            }
        }

        Err(ChannelError::ConnectFailed {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    /// Tear down the connection and its reader task. Safe to call with
    /// no connection open.
    pub fn disconnect(&self) {
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
            info!("Live update channel disconnected");
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read inbound events and forward them to the store. Parse and apply
/// errors are logged and swallowed; only transport-level failures end
/// the loop.
async fn read_loop(
    mut ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    store: Arc<RegistryStore>,
) {
    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                forward_event(&store, text.as_str());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!("Push source sent close frame");
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!("Unexpected binary message from push source");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Channel transport error, stopping reader");
                break;
            }
        }
    }
    debug!("Channel reader finished");
}

fn forward_event(store: &RegistryStore, text: &str) {
    let event: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Dropping unparseable push event");
            return;
        }
    };

    if let Err(err) = store.apply_event(&event) {
        warn!(error = %err, "Dropping unusable push event");
    }
}

/// RAII scope for the channel lifecycle: acquire on entering the
/// tracking context, guaranteed release when the scope ends.
pub struct ChannelGuard {
    channel: Arc<LiveChannel>,
}

impl ChannelGuard {
    /// Connect and wrap the channel. On failure nothing is held open.
    pub async fn open(channel: Arc<LiveChannel>) -> ChannelResult<Self> {
        channel.connect().await?;
        Ok(Self { channel })
    }

    pub fn channel(&self) -> &LiveChannel {
        &self.channel
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.channel.disconnect();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleet_core::{StatusCategory, VehicleId, VehicleSnapshot};
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    fn seeded_store() -> Arc<RegistryStore> {
        let store = Arc::new(RegistryStore::new());
        store.load_registry(vec![VehicleSnapshot::new(
            "V-01",
            "Bus 1",
            "KA-01",
            "860000000000001",
        )]);
        store
    }

    /// One-shot push source: accepts a single connection and sends the
    /// given frames.
    async fn spawn_push_source(frames: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            // Keep the connection open so the reader stays alive
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_noop() {
        let channel = LiveChannel::new(ChannelConfig::new("ws://127.0.0.1:1"), seeded_store());
        channel.disconnect();
        channel.disconnect();
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_bounded_attempts() {
        let mut config = ChannelConfig::new("ws://127.0.0.1:1");
        config.max_attempts = 2;
        config.connect_timeout = Duration::from_millis(500);

        let channel = LiveChannel::new(config, seeded_store());
        let err = channel.connect().await.unwrap_err();

        assert!(matches!(err, ChannelError::ConnectFailed { attempts: 2, .. }));
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_events_forwarded_and_bad_events_survive() {
        let store = seeded_store();
        let good_event = serde_json::json!({
            "imei": "860000000000001",
            "lat": 12.9,
            "lng": 77.6,
            "timestamp": Utc::now().to_rfc3339(),
            "ignition": 1,
            "movement": 1,
        })
        .to_string();

        let url = spawn_push_source(vec![
            "this is not json".to_string(),
            "[1,2,3]".to_string(),
            good_event,
        ])
        .await;

        let channel = LiveChannel::new(ChannelConfig::new(url), store.clone());
        channel.connect().await.unwrap();

        // Give the reader a moment to drain the frames
        tokio::time::sleep(Duration::from_millis(200)).await;

        let vehicle = store.get(&VehicleId::new("V-01")).unwrap();
        assert_eq!(vehicle.classify(Utc::now()).status, StatusCategory::Running);
        assert!(channel.is_connected());

        channel.disconnect();
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let url = spawn_push_source(Vec::new()).await;
        let channel = LiveChannel::new(ChannelConfig::new(url), seeded_store());

        channel.connect().await.unwrap();
        assert!(channel.is_connected());

        // Second call must not replace the live connection
        channel.connect().await.unwrap();
        assert!(channel.is_connected());

        channel.disconnect();
    }

    /// Push source that accepts any number of connections and sends one
    /// delayed frame on each.
    async fn spawn_delayed_push_source(frame: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let frame = frame.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    let _ = ws.send(Message::Text(frame.into())).await;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                });
            }
        });

        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_racing_connects_leave_single_reader() {
        let store = seeded_store();
        let event = serde_json::json!({
            "imei": "860000000000001",
            "timestamp": Utc::now().to_rfc3339(),
            "ignition": 1,
            "movement": 1,
        })
        .to_string();
        let url = spawn_delayed_push_source(event).await;

        let channel = LiveChannel::new(ChannelConfig::new(url), store.clone());

        // Both calls pass the initial connected check before either
        // finishes its handshake; exactly one reader may survive.
        let (first, second) = tokio::join!(channel.connect(), channel.connect());
        first.unwrap();
        second.unwrap();
        assert!(channel.is_connected());

        channel.disconnect();
        assert!(!channel.is_connected());

        // A reader leaked by the losing connect would still be alive to
        // forward the delayed frame after disconnect.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let vehicle = store.get(&VehicleId::new("V-01")).unwrap();
        assert_eq!(vehicle.classify(Utc::now()).status, StatusCategory::New);
    }

    #[tokio::test]
    async fn test_guard_disconnects_on_drop() {
        let url = spawn_push_source(Vec::new()).await;
        let channel = Arc::new(LiveChannel::new(ChannelConfig::new(url), seeded_store()));

        {
            let _guard = ChannelGuard::open(channel.clone()).await.unwrap();
            assert!(channel.is_connected());
        }

        assert!(!channel.is_connected());
    }
}
