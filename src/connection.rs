//! Connection Manager for the duplex notification channel.
//!
//! Owns the single persistent WebSocket connection to the server. Handles:
//!
//! - Idempotent `connect` / `disconnect` (at most one live transport handle)
//! - Authentication via a connection-time `token` parameter
//! - Automatic reconnection with bounded exponential backoff; after the
//!   attempt cap is exceeded the connection rests disconnected silently
//! - Ordered, synchronous dispatch of inbound frames through the
//!   [`EventRouter`](crate::router::EventRouter)
//!
//! Connecting and disconnecting never return errors: every transport failure
//! is absorbed into the connected/disconnected signal and the optional
//! [`EventHandlers`](crate::event_handlers::EventHandlers) hooks.

use crate::{
    event_handlers::{ConnectionError, DisconnectReason, EventHandlers},
    models::ConnectionOptions,
    router::EventRouter,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Namespaced path of the duplex channel endpoint.
pub const NOTIFICATIONS_PATH: &str = "/ws/notifications";

/// WebSocket stream over a possibly TLS-wrapped TCP connection.
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Commands sent from the public API to the background connection task.
enum ConnCmd {
    /// Tear down the transport and exit the task.
    Shutdown,
}

/// Handle to a live (or reconnecting) background connection task.
struct ConnHandle {
    cmd_tx: mpsc::Sender<ConnCmd>,
    task: JoinHandle<()>,
}

/// Owns the process-wide duplex channel to the server.
///
/// Constructor-injected wherever it is needed; there is no ambient global
/// instance. All other components consume inbound traffic through the
/// injected [`EventRouter`], never the transport directly.
pub struct ConnectionManager {
    base_url: String,
    options: ConnectionOptions,
    router: Arc<EventRouter>,
    event_handlers: EventHandlers,
    /// Whether the transport currently reports "open".
    connected: Arc<AtomicBool>,
    /// Consecutive failed (re)connection attempts; resets on success.
    reconnect_attempts: Arc<AtomicU32>,
    /// Set by `disconnect()`, cleared on transport open.
    intentional_disconnect: Arc<AtomicBool>,
    inner: Mutex<Option<ConnHandle>>,
}

impl ConnectionManager {
    /// Create a manager for `base_url`. No transport is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(
        base_url: impl Into<String>,
        options: ConnectionOptions,
        router: Arc<EventRouter>,
        event_handlers: EventHandlers,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            options,
            router,
            event_handlers,
            connected: Arc::new(AtomicBool::new(false)),
            reconnect_attempts: Arc::new(AtomicU32::new(0)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(None),
        }
    }

    /// Establish the duplex channel, passing `credential` as an
    /// authentication parameter when present (absence is legal: the server
    /// may allow unauthenticated traffic).
    ///
    /// Idempotent: if a connection task is already live (connected or still
    /// retrying) this returns immediately without creating a second
    /// transport. A task that previously gave up (attempt cap reached) is
    /// replaced by a fresh one.
    pub async fn connect(&self, credential: Option<String>) {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.as_ref() {
            if !handle.task.is_finished() {
                log::debug!("[sync-link] connect: channel already live, ignoring");
                return;
            }
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let ws_url = resolve_ws_url(&self.base_url, credential.as_deref());
        let (cmd_tx, cmd_rx) = mpsc::channel::<ConnCmd>(8);
        let task = tokio::spawn(connection_task(
            cmd_rx,
            ws_url,
            self.options.clone(),
            self.router.clone(),
            self.event_handlers.clone(),
            self.connected.clone(),
            self.reconnect_attempts.clone(),
            self.intentional_disconnect.clone(),
        ));

        *inner = Some(ConnHandle { cmd_tx, task });
    }

    /// Tear down the transport and stop reconnecting.
    ///
    /// Safe to call when not connected (no-op). Returns only after the
    /// background task has closed the socket and exited, so a follow-up
    /// `connect()` can never overlap with a transport still tearing down.
    /// The in-flight server-side work is not cancelled; only this client's
    /// subscription to its updates ends.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        let Some(ConnHandle { cmd_tx, task }) = inner.take() else {
            return;
        };
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let _ = cmd_tx.send(ConnCmd::Shutdown).await;
        // The task never takes the handle lock, so waiting here cannot
        // deadlock; it holds the lock against a concurrent connect().
        let _ = task.await;
    }

    /// Whether the transport currently reports "open". Pure read.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Number of consecutive failed reconnection attempts so far.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }
}

/// Map the HTTP base URL onto the WebSocket endpoint, appending the
/// credential as a connection-time query parameter when present.
fn resolve_ws_url(base_url: &str, credential: Option<&str>) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    };

    let mut url = format!("{}{}", ws_base, NOTIFICATIONS_PATH);
    if let Some(token) = credential {
        url.push_str("?token=");
        url.extend(url::form_urlencoded::byte_serialize(token.as_bytes()));
    }
    url
}

/// Establish the WebSocket transport.
async fn establish_ws(ws_url: &str) -> Result<WsStream, String> {
    log::debug!("[sync-link] Establishing duplex channel");
    match tokio_tungstenite::connect_async(ws_url).await {
        Ok((stream, _response)) => Ok(stream),
        Err(e) => Err(format!("Connection failed: {}", e)),
    }
}

/// The background task managing the duplex channel.
///
/// Lifecycle:
/// 1. Establish the WebSocket connection
/// 2. Enter the event loop: read frames, dispatch through the router,
///    process shutdown commands
/// 3. On unexpected loss: reconnect with bounded exponential backoff
/// 4. After the attempt cap: exit silently (rest state, no hard failure)
#[allow(clippy::too_many_arguments)]
async fn connection_task(
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
    ws_url: String,
    options: ConnectionOptions,
    router: Arc<EventRouter>,
    event_handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    reconnect_attempts: Arc<AtomicU32>,
    intentional_disconnect: Arc<AtomicBool>,
) {
    let mut ws_stream: Option<WsStream> = None;

    loop {
        if let Some(ref mut ws) = ws_stream {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Shutdown) | None => {
                        let _ = ws.close(None).await;
                        let was_connected = connected.swap(false, Ordering::SeqCst);
                        if was_connected || intentional_disconnect.load(Ordering::SeqCst) {
                            event_handlers
                                .emit_disconnect(DisconnectReason::new("Client disconnected"));
                        }
                        return;
                    },
                },

                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Synchronous dispatch keeps channel ordering: all
                        // handlers for this frame run before the next read.
                        router.dispatch_text(text.as_str());
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    },
                    Some(Ok(Message::Binary(_)))
                    | Some(Ok(Message::Pong(_)))
                    | Some(Ok(Message::Frame(_))) => {},
                    Some(Ok(Message::Close(frame))) => {
                        let reason = match frame {
                            Some(f) => DisconnectReason::with_code(
                                f.reason.to_string(),
                                u16::from(f.code),
                            ),
                            None => DisconnectReason::new("Server closed connection"),
                        };
                        event_handlers.emit_disconnect(reason);
                        connected.store(false, Ordering::SeqCst);
                        ws_stream = None;
                    },
                    Some(Err(e)) => {
                        let msg = e.to_string();
                        event_handlers.emit_error(ConnectionError::new(&msg, true));
                        event_handlers.emit_disconnect(DisconnectReason::new(format!(
                            "WebSocket error: {}",
                            msg,
                        )));
                        connected.store(false, Ordering::SeqCst);
                        ws_stream = None;
                    },
                    None => {
                        event_handlers
                            .emit_disconnect(DisconnectReason::new("WebSocket stream ended"));
                        connected.store(false, Ordering::SeqCst);
                        ws_stream = None;
                    },
                },
            }
        } else {
            // Not connected: (re)establish with bounded backoff.

            if intentional_disconnect.load(Ordering::SeqCst) {
                return;
            }

            let attempt = reconnect_attempts.fetch_add(1, Ordering::SeqCst);
            if attempt > 0 {
                if !options.auto_reconnect {
                    log::debug!("[sync-link] Auto-reconnect disabled, staying disconnected");
                    return;
                }
                if let Some(max) = options.max_reconnect_attempts {
                    if attempt > max {
                        // Give up silently: callers observe this only via
                        // is_connected() returning false.
                        log::warn!(
                            "[sync-link] Max reconnection attempts ({}) reached, giving up",
                            max,
                        );
                        event_handlers.emit_error(ConnectionError::new(
                            format!("Max reconnection attempts ({}) reached", max),
                            false,
                        ));
                        return;
                    }
                }

                let delay = options.backoff_delay(attempt - 1);
                log::info!(
                    "[sync-link] Reconnecting in {:?} (attempt {})",
                    delay,
                    attempt,
                );

                // Honor shutdown while waiting out the backoff.
                let sleep_fut = tokio::time::sleep(delay);
                tokio::pin!(sleep_fut);
                tokio::select! {
                    biased;
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ConnCmd::Shutdown) | None => return,
                    },
                    _ = &mut sleep_fut => {},
                }
            }

            match establish_ws(&ws_url).await {
                Ok(stream) => {
                    log::info!("[sync-link] Duplex channel established");
                    reconnect_attempts.store(0, Ordering::SeqCst);
                    intentional_disconnect.store(false, Ordering::SeqCst);
                    connected.store(true, Ordering::SeqCst);
                    event_handlers.emit_connect();
                    ws_stream = Some(stream);
                },
                Err(msg) => {
                    log::warn!("[sync-link] Connection attempt {} failed: {}", attempt + 1, msg);
                    event_handlers.emit_error(ConnectionError::new(msg, true));
                },
            }
        }
    }
}
