//! Connection lifecycle event handlers.
//!
//! Provides callback-based hooks for monitoring the duplex channel:
//!
//! - [`on_connect`](EventHandlers::on_connect): fired when the channel opens
//! - [`on_disconnect`](EventHandlers::on_disconnect): fired when it closes
//! - [`on_error`](EventHandlers::on_error): fired on transport/protocol errors
//!
//! # Example
//!
//! ```rust,no_run
//! use sync_link::{EventHandlers, SyncLinkClient};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("Realtime channel up"))
//!     .on_disconnect(|reason| println!("Channel down: {}", reason))
//!     .on_error(|error| eprintln!("Channel error: {}", error));
//!
//! let client = SyncLinkClient::builder()
//!     .base_url("http://localhost:3000")
//!     .event_handlers(handlers)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is recoverable (i.e. auto-reconnect may succeed).
    pub recoverable: bool,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Type alias for the on_connect callback.
pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for the on_disconnect callback.
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Type alias for the on_error callback.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Connection lifecycle event handlers.
///
/// All handlers are optional. Handlers are `Send + Sync` so they work with
/// the async tokio runtime. These hooks report *transport* lifecycle only;
/// application events go through the [`EventRouter`](crate::router::EventRouter).
#[derive(Clone, Default)]
pub struct EventHandlers {
    /// Called when the duplex channel is successfully established.
    pub(crate) on_connect: Option<OnConnectCallback>,

    /// Called when the duplex channel closes (intentionally or not).
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,

    /// Called when a connection or protocol error occurs.
    pub(crate) on_error: Option<OnErrorCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked when the duplex channel is established.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when the duplex channel is closed.
    ///
    /// The callback receives a [`DisconnectReason`] with details about why
    /// the connection was closed.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when a connection error occurs.
    ///
    /// The callback receives a [`ConnectionError`] indicating whether the
    /// error is recoverable (auto-reconnect may help) or fatal.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    /// Dispatch the on_connect event.
    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    /// Dispatch the on_disconnect event.
    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    /// Dispatch the on_error event.
    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}
