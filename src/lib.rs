//! # sync-link
//!
//! Realtime synchronization client. Keeps a local view of server-side
//! entities (connector status, synced applications, long-running operation
//! progress, notifications) consistent with server state, without polling,
//! while tolerating unreliable network connections.
//!
//! Four components, composed by [`SyncLinkClient`]:
//!
//! - [`ConnectionManager`](connection::ConnectionManager): one persistent
//!   duplex WebSocket channel; connect/disconnect/reconnect with bounded
//!   backoff.
//! - [`EventRouter`]: classifies inbound channel events by type and fans
//!   them out to registered handlers.
//! - [`ProgressMonitor`]: one one-way event stream per in-flight long-running
//!   operation, driving a per-session progress state machine.
//! - [`CacheInvalidationBridge`]: maps events to stale-key signals for an
//!   external reactive query cache.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sync_link::{
//!     CacheKey, ProgressEndpoint, ProgressHandlers, QueryCache, SyncLinkClient,
//! };
//!
//! struct MyCache;
//! impl QueryCache for MyCache {
//!     fn invalidate(&self, key: &CacheKey) {
//!         println!("stale: {}", key);
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SyncLinkClient::builder()
//!     .base_url("http://localhost:3000")
//!     .credential("jwt-token")
//!     .build()?;
//!
//! client.connect().await;
//! let _bridge = client.bridge_cache(Arc::new(MyCache));
//!
//! let monitor = client.watch_progress(
//!     &ProgressEndpoint::sandbox_sync(),
//!     "sb-1",
//!     ProgressHandlers::new().on_complete(|s| println!("done: {}%", s.progress())),
//! );
//! println!("status: {:?}", monitor.status());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod invalidation;
pub mod models;
pub mod progress;
pub mod router;

pub use client::{SyncLinkClient, SyncLinkClientBuilder};
pub use config::LinkConfig;
pub use connection::ConnectionManager;
pub use error::{Result, SyncLinkError};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use invalidation::{invalidation_keys, CacheInvalidationBridge, QueryCache};
pub use models::{
    event_type, CacheKey, ConnectionOptions, ConnectionStatusChanged, ConnectorStatus,
    EntitySynced, Notification, ProgressEvent, StepStatus,
};
pub use progress::{
    ProgressEndpoint, ProgressHandlers, ProgressMonitor, ProgressSnapshot, ProgressStatus,
};
pub use router::{EventRouter, SubscriptionGuard};
