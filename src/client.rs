//! Main sync-link client with builder pattern.
//!
//! The composition root of the realtime layer: builds the router, injects it
//! into the connection manager, and hands out progress monitors and the
//! cache-invalidation bridge.

use crate::{
    config::LinkConfig,
    connection::ConnectionManager,
    error::{Result, SyncLinkError},
    event_handlers::EventHandlers,
    invalidation::{CacheInvalidationBridge, QueryCache},
    models::ConnectionOptions,
    progress::{ProgressEndpoint, ProgressHandlers, ProgressMonitor},
    router::{EventRouter, SubscriptionGuard},
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Main sync-link client.
///
/// Use [`SyncLinkClientBuilder`] to construct instances with custom
/// configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use sync_link::SyncLinkClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SyncLinkClient::builder()
///     .base_url("http://localhost:3000")
///     .credential("jwt-token")
///     .build()?;
///
/// client.connect().await;
/// let _guard = client.on("notification", |payload| {
///     println!("notification: {}", payload);
/// });
/// # Ok(())
/// # }
/// ```
pub struct SyncLinkClient {
    base_url: String,
    credential: Option<String>,
    realtime_enabled: bool,
    router: Arc<EventRouter>,
    connection: ConnectionManager,
}

impl SyncLinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> SyncLinkClientBuilder {
        SyncLinkClientBuilder::new()
    }

    /// Open the duplex notification channel with the configured credential.
    ///
    /// Idempotent; never fails. When the realtime feature flag is off this
    /// is a no-op and `is_connected()` stays `false`.
    pub async fn connect(&self) {
        if !self.realtime_enabled {
            log::debug!("[sync-link] Realtime disabled, skipping duplex channel");
            return;
        }
        self.connection.connect(self.credential.clone()).await;
    }

    /// Close the duplex channel. Safe to call when not connected.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Whether the duplex channel currently reports "open".
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Register a handler for an event type on the duplex channel.
    ///
    /// Delegates to the injected [`EventRouter`]; see
    /// [`EventRouter::on`] for ordering and failure semantics.
    pub fn on(
        &self,
        event_type: impl Into<String>,
        handler: impl Fn(&JsonValue) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        self.router.on(event_type, handler)
    }

    /// The router all inbound duplex-channel events flow through.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Install the cache invalidation bridge against an external query cache.
    ///
    /// The returned bridge keeps the mapping alive; drop it to uninstall.
    pub fn bridge_cache(&self, cache: Arc<dyn QueryCache>) -> CacheInvalidationBridge {
        CacheInvalidationBridge::install(&self.router, cache)
    }

    /// Open a progress monitor for one long-running operation.
    ///
    /// The configured credential is passed into the stream open explicitly;
    /// the monitor itself never looks anything up from the environment.
    pub fn watch_progress(
        &self,
        endpoint: &ProgressEndpoint,
        operation_id: &str,
        handlers: ProgressHandlers,
    ) -> ProgressMonitor {
        ProgressMonitor::open(
            &self.base_url,
            endpoint,
            operation_id,
            self.credential.as_deref(),
            handlers,
        )
    }

    /// The configured server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Builder for configuring [`SyncLinkClient`] instances.
pub struct SyncLinkClientBuilder {
    base_url: Option<String>,
    credential: Option<String>,
    realtime_enabled: bool,
    connection_options: ConnectionOptions,
    event_handlers: EventHandlers,
}

impl SyncLinkClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            credential: None,
            realtime_enabled: true,
            connection_options: ConnectionOptions::default(),
            event_handlers: EventHandlers::new(),
        }
    }

    /// Set the server base URL (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the bearer credential passed to both channel kinds.
    ///
    /// Optional: without one, channels open unauthenticated and the server
    /// decides what traffic to allow.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Gate the duplex channel. When `false`, `connect()` is a no-op.
    pub fn realtime_enabled(mut self, enabled: bool) -> Self {
        self.realtime_enabled = enabled;
        self
    }

    /// Set reconnection behavior for the duplex channel.
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Set connection lifecycle hooks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Apply base URL and realtime flag from a [`LinkConfig`]
    /// (typically [`LinkConfig::from_env`]).
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.base_url = Some(config.base_url);
        self.realtime_enabled = config.realtime_enabled;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<SyncLinkClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| SyncLinkError::ConfigurationError("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let router = EventRouter::new();
        let connection = ConnectionManager::new(
            base_url.clone(),
            self.connection_options,
            router.clone(),
            self.event_handlers,
        );

        Ok(SyncLinkClient {
            base_url,
            credential: self.credential,
            realtime_enabled: self.realtime_enabled,
            router,
            connection,
        })
    }
}
