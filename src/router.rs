//! Event Router: classifies inbound duplex-channel events by their `type`
//! discriminator and fans them out to registered handlers.
//!
//! The router knows nothing about event semantics beyond the discriminator
//! field; payload interpretation is entirely the handler's responsibility.
//! Dispatch is synchronous and ordered: events are delivered in the order
//! they arrive on the channel, and handlers for one event run to completion
//! (in registration order) before the next event is dispatched.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Handler invoked with the raw JSON payload of a matching event.
pub type EventHandler = Arc<dyn Fn(&JsonValue) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

/// Routes inbound events to handlers registered per event type.
///
/// Multiple handlers per type are permitted; all are invoked in registration
/// order. A panicking handler is caught at the dispatch boundary and logged,
/// never propagated.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sync_link::EventRouter;
///
/// let router = EventRouter::new();
/// let mut guard = router.on("notification", |payload| {
///     println!("notification: {}", payload);
/// });
/// router.dispatch("notification", &serde_json::json!({"id": "n1"}));
/// guard.unsubscribe();
/// ```
pub struct EventRouter {
    handlers: RwLock<HashMap<String, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl EventRouter {
    /// Create a new router with no registered handlers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register `handler` for `event_type`.
    ///
    /// Returns a [`SubscriptionGuard`] whose
    /// [`unsubscribe`](SubscriptionGuard::unsubscribe) (or `Drop`) removes
    /// exactly this handler. After removal the handler is never invoked for subsequently
    /// dispatched events, even ones already queued on the transport.
    pub fn on(
        self: &Arc<Self>,
        event_type: impl Into<String>,
        handler: impl Fn(&JsonValue) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        let event_type = event_type.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = lock_write(&self.handlers);
        handlers
            .entry(event_type.clone())
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });
        SubscriptionGuard {
            router: Arc::downgrade(self),
            event_type,
            id,
            released: false,
        }
    }

    /// Dispatch one event to all handlers registered for its type.
    ///
    /// Handlers run synchronously, in registration order. Unknown types are
    /// silently ignored.
    pub fn dispatch(&self, event_type: &str, payload: &JsonValue) {
        // Snapshot the handler list so a handler may register/unsubscribe
        // without deadlocking against the registry lock.
        let snapshot: Vec<EventHandler> = {
            let handlers = lock_read(&self.handlers);
            match handlers.get(event_type) {
                Some(entries) => entries.iter().map(|e| e.handler.clone()).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                log::warn!(
                    "[sync-link] Handler for '{}' panicked; continuing with remaining handlers",
                    event_type,
                );
            }
        }
    }

    /// Parse a raw channel frame and dispatch it by its `type` field.
    ///
    /// Malformed JSON and frames without a string `type` discriminator are
    /// logged and dropped without affecting other in-flight messages.
    pub fn dispatch_text(&self, text: &str) {
        let value: JsonValue = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("[sync-link] Dropping malformed channel message: {}", e);
                return;
            },
        };
        let event_type = match value.get("type").and_then(JsonValue::as_str) {
            Some(t) => t.to_string(),
            None => {
                log::debug!("[sync-link] Dropping event without type discriminator");
                return;
            },
        };
        self.dispatch(&event_type, &value);
    }

    /// Number of handlers currently registered for `event_type`.
    pub fn handler_count(&self, event_type: &str) -> usize {
        lock_read(&self.handlers)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    fn remove(&self, event_type: &str, id: u64) {
        let mut handlers = lock_write(&self.handlers);
        if let Some(entries) = handlers.get_mut(event_type) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                handlers.remove(event_type);
            }
        }
    }
}

// A poisoned registry lock can only come from a panic inside `on`/`remove`
// bookkeeping, which never leaves the map half-updated; recover the guard.
fn lock_read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Capability returned by [`EventRouter::on`].
///
/// Invoking [`unsubscribe`](Self::unsubscribe), or dropping the guard,
/// removes exactly the handler it was returned for. Unsubscribing twice is a
/// no-op. Guards held across a connection teardown simply become inert: the
/// handler stays registered but no events flow.
pub struct SubscriptionGuard {
    router: Weak<EventRouter>,
    event_type: String,
    id: u64,
    released: bool,
}

impl SubscriptionGuard {
    /// Remove the handler this guard was returned for. Idempotent.
    pub fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(router) = self.router.upgrade() {
            router.remove(&self.event_type, self.id);
        }
    }

    /// The event type this guard is registered against.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
