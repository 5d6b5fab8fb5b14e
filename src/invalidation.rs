//! Cache Invalidation Bridge: translates inbound duplex-channel events into
//! "this cached data is stale" signals for the external reactive query cache.
//!
//! The bridge holds no state of its own: it is a pure event-to-call mapper
//! registered on the [`EventRouter`](crate::router::EventRouter). The mapping
//! is a fixed table, not mutable at runtime:
//!
//! - `connection_status_changed` always invalidates the platform's status
//!   entry, and additionally its list entry when the new status denotes
//!   "connected" (no list refetch on transient status flaps);
//! - `entity_synced` invalidates the platform's list entry.
//!
//! Invalidation is fire-and-forget and idempotent; invalidating an
//! already-fresh key is harmless.

use crate::{
    models::{event_type, CacheKey, ConnectionStatusChanged, EntitySynced},
    router::{EventRouter, SubscriptionGuard},
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// External reactive query cache, as seen from this layer.
///
/// The sole contract is `invalidate(key)`: mark the entry stale so the next
/// read refreshes through. Implementations must tolerate redundant calls.
pub trait QueryCache: Send + Sync {
    /// Mark the cached entry for `key` stale.
    fn invalidate(&self, key: &CacheKey);
}

/// Compute the cache keys an event invalidates.
///
/// Pure function over the static mapping table; unknown event types and
/// undecodable payloads map to no keys (the latter is logged).
pub fn invalidation_keys(event_type_name: &str, payload: &JsonValue) -> Vec<CacheKey> {
    match event_type_name {
        event_type::CONNECTION_STATUS_CHANGED => {
            match serde_json::from_value::<ConnectionStatusChanged>(payload.clone()) {
                Ok(change) => {
                    let mut keys = vec![CacheKey::connector_status(&change.platform)];
                    if change.status.is_connected() {
                        keys.push(CacheKey::connector_list(&change.platform));
                    }
                    keys
                },
                Err(e) => {
                    log::warn!(
                        "[sync-link] Undecodable connection_status_changed payload: {}",
                        e,
                    );
                    Vec::new()
                },
            }
        },
        event_type::ENTITY_SYNCED => match serde_json::from_value::<EntitySynced>(payload.clone())
        {
            Ok(synced) => vec![CacheKey::connector_list(&synced.platform)],
            Err(e) => {
                log::warn!("[sync-link] Undecodable entity_synced payload: {}", e);
                Vec::new()
            },
        },
        _ => Vec::new(),
    }
}

/// Wires the static event-to-invalidation mapping onto a router.
///
/// Dropping the bridge releases its router subscriptions; the cache itself
/// is never touched again.
pub struct CacheInvalidationBridge {
    _subscriptions: Vec<SubscriptionGuard>,
}

impl CacheInvalidationBridge {
    /// Register invalidation handlers for every mapped event type.
    pub fn install(router: &Arc<EventRouter>, cache: Arc<dyn QueryCache>) -> Self {
        let mapped_types = [event_type::CONNECTION_STATUS_CHANGED, event_type::ENTITY_SYNCED];
        let subscriptions = mapped_types
            .into_iter()
            .map(|type_name| {
                let cache = cache.clone();
                router.on(type_name, move |payload| {
                    for key in invalidation_keys(type_name, payload) {
                        log::debug!("[sync-link] Invalidating {}", key);
                        cache.invalidate(&key);
                    }
                })
            })
            .collect();
        Self {
            _subscriptions: subscriptions,
        }
    }
}
