//! Data models for the sync-link client library.
//!
//! Defines the wire payloads consumed from the duplex notification channel
//! and the per-operation progress streams, plus connection-level options.

pub mod cache_key;
pub mod connection_options;
pub mod connector_status;
pub mod notification;
pub mod progress_event;
pub mod server_event;

pub use cache_key::CacheKey;
pub use connection_options::ConnectionOptions;
pub use connector_status::ConnectorStatus;
pub use notification::Notification;
pub use progress_event::{ProgressEvent, StepStatus};
pub use server_event::{event_type, ConnectionStatusChanged, EntitySynced};
