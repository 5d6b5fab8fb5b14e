//! Error types for the sync-link client library.
//!
//! Transport-level failures on the duplex channel and the one-way progress
//! streams are deliberately *not* represented here: both components absorb
//! them into their connected/disconnected signals (see [`crate::connection`]
//! and [`crate::progress`]). What remains is the configuration surface.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncLinkError>;

/// Errors surfaced by the sync-link public API.
#[derive(Debug, Error)]
pub enum SyncLinkError {
    /// Invalid or missing client configuration (e.g. no base URL).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}
