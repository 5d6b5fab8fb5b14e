use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A user-facing notification, carried under the `notification` key of a
/// `notification` event on the duplex channel.
///
/// The sync layer does not interpret notifications; it only delivers them to
/// whoever subscribed via the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Server-assigned notification identifier.
    pub id: String,
    /// Notification category (e.g. `sync_completed`, `connector_down`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Short title.
    pub title: String,
    /// Human-readable body.
    pub message: String,
    /// Whether the user has already seen this notification.
    pub read: bool,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Free-form extra data attached by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}
