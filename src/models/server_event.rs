use serde::{Deserialize, Serialize};

use super::connector_status::ConnectorStatus;

/// Event-type discriminators used on the duplex notification channel.
///
/// The router matches on these strings; payload interpretation is left to the
/// registered handlers.
pub mod event_type {
    /// A platform connector changed its connection status.
    pub const CONNECTION_STATUS_CHANGED: &str = "connection_status_changed";
    /// An application finished syncing into a sandbox.
    pub const ENTITY_SYNCED: &str = "entity_synced";
    /// A user-facing notification was created.
    pub const NOTIFICATION: &str = "notification";
}

/// Payload of a `connection_status_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatusChanged {
    /// Platform discriminator (e.g. `mendix`, `powerapps`).
    pub platform: String,
    /// The connector's new status.
    pub status: ConnectorStatus,
}

/// Payload of an `entity_synced` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySynced {
    /// Platform discriminator the entity belongs to.
    pub platform: String,
    /// Identifier of the synced entity.
    pub entity_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_status_changed() {
        let payload: ConnectionStatusChanged = serde_json::from_str(
            r#"{"type":"connection_status_changed","platform":"mendix","status":"CONNECTED"}"#,
        )
        .unwrap();
        assert_eq!(payload.platform, "mendix");
        assert_eq!(payload.status, ConnectorStatus::Connected);
    }

    #[test]
    fn test_parse_entity_synced() {
        let payload: EntitySynced = serde_json::from_str(
            r#"{"type":"entity_synced","platform":"powerapps","entityId":"app-42"}"#,
        )
        .unwrap();
        assert_eq!(payload.platform, "powerapps");
        assert_eq!(payload.entity_id, "app-42");
    }
}
