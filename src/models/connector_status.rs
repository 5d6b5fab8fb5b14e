use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status of a platform connector as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorStatus {
    /// Connector is up and the platform is reachable.
    Connected,
    /// Connector is down or was never configured.
    Disconnected,
    /// Connector is in the middle of establishing a session.
    Connecting,
    /// Connector hit a non-transient failure.
    Error,
}

impl ConnectorStatus {
    /// Whether this status denotes an established connection.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "CONNECTED"),
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_screaming_case() {
        let status: ConnectorStatus = serde_json::from_str("\"CONNECTED\"").unwrap();
        assert_eq!(status, ConnectorStatus::Connected);
        assert!(status.is_connected());

        let status: ConnectorStatus = serde_json::from_str("\"DISCONNECTED\"").unwrap();
        assert!(!status.is_connected());
    }
}
