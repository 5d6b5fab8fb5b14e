use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection-level options for the duplex notification channel.
///
/// Controls automatic reconnection behavior. Reconnection is deliberately
/// bounded: after `max_reconnect_attempts` consecutive failures the
/// connection rests in a disconnected state instead of retrying forever,
/// observable only via `is_connected()`.
///
/// # Example
///
/// ```rust
/// use sync_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(500)
///     .with_max_reconnect_attempts(Some(3));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Enable automatic reconnection on connection loss.
    /// Default: `true`.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Initial delay in milliseconds between reconnection attempts.
    /// Doubles on each consecutive failure up to `max_reconnect_delay_ms`.
    /// Default: 1000 ms.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Ceiling for the exponential backoff delay.
    /// Default: 5000 ms.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts before giving up.
    /// `None` disables the cap. Default: `Some(5)`.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: Option<u32>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> Option<u32> {
    Some(5)
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 5000,
            max_reconnect_attempts: Some(5),
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect on connection loss.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the initial delay between reconnection attempts (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum delay between reconnection attempts (in milliseconds).
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the maximum number of reconnection attempts.
    /// Pass `None` for unbounded retries, `Some(0)` to disable reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Backoff delay before reconnect attempt `attempt` (0-based).
    ///
    /// `base * 2^attempt`, saturating, capped at the configured ceiling.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .reconnect_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.max_reconnect_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert!(options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 1000);
        assert_eq!(options.max_reconnect_delay_ms, 5000);
        assert_eq!(options.max_reconnect_attempts, Some(5));
    }

    #[test]
    fn test_builders() {
        let options = ConnectionOptions::new()
            .with_auto_reconnect(false)
            .with_reconnect_delay_ms(250)
            .with_max_reconnect_delay_ms(2000)
            .with_max_reconnect_attempts(None);
        assert!(!options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 250);
        assert_eq!(options.max_reconnect_delay_ms, 2000);
        assert_eq!(options.max_reconnect_attempts, None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let options = ConnectionOptions::new()
            .with_reconnect_delay_ms(1000)
            .with_max_reconnect_delay_ms(5000);
        assert_eq!(options.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(options.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(options.backoff_delay(2), Duration::from_millis(4000));
        // capped from here on
        assert_eq!(options.backoff_delay(3), Duration::from_millis(5000));
        assert_eq!(options.backoff_delay(30), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let options = ConnectionOptions::new()
            .with_reconnect_delay_ms(u64::MAX)
            .with_max_reconnect_delay_ms(u64::MAX);
        // saturates instead of panicking
        let _ = options.backoff_delay(u32::MAX);
    }
}
