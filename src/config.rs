//! Environment-driven configuration.
//!
//! The environment surface of this layer is intentionally small: a base URL
//! and a feature flag gating whether the duplex notification channel is used
//! at all. Everything else is configured through the
//! [`SyncLinkClient`](crate::client::SyncLinkClient) builder.

use crate::error::{Result, SyncLinkError};

/// Environment variable holding the server base URL (e.g. `http://localhost:3000`).
pub const BASE_URL_ENV: &str = "SYNC_LINK_BASE_URL";

/// Environment variable gating the duplex notification channel.
///
/// Accepts `1`/`true`/`yes` (enabled) and `0`/`false`/`no` (disabled),
/// case-insensitively. Unset means enabled.
pub const REALTIME_ENV: &str = "SYNC_LINK_REALTIME";

/// Configuration sourced from the process environment.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Server base URL. The duplex channel and progress stream endpoints are
    /// derived from it.
    pub base_url: String,
    /// Whether the duplex notification channel should be opened at all.
    pub realtime_enabled: bool,
}

impl LinkConfig {
    /// Read configuration from the process environment.
    ///
    /// Fails only when [`BASE_URL_ENV`] is unset; the realtime flag defaults
    /// to enabled.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// Exists so the parsing rules can be exercised with fixed inputs instead
    /// of mutating process-global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                SyncLinkError::ConfigurationError(format!("{} is not set", BASE_URL_ENV))
            })?;

        let realtime_enabled = match lookup(REALTIME_ENV) {
            Some(raw) => parse_flag(&raw),
            None => true,
        };

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            realtime_enabled,
        })
    }
}

/// Parse a boolean-ish environment flag. Unrecognized values count as enabled
/// so a typo never silently turns realtime off.
fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        let result = LinkConfig::from_lookup(env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let config =
            LinkConfig::from_lookup(env(&[(BASE_URL_ENV, "http://localhost:3000/")])).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert!(config.realtime_enabled);
    }

    #[test]
    fn test_realtime_flag_parsing() {
        for (raw, expected) in [
            ("1", true),
            ("true", true),
            ("YES", true),
            ("0", false),
            ("false", false),
            ("No", false),
            ("off", false),
            ("banana", true),
        ] {
            let config = LinkConfig::from_lookup(env(&[
                (BASE_URL_ENV, "http://localhost:3000"),
                (REALTIME_ENV, raw),
            ]))
            .unwrap();
            assert_eq!(config.realtime_enabled, expected, "raw={}", raw);
        }
    }
}
