//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Courier host configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `COURIER_HOST_NAME` — recorded on log entries and exceptions
///   (default: `HOSTNAME`, then `"localhost"`)
/// - `COURIER_ADDRESS_SCHEME` — scheme of generated activity addresses (default: `"queue"`)
/// - `COURIER_MAX_REDELIVERIES` — redeliveries before dead-lettering (default: `3`)
/// - `COURIER_IDLE_POLL_MS` — dispatcher sleep when no endpoint has work (default: `50`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierConfig {
    pub host_name: String,
    pub address_scheme: String,
    pub max_redeliveries: u32,
    pub idle_poll_interval: Duration,
}

impl CourierConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host_name: lookup("COURIER_HOST_NAME")
                .or_else(|| lookup("HOSTNAME"))
                .unwrap_or(defaults.host_name),
            address_scheme: lookup("COURIER_ADDRESS_SCHEME").unwrap_or(defaults.address_scheme),
            max_redeliveries: lookup("COURIER_MAX_REDELIVERIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_redeliveries),
            idle_poll_interval: lookup("COURIER_IDLE_POLL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_poll_interval),
        }
    }
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
            address_scheme: "queue".to_string(),
            max_redeliveries: 3,
            idle_poll_interval: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = CourierConfig::default();
        assert_eq!(config.host_name, "localhost");
        assert_eq!(config.address_scheme, "queue");
        assert_eq!(config.max_redeliveries, 3);
        assert_eq!(config.idle_poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        assert_eq!(CourierConfig::from_lookup(lookup(&[])), CourierConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = CourierConfig::from_lookup(lookup(&[
            ("COURIER_HOST_NAME", "worker-7"),
            ("HOSTNAME", "ignored"),
            ("COURIER_ADDRESS_SCHEME", "loopback"),
            ("COURIER_MAX_REDELIVERIES", "5"),
            ("COURIER_IDLE_POLL_MS", "10"),
        ]));
        assert_eq!(config.host_name, "worker-7");
        assert_eq!(config.address_scheme, "loopback");
        assert_eq!(config.max_redeliveries, 5);
        assert_eq!(config.idle_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_hostname_fallback() {
        let config = CourierConfig::from_lookup(lookup(&[("HOSTNAME", "pod-abc")]));
        assert_eq!(config.host_name, "pod-abc");
    }

    #[test]
    fn test_unparsable_numbers_use_defaults() {
        let config = CourierConfig::from_lookup(lookup(&[("COURIER_MAX_REDELIVERIES", "many")]));
        assert_eq!(config.max_redeliveries, 3);
    }
}
