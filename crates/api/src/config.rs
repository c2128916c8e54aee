//! Application configuration loaded from environment variables.

use courier::CourierConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `TIMELINE_ADDRESS` — where routing slips publish their events
///   (default: `"{scheme}:routing_slip_timeline"`)
/// - the `COURIER_*` variables read by [`CourierConfig`]
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub timeline_address: String,
    pub courier: CourierConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let courier = CourierConfig::from_lookup(&lookup);
        let timeline_address = lookup("TIMELINE_ADDRESS")
            .unwrap_or_else(|| default_timeline_address(&courier.address_scheme));
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            timeline_address,
            courier,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_timeline_address(scheme: &str) -> String {
    format!("{scheme}:routing_slip_timeline")
}

impl Default for Config {
    fn default() -> Self {
        let courier = CourierConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            timeline_address: default_timeline_address(&courier.address_scheme),
            courier,
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
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeline_address, "queue:routing_slip_timeline");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_timeline_address_follows_scheme() {
        let config = Config::from_lookup(lookup(&[("COURIER_ADDRESS_SCHEME", "rabbitmq")]));
        assert_eq!(config.timeline_address, "rabbitmq:routing_slip_timeline");
        assert_eq!(config.courier.address_scheme, "rabbitmq");
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("TIMELINE_ADDRESS", "queue:audit"),
            ("COURIER_MAX_REDELIVERIES", "1"),
        ]));
        assert_eq!(config.port, 8081);
        assert_eq!(config.timeline_address, "queue:audit");
        assert_eq!(config.courier.max_redeliveries, 1);
    }

    #[test]
    fn test_unparseable_port_falls_back() {
        let config = Config::from_lookup(lookup(&[("PORT", "http")]));
        assert_eq!(config.port, 3000);
    }
}
