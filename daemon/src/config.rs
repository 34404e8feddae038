//! Daemon configuration.

use std::str::FromStr;
use std::time::Duration;

use ratekeeper_common::CurrencySet;
use ratekeeper_fx::{ApiClientConfig, RateCacheConfig, RefresherConfig};
use tracing::warn;

/// Main daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Cache configuration.
    pub cache: RateCacheConfig,
    /// Refresh configuration.
    pub refresher: RefresherConfig,
    /// Upstream API configuration.
    pub api: ApiClientConfig,
    /// Currencies kept warm by the refresher.
    pub currencies: CurrencySet,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cache: RateCacheConfig::default(),
            refresher: RefresherConfig::default(),
            api: ApiClientConfig::default(),
            currencies: CurrencySet::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparsable values keep the
    /// default and are logged.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ttl) = parse_var::<u64>(&lookup, "RATEKEEPER_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(ttl);
        }

        if let Some(interval) = parse_var::<u64>(&lookup, "RATEKEEPER_SWEEP_INTERVAL_SECS") {
            config.cache.sweep_interval = Duration::from_secs(interval);
        }

        if let Some(interval) = parse_var::<u64>(&lookup, "RATEKEEPER_FETCH_INTERVAL_SECS") {
            config.refresher.fetch_interval = Duration::from_secs(interval);
        }

        if let Some(cap) = parse_var::<usize>(&lookup, "RATEKEEPER_MAX_CONCURRENT_FETCHES") {
            config.refresher.max_concurrent_fetches = Some(cap);
        }

        if let Some(list) = lookup("RATEKEEPER_CURRENCIES") {
            match CurrencySet::parse_list(&list) {
                Ok(currencies) => config.currencies = currencies,
                Err(e) => warn!(value = %list, error = %e, "Ignoring RATEKEEPER_CURRENCIES"),
            }
        }

        if let Some(url) = lookup("RATEKEEPER_API_BASE_URL") {
            config.api.base_url = url;
        }

        if let Some(timeout) = parse_var::<u64>(&lookup, "RATEKEEPER_REQUEST_TIMEOUT_SECS") {
            config.api.request_timeout = Duration::from_secs(timeout);
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate().map_err(|e| e.to_string())?;
        self.refresher.validate().map_err(|e| e.to_string())?;

        if self.api.base_url.is_empty() {
            return Err("API base URL cannot be empty".to_string());
        }

        if self.api.request_timeout.is_zero() {
            return Err("Request timeout cannot be 0".to_string());
        }

        if self.currencies.is_empty() {
            return Err("At least one currency must be configured".to_string());
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratekeeper_common::Currency;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_ok!(config.validate());
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.refresher.fetch_interval, Duration::from_secs(3600));
        assert_eq!(config.currencies.len(), 5);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = DaemonConfig::from_lookup(lookup_from(&[
            ("RATEKEEPER_CACHE_TTL_SECS", "120"),
            ("RATEKEEPER_FETCH_INTERVAL_SECS", "60"),
            ("RATEKEEPER_MAX_CONCURRENT_FETCHES", "2"),
            ("RATEKEEPER_CURRENCIES", "usd,chf"),
            ("RATEKEEPER_API_BASE_URL", "http://localhost:8081/v4"),
        ]));

        assert_eq!(config.cache.ttl, Duration::from_secs(120));
        assert_eq!(config.refresher.fetch_interval, Duration::from_secs(60));
        assert_eq!(config.refresher.max_concurrent_fetches, Some(2));
        assert!(config.currencies.contains(&Currency::new("CHF")));
        assert_eq!(config.currencies.len(), 2);
        assert_eq!(config.api.base_url, "http://localhost:8081/v4");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = DaemonConfig::from_lookup(lookup_from(&[
            ("RATEKEEPER_CACHE_TTL_SECS", "an hour"),
            ("RATEKEEPER_CURRENCIES", "USD,EURO"),
        ]));

        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.currencies, CurrencySet::default());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = DaemonConfig::default();
        config.refresher.fetch_interval = Duration::ZERO;
        assert_err!(config.validate());

        let mut config = DaemonConfig::default();
        config.api.base_url.clear();
        assert_err!(config.validate());

        let config = DaemonConfig::from_lookup(lookup_from(&[(
            "RATEKEEPER_MAX_CONCURRENT_FETCHES",
            "0",
        )]));
        assert_err!(config.validate());
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let config = DaemonConfig::from_lookup(lookup_from(&[(
            "RATEKEEPER_CACHE_TTL_SECS",
            "18446744073709551615",
        )]));
        assert_eq!(config.cache.ttl, Duration::from_secs(u64::MAX));
        assert_err!(config.validate());

        let config = DaemonConfig::from_lookup(lookup_from(&[(
            "RATEKEEPER_FETCH_INTERVAL_SECS",
            "999999999999",
        )]));
        assert_err!(config.validate());

        let config = DaemonConfig::from_lookup(lookup_from(&[(
            "RATEKEEPER_MAX_CONCURRENT_FETCHES",
            "18446744073709551615",
        )]));
        assert_err!(config.validate());
    }
}
