//! Runtime configuration read from the environment

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use crate::domain::value_objects::DEFAULT_CURRENCY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    /// Directory for the file store; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub storage_prefix: String,
    pub currency: String,
    pub reload_debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            data_dir: Some(PathBuf::from("./data")),
            storage_prefix: "storefront".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            reload_debounce: Duration::from_millis(2500),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|key| env::var(key).ok()) }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let data_dir = match lookup("STOREFRONT_DATA_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => defaults.data_dir,
        };
        let storage_prefix = lookup("STOREFRONT_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix);
        if storage_prefix.is_empty() || !storage_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(invalid("STOREFRONT_STORAGE_PREFIX", storage_prefix, "expected letters, digits, '-' or '_'"));
        }
        let currency = lookup("STOREFRONT_CURRENCY").unwrap_or(defaults.currency).to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid("STOREFRONT_CURRENCY", currency, "expected a three-letter ISO code"));
        }
        let debounce_ms = parse_or(&lookup, "STOREFRONT_RELOAD_DEBOUNCE_MS", defaults.reload_debounce.as_millis() as u64)?;
        Ok(Self { port, data_dir, storage_prefix, currency, reload_debounce: Duration::from_millis(debounce_ms) })
    }

    pub fn bind_address(&self) -> String { format!("0.0.0.0:{}", self.port) }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, raw, e.to_string())),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key, value, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8083");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("STOREFRONT_DATA_DIR", ""),
            ("STOREFRONT_CURRENCY", "usd"),
            ("STOREFRONT_RELOAD_DEBOUNCE_MS", " 500 "),
            ("STOREFRONT_STORAGE_PREFIX", "shop"),
        ]).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, None);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.reload_debounce, Duration::from_millis(500));
        assert_eq!(config.storage_prefix, "shop");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config_from(&[("PORT", "eighty")]), Err(ConfigError::Invalid { key: "PORT", .. })));
        assert!(matches!(config_from(&[("STOREFRONT_CURRENCY", "CEDI")]), Err(ConfigError::Invalid { key: "STOREFRONT_CURRENCY", .. })));
        assert!(matches!(config_from(&[("STOREFRONT_STORAGE_PREFIX", "a:b")]), Err(ConfigError::Invalid { .. })));
        assert!(matches!(config_from(&[("STOREFRONT_RELOAD_DEBOUNCE_MS", "-1")]), Err(ConfigError::Invalid { .. })));
    }
}
