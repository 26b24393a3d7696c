//! Service configuration from the environment (`.env` is loaded by `main`).

use std::str::FromStr;
use std::time::Duration;
use rust_decimal::Decimal;
use thiserror::Error;
use crate::domain::aggregates::ShippingDefaults;
use crate::domain::value_objects::{Kilometers, Money};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub shipping_defaults: ShippingDefaults,
    pub gst_rate_percent: Decimal,
    pub order_create_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let fallback = ShippingDefaults::default();
        let money = |key: &'static str, default: Money| parse(&lookup, key).map(|v| v.map(Money::new).unwrap_or(default));

        let shipping_defaults = ShippingDefaults {
            base_rate: money("SHIPPING_DEFAULT_BASE_RATE", fallback.base_rate)?,
            per_km_rate: money("SHIPPING_DEFAULT_PER_KM_RATE", fallback.per_km_rate)?,
            free_shipping_threshold: money("SHIPPING_DEFAULT_FREE_THRESHOLD", fallback.free_shipping_threshold)?,
            distance_free_radius: parse(&lookup, "SHIPPING_DEFAULT_FREE_RADIUS_KM")?.map(Kilometers::new).unwrap_or(fallback.distance_free_radius),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            port: parse(&lookup, "PORT")?.unwrap_or(8083),
            nats_url: lookup("NATS_URL").filter(|url| !url.is_empty()),
            shipping_defaults,
            gst_rate_percent: parse(&lookup, "GST_RATE_PERCENT")?.unwrap_or(Decimal::from(18)),
            order_create_timeout: Duration::from_secs(parse(&lookup, "ORDER_CREATE_TIMEOUT_SECS")?.unwrap_or(15)),
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/storefront")]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.nats_url, None);
        assert_eq!(cfg.shipping_defaults, ShippingDefaults::default());
        assert_eq!(cfg.gst_rate_percent, Decimal::from(18));
        assert_eq!(cfg.order_create_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://db/storefront"),
            ("PORT", "9000"),
            ("SHIPPING_DEFAULT_BASE_RATE", "350"),
            ("SHIPPING_DEFAULT_FREE_RADIUS_KM", "7.5"),
            ("GST_RATE_PERCENT", "12"),
        ]).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.shipping_defaults.base_rate, Money::rupees(350));
        assert_eq!(cfg.shipping_defaults.per_km_rate, Money::rupees(50));
        assert_eq!(cfg.shipping_defaults.distance_free_radius, Kilometers::new(Decimal::new(75, 1)));
        assert_eq!(cfg.gst_rate_percent, Decimal::from(12));
    }

    #[test]
    fn test_missing_database_url() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("DATABASE_URL", "postgres://db"), ("SHIPPING_DEFAULT_PER_KM_RATE", "fifty")]).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "SHIPPING_DEFAULT_PER_KM_RATE", value: "fifty".into() });
    }
}
