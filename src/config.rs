use anyhow::Context;
use tracing::warn;

use crate::credentials::schema::{HASH_MIN_LENGTH, SALT_MIN_LENGTH};
use crate::store::{MatchOrder, AUTH_DATABASE, CREDENTIALS_COLLECTION};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database: String,
    pub collection: String,
    pub match_order: MatchOrder,
    pub hash_min_bytes: usize,
    pub salt_min_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: AUTH_DATABASE.into(),
            collection: CREDENTIALS_COLLECTION.into(),
            match_order: MatchOrder::default(),
            hash_min_bytes: HASH_MIN_LENGTH,
            salt_min_bytes: SALT_MIN_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "credstore=debug".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; missing keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let match_order = match lookup("CREDSTORE_MATCH_ORDER") {
            Some(v) => v.parse::<MatchOrder>().context("CREDSTORE_MATCH_ORDER")?,
            None => defaults.store.match_order,
        };
        let store = StoreConfig {
            database: lookup("CREDSTORE_DATABASE").unwrap_or(defaults.store.database),
            collection: lookup("CREDSTORE_COLLECTION").unwrap_or(defaults.store.collection),
            match_order,
            hash_min_bytes: usize_or(
                &lookup,
                "CREDSTORE_HASH_MIN_BYTES",
                defaults.store.hash_min_bytes,
            ),
            salt_min_bytes: usize_or(
                &lookup,
                "CREDSTORE_SALT_MIN_BYTES",
                defaults.store.salt_min_bytes,
            ),
        };
        if store.hash_min_bytes == 0 || store.salt_min_bytes == 0 {
            anyhow::bail!("minimum hash and salt lengths must be positive");
        }

        let log = LogConfig {
            filter: lookup("RUST_LOG").unwrap_or(defaults.log.filter),
            json: lookup("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
        };
        Ok(Self { store, log })
    }
}

fn usize_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    let Some(val) = lookup(key) else {
        return default;
    };
    val.trim().parse().unwrap_or_else(|_| {
        warn!(key, val = %val, default, "non-integer value for integer variable; using default");
        default
    })
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.store.database, "auth");
        assert_eq!(cfg.store.collection, "credentials");
        assert_eq!(cfg.store.match_order, MatchOrder::Newest);
        assert_eq!(cfg.store.hash_min_bytes, 32);
        assert_eq!(cfg.store.salt_min_bytes, 32);
        assert!(!cfg.log.json);
    }

    #[test]
    fn reads_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("CREDSTORE_COLLECTION", "creds_v2"),
            ("CREDSTORE_MATCH_ORDER", "oldest"),
            ("CREDSTORE_HASH_MIN_BYTES", "64"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.store.collection, "creds_v2");
        assert_eq!(cfg.store.match_order, MatchOrder::Oldest);
        assert_eq!(cfg.store.hash_min_bytes, 64);
        assert!(cfg.log.json);
    }

    #[test]
    fn bad_integer_falls_back_to_default() {
        let cfg =
            AppConfig::from_lookup(lookup(&[("CREDSTORE_SALT_MIN_BYTES", "lots")])).unwrap();
        assert_eq!(cfg.store.salt_min_bytes, 32);
    }

    #[test]
    fn bad_match_order_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("CREDSTORE_MATCH_ORDER", "random")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("CREDSTORE_MATCH_ORDER"));
    }

    #[test]
    fn zero_minimum_is_an_error() {
        assert!(AppConfig::from_lookup(lookup(&[("CREDSTORE_HASH_MIN_BYTES", "0")])).is_err());
    }
}
