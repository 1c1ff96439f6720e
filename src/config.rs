//! Process settings read from the environment (call `dotenvy::dotenv()` first in binaries).

use crate::error::ConfigError;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub bind: String,
    pub max_connections: u32,
    pub body_limit: usize,
    pub pager: PagerConfig,
}

/// Page sizing for list operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagerConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagerConfig {
    fn default() -> Self {
        PagerConfig {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PagerConfig::default();
        Ok(Settings {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/crudman".into()),
            bind: lookup("CRUDMAN_BIND").unwrap_or_else(|| "0.0.0.0:3000".into()),
            max_connections: parse(&lookup, "CRUDMAN_MAX_CONNECTIONS", 5)?,
            body_limit: parse(&lookup, "CRUDMAN_BODY_LIMIT", 2 * 1024 * 1024)?,
            pager: PagerConfig {
                default_page_size: parse(&lookup, "CRUDMAN_PAGE_SIZE", defaults.default_page_size)?,
                max_page_size: parse(&lookup, "CRUDMAN_MAX_PAGE_SIZE", defaults.max_page_size)?,
            },
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(s.bind, "0.0.0.0:3000");
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.pager, PagerConfig::default());
    }

    #[test]
    fn reads_overrides_and_rejects_garbage() {
        let env: HashMap<&str, &str> = [("CRUDMAN_PAGE_SIZE", "25"), ("CRUDMAN_BIND", "127.0.0.1:9000")].into();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.pager.default_page_size, 25);
        assert_eq!(s.bind, "127.0.0.1:9000");

        let err = Settings::from_lookup(|k| (k == "CRUDMAN_MAX_CONNECTIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CRUDMAN_MAX_CONNECTIONS", .. }));
    }
}
