//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::carrier::CarrierConfig;
use crate::planner::SearchConfig;

/// Cache file used when none is configured.
const DEFAULT_CACHE_FILE: &str = "hop-cache.json";

/// Session file used when none is configured.
const DEFAULT_SESSION_FILE: &str = "session.json";

/// Error from reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `HOP_BIND_ADDR`
    pub bind_addr: SocketAddr,

    /// `HOP_CACHE_FILE`; set it empty to keep the cache in memory only.
    pub cache_file: Option<PathBuf>,

    /// `HOP_SESSION_FILE`: carrier session exported from the browser.
    pub session_file: PathBuf,

    /// `HOP_MOCK_DIR`: serve fixtures from this directory instead of the
    /// live carrier.
    pub mock_dir: Option<PathBuf>,

    /// `HOP_MAX_HOPS`, `HOP_MIN_LAYOVER_HOURS`, `HOP_MAX_LAYOVER_HOURS`
    /// and `HOP_FUTURE_DAYS` override the search defaults.
    pub search: SearchConfig,

    /// `HOP_PAGE_TTL_MINUTES` and `HOP_RESULTS_TTL_HOURS`.
    pub cache: CacheConfig,

    /// `HOP_CARRIER_TIMEOUT_SECS` and `HOP_CARRIER_MAX_CONCURRENT`.
    pub carrier: CarrierConfig,
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let bind_addr = parse_or("HOP_BIND_ADDR", var("HOP_BIND_ADDR"), default_bind_addr)?;

        let cache_file = match var("HOP_CACHE_FILE") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_CACHE_FILE)),
        };
        let session_file = var("HOP_SESSION_FILE")
            .filter(|p| !p.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);
        let mock_dir = var("HOP_MOCK_DIR")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let defaults = SearchConfig::default();
        let search = SearchConfig::default()
            .with_default_max_hops(parse_or("HOP_MAX_HOPS", var("HOP_MAX_HOPS"), || {
                defaults.default_max_hops
            })?)
            .with_default_min_layover_hours(parse_or(
                "HOP_MIN_LAYOVER_HOURS",
                var("HOP_MIN_LAYOVER_HOURS"),
                || defaults.default_min_layover_hours,
            )?)
            .with_default_max_layover_hours(parse_optional(
                "HOP_MAX_LAYOVER_HOURS",
                var("HOP_MAX_LAYOVER_HOURS"),
            )?)
            .with_future_days(parse_or("HOP_FUTURE_DAYS", var("HOP_FUTURE_DAYS"), || {
                defaults.future_days
            })?);

        let cache_defaults = CacheConfig::default();
        let page_ttl_minutes = parse_or("HOP_PAGE_TTL_MINUTES", var("HOP_PAGE_TTL_MINUTES"), || {
            cache_defaults.page_ttl.as_secs() / 60
        })?;
        let results_ttl_hours = parse_or("HOP_RESULTS_TTL_HOURS", var("HOP_RESULTS_TTL_HOURS"), || {
            cache_defaults.results_ttl.as_secs() / 3600
        })?;
        let cache = CacheConfig::default()
            .with_page_ttl(minutes(page_ttl_minutes))
            .with_results_ttl(minutes(results_ttl_hours.saturating_mul(60)));

        let carrier_defaults = CarrierConfig::default();
        let carrier = CarrierConfig::default()
            .with_timeout(parse_or(
                "HOP_CARRIER_TIMEOUT_SECS",
                var("HOP_CARRIER_TIMEOUT_SECS"),
                || carrier_defaults.timeout_secs,
            )?)
            .with_max_concurrent(parse_or(
                "HOP_CARRIER_MAX_CONCURRENT",
                var("HOP_CARRIER_MAX_CONCURRENT"),
                || carrier_defaults.max_concurrent,
            )?);

        Ok(Self {
            bind_addr,
            cache_file,
            session_file,
            mock_dir,
            search,
            cache,
            carrier,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cache_file: Some(PathBuf::from(DEFAULT_CACHE_FILE)),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            mock_dir: None,
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            carrier: CarrierConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

fn parse_optional<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| ConfigError { name, value: v }),
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    Ok(parse_optional(name, value)?.unwrap_or_else(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.cache_file, Some(PathBuf::from("hop-cache.json")));
        assert_eq!(config.session_file, PathBuf::from("session.json"));
        assert!(config.mock_dir.is_none());
        assert_eq!(config.search.default_max_hops, 3);
        assert_eq!(config.search.default_max_layover_hours, None);
        assert_eq!(config.search.future_days, 3);
        assert_eq!(config.cache.page_ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.results_ttl, Duration::from_secs(8 * 3600));
        assert_eq!(config.carrier.timeout_secs, 30);
        assert_eq!(config.carrier.max_concurrent, 2);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("HOP_BIND_ADDR", "0.0.0.0:8080"),
            ("HOP_CACHE_FILE", ""),
            ("HOP_MOCK_DIR", "fixtures"),
            ("HOP_MAX_HOPS", "2"),
            ("HOP_MIN_LAYOVER_HOURS", "3"),
            ("HOP_MAX_LAYOVER_HOURS", " 12 "),
            ("HOP_FUTURE_DAYS", "5"),
            ("HOP_PAGE_TTL_MINUTES", "15"),
            ("HOP_RESULTS_TTL_HOURS", "2"),
            ("HOP_CARRIER_TIMEOUT_SECS", "10"),
            ("HOP_CARRIER_MAX_CONCURRENT", "4"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.cache_file.is_none());
        assert_eq!(config.mock_dir, Some(PathBuf::from("fixtures")));
        assert_eq!(config.search.default_max_hops, 2);
        assert_eq!(config.search.default_min_layover_hours, 3);
        assert_eq!(config.search.default_max_layover_hours, Some(12));
        assert_eq!(config.search.future_days, 5);
        assert_eq!(config.cache.page_ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.cache.results_ttl, Duration::from_secs(2 * 3600));
        assert_eq!(config.carrier.timeout_secs, 10);
        assert_eq!(config.carrier.max_concurrent, 4);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("HOP_MAX_HOPS", "lots")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError {
                name: "HOP_MAX_HOPS",
                value: "lots".to_string()
            }
        );
        assert_eq!(err.to_string(), r#"invalid value for HOP_MAX_HOPS: "lots""#);
    }
}
