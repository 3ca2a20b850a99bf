//! Gateway configuration (layered: code > env / TOML > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::FileDurableStore;
use crate::error::{GatewayError, Result};
use crate::types::Domain;

pub const DEFAULT_BASE_URL: &str = "https://test.api.amadeus.com";
pub const DEFAULT_TOKEN_PATH: &str = "/v1/security/oauth2/token";

const ENV_PREFIX: &str = "TRIPGATE_";

/// Default lifetime of cached results, per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainTtls {
    pub flight: Duration,
    pub hotel: Duration,
    pub location: Duration,
    pub activity: Duration,
}

impl Default for DomainTtls {
    fn default() -> Self {
        Self {
            flight: Duration::from_secs(10 * 60),
            hotel: Duration::from_secs(30 * 60),
            location: Duration::from_secs(24 * 60 * 60),
            activity: Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl DomainTtls {
    pub fn for_domain(&self, domain: Domain) -> Duration {
        match domain {
            Domain::Flight => self.flight,
            Domain::Hotel => self.hotel,
            Domain::Location => self.location,
            Domain::Activity => self.activity,
        }
    }
}

/// How the two cache tiers behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// When false every lookup misses and every write is dropped.
    pub enabled: bool,
    pub memory_max_entries: usize,
    /// Upper bound on how long an entry lives in the in-process tier.
    pub memory_ttl: Duration,
    pub ttls: DomainTtls,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_max_entries: 1000,
            memory_ttl: Duration::from_secs(5 * 60),
            ttls: DomainTtls::default(),
        }
    }
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Everything needed to build a [`SearchService`](crate::search::SearchService).
#[derive(Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token_path: String,
    pub client_id: String,
    pub client_secret: String,
    /// Default deadline for one upstream call.
    pub request_timeout: Duration,
    /// Credentials are refreshed this long before they expire.
    pub refresh_buffer: Duration,
    pub cache: CachePolicy,
    pub cache_dir: PathBuf,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("token_path", &self.token_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("request_timeout", &self.request_timeout)
            .field("refresh_buffer", &self.refresh_buffer)
            .field("cache", &self.cache)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout: Duration::from_secs(10),
            refresh_buffer: Duration::from_secs(5 * 60),
            cache: CachePolicy::default(),
            cache_dir: FileDurableStore::default_dir(),
        }
    }
}

/// On-disk shape accepted by [`GatewayConfig::from_toml_str`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    token_path: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout_ms: Option<u64>,
    token_refresh_buffer_secs: Option<u64>,
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    cache: FileCacheConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCacheConfig {
    enabled: Option<bool>,
    max_entries: Option<usize>,
    memory_ttl_secs: Option<u64>,
    #[serde(default)]
    ttl_secs: FileTtlConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTtlConfig {
    flight: Option<u64>,
    hotel: Option<u64>,
    location: Option<u64>,
    activity: Option<u64>,
}

impl GatewayConfig {
    /// Defaults with the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Load from `TRIPGATE_*` environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        let string_mappings: [(&str, &mut String); 4] = [
            ("BASE_URL", &mut config.base_url),
            ("TOKEN_PATH", &mut config.token_path),
            ("CLIENT_ID", &mut config.client_id),
            ("CLIENT_SECRET", &mut config.client_secret),
        ];
        for (suffix, field) in string_mappings {
            if let Some(value) = get(suffix) {
                *field = value;
            }
        }

        if let Some(ms) = get("TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(parse_number("TIMEOUT_MS", &ms)?);
        }
        if let Some(secs) = get("TOKEN_REFRESH_BUFFER_SECS") {
            config.refresh_buffer =
                Duration::from_secs(parse_number("TOKEN_REFRESH_BUFFER_SECS", &secs)?);
        }
        if let Some(enabled) = get("CACHE_ENABLED") {
            config.cache.enabled = parse_bool("CACHE_ENABLED", &enabled)?;
        }
        if let Some(max) = get("CACHE_MAX_ENTRIES") {
            config.cache.memory_max_entries = parse_number("CACHE_MAX_ENTRIES", &max)?;
        }
        if let Some(secs) = get("CACHE_MEMORY_TTL_SECS") {
            config.cache.memory_ttl =
                Duration::from_secs(parse_number("CACHE_MEMORY_TTL_SECS", &secs)?);
        }

        let ttl_mappings: [(&str, &mut Duration); 4] = [
            ("TTL_FLIGHT_SECS", &mut config.cache.ttls.flight),
            ("TTL_HOTEL_SECS", &mut config.cache.ttls.hotel),
            ("TTL_LOCATION_SECS", &mut config.cache.ttls.location),
            ("TTL_ACTIVITY_SECS", &mut config.cache.ttls.activity),
        ];
        for (suffix, field) in ttl_mappings {
            if let Some(secs) = get(suffix) {
                *field = Duration::from_secs(parse_number(suffix, &secs)?);
            }
        }

        if let Some(dir) = get("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Parse a TOML document; absent fields keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(input)?;
        let mut config = Self::default();

        if let Some(base_url) = file.base_url {
            config.base_url = base_url;
        }
        if let Some(token_path) = file.token_path {
            config.token_path = token_path;
        }
        if let Some(client_id) = file.client_id {
            config.client_id = client_id;
        }
        if let Some(client_secret) = file.client_secret {
            config.client_secret = client_secret;
        }
        if let Some(ms) = file.timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = file.token_refresh_buffer_secs {
            config.refresh_buffer = Duration::from_secs(secs);
        }
        if let Some(dir) = file.cache_dir {
            config.cache_dir = dir;
        }

        let cache = file.cache;
        if let Some(enabled) = cache.enabled {
            config.cache.enabled = enabled;
        }
        if let Some(max) = cache.max_entries {
            config.cache.memory_max_entries = max;
        }
        if let Some(secs) = cache.memory_ttl_secs {
            config.cache.memory_ttl = Duration::from_secs(secs);
        }
        let ttls = &mut config.cache.ttls;
        for (value, field) in [
            (cache.ttl_secs.flight, &mut ttls.flight),
            (cache.ttl_secs.hotel, &mut ttls.hotel),
            (cache.ttl_secs.location, &mut ttls.location),
            (cache.ttl_secs.activity, &mut ttls.activity),
        ] {
            if let Some(secs) = value {
                *field = Duration::from_secs(secs);
            }
        }

        Ok(config)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GatewayError::Configuration(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check that the configuration can reach the upstream.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(GatewayError::Configuration(format!(
                "{ENV_PREFIX}CLIENT_ID is not set"
            )));
        }
        if self.client_secret.trim().is_empty() {
            return Err(GatewayError::Configuration(format!(
                "{ENV_PREFIX}CLIENT_SECRET is not set"
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(GatewayError::Configuration(format!(
                "Base URL must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(GatewayError::Configuration(
                "Request timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// `base_url` joined with `path`, tolerating slashes on either side.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn token_url(&self) -> String {
        self.endpoint(&self.token_path)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|err| {
        GatewayError::Configuration(format!("{ENV_PREFIX}{name}={value:?} is invalid: {err}"))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GatewayError::Configuration(format!(
            "{ENV_PREFIX}{name}={value:?} is not a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn debug_redacts_the_secret() {
        let config = GatewayConfig::new("id", "super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn endpoint_joins_slashes() {
        let mut config = GatewayConfig::default();
        config.base_url = "https://api.example.com/".into();
        assert_eq!(
            config.endpoint("/v1/reference-data/locations"),
            "https://api.example.com/v1/reference-data/locations"
        );
        assert_eq!(
            config.token_url(),
            "https://api.example.com/v1/security/oauth2/token"
        );
    }

    #[test]
    fn blank_variables_keep_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[("TRIPGATE_BASE_URL", "  ")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn boolean_spellings() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn ttls_follow_domain() {
        let ttls = DomainTtls::default();
        assert_eq!(ttls.for_domain(Domain::Location), Duration::from_secs(86_400));
        assert_eq!(ttls.for_domain(Domain::Activity), Duration::from_secs(43_200));
        assert_eq!(ttls.for_domain(Domain::Hotel), Duration::from_secs(1_800));
        assert_eq!(ttls.for_domain(Domain::Flight), Duration::from_secs(600));
    }
}
