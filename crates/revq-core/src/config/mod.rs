//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `REVQ_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `REVQ_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Base URL of the external review provider.
    pub review_api_url: String,

    /// Model identifier passed to the generation client.
    pub generation_model: String,

    /// Postgres connection string for Q&A history and analytics.
    /// When absent the server falls back to in-memory sinks.
    pub database_url: Option<String>,

    /// TTL for cached answers. Default: 7 days.
    pub answer_ttl: Duration,

    /// Max entries in the in-memory answer cache. Default: `10_000`.
    pub answer_cache_capacity: u64,

    /// Timeout applied to outbound review/scrape HTTP calls. Default: 10s.
    pub http_timeout: Duration,
}

/// Default review provider URL used when `REVQ_REVIEW_API_URL` is not set.
pub const DEFAULT_REVIEW_API_URL: &str = "https://www.kiyoh.com";

/// Default generation model used when `REVQ_GENERATION_MODEL` is not set.
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            review_api_url: DEFAULT_REVIEW_API_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            database_url: None,
            answer_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            answer_cache_capacity: 10_000,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "REVQ_PORT";
    const ENV_BIND_ADDR: &'static str = "REVQ_BIND_ADDR";
    const ENV_REVIEW_API_URL: &'static str = "REVQ_REVIEW_API_URL";
    const ENV_GENERATION_MODEL: &'static str = "REVQ_GENERATION_MODEL";
    const ENV_DATABASE_URL: &'static str = "REVQ_DATABASE_URL";
    const ENV_ANSWER_TTL_SECS: &'static str = "REVQ_ANSWER_TTL_SECS";
    const ENV_CACHE_CAPACITY: &'static str = "REVQ_CACHE_CAPACITY";
    const ENV_HTTP_TIMEOUT_SECS: &'static str = "REVQ_HTTP_TIMEOUT_SECS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let review_api_url =
            Self::parse_string_from_env(Self::ENV_REVIEW_API_URL, defaults.review_api_url);
        let generation_model =
            Self::parse_string_from_env(Self::ENV_GENERATION_MODEL, defaults.generation_model);
        let database_url = Self::parse_optional_string_from_env(Self::ENV_DATABASE_URL);
        let answer_ttl = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_ANSWER_TTL_SECS,
            defaults.answer_ttl.as_secs(),
        ));
        let answer_cache_capacity =
            Self::parse_u64_from_env(Self::ENV_CACHE_CAPACITY, defaults.answer_cache_capacity);
        let http_timeout = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_HTTP_TIMEOUT_SECS,
            defaults.http_timeout.as_secs(),
        ));

        Ok(Self {
            port,
            bind_addr,
            review_api_url,
            generation_model,
            database_url,
            answer_ttl,
            answer_cache_capacity,
            http_timeout,
        })
    }

    /// Validates basic invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.review_api_url.starts_with("http://") && !self.review_api_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidProviderUrl {
                value: self.review_api_url.clone(),
            });
        }

        if self.answer_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: Self::ENV_ANSWER_TTL_SECS,
            });
        }

        if self.http_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: Self::ENV_HTTP_TIMEOUT_SECS,
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
