use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_revq_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("REVQ_PORT");
        env::remove_var("REVQ_BIND_ADDR");
        env::remove_var("REVQ_REVIEW_API_URL");
        env::remove_var("REVQ_GENERATION_MODEL");
        env::remove_var("REVQ_DATABASE_URL");
        env::remove_var("REVQ_ANSWER_TTL_SECS");
        env::remove_var("REVQ_CACHE_CAPACITY");
        env::remove_var("REVQ_HTTP_TIMEOUT_SECS");
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert_eq!(config.review_api_url, DEFAULT_REVIEW_API_URL);
    assert_eq!(config.generation_model, DEFAULT_GENERATION_MODEL);
    assert!(config.database_url.is_none());
    assert_eq!(config.answer_ttl, Duration::from_secs(604_800));
    assert_eq!(config.answer_cache_capacity, 10_000);
}

#[test]
fn test_socket_addr() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = Config {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_revq_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.port, 8080);
    assert_eq!(config.review_api_url, DEFAULT_REVIEW_API_URL);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_revq_env();

    let config = with_env_vars(
        &[
            ("REVQ_PORT", "9090"),
            ("REVQ_BIND_ADDR", "0.0.0.0"),
            ("REVQ_REVIEW_API_URL", "https://reviews.internal"),
            ("REVQ_ANSWER_TTL_SECS", "3600"),
            ("REVQ_CACHE_CAPACITY", "500"),
        ],
        || Config::from_env().expect("should parse overrides"),
    );

    assert_eq!(config.port, 9090);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
    );
    assert_eq!(config.review_api_url, "https://reviews.internal");
    assert_eq!(config.answer_ttl, Duration::from_secs(3600));
    assert_eq!(config.answer_cache_capacity, 500);
}

#[test]
#[serial]
fn test_from_env_rejects_port_zero() {
    clear_revq_env();

    let result = with_env_vars(&[("REVQ_PORT", "0")], Config::from_env);
    assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
}

#[test]
#[serial]
fn test_from_env_rejects_unparseable_port() {
    clear_revq_env();

    let result = with_env_vars(&[("REVQ_PORT", "not-a-port")], Config::from_env);
    assert!(matches!(result, Err(ConfigError::PortParseError { .. })));
}

#[test]
#[serial]
fn test_from_env_rejects_bad_bind_addr() {
    clear_revq_env();

    let result = with_env_vars(&[("REVQ_BIND_ADDR", "localhost")], Config::from_env);
    assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));
}

#[test]
#[serial]
fn test_empty_database_url_treated_as_unset() {
    clear_revq_env();

    let config = with_env_vars(&[("REVQ_DATABASE_URL", "  ")], || {
        Config::from_env().expect("should parse")
    });
    assert!(config.database_url.is_none());
}

#[test]
fn test_validate_rejects_non_http_provider_url() {
    let config = Config {
        review_api_url: "ftp://reviews".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidProviderUrl { .. })
    ));
}

#[test]
fn test_validate_rejects_zero_ttl() {
    let config = Config {
        answer_ttl: Duration::ZERO,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroDuration { .. })
    ));
}

#[test]
fn test_validate_accepts_defaults() {
    assert!(Config::default().validate().is_ok());
}
