use crate::config::types::{
    Config, FetchConfig, HttpConfig, RetryConfig, SearchConfig, SearchEngine, StorageConfig,
    WorkerConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Proxy schemes reqwest can dial
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_search_config(&config.search)?;
    validate_fetch_config(&config.fetch)?;
    validate_http_config(&config.http)?;
    validate_retry_config(&config.retry)?;
    validate_storage_config(&config.storage)?;
    validate_worker_config(&config.workers)?;
    if let Some(level) = &config.log_level {
        validate_log_level(level)?;
    }
    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> ConfigResult<()> {
    for engine in SearchEngine::ALL {
        validate_endpoint(engine, config.endpoints.get(engine))?;
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "search timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.debug_artifact_path.is_empty() {
        return Err(ConfigError::Validation(
            "debug-artifact-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(engine: SearchEngine, endpoint: &str) -> ConfigResult<()> {
    let url = Url::parse(endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid {} search endpoint: {}", engine, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} search endpoint must use http or https, got '{}'",
            engine,
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> ConfigResult<()> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch timeout-secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates request header configuration
fn validate_http_config(config: &HttpConfig) -> ConfigResult<()> {
    for (name, value) in [
        ("user-agent", &config.user_agent),
        ("accept", &config.accept),
        ("accept-language", &config.accept_language),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    for proxy in &config.proxies {
        let url = Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        if !PROXY_SCHEMES.contains(&url.scheme()) {
            return Err(ConfigError::InvalidUrl(format!(
                "Proxy '{}' must use one of {}",
                proxy,
                PROXY_SCHEMES.join(", ")
            )));
        }
    }

    Ok(())
}

/// Validates backoff configuration
fn validate_retry_config(config: &RetryConfig) -> ConfigResult<()> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    for (name, value) in [
        ("multiplier", config.multiplier),
        ("min-wait", config.min_wait),
        ("max-wait", config.max_wait),
    ] {
        if !value.is_finite() {
            return Err(ConfigError::Validation(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
    }

    if config.multiplier <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be > 0, got {}",
            config.multiplier
        )));
    }

    if config.min_wait < 0.0 || config.min_wait > config.max_wait {
        return Err(ConfigError::Validation(format!(
            "min-wait must be between 0 and max-wait, got {} (max-wait {})",
            config.min_wait, config.max_wait
        )));
    }

    if config.unit_ms == 0 {
        return Err(ConfigError::Validation(
            "unit-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.max_connections < 1 {
        return Err(ConfigError::Validation(format!(
            "max-connections must be >= 1, got {}",
            config.max_connections
        )));
    }

    Ok(())
}

/// Validates worker pool configuration
fn validate_worker_config(config: &WorkerConfig) -> ConfigResult<()> {
    if config.count < 1 || config.count > 256 {
        return Err(ConfigError::Validation(format!(
            "workers count must be between 1 and 256, got {}",
            config.count
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    Ok(())
}

fn validate_log_level(level: &str) -> ConfigResult<()> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "log-level must be one of trace, debug, info, warn, error; got '{}'",
            other
        ))),
    }
}
