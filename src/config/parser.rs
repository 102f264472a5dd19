use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `storage.database-path`
pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";

/// Environment variable overriding the default engine's endpoint
pub const ENV_SEARCH_URL: &str = "SEARCH_URL";

/// Environment variable overriding `log-level`
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use lantern_crawl::config::load_config;
///
/// let config = load_config(Path::new("lantern.toml")).unwrap();
/// println!("Default engine: {}", config.search.default_engine);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    finalize(config)
}

/// Builds a configuration from defaults plus environment overrides
///
/// Used when no configuration file is given on the command line.
pub fn default_config() -> ConfigResult<Config> {
    finalize(Config::default())
}

fn finalize(config: Config) -> ConfigResult<Config> {
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies environment overrides using the given lookup function
///
/// Empty values are ignored.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        config.storage.database_path = path;
    }
    if let Some(endpoint) = lookup(ENV_SEARCH_URL) {
        let engine = config.search.default_engine;
        config.search.endpoints.set(engine, endpoint);
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.log_level = Some(level.to_lowercase());
    }

    config
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so operators can tell which configuration a process ran with.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
