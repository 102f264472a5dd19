//! Configuration module for Lantern Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use lantern_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lantern.toml")).unwrap();
//! println!("Retry attempts: {}", config.retry.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, HttpConfig, RetryConfig, RetryTrigger, SearchConfig, SearchEndpoints,
    SearchEngine, ServerConfig, StorageConfig, WorkerConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, default_config, load_config, load_config_with_hash,
    ENV_DATABASE_PATH, ENV_LOG_LEVEL, ENV_SEARCH_URL,
};
