//! Lantern Crawl: keyword search and first-page extraction
//!
//! This crate takes a search keyword, queries a search engine's feed endpoint,
//! fetches the top result, extracts readable text and metadata from it, and
//! persists the outcome under a task id that clients poll.

pub mod api;
pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Lantern Crawl operations
#[derive(Debug, Error)]
pub enum LanternError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport failure, timeout or non-2xx status. The only retryable class.
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl LanternError {
    /// Builds a `Network` error from a reqwest failure
    pub fn network(url: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Request timeout".to_string()
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else if let Some(status) = err.status() {
            format!("HTTP {}", status.as_u16())
        } else {
            err.to_string()
        };

        Self::Network {
            url: url.to_string(),
            message,
        }
    }

    /// Returns true for errors worth retrying (transport-level failures)
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Lantern Crawl operations
pub type Result<T> = std::result::Result<T, LanternError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::CrawlService;
pub use config::Config;
pub use crawler::{SearchHit, TaskPipeline};
pub use state::TaskStatus;
pub use storage::{StoragePool, TaskRecord};
