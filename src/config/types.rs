use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Main configuration structure for Lantern Crawl
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub workers: WorkerConfig,
    pub server: ServerConfig,

    /// Log level used when no verbosity flag is given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

/// Search engines a task can be run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Bing,
    Google,
}

impl SearchEngine {
    pub const ALL: [SearchEngine; 2] = [SearchEngine::Bing, SearchEngine::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bing => "bing",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = String;

    /// Parses an engine name, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|engine| engine.as_str() == name)
            .ok_or_else(|| format!("unknown search engine '{}' (expected bing or google)", s.trim()))
    }
}

/// Feed endpoint per search engine; `format=rss&q=<keyword>` is appended
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchEndpoints {
    pub bing: String,
    pub google: String,
}

impl SearchEndpoints {
    pub fn get(&self, engine: SearchEngine) -> &str {
        match engine {
            SearchEngine::Bing => &self.bing,
            SearchEngine::Google => &self.google,
        }
    }

    pub fn set(&mut self, engine: SearchEngine, endpoint: String) {
        match engine {
            SearchEngine::Bing => self.bing = endpoint,
            SearchEngine::Google => self.google = endpoint,
        }
    }
}

impl Default for SearchEndpoints {
    fn default() -> Self {
        Self {
            bing: "https://www.bing.com/search".to_string(),
            google: "https://news.google.com/rss/search".to_string(),
        }
    }
}

/// Search engine query configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Engine used when a submission does not name one
    #[serde(rename = "default-engine")]
    pub default_engine: SearchEngine,

    pub endpoints: SearchEndpoints,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Where the raw response goes when a search yields zero hits.
    /// `{engine}` is replaced by the engine name.
    #[serde(rename = "debug-artifact-path")]
    pub debug_artifact_path: String,

    /// JSON-lines log of searches that produced no usable hits; empty disables it
    #[serde(rename = "failure-log-path")]
    pub failure_log_path: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_engine: SearchEngine::Bing,
            endpoints: SearchEndpoints::default(),
            timeout_secs: 10,
            debug_artifact_path: "debug_{engine}.xml".to_string(),
            failure_log_path: "crawl_failures.log".to_string(),
        }
    }
}

/// Result page fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Which failures trigger a retry of the page fetch
    #[serde(rename = "retry-on")]
    pub retry_on: RetryTrigger,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            retry_on: RetryTrigger::Any,
        }
    }
}

/// Retry trigger as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryTrigger {
    /// Retry on any error raised by the operation
    Any,
    /// Retry only on transport-level failures
    Transient,
}

/// Browser-like request headers shared by search and fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    pub accept: String,

    #[serde(rename = "accept-language")]
    pub accept_language: String,

    /// Proxy URLs rotated round-robin across requests; empty means direct
    pub proxies: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
                     image/webp,image/apng,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            proxies: Vec::new(),
        }
    }
}

/// Exponential backoff configuration
///
/// The wait before attempt `n` (n >= 2) is
/// `clamp(multiplier * 2^(n-2), min-wait, max-wait)` units of `unit-ms`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    pub multiplier: f64,

    #[serde(rename = "min-wait")]
    pub min_wait: f64,

    #[serde(rename = "max-wait")]
    pub max_wait: f64,

    /// Length of one backoff unit in milliseconds
    #[serde(rename = "unit-ms")]
    pub unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.0,
            min_wait: 4.0,
            max_wait: 10.0,
            unit_ms: 1000,
        }
    }
}

/// Task store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Maximum number of store handles open at once
    #[serde(rename = "max-connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./crawling.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Background worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker tasks draining the job queue
    pub count: u32,

    /// Maximum number of queued, not yet started, jobs
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            queue_capacity: 64,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}
