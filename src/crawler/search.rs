//! Search engine client
//!
//! This module queries an engine's search endpoint for an RSS feed of results
//! and turns the feed items into [`SearchHit`]s:
//! - items without a link are dropped
//! - missing titles and snippets get placeholder strings
//! - search-engine redirect links are unwrapped to their destination
//! - a zero-hit response is saved to a diagnostic artifact
//! - searches that yield no usable hits are appended to a JSON-lines log

use crate::config::{HttpConfig, SearchConfig, SearchEngine};
use crate::crawler::fetcher::ClientRotation;
use crate::{LanternError, Result};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Title used when a feed item has none
pub const NO_TITLE: &str = "No title";

/// Snippet used when a feed item has none
pub const NO_SNIPPET: &str = "No snippet";

/// Failure log reason for a feed without usable items
pub const REASON_NO_RESULTS: &str = "no_results_found";

/// Failure log reason for a body that is not a feed (block pages, captchas)
pub const REASON_NOT_A_FEED: &str = "not_a_feed";

/// Placeholder in the artifact path replaced by the engine name
const ENGINE_PLACEHOLDER: &str = "{engine}";

/// One search result entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// One line of the search failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub timestamp: String,
    pub engine: SearchEngine,
    pub keyword: String,
    pub reason: String,
    pub body_len: usize,
}

/// Client for the search engines' feed endpoints
pub struct SearchClient {
    clients: ClientRotation,
    bing: Url,
    google: Url,
    artifact_path: String,
    failure_log: Option<PathBuf>,
}

impl SearchClient {
    /// Creates a search client from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Engine endpoints, timeout, artifact and failure log paths
    /// * `http` - Browser-like request headers and proxies
    pub fn new(config: &SearchConfig, http: &HttpConfig) -> Result<Self> {
        let clients = ClientRotation::new(http, Duration::from_secs(config.timeout_secs))?;
        let failure_log = Some(config.failure_log_path.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            clients,
            bing: Url::parse(&config.endpoints.bing)?,
            google: Url::parse(&config.endpoints.google)?,
            artifact_path: config.debug_artifact_path.clone(),
            failure_log,
        })
    }

    fn endpoint(&self, engine: SearchEngine) -> &Url {
        match engine {
            SearchEngine::Bing => &self.bing,
            SearchEngine::Google => &self.google,
        }
    }

    /// Builds the feed query URL for a keyword
    pub fn query_url(&self, engine: SearchEngine, keyword: &str) -> Url {
        let mut url = self.endpoint(engine).clone();
        url.query_pairs_mut()
            .append_pair("format", "rss")
            .append_pair("q", keyword);
        url
    }

    /// Path of the zero-hit diagnostic artifact for an engine
    pub fn artifact_path(&self, engine: SearchEngine) -> PathBuf {
        PathBuf::from(self.artifact_path.replace(ENGINE_PLACEHOLDER, engine.as_str()))
    }

    /// Searches for a keyword and returns the hits in feed order
    ///
    /// # Errors
    ///
    /// * `LanternError::Network` - Transport failure, timeout or non-2xx status
    /// * `LanternError::Parse` - The body is not an RSS/Atom feed
    ///
    /// A well-formed feed with no usable items is not an error: the raw body
    /// is written to the diagnostic artifact and an empty list is returned.
    pub async fn search(&self, engine: SearchEngine, keyword: &str) -> Result<Vec<SearchHit>> {
        let url = self.query_url(engine, keyword);
        tracing::debug!("Searching {}: {}", engine, url);

        let response = self
            .clients
            .pick()
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LanternError::network(url.as_str(), &e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| LanternError::network(url.as_str(), &e))?;

        let hits = match parse_feed(&body) {
            Ok(hits) => hits,
            Err(message) => {
                self.log_failure(engine, keyword, REASON_NOT_A_FEED, body.len())
                    .await;
                return Err(LanternError::Parse {
                    url: url.to_string(),
                    message,
                });
            }
        };

        if hits.is_empty() {
            let artifact = self.artifact_path(engine);
            tracing::warn!(
                "No results found for '{}' on {}. Saving response to {}",
                keyword,
                engine,
                artifact.display()
            );
            if let Err(e) = tokio::fs::write(&artifact, &body).await {
                tracing::warn!(
                    "Failed to write diagnostic artifact {}: {}",
                    artifact.display(),
                    e
                );
            }
            self.log_failure(engine, keyword, REASON_NO_RESULTS, body.len())
                .await;
        } else {
            tracing::debug!("Search for '{}' returned {} hits", keyword, hits.len());
        }

        Ok(hits)
    }

    /// Appends one line to the failure log; errors are only logged
    async fn log_failure(&self, engine: SearchEngine, keyword: &str, reason: &str, body_len: usize) {
        let Some(path) = &self.failure_log else {
            return;
        };

        let entry = SearchFailure {
            timestamp: Utc::now().to_rfc3339(),
            engine,
            keyword: keyword.to_string(),
            reason: reason.to_string(),
            body_len,
        };
        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to encode search failure entry: {}", e);
                return;
            }
        };
        line.push('\n');

        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(e) = written {
            tracing::warn!(
                "Failed to append to search failure log {}: {}",
                path.display(),
                e
            );
        }
    }
}

/// Parses an RSS or Atom feed body into search hits
///
/// Returns an error message if the body is not a feed.
pub fn parse_feed(body: &[u8]) -> std::result::Result<Vec<SearchHit>, String> {
    let feed = feed_rs::parser::parse(body).map_err(|e| e.to_string())?;

    let hits = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty())?;

            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NO_TITLE.to_string());

            let snippet = entry
                .summary
                .map(|s| s.content.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NO_SNIPPET.to_string());

            Some(SearchHit {
                title,
                link: resolve_redirect_link(&link),
                snippet,
            })
        })
        .collect();

    Ok(hits)
}

/// Unwraps search-engine click-tracking links to their destination
///
/// Handles Bing `/ck/a?...&u=a1<base64>` and Google `/url?url=<dest>` links.
/// Anything else, including links that fail to decode, is returned unchanged.
pub fn resolve_redirect_link(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        return link.to_string();
    };
    let host = url.host_str().unwrap_or_default();

    if host.ends_with("bing.com") && url.path() == "/ck/a" {
        if let Some(encoded) = query_param(&url, "u") {
            let encoded = encoded.strip_prefix("a1").unwrap_or(&encoded);
            if let Some(decoded) = decode_base64_url(encoded) {
                return decoded;
            }
        }
    }

    if host.contains("google.") && url.path() == "/url" {
        for key in ["url", "q"] {
            if let Some(dest) = query_param(&url, key) {
                if is_http_url(&dest) {
                    return dest;
                }
            }
        }
    }

    link.to_string()
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn decode_base64_url(encoded: &str) -> Option<String> {
    let trimmed = encoded.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    is_http_url(&decoded).then_some(decoded)
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}
