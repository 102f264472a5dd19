//! HTTP fetcher implementation
//!
//! This module handles the page download for a task, including:
//! - Building HTTP clients with browser-like headers
//! - Rotating requests across the configured proxies
//! - GET requests with a bounded timeout and redirect chain
//! - Error classification into network failures
//! - Running extraction on the downloaded HTML

use crate::config::HttpConfig;
use crate::crawler::extract::{extract_metadata, extract_text, TextOptions};
use crate::{ConfigError, LanternError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect::Policy, Client, Proxy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Maximum number of redirects followed for one request
const MAX_REDIRECTS: usize = 10;

/// Upper bound on the connect phase, independent of the total timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The first page of a task: raw HTML plus what extraction found in it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageContent {
    pub html: String,
    pub text: Option<String>,
    pub meta_description: Option<String>,
    pub meta_author: Option<String>,
    pub meta_date: Option<String>,
}

impl PageContent {
    /// Runs extraction over downloaded HTML
    pub fn from_html(html: String) -> Self {
        let metadata = extract_metadata(&html);
        let text = extract_text(&html, &TextOptions::default());

        Self {
            html,
            text,
            meta_description: metadata.description,
            meta_author: metadata.author,
            meta_date: metadata.date,
        }
    }

    /// Placeholder stored when the first page could not be fetched
    pub fn fetch_error(error: &LanternError) -> Self {
        Self {
            html: format!("Error fetching page: {}", error),
            ..Self::default()
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - Header values sent with every request
/// * `timeout` - Total request timeout
/// * `proxy` - Proxy URL every request of this client goes through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(LanternError)` - A header value or the proxy is invalid, or the client failed to build
fn build_http_client(config: &HttpConfig, timeout: Duration, proxy: Option<&str>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, header_value("accept", &config.accept)?);
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value("accept-language", &config.accept_language)?,
    );

    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        LanternError::Config(ConfigError::Validation(format!(
            "http.{} is not a valid header value",
            name
        )))
    })
}

/// HTTP clients used round-robin, one per configured proxy
///
/// With no proxies configured there is a single direct client.
pub struct ClientRotation {
    clients: Vec<Client>,
    next: AtomicUsize,
}

impl ClientRotation {
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self> {
        let clients = if config.proxies.is_empty() {
            vec![build_http_client(config, timeout, None)?]
        } else {
            tracing::debug!("Rotating requests across {} proxies", config.proxies.len());
            config
                .proxies
                .iter()
                .map(|proxy| build_http_client(config, timeout, Some(proxy)))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    /// Client for the next request
    pub fn pick(&self) -> &Client {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }
}

/// Downloads pages and extracts their content
pub struct PageFetcher {
    clients: ClientRotation,
}

impl PageFetcher {
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            clients: ClientRotation::new(config, timeout)?,
        })
    }

    /// Fetches a URL and extracts its content
    ///
    /// Any non-2xx final status is a failure. Extraction never fails the
    /// fetch: fields it cannot find are left empty.
    pub async fn fetch(&self, url: &str) -> Result<PageContent> {
        tracing::debug!("Fetching: {}", url);

        let response = self
            .clients
            .pick()
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LanternError::network(url, &e))?;

        let html = response
            .text()
            .await
            .map_err(|e| LanternError::network(url, &e))?;

        tracing::debug!("Fetched {} ({} bytes)", url, html.len());

        Ok(PageContent::from_html(html))
    }
}
