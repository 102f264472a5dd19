//! Crawler module for keyword search and first-page processing
//!
//! This module contains the core crawling logic, including:
//! - Search engine feed queries
//! - HTTP fetching of the top result
//! - Metadata and main-text extraction
//! - Bounded retry with exponential backoff
//! - The task pipeline that ties them to the task store

mod extract;
mod fetcher;
mod pipeline;
mod retry;
mod search;

pub use extract::{extract_metadata, extract_text, PageMetadata, TextOptions};
pub use fetcher::{ClientRotation, PageContent, PageFetcher};
pub use pipeline::TaskPipeline;
pub use retry::{RetryOn, RetryPolicy};
pub use search::{
    parse_feed, resolve_redirect_link, SearchClient, SearchFailure, SearchHit, NO_SNIPPET,
    NO_TITLE, REASON_NOT_A_FEED, REASON_NO_RESULTS,
};
