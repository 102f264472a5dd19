//! Task pipeline
//!
//! One run of the pipeline takes a task from `Processing` to a terminal
//! status:
//!
//! 1. Search for the keyword, retrying transient failures. A search that
//!    still fails counts as "no results".
//! 2. Fetch the first hit, retrying per the fetch policy
//! 3. If the fetch still fails, keep a placeholder page describing the error
//! 4. Write the results and mark the task `Completed`
//!
//! Search and fetch failures therefore still end in `Completed`. Only an
//! error at the terminal write is logged and recorded on the task as
//! `Failed`. A run never panics or returns an error to its caller.

use crate::config::{Config, SearchEngine};
use crate::crawler::fetcher::{PageContent, PageFetcher};
use crate::crawler::retry::{RetryOn, RetryPolicy};
use crate::crawler::search::{SearchClient, SearchHit};
use crate::state::TaskStatus;
use crate::storage::{StorageError, StoragePool, TaskResults, TaskStore};
use crate::Result;
use std::time::Duration;

/// Runs crawl tasks end to end
pub struct TaskPipeline {
    search: SearchClient,
    fetcher: PageFetcher,
    search_retry: RetryPolicy,
    fetch_retry: RetryPolicy,
    pool: StoragePool,
}

impl TaskPipeline {
    pub fn new(
        search: SearchClient,
        fetcher: PageFetcher,
        search_retry: RetryPolicy,
        fetch_retry: RetryPolicy,
        pool: StoragePool,
    ) -> Self {
        Self {
            search,
            fetcher,
            search_retry,
            fetch_retry,
            pool,
        }
    }

    /// Builds the pipeline from configuration
    ///
    /// Search retries only transient failures. Fetch retries follow
    /// `fetch.retry-on`.
    pub fn from_config(config: &Config, pool: StoragePool) -> Result<Self> {
        let search = SearchClient::new(&config.search, &config.http)?;
        let fetcher = PageFetcher::new(
            &config.http,
            Duration::from_secs(config.fetch.timeout_secs),
        )?;

        Ok(Self::new(
            search,
            fetcher,
            RetryPolicy::from_config(&config.retry, RetryOn::Transient),
            RetryPolicy::from_config(&config.retry, config.fetch.retry_on.into()),
            pool,
        ))
    }

    pub fn pool(&self) -> &StoragePool {
        &self.pool
    }

    /// Runs one task to a terminal status
    ///
    /// The task must already exist in `Processing`. Returns the status the
    /// task was left in: `Completed`, `Failed`, or `Processing` when even the
    /// failure could not be recorded.
    pub async fn run(&self, task_id: &str, keyword: &str, engine: SearchEngine) -> TaskStatus {
        tracing::info!(
            "Starting task {} for keyword: {} ({})",
            task_id,
            keyword,
            engine
        );

        let results = self.collect(keyword, engine).await;

        match self.store_results(task_id, &results).await {
            Ok(()) => {
                tracing::info!(
                    "Task {} completed with {} results",
                    task_id,
                    results.hits.len()
                );
                TaskStatus::Completed
            }
            Err(e) => {
                tracing::error!("Error processing task {}: {}", task_id, e);
                self.record_failure(task_id, &e.to_string()).await
            }
        }
    }

    /// Searches and fetches without touching storage
    ///
    /// Never fails: a failed search yields no hits and a failed fetch yields
    /// a placeholder page.
    pub async fn collect(&self, keyword: &str, engine: SearchEngine) -> TaskResults {
        let hits = match self
            .search_retry
            .run("Search", || self.search.search(engine, keyword))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Search failed after retries: {}", e);
                Vec::new()
            }
        };

        let page = match hits.first() {
            Some(first) => Some(self.fetch_first(first).await),
            None => {
                tracing::warn!("No search results found for keyword: {}", keyword);
                None
            }
        };

        TaskResults { hits, page }
    }

    async fn fetch_first(&self, hit: &SearchHit) -> PageContent {
        tracing::info!("Fetching first result: {}", hit.link);

        match self
            .fetch_retry
            .run("Fetch", || self.fetcher.fetch(&hit.link))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Page fetch failed after retries: {}", e);
                PageContent::fetch_error(&e)
            }
        }
    }

    async fn store_results(&self, task_id: &str, results: &TaskResults) -> Result<()> {
        let mut store = self.pool.acquire().await?;
        store.complete_task(task_id, results)?;
        Ok(())
    }

    /// Best-effort transition to `Failed`
    ///
    /// Returns the status the task is left in. If the record already reached
    /// a terminal status that status is returned unchanged.
    pub async fn record_failure(&self, task_id: &str, error: &str) -> TaskStatus {
        let outcome = match self.pool.acquire().await {
            Ok(mut store) => store.fail_task(task_id, error),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => TaskStatus::Failed,
            Err(StorageError::InvalidTransition { from, .. }) => {
                tracing::warn!("Task {} already {}; failure not recorded", task_id, from);
                from
            }
            Err(e) => {
                tracing::error!(
                    "Could not record failure for task {}: {}. Task remains processing",
                    task_id,
                    e
                );
                TaskStatus::Processing
            }
        }
    }
}
