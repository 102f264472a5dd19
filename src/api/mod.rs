//! Submission boundary for crawl tasks
//!
//! [`CrawlService`] implements the four client operations:
//! - Submit: create a `Processing` record and queue the run
//! - Poll: read one task record
//! - List: the most recent tasks
//! - Health: a static readiness message
//!
//! Every call acquires its own store handle from the pool and releases it
//! before returning. The HTTP surface in [`routes`] is a thin mapping over
//! these operations.

pub mod routes;
mod types;

pub use types::{CrawlRequest, ErrorBody, HealthResponse, Submission, TaskListItem, TaskView};

use crate::config::SearchEngine;
use crate::dispatch::{CrawlJob, Dispatcher};
use crate::storage::{StoragePool, TaskStore};
use crate::{LanternError, Result};
use uuid::Uuid;

/// Static readiness message
pub const HEALTH_MESSAGE: &str = "Lantern crawl API is running";

/// Message returned with every accepted submission
pub const SUBMIT_MESSAGE: &str = "Crawl started";

/// Number of tasks returned by [`CrawlService::list`]
pub const LIST_LIMIT: u32 = 50;

/// Client-facing crawl operations
#[derive(Clone)]
pub struct CrawlService {
    pool: StoragePool,
    dispatcher: Dispatcher,
    default_engine: SearchEngine,
}

impl CrawlService {
    pub fn new(pool: StoragePool, dispatcher: Dispatcher, default_engine: SearchEngine) -> Self {
        Self {
            pool,
            dispatcher,
            default_engine,
        }
    }

    /// Creates a task for the keyword and queues its pipeline run
    ///
    /// The record is persisted before this returns, so an immediate poll
    /// finds it in `Processing`. The run itself happens in the background.
    ///
    /// # Errors
    ///
    /// * `InvalidRequest` - The keyword is empty or whitespace, or the engine is unknown
    /// * `Dispatch` - The run could not be queued; the record is moved to `Failed`
    /// * `Storage` - The record could not be created
    pub async fn submit(&self, keyword: &str, engine: Option<&str>) -> Result<Submission> {
        if keyword.trim().is_empty() {
            return Err(LanternError::InvalidRequest(
                "keyword must not be empty".to_string(),
            ));
        }
        let engine = match engine {
            Some(name) => name
                .parse::<SearchEngine>()
                .map_err(LanternError::InvalidRequest)?,
            None => self.default_engine,
        };

        let task_id = Uuid::new_v4().to_string();
        {
            let mut store = self.pool.acquire().await?;
            store.create_task(&task_id, keyword, engine)?;
        }

        let job = CrawlJob {
            task_id: task_id.clone(),
            keyword: keyword.to_string(),
            engine,
        };
        if let Err(e) = self.dispatcher.enqueue(job) {
            tracing::error!("Could not schedule task {}: {}", task_id, e);
            self.mark_unscheduled(&task_id, &e).await;
            return Err(e);
        }

        tracing::info!(
            "Accepted task {} for keyword: {} on {} ({} queued)",
            task_id,
            keyword,
            engine,
            self.dispatcher.pending()
        );

        Ok(Submission {
            task_id,
            message: SUBMIT_MESSAGE.to_string(),
        })
    }

    async fn mark_unscheduled(&self, task_id: &str, error: &LanternError) {
        let outcome = match self.pool.acquire().await {
            Ok(mut store) => store.fail_task(task_id, &error.to_string()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            tracing::error!("Could not mark task {} as failed: {}", task_id, e);
        }
    }

    /// Reads the full record for a task
    pub async fn poll(&self, task_id: &str) -> Result<TaskView> {
        let store = self.pool.acquire().await?;
        store
            .get_task(task_id)?
            .map(TaskView::from)
            .ok_or_else(|| LanternError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Lists the most recent tasks, newest first
    pub async fn list(&self) -> Result<Vec<TaskListItem>> {
        let store = self.pool.acquire().await?;
        let tasks = store.list_tasks(LIST_LIMIT)?;
        Ok(tasks.into_iter().map(TaskListItem::from).collect())
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            message: HEALTH_MESSAGE.to_string(),
        }
    }
}
