//! Request and response bodies for the crawl API

use crate::config::SearchEngine;
use crate::crawler::SearchHit;
use crate::state::TaskStatus;
use crate::storage::{TaskRecord, TaskSummary};
use serde::{Deserialize, Serialize};

/// Body of a crawl submission
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    pub keyword: String,

    /// `bing` or `google`; the configured default engine when absent
    #[serde(default)]
    pub engine: Option<String>,
}

/// Returned once a task record exists and the run is queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub task_id: String,
    pub message: String,
}

/// Full task record as seen by a polling client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub status: TaskStatus,
    pub keyword: String,
    pub engine: SearchEngine,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub results: Vec<SearchHit>,
    pub first_page_html: Option<String>,
    pub extracted_text: Option<String>,
    pub meta_description: Option<String>,
    pub meta_author: Option<String>,
    pub meta_date: Option<String>,
    pub error: Option<String>,
}

impl From<TaskRecord> for TaskView {
    fn from(record: TaskRecord) -> Self {
        Self {
            status: record.status,
            keyword: record.keyword,
            engine: record.engine,
            created_at: record.created_at,
            completed_at: record.completed_at,
            results: record.results,
            first_page_html: record.first_page_html,
            extracted_text: record.extracted_text,
            meta_description: record.meta_description,
            meta_author: record.meta_author,
            meta_date: record.meta_date,
            error: record.error,
        }
    }
}

/// One row of the task listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub keyword: String,
    pub engine: SearchEngine,
    pub status: TaskStatus,
    pub created_at: String,
}

impl From<TaskSummary> for TaskListItem {
    fn from(summary: TaskSummary) -> Self {
        Self {
            id: summary.id,
            keyword: summary.keyword,
            engine: summary.engine,
            status: summary.status,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
