//! Storage module for persisting crawl tasks
//!
//! This module handles all database operations for the task store, including:
//! - SQLite database initialization and schema management
//! - Task creation and the single terminal write per task
//! - Scoped store handles drawn from an explicit pool

mod pool;
mod schema;
mod sqlite;
mod traits;

pub use pool::{StoragePool, StoreHandle};
pub use sqlite::SqliteTaskStore;
pub use traits::{StorageError, StorageResult, TaskStore};

use crate::config::SearchEngine;
use crate::crawler::{PageContent, SearchHit};
use crate::state::TaskStatus;

/// Represents a task in the database
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub keyword: String,
    pub engine: SearchEngine,
    pub status: TaskStatus,
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

/// Short form of a task used for listings
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub keyword: String,
    pub engine: SearchEngine,
    pub status: TaskStatus,
    pub created_at: String,
}

/// Everything a pipeline run collects for its terminal write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResults {
    /// Search hits in the order the search engine returned them
    pub hits: Vec<SearchHit>,

    /// The first hit's page, or a placeholder describing the fetch error.
    /// `None` when there were no hits to fetch.
    pub page: Option<PageContent>,
}
