//! Storage traits and error types
//!
//! This module defines the trait interface for task store backends and
//! associated error types.

use crate::config::SearchEngine;
use crate::state::TaskStatus;
use crate::storage::{TaskRecord, TaskResults, TaskSummary};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Corrupt record {task_id}: unknown {column} '{value}'")]
    CorruptRecord {
        task_id: String,
        column: &'static str,
        value: String,
    },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage pool is closed")]
    PoolClosed,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for task store implementations
///
/// Records are keyed by task id. A record is created once in `Processing`
/// and receives exactly one terminal write; implementations must reject a
/// terminal write on a record that already left `Processing`.
pub trait TaskStore {
    /// Inserts a new task in `Processing` and returns the stored record
    ///
    /// Fails with `ConstraintViolation` if the id already exists.
    fn create_task(
        &mut self,
        task_id: &str,
        keyword: &str,
        engine: SearchEngine,
    ) -> StorageResult<TaskRecord>;

    /// Gets a task by id
    fn get_task(&self, task_id: &str) -> StorageResult<Option<TaskRecord>>;

    /// Gets only the status of a task
    fn get_status(&self, task_id: &str) -> StorageResult<Option<TaskStatus>>;

    /// Writes the collected results and moves the task to `Completed`
    ///
    /// Fails with `TaskNotFound` or `InvalidTransition` when the record is
    /// missing or already terminal; nothing is written then.
    fn complete_task(&mut self, task_id: &str, results: &TaskResults) -> StorageResult<()>;

    /// Records an error summary and moves the task to `Failed`
    fn fail_task(&mut self, task_id: &str, error: &str) -> StorageResult<()>;

    /// Lists the most recent tasks, newest first
    fn list_tasks(&self, limit: u32) -> StorageResult<Vec<TaskSummary>>;

    /// Counts tasks in the given status
    fn count_by_status(&self, status: TaskStatus) -> StorageResult<u64>;
}
