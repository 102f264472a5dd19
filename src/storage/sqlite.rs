//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the TaskStore trait.

use crate::config::SearchEngine;
use crate::crawler::SearchHit;
use crate::state::TaskStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, TaskStore};
use crate::storage::{TaskRecord, TaskResults, TaskSummary};
use chrono::Utc;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TASK_COLUMNS: &str = "id, keyword, engine, status, created_at, completed_at, results_json,
     first_page_html, extracted_text, meta_description, meta_author, meta_date, error_message";

/// SQLite task store backend
pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Opens (or creates) the task database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteTaskStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets pollers read while a pipeline run writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs one terminal write inside an immediate transaction
    ///
    /// The stored status is checked against [`TaskStatus::can_transition_to`]
    /// under the write lock, so two writers can never both leave `Processing`.
    /// `write` receives the transaction and the completion timestamp.
    fn terminal_write<F>(&mut self, task_id: &str, to: TaskStatus, write: F) -> StorageResult<()>
    where
        F: FnOnce(&Transaction<'_>, &str) -> rusqlite::Result<usize>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Err(StorageError::TaskNotFound(task_id.to_string()));
        };

        let from = parse_status(task_id, &stored)?;
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition {
                task_id: task_id.to_string(),
                from,
                to,
            });
        }

        write(&tx, &Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(())
    }
}

fn parse_status(task_id: &str, value: &str) -> StorageResult<TaskStatus> {
    TaskStatus::from_db_string(value).ok_or_else(|| StorageError::CorruptRecord {
        task_id: task_id.to_string(),
        column: "status",
        value: value.to_string(),
    })
}

fn parse_engine(task_id: &str, value: &str) -> StorageResult<SearchEngine> {
    value
        .parse::<SearchEngine>()
        .map_err(|_| StorageError::CorruptRecord {
            task_id: task_id.to_string(),
            column: "engine",
            value: value.to_string(),
        })
}

/// A `tasks` row before its enum and JSON columns are decoded
struct TaskRow {
    id: String,
    keyword: String,
    engine: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    results_json: Option<String>,
    first_page_html: Option<String>,
    extracted_text: Option<String>,
    meta_description: Option<String>,
    meta_author: Option<String>,
    meta_date: Option<String>,
    error: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            keyword: row.get(1)?,
            engine: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            completed_at: row.get(5)?,
            results_json: row.get(6)?,
            first_page_html: row.get(7)?,
            extracted_text: row.get(8)?,
            meta_description: row.get(9)?,
            meta_author: row.get(10)?,
            meta_date: row.get(11)?,
            error: row.get(12)?,
        })
    }

    fn into_record(self) -> StorageResult<TaskRecord> {
        let results = match &self.results_json {
            Some(json) => serde_json::from_str::<Vec<SearchHit>>(json)?,
            None => Vec::new(),
        };

        Ok(TaskRecord {
            engine: parse_engine(&self.id, &self.engine)?,
            status: parse_status(&self.id, &self.status)?,
            id: self.id,
            keyword: self.keyword,
            created_at: self.created_at,
            completed_at: self.completed_at,
            results,
            first_page_html: self.first_page_html,
            extracted_text: self.extracted_text,
            meta_description: self.meta_description,
            meta_author: self.meta_author,
            meta_date: self.meta_date,
            error: self.error,
        })
    }
}

impl TaskStore for SqliteTaskStore {
    fn create_task(
        &mut self,
        task_id: &str,
        keyword: &str,
        engine: SearchEngine,
    ) -> StorageResult<TaskRecord> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO tasks (id, keyword, engine, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task_id,
                keyword,
                engine.as_str(),
                TaskStatus::Processing.to_db_string(),
                now
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StorageError::ConstraintViolation(format!(
                    "Task id {} already exists",
                    task_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(TaskRecord {
            id: task_id.to_string(),
            keyword: keyword.to_string(),
            engine,
            status: TaskStatus::Processing,
            created_at: now,
            completed_at: None,
            results: Vec::new(),
            first_page_html: None,
            extracted_text: None,
            meta_description: None,
            meta_author: None,
            meta_date: None,
            error: None,
        })
    }

    fn get_task(&self, task_id: &str) -> StorageResult<Option<TaskRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))?;

        stmt.query_row(params![task_id], TaskRow::from_row)
            .optional()?
            .map(TaskRow::into_record)
            .transpose()
    }

    fn get_status(&self, task_id: &str) -> StorageResult<Option<TaskStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;

        status.map(|s| parse_status(task_id, &s)).transpose()
    }

    fn complete_task(&mut self, task_id: &str, results: &TaskResults) -> StorageResult<()> {
        let results_json = serde_json::to_string(&results.hits)?;
        let page = results.page.as_ref();

        self.terminal_write(task_id, TaskStatus::Completed, |tx, now| {
            tx.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2, results_json = ?3,
                 first_page_html = ?4, extracted_text = ?5, meta_description = ?6,
                 meta_author = ?7, meta_date = ?8
                 WHERE id = ?9",
                params![
                    TaskStatus::Completed.to_db_string(),
                    now,
                    results_json,
                    page.map(|p| p.html.as_str()),
                    page.and_then(|p| p.text.as_deref()),
                    page.and_then(|p| p.meta_description.as_deref()),
                    page.and_then(|p| p.meta_author.as_deref()),
                    page.and_then(|p| p.meta_date.as_deref()),
                    task_id,
                ],
            )
        })
    }

    fn fail_task(&mut self, task_id: &str, error: &str) -> StorageResult<()> {
        self.terminal_write(task_id, TaskStatus::Failed, |tx, now| {
            tx.execute(
                "UPDATE tasks SET status = ?1, completed_at = ?2, error_message = ?3
                 WHERE id = ?4",
                params![TaskStatus::Failed.to_db_string(), now, error, task_id],
            )
        })
    }

    fn list_tasks(&self, limit: u32) -> StorageResult<Vec<TaskSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, keyword, engine, status, created_at FROM tasks
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, keyword, engine, status, created_at)| {
                Ok(TaskSummary {
                    engine: parse_engine(&id, &engine)?,
                    status: parse_status(&id, &status)?,
                    id,
                    keyword,
                    created_at,
                })
            })
            .collect()
    }

    fn count_by_status(&self, status: TaskStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
