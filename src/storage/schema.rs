//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Lantern Crawl task store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per submitted crawl task
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    keyword TEXT NOT NULL,
    engine TEXT NOT NULL DEFAULT 'bing',
    status TEXT NOT NULL DEFAULT 'processing',
    created_at TEXT NOT NULL,
    completed_at TEXT,

    -- Search hits as a JSON array of {title, link, snippet}
    results_json TEXT,
    first_page_html TEXT,

    -- Fields extracted from the first page
    extracted_text TEXT,
    meta_description TEXT,
    meta_author TEXT,
    meta_date TEXT,

    -- Error summary for failed tasks
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_keyword ON tasks(keyword);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
"#;

/// Initializes the database schema
///
/// Safe to call on every connection: all statements are `IF NOT EXISTS`,
/// and databases created before the `engine` column existed gain it here.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;

    let has_engine: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('tasks') WHERE name = 'engine'",
        [],
        |row| row.get(0),
    )?;
    if !has_engine {
        tracing::info!("Running migration: adding 'engine' column to tasks table");
        conn.execute_batch("ALTER TABLE tasks ADD COLUMN engine TEXT NOT NULL DEFAULT 'bing'")?;
    }
    Ok(())
}
