//! Lantern Crawl main entry point
//!
//! This is the command-line interface for the Lantern keyword crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use lantern_crawl::api::{routes, CrawlService, TaskListItem, TaskView};
use lantern_crawl::config::{default_config, load_config_with_hash, Config, SearchEngine};
use lantern_crawl::crawler::TaskPipeline;
use lantern_crawl::dispatch::Dispatcher;
use lantern_crawl::state::TaskStatus;
use lantern_crawl::storage::{StoragePool, TaskStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Lantern Crawl: keyword search and first-page extraction
///
/// Lantern searches the web for a keyword, fetches the top result, and
/// extracts its readable text and metadata. Tasks run in the background and
/// are polled by id.
#[derive(Parser, Debug)]
#[command(name = "lantern-crawl")]
#[command(version = "1.0.0")]
#[command(about = "Keyword search and first-page extraction", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and the background workers
    Serve,

    /// Run one crawl in the foreground and print the task record
    Crawl {
        /// Search keyword
        keyword: String,

        /// Search engine to query (bing or google); the configured default otherwise
        #[arg(short, long)]
        engine: Option<SearchEngine>,
    },

    /// Print the record of a task
    Status {
        /// Task identifier returned by a submission
        task_id: String,
    },

    /// List the most recent tasks and the task count per status
    Tasks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            (config, Some(hash))
        }
        None => (default_config().context("Invalid default configuration")?, None),
    };

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet, config.log_level.as_deref());

    match (&cli.config, &config_hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash);
        }
        _ => tracing::info!("Using default configuration"),
    }

    let pool = StoragePool::open(&config.storage.database_path, config.storage.max_connections)
        .with_context(|| {
            format!(
                "Failed to open task database {}",
                config.storage.database_path
            )
        })?;

    match cli.command {
        Command::Serve => handle_serve(config, pool).await,
        Command::Crawl { keyword, engine } => {
            let engine = engine.unwrap_or(config.search.default_engine);
            handle_crawl(&config, pool, &keyword, engine).await
        }
        Command::Status { task_id } => handle_status(&pool, &task_id).await,
        Command::Tasks => handle_tasks(&pool).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Command-line flags win over the configured `log-level`.
fn setup_logging(verbose: u8, quiet: bool, configured: Option<&str>) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match (verbose, configured) {
            (0, Some(level)) => EnvFilter::new(format!("lantern_crawl={},warn", level)),
            (0, None) => EnvFilter::new("lantern_crawl=info,warn"),
            (1, _) => EnvFilter::new("lantern_crawl=debug,info"),
            (2, _) => EnvFilter::new("lantern_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_pipeline(config: &Config, pool: StoragePool) -> anyhow::Result<TaskPipeline> {
    TaskPipeline::from_config(config, pool).context("Failed to build crawl pipeline")
}

/// Handles `serve`: starts the workers and the HTTP API
async fn handle_serve(config: Config, pool: StoragePool) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(&config, pool.clone())?);
    let (dispatcher, workers) = Dispatcher::start(
        pipeline,
        config.workers.count as usize,
        config.workers.queue_capacity as usize,
    );

    let service = Arc::new(CrawlService::new(
        pool,
        dispatcher,
        config.search.default_engine,
    ));
    let result = routes::serve(&config.server, service).await;

    // The router owned the last dispatcher clone; workers drain and stop
    tracing::info!("Waiting for {} workers to finish", workers.len());
    workers.join().await;

    result
}

/// Handles `crawl`: runs a single task inline
async fn handle_crawl(
    config: &Config,
    pool: StoragePool,
    keyword: &str,
    engine: SearchEngine,
) -> anyhow::Result<()> {
    if keyword.trim().is_empty() {
        anyhow::bail!("keyword must not be empty");
    }

    let pipeline = build_pipeline(config, pool.clone())?;
    let task_id = Uuid::new_v4().to_string();
    pool.acquire()
        .await?
        .create_task(&task_id, keyword, engine)?;

    let status = pipeline.run(&task_id, keyword, engine).await;
    tracing::info!("Task {} finished as {}", task_id, status);

    print_task(&pool, &task_id).await
}

/// Handles `status`: prints one task record
async fn handle_status(pool: &StoragePool, task_id: &str) -> anyhow::Result<()> {
    print_task(pool, task_id).await
}

/// Handles `tasks`: prints the most recent tasks
async fn handle_tasks(pool: &StoragePool) -> anyhow::Result<()> {
    let store = pool.acquire().await?;
    let tasks = store
        .list_tasks(lantern_crawl::api::LIST_LIMIT)?
        .into_iter()
        .map(TaskListItem::from)
        .collect::<Vec<_>>();

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    for task in &tasks {
        let status = task.status.to_string();
        println!(
            "{}  {:<10}  {:<6}  {}  {}",
            task.created_at, status, task.engine, task.id, task.keyword
        );
    }

    let counts = TaskStatus::all_statuses()
        .into_iter()
        .map(|status| Ok(format!("{}: {}", status, store.count_by_status(status)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    println!();
    println!("{}", counts.join(", "));
    Ok(())
}

async fn print_task(pool: &StoragePool, task_id: &str) -> anyhow::Result<()> {
    let store = pool.acquire().await?;
    let record = store
        .get_task(task_id)?
        .with_context(|| format!("Task not found: {}", task_id))?;

    println!("{}", serde_json::to_string_pretty(&TaskView::from(record))?);
    Ok(())
}
