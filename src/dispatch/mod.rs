//! Background execution of crawl tasks
//!
//! Submissions are pushed onto a bounded queue and drained by a fixed set of
//! worker tasks. Enqueueing never waits: a full queue is reported to the
//! caller straight away. Every pipeline run is spawned on its own task so a
//! panic inside it is caught at the worker and recorded on the task.

use crate::config::SearchEngine;
use crate::crawler::TaskPipeline;
use crate::state::TaskStatus;
use crate::{LanternError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// A unit of background work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub task_id: String,
    pub keyword: String,
    pub engine: SearchEngine,
}

/// Cloneable handle used to schedule jobs on the worker pool
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<CrawlJob>,
    capacity: usize,
}

/// Join handles of the running workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Starts `workers` background workers sharing a queue of `capacity` jobs
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(pipeline: Arc<TaskPipeline>, workers: usize, capacity: usize) -> (Self, WorkerPool) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let pipeline = Arc::clone(&pipeline);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(worker_loop(worker_id, pipeline, receiver))
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Started {} crawl workers (queue capacity: {})",
            handles.len(),
            capacity
        );

        (Self { sender, capacity }, WorkerPool { handles })
    }

    /// Queues a job without waiting
    ///
    /// # Errors
    ///
    /// `LanternError::Dispatch` if the queue is full or the workers are gone.
    pub fn enqueue(&self, job: CrawlJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => LanternError::Dispatch(format!(
                "queue full ({} pending), task {} not scheduled",
                self.capacity, job.task_id
            )),
            mpsc::error::TrySendError::Closed(job) => LanternError::Dispatch(format!(
                "workers have shut down, task {} not scheduled",
                job.task_id
            )),
        })
    }

    /// Number of jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for all workers to exit
    ///
    /// Workers exit once every [`Dispatcher`] clone has been dropped and the
    /// queue is drained.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Crawl worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    pipeline: Arc<TaskPipeline>,
    receiver: Arc<Mutex<mpsc::Receiver<CrawlJob>>>,
) {
    tracing::debug!("Worker {} started", worker_id);

    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        let status = run_job(&pipeline, job.clone()).await;
        tracing::debug!("Worker {} finished task {}: {}", worker_id, job.task_id, status);
    }

    tracing::debug!("Worker {} stopped", worker_id);
}

/// Runs one job in its own task and records a crash as a failure
async fn run_job(pipeline: &Arc<TaskPipeline>, job: CrawlJob) -> TaskStatus {
    let task_pipeline = Arc::clone(pipeline);
    let CrawlJob {
        task_id,
        keyword,
        engine,
    } = job;
    let run_id = task_id.clone();

    let handle = tokio::spawn(async move { task_pipeline.run(&run_id, &keyword, engine).await });
    settle(pipeline, &task_id, handle).await
}

/// Waits for a spawned run; a panicked or cancelled run is recorded as `Failed`
async fn settle(
    pipeline: &TaskPipeline,
    task_id: &str,
    handle: JoinHandle<TaskStatus>,
) -> TaskStatus {
    match handle.await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("Task {} crashed: {}", task_id, e);
            pipeline
                .record_failure(task_id, &format!("Task crashed: {}", e))
                .await
        }
    }
}
