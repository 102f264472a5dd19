//! Explicit connection pool for the task store
//!
//! The pool is built once at process start and cloned into every component
//! that touches storage. Each caller acquires a short-lived [`StoreHandle`];
//! dropping the handle closes its connection and returns the permit, so
//! release happens on every path, including early returns through `?`.

use crate::storage::sqlite::SqliteTaskStore;
use crate::storage::traits::{StorageError, StorageResult};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Shared, cloneable handle factory for the task database
#[derive(Clone)]
pub struct StoragePool {
    path: Arc<PathBuf>,
    permits: Arc<Semaphore>,
}

impl StoragePool {
    /// Opens the pool and makes sure the schema exists
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `max_connections` - Upper bound on simultaneously open handles
    pub fn open(path: impl Into<PathBuf>, max_connections: u32) -> StorageResult<Self> {
        let path = path.into();
        let max_connections = max_connections.max(1) as usize;

        // Fail fast on an unusable path instead of at the first submission
        drop(SqliteTaskStore::new(&path)?);

        tracing::debug!(
            "Opened task store at {} (max connections: {})",
            path.display(),
            max_connections
        );

        Ok(Self {
            path: Arc::new(path),
            permits: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// Waits for a free slot and opens a scoped store handle
    pub async fn acquire(&self) -> StorageResult<StoreHandle> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StorageError::PoolClosed)?;

        let store = SqliteTaskStore::new(&self.path)?;

        Ok(StoreHandle {
            store,
            _permit: permit,
        })
    }
}

/// A store connection checked out of a [`StoragePool`]
pub struct StoreHandle {
    store: SqliteTaskStore,
    _permit: OwnedSemaphorePermit,
}

impl Deref for StoreHandle {
    type Target = SqliteTaskStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for StoreHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}
