/// Task status definitions for the crawl task lifecycle
///
/// A task is persisted as `Processing` at submission and receives exactly one
/// terminal write: `Completed` from the pipeline's final step, or `Failed`
/// when the run hit an unexpected error.
use serde::Serialize;
use std::fmt;

/// Represents the durable status of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    // ===== Active States =====
    /// Task record exists and its pipeline run has not written a result yet
    Processing,

    // ===== Terminal States =====
    /// Pipeline run finished, possibly with degraded results
    Completed,

    /// Pipeline run aborted on an unexpected error (storage, dispatch, panic)
    Failed,
}

impl TaskStatus {
    /// Returns true if no further writes are allowed for this task
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Returns true if the status machine allows moving from `self` to `next`
    ///
    /// The only legal transitions are `Processing -> Completed` and
    /// `Processing -> Failed`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed) | (Self::Processing, Self::Failed)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible task statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Processing, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
