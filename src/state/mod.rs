//! State module for the crawl task lifecycle
//!
//! # Components
//!
//! - `TaskStatus`: the durable status a polling client observes
//!   (processing, completed, failed)

mod task_state;

pub use task_state::TaskStatus;
