//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: Tracks the lifecycle of a crawl task (queued, running, completed, failed)

mod task_state;

pub use task_state::TaskState;
