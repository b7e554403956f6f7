/// Task state definitions for tracking crawl progress
///
/// This module defines the lifecycle of a crawl task inside the scheduler.
use std::fmt;

/// Represents the current state of a crawl task
///
/// Tasks move `Queued → Running → {Completed, Failed}`. Terminal states are
/// never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Task is waiting in the queue
    Queued,

    /// Task has been picked up by a worker and its adapter is running
    Running,

    /// Adapter ran to completion (possibly producing nothing)
    Completed,

    /// Adapter could not be built, or every fetch it attempted failed
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if this is an active state (task may still produce discoveries)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether moving from `self` to `next` follows the task lifecycle
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Returns the lowercase label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
