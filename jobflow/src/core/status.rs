//! Job lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a job.
///
/// Transitions are one-directional: `Pending -> Running -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued and has not been picked up by a worker.
    #[default]
    Pending,
    /// Job is currently being executed by a worker.
    Running,
    /// Job finished successfully.
    Completed,
    /// Job exhausted its attempts or was cancelled mid-flight.
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Running, Self::Completed, Self::Failed];

    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}
