//! Aggregate job counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::JobStatus;

/// Snapshot of how many jobs are in each status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Every job known to the pipeline.
    pub total: usize,
    /// Jobs not yet picked up (including jobs rejected by validation).
    pub pending: usize,
    /// Jobs currently executing.
    pub running: usize,
    /// Jobs that completed successfully.
    pub completed: usize,
    /// Jobs that ended in failure.
    pub failed: usize,
}

impl PipelineStats {
    /// Counts a sequence of statuses.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            match status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Count for one status bucket.
    #[must_use]
    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    /// Sum of all status buckets. Always equal to `total`.
    #[must_use]
    pub fn accounted(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }

    /// Jobs in a terminal state.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Returns true if no job is currently executing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.running == 0
    }

    /// Stats keyed by `"total"` and the status names.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        map.insert("total".to_string(), self.total);
        for status in JobStatus::ALL {
            map.insert(status.to_string(), self.count(status));
        }
        map
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} pending={} running={} completed={} failed={}",
            self.total, self.pending, self.running, self.completed, self.failed
        )
    }
}
