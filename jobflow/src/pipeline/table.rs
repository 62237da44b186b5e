//! The lock-protected job table.
//!
//! All status transitions go through here. The write lock is held only for
//! the in-memory update and is never held across an await point.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::core::{Job, JobId, JobStatus};
use crate::errors::{JobflowError, Result};

use super::PipelineStats;

/// Position of a job in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct JobSlot(pub(super) usize);

#[derive(Debug, Default)]
struct TableInner {
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    sealed: bool,
}

impl TableInner {
    fn job_mut(&mut self, slot: JobSlot) -> Result<&mut Job> {
        self.jobs
            .get_mut(slot.0)
            .ok_or_else(|| JobflowError::JobNotFound(JobId::new(format!("slot-{}", slot.0))))
    }

    fn transition(&mut self, slot: JobSlot, to: JobStatus) -> Result<&mut Job> {
        let job = self.job_mut(slot)?;
        let from = job.status();
        if !from.can_transition_to(to) {
            return Err(JobflowError::InvalidTransition {
                job_id: job.id().clone(),
                from,
                to,
            });
        }
        job.set_status(to);
        Ok(job)
    }
}

/// Ordered job sequence guarded by a single reader/writer lock.
#[derive(Debug, Default)]
pub(crate) struct JobTable {
    inner: RwLock<TableInner>,
}

impl JobTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a job, stamping it pending.
    pub(crate) fn insert(&self, mut job: Job) -> Result<JobSlot> {
        let mut inner = self.inner.write();
        if inner.sealed {
            return Err(JobflowError::AlreadyStarted);
        }
        if inner.index.contains_key(job.id()) {
            return Err(JobflowError::DuplicateJob(job.id().clone()));
        }

        job.stamp_pending();
        let slot = inner.jobs.len();
        inner.index.insert(job.id().clone(), slot);
        inner.jobs.push(job);
        Ok(JobSlot(slot))
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().jobs.len()
    }

    /// Closes the table to new jobs and returns the snapshot a run dispatches from.
    pub(crate) fn seal(&self) -> Vec<(JobSlot, Job)> {
        let mut inner = self.inner.write();
        inner.sealed = true;
        inner
            .jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (JobSlot(i), job.clone()))
            .collect()
    }

    pub(crate) fn jobs(&self) -> Vec<Job> {
        self.inner.read().jobs.clone()
    }

    pub(crate) fn find(&self, id: &JobId) -> Option<Job> {
        let inner = self.inner.read();
        inner.index.get(id).and_then(|&i| inner.jobs.get(i)).cloned()
    }

    /// `Pending -> Running`; returns the job as the processor should see it.
    pub(crate) fn start(&self, slot: JobSlot) -> Result<Job> {
        let mut inner = self.inner.write();
        let job = inner.transition(slot, JobStatus::Running)?;
        Ok(job.clone())
    }

    /// Records that retry number `retry` is about to run.
    pub(crate) fn record_retry(&self, slot: JobSlot, retry: u32) -> Result<()> {
        let mut inner = self.inner.write();
        inner.job_mut(slot)?.set_retry_count(retry);
        Ok(())
    }

    /// `Running -> Completed | Failed`.
    pub(crate) fn finish(&self, slot: JobSlot, status: JobStatus, retry_count: u32) -> Result<()> {
        let mut inner = self.inner.write();
        let job = inner.transition(slot, status)?;
        job.set_retry_count(retry_count);
        Ok(())
    }

    pub(crate) fn stats(&self) -> PipelineStats {
        let inner = self.inner.read();
        PipelineStats::from_statuses(inner.jobs.iter().map(Job::status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(ids: &[&str]) -> (JobTable, Vec<JobSlot>) {
        let table = JobTable::new();
        let slots = ids
            .iter()
            .map(|id| table.insert(Job::new(*id, "test")).unwrap())
            .collect();
        (table, slots)
    }

    #[test]
    fn test_insert_preserves_order() {
        let (table, _) = table_with(&["c", "a", "b"]);
        let ids: Vec<String> = table
            .jobs()
            .iter()
            .map(|j| j.id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let (table, _) = table_with(&["a"]);
        let err = table.insert(Job::new("a", "again")).unwrap_err();
        assert!(matches!(err, JobflowError::DuplicateJob(id) if id.as_str() == "a"));
    }

    #[test]
    fn test_sealed_table_rejects_inserts() {
        let (table, _) = table_with(&["a", "b"]);
        let snapshot = table.seal();
        assert_eq!(snapshot.len(), 2);

        let err = table.insert(Job::new("c", "late")).unwrap_err();
        assert!(matches!(err, JobflowError::AlreadyStarted));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lifecycle() {
        let (table, slots) = table_with(&["a"]);

        let job = table.start(slots[0]).unwrap();
        assert_eq!(job.status(), JobStatus::Running);

        table.record_retry(slots[0], 2).unwrap();
        assert_eq!(table.find(&JobId::new("a")).unwrap().retry_count(), 2);

        table.finish(slots[0], JobStatus::Completed, 2).unwrap();
        let job = table.find(&JobId::new("a")).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.retry_count(), 2);
    }

    #[test]
    fn test_terminal_jobs_cannot_restart() {
        let (table, slots) = table_with(&["a"]);
        table.start(slots[0]).unwrap();
        table.finish(slots[0], JobStatus::Failed, 3).unwrap();

        let err = table.start(slots[0]).unwrap_err();
        assert!(matches!(
            err,
            JobflowError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Running,
                ..
            }
        ));
    }

    #[test]
    fn test_pending_cannot_finish_directly() {
        let (table, slots) = table_with(&["a"]);
        assert!(table.finish(slots[0], JobStatus::Completed, 0).is_err());
    }

    #[test]
    fn test_stats_track_transitions() {
        let (table, slots) = table_with(&["a", "b", "c"]);
        table.start(slots[0]).unwrap();
        table.start(slots[1]).unwrap();
        table.finish(slots[1], JobStatus::Completed, 0).unwrap();

        let stats = table.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.accounted(), stats.total);
    }
}
