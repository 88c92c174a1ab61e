//! Ordered in-memory store of dispensing jobs.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, JobStatus};

/// Counts of jobs by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub waiting: u64,
    pub processing: u64,
    pub completed: u64,
    pub error: u64,
}

impl QueueStats {
    /// Jobs not yet in a terminal state.
    pub fn active(&self) -> u64 {
        self.waiting + self.processing
    }

    /// Jobs that reached a terminal state.
    pub fn processed(&self) -> u64 {
        self.completed + self.error
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}

/// Jobs in insertion order. Jobs are never removed.
#[derive(Debug, Default)]
pub struct QueueStore {
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job and return its id.
    pub fn enqueue(&mut self, job: Job) -> JobId {
        let id = job.id;
        self.index.insert(id, self.jobs.len());
        self.jobs.push(job);
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.index.get(&id).map(|&i| &self.jobs[i])
    }

    /// All jobs in the order they were enqueued.
    pub fn list_ordered(&self) -> &[Job] {
        &self.jobs
    }

    /// The oldest waiting job.
    pub fn next_waiting(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.status == JobStatus::Waiting)
    }

    /// Number of jobs still waiting to be started.
    pub fn waiting_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Waiting)
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Set a job's status.
    ///
    /// Missing jobs and jobs already in a terminal state are left untouched;
    /// returns whether anything changed.
    pub fn update_status(&mut self, id: JobId, status: JobStatus) -> bool {
        match self.get_mut(id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = status;
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Move a job's cursor. Same no-op rules as [`QueueStore::update_status`];
    /// the index is clamped to the prescription count.
    pub fn advance_index(&mut self, id: JobId, new_index: usize) -> bool {
        match self.get_mut(id) {
            Some(job) if !job.status.is_terminal() => {
                job.current_index = new_index.min(job.prescriptions.len());
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Count jobs by status.
    pub fn stats(&self) -> QueueStats {
        self.jobs
            .iter()
            .fold(QueueStats::default(), |mut stats, job| {
                match job.status {
                    JobStatus::Waiting => stats.waiting += 1,
                    JobStatus::Processing => stats.processing += 1,
                    JobStatus::Completed => stats.completed += 1,
                    JobStatus::Error => stats.error += 1,
                }
                stats
            })
    }

    fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        let i = *self.index.get(&id)?;
        self.jobs.get_mut(i)
    }
}
