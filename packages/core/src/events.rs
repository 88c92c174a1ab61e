//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AttemptId, AttemptPhase, DispenseAttempt, Job, JobId, JobStatus};

/// Events emitted by the dispense engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispenseEvent {
    // Job events
    /// A new job was enqueued.
    JobEnqueued { job: Job, timestamp: DateTime<Utc> },
    /// A job started (or resumed) processing.
    JobStarted {
        job_id: JobId,
        from_index: usize,
        timestamp: DateTime<Utc>,
    },
    /// A job moved on to another prescription.
    JobProgressed {
        job_id: JobId,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    /// Every prescription of a job was dispensed.
    JobCompleted {
        job_id: JobId,
        dispensed: usize,
        timestamp: DateTime<Utc>,
    },
    /// A dispense fault halted a job.
    JobFailed {
        job_id: JobId,
        index: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A processing job was returned to the queue.
    JobPaused {
        job_id: JobId,
        index: usize,
        timestamp: DateTime<Utc>,
    },

    // Attempt events
    /// A new attempt was appended to the history.
    AttemptRecorded {
        attempt: DispenseAttempt,
        timestamp: DateTime<Utc>,
    },
    /// An attempt moved to a later phase.
    AttemptPhaseChanged {
        attempt_id: AttemptId,
        job_id: JobId,
        old_phase: AttemptPhase,
        new_phase: AttemptPhase,
        note: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl DispenseEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DispenseEvent::JobEnqueued { timestamp, .. } => *timestamp,
            DispenseEvent::JobStarted { timestamp, .. } => *timestamp,
            DispenseEvent::JobProgressed { timestamp, .. } => *timestamp,
            DispenseEvent::JobCompleted { timestamp, .. } => *timestamp,
            DispenseEvent::JobFailed { timestamp, .. } => *timestamp,
            DispenseEvent::JobPaused { timestamp, .. } => *timestamp,
            DispenseEvent::AttemptRecorded { timestamp, .. } => *timestamp,
            DispenseEvent::AttemptPhaseChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event.
    pub fn job_id(&self) -> JobId {
        match self {
            DispenseEvent::JobEnqueued { job, .. } => job.id,
            DispenseEvent::JobStarted { job_id, .. } => *job_id,
            DispenseEvent::JobProgressed { job_id, .. } => *job_id,
            DispenseEvent::JobCompleted { job_id, .. } => *job_id,
            DispenseEvent::JobFailed { job_id, .. } => *job_id,
            DispenseEvent::JobPaused { job_id, .. } => *job_id,
            DispenseEvent::AttemptRecorded { attempt, .. } => attempt.job_id,
            DispenseEvent::AttemptPhaseChanged { job_id, .. } => *job_id,
        }
    }

    /// The job status this event leaves the job in, for job-level events.
    pub fn job_status(&self) -> Option<JobStatus> {
        match self {
            DispenseEvent::JobEnqueued { .. } | DispenseEvent::JobPaused { .. } => {
                Some(JobStatus::Waiting)
            }
            DispenseEvent::JobStarted { .. } | DispenseEvent::JobProgressed { .. } => {
                Some(JobStatus::Processing)
            }
            DispenseEvent::JobCompleted { .. } => Some(JobStatus::Completed),
            DispenseEvent::JobFailed { .. } => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Check if the event ends a job.
    pub fn is_terminal(&self) -> bool {
        self.job_status().is_some_and(|s| s.is_terminal())
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            DispenseEvent::JobEnqueued { job, .. } => format!(
                "Job {} enqueued for {} ({} medications)",
                job.id,
                job.patient_name,
                job.prescriptions.len()
            ),
            DispenseEvent::JobStarted {
                job_id, from_index, ..
            } => format!("Job {} started at item {}", job_id, from_index),
            DispenseEvent::JobProgressed { job_id, index, .. } => {
                format!("Job {} -> item {}", job_id, index)
            }
            DispenseEvent::JobCompleted {
                job_id, dispensed, ..
            } => format!("Job {} completed ({} dispensed)", job_id, dispensed),
            DispenseEvent::JobFailed {
                job_id,
                index,
                error,
                ..
            } => format!("Job {} failed at item {}: {}", job_id, index, error),
            DispenseEvent::JobPaused { job_id, index, .. } => {
                format!("Job {} paused at item {}", job_id, index)
            }
            DispenseEvent::AttemptRecorded { attempt, .. } => format!(
                "Attempt {} recorded: {} from Box {}",
                attempt.id, attempt.medication_name, attempt.box_number
            ),
            DispenseEvent::AttemptPhaseChanged {
                attempt_id,
                new_phase,
                note,
                ..
            } => {
                let note = note.as_deref().unwrap_or("no response");
                format!("Attempt {} -> {}: {}", attempt_id, new_phase, note)
            }
        }
    }
}
