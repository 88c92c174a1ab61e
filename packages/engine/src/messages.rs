//! Message types for actor communication.

use dispense_core::{
    AttemptId, BoxNumber, DispenseAttempt, DispenseError, Job, JobId, JobStatus, PatientRef,
    PrescriptionRef, QueueStats,
};
use ractor::RpcReplyPort;
use serde::{Deserialize, Serialize};

/// Snapshot of the dispenser's single-flight state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub active_job_id: Option<JobId>,
    pub busy: bool,
}

/// Where a running job's pipeline resumes when a timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The dispenser acknowledged the command for this attempt.
    Acknowledge { attempt_id: AttemptId },
    /// The dispenser finished releasing medication for this attempt.
    Resolve { attempt_id: AttemptId },
    /// Begin the prescription at `index`.
    Next { index: usize },
}

/// A timer expiry, tagged with the run generation it was scheduled under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStep {
    pub job_id: JobId,
    pub generation: u64,
    pub stage: Stage,
}

/// Messages for the DispenseActor.
#[derive(Debug)]
pub enum EngineMessage {
    /// Enqueue a new job.
    Enqueue {
        patient: PatientRef,
        prescriptions: Vec<PrescriptionRef>,
        reply: RpcReplyPort<Result<Job, DispenseError>>,
    },

    /// Start (or resume) a waiting job.
    Start {
        job_id: JobId,
        reply: RpcReplyPort<Result<Job, DispenseError>>,
    },

    /// Return the processing job, if any, to the queue.
    Pause { reply: RpcReplyPort<Option<Job>> },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// List jobs in enqueue order.
    ListJobs {
        status_filter: Option<JobStatus>,
        reply: RpcReplyPort<Vec<Job>>,
    },

    /// Get the oldest waiting job.
    NextWaiting { reply: RpcReplyPort<Option<Job>> },

    /// Get the last `limit` attempts.
    History {
        limit: usize,
        reply: RpcReplyPort<Vec<DispenseAttempt>>,
    },

    /// Get the last `limit` attempts for one box.
    BoxHistory {
        box_number: BoxNumber,
        limit: usize,
        reply: RpcReplyPort<Vec<DispenseAttempt>>,
    },

    /// Get every attempt recorded for a job.
    JobHistory {
        job_id: JobId,
        reply: RpcReplyPort<Vec<DispenseAttempt>>,
    },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Get the run state.
    GetRunState { reply: RpcReplyPort<RunState> },

    /// A pipeline timer expired.
    Step(PipelineStep),

    /// Shutdown the engine.
    Shutdown,
}
