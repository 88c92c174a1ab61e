//! Error taxonomy for dispensing operations.

use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors returned synchronously by engine and store operations.
///
/// Dispense faults are not errors: they are recorded as `Error` state on the
/// job and its attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispenseError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is {status}, expected waiting")]
    InvalidState { job_id: JobId, status: JobStatus },

    #[error("Dispenser is busy with job {active}")]
    AlreadyBusy { active: JobId },

    #[error("Engine error: {0}")]
    Engine(String),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid dispense config: {0}")]
    InvalidConfig(String),
}
