//! Core domain types for the medication dispense queue.
//!
//! This crate contains shared types used across all packages:
//! - Job, PrescriptionRef and BoxNumber for queued work
//! - DispenseAttempt and AttemptPhase for dispensing history
//! - QueueStore and RecordStore, the in-memory stores the engine owns
//! - Events for real-time updates

mod attempt;
mod config;
mod error;
mod events;
mod history;
mod job;
mod prescription;
mod queue;

pub use attempt::{AttemptId, AttemptPhase, DispenseAttempt};
pub use config::DispenseConfig;
pub use error::{ConfigError, DispenseError};
pub use events::DispenseEvent;
pub use history::RecordStore;
pub use job::{BOX_COUNT, BoxNumber, Job, JobId, JobStatus, PrescriptionRef};
pub use prescription::{PatientRef, Prescription, PrescriptionStatus, select_dispensable};
pub use queue::{QueueStats, QueueStore};
