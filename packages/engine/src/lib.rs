//! Actor-based dispense queue engine.
//!
//! This crate runs the simulated medication dispenser: jobs are queued,
//! started one at a time, and driven through a timed
//! Pending -> InProgress -> Completed/Error pipeline per prescription.
//!
//! # Architecture
//!
//! - `DispenseActor` - Owns the queue and history stores; the only writer
//! - `Timer` - Delivers pipeline steps after a delay (tokio or virtual time)
//! - `DispenseOutcome` - Decides whether a dispense succeeds
//! - `DispenseEngine` - Cloneable handle exposing the async API and events
//!
//! # Usage
//!
//! ```ignore
//! use engine::DispenseEngine;
//!
//! let (engine, _handle) = DispenseEngine::spawn(DispenseConfig::default()).await?;
//! let job = engine.enqueue(patient, &prescriptions).await?;
//! engine.start(job.id).await?;
//! ```

mod dispense_actor;
mod engine;
mod messages;
mod outcome;
mod timer;

pub use dispense_actor::{DispenseActor, DispenseArgs};
pub use engine::DispenseEngine;
pub use messages::{EngineMessage, PipelineStep, RunState, Stage};
pub use outcome::{DispenseOutcome, FixedOutcome, FnOutcome, RandomOutcome};
pub use timer::{ManualTimer, Timer, TokioTimer};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};
