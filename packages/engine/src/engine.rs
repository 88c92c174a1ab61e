//! Caller-facing handle to a running dispense engine.

use std::sync::Arc;

use dispense_core::{
    BoxNumber, DispenseAttempt, DispenseConfig, DispenseError, DispenseEvent, Job, JobId,
    JobStatus, PatientRef, Prescription, PrescriptionRef, QueueStats,
};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::dispense_actor::{DispenseActor, DispenseArgs};
use crate::messages::{EngineMessage, RunState};
use crate::outcome::{DispenseOutcome, RandomOutcome};
use crate::timer::{Timer, TokioTimer};

/// Handle to a dispense engine actor.
///
/// Cheap to clone; every clone talks to the same engine. All calls are
/// answered by the actor, so reads see a consistent snapshot but may lag
/// behind a transition that is about to happen.
#[derive(Clone)]
pub struct DispenseEngine {
    actor: ActorRef<EngineMessage>,
    event_tx: broadcast::Sender<DispenseEvent>,
}

impl DispenseEngine {
    /// Spawn an engine on wall-clock time with the random fault model.
    pub async fn spawn(config: DispenseConfig) -> Result<(Self, JoinHandle<()>), DispenseError> {
        let outcome = RandomOutcome::new(config.success_probability);
        Self::spawn_with(config, Arc::new(TokioTimer), Arc::new(outcome)).await
    }

    /// Spawn an engine with an explicit timer source and outcome policy.
    pub async fn spawn_with(
        config: DispenseConfig,
        timer: Arc<dyn Timer>,
        outcome: Arc<dyn DispenseOutcome>,
    ) -> Result<(Self, JoinHandle<()>), DispenseError> {
        config
            .validate()
            .map_err(|e| DispenseError::InvalidArgument(e.to_string()))?;

        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let args = DispenseArgs {
            config,
            timer,
            outcome,
            event_tx: event_tx.clone(),
        };

        let (actor, handle) = Actor::spawn(None, DispenseActor, args)
            .await
            .map_err(|e| DispenseError::Engine(format!("Failed to spawn engine: {e}")))?;

        Ok((Self { actor, event_tx }, handle))
    }

    async fn call<T, F>(&self, build: F) -> Result<T, DispenseError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> EngineMessage,
    {
        match ractor::rpc::call(&self.actor, build, None).await {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(DispenseError::Engine("engine call timed out".into())),
            Ok(CallResult::SenderError) => {
                Err(DispenseError::Engine("engine dropped the reply".into()))
            }
            Err(e) => Err(DispenseError::Engine(format!("engine unavailable: {e}"))),
        }
    }

    /// Subscribe to engine events. Events published before subscribing are
    /// not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<DispenseEvent> {
        self.event_tx.subscribe()
    }

    /// Queue a job built from ward prescriptions.
    ///
    /// Each prescription is snapshotted; an out-of-range box number or an
    /// empty list fails with `InvalidArgument` and queues nothing.
    pub async fn enqueue(
        &self,
        patient: PatientRef,
        prescriptions: &[Prescription],
    ) -> Result<Job, DispenseError> {
        let refs = prescriptions
            .iter()
            .map(PrescriptionRef::snapshot)
            .collect::<Result<Vec<_>, _>>()?;
        self.enqueue_refs(patient, refs).await
    }

    /// Queue a job from already-validated prescription snapshots.
    pub async fn enqueue_refs(
        &self,
        patient: PatientRef,
        prescriptions: Vec<PrescriptionRef>,
    ) -> Result<Job, DispenseError> {
        self.call(|reply| EngineMessage::Enqueue {
            patient,
            prescriptions,
            reply,
        })
        .await?
    }

    /// Start a waiting job. Returns once the first attempt is recorded;
    /// dispensing continues in the background.
    pub async fn start(&self, job_id: JobId) -> Result<Job, DispenseError> {
        self.call(|reply| EngineMessage::Start { job_id, reply })
            .await?
    }

    /// Return the processing job to the queue. Returns the paused job, or
    /// `None` when nothing was running.
    pub async fn pause(&self) -> Result<Option<Job>, DispenseError> {
        self.call(|reply| EngineMessage::Pause { reply }).await
    }

    /// Get a job snapshot.
    pub async fn job(&self, job_id: JobId) -> Result<Job, DispenseError> {
        self.call(|reply| EngineMessage::GetJob { job_id, reply })
            .await?
            .ok_or_else(|| DispenseError::NotFound(format!("Job not found: {job_id}")))
    }

    /// All jobs in enqueue order.
    pub async fn jobs(&self) -> Result<Vec<Job>, DispenseError> {
        self.call(|reply| EngineMessage::ListJobs {
            status_filter: None,
            reply,
        })
        .await
    }

    /// Jobs with the given status, in enqueue order.
    pub async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, DispenseError> {
        self.call(|reply| EngineMessage::ListJobs {
            status_filter: Some(status),
            reply,
        })
        .await
    }

    /// The oldest waiting job.
    pub async fn next_waiting(&self) -> Result<Option<Job>, DispenseError> {
        self.call(|reply| EngineMessage::NextWaiting { reply }).await
    }

    /// The last `limit` attempts, oldest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<DispenseAttempt>, DispenseError> {
        self.call(|reply| EngineMessage::History { limit, reply })
            .await
    }

    /// The last `limit` attempts dispensed from one box, oldest first.
    pub async fn box_history(
        &self,
        box_number: BoxNumber,
        limit: usize,
    ) -> Result<Vec<DispenseAttempt>, DispenseError> {
        self.call(|reply| EngineMessage::BoxHistory {
            box_number,
            limit,
            reply,
        })
        .await
    }

    /// Every attempt recorded for a job.
    pub async fn job_history(&self, job_id: JobId) -> Result<Vec<DispenseAttempt>, DispenseError> {
        self.call(|reply| EngineMessage::JobHistory { job_id, reply })
            .await
    }

    pub async fn stats(&self) -> Result<QueueStats, DispenseError> {
        self.call(|reply| EngineMessage::GetStats { reply }).await
    }

    /// Number of jobs waiting to be started.
    pub async fn waiting_count(&self) -> Result<u64, DispenseError> {
        Ok(self.stats().await?.waiting)
    }

    pub async fn run_state(&self) -> Result<RunState, DispenseError> {
        self.call(|reply| EngineMessage::GetRunState { reply }).await
    }

    /// Stop the engine. A running job is paused first.
    pub fn shutdown(&self) -> Result<(), DispenseError> {
        self.actor
            .send_message(EngineMessage::Shutdown)
            .map_err(|e| DispenseError::Engine(format!("engine unavailable: {e}")))
    }
}
