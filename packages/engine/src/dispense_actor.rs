//! Dispense actor: the single writer driving jobs through the dispenser.

use std::sync::Arc;

use chrono::Utc;
use dispense_core::{
    AttemptId, AttemptPhase, DispenseAttempt, DispenseConfig, DispenseError, DispenseEvent, Job,
    JobId, JobStatus, PatientRef, PrescriptionRef, QueueStore, RecordStore,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{EngineMessage, PipelineStep, RunState, Stage};
use crate::outcome::DispenseOutcome;
use crate::timer::Timer;

const PAUSED_NOTE: &str = "Interrupted: dispensing paused before completion";

/// Arguments for spawning the dispense actor.
pub struct DispenseArgs {
    pub config: DispenseConfig,
    pub timer: Arc<dyn Timer>,
    pub outcome: Arc<dyn DispenseOutcome>,
    pub event_tx: broadcast::Sender<DispenseEvent>,
}

/// State for the dispense actor.
pub struct DispenseActorState {
    config: DispenseConfig,
    queue: QueueStore,
    history: RecordStore,
    run: RunState,
    /// Bumped whenever the active run starts or ends; steps carrying an
    /// older generation are ignored.
    generation: u64,
    /// Attempt of the active job that has not reached a terminal phase.
    active_attempt: Option<AttemptId>,
    timer: Arc<dyn Timer>,
    outcome: Arc<dyn DispenseOutcome>,
    event_tx: broadcast::Sender<DispenseEvent>,
}

impl DispenseActorState {
    /// Create a new dispense actor state.
    pub fn new(args: DispenseArgs) -> Self {
        Self {
            config: args.config,
            queue: QueueStore::new(),
            history: RecordStore::new(),
            run: RunState::default(),
            generation: 0,
            active_attempt: None,
            timer: args.timer,
            outcome: args.outcome,
            event_tx: args.event_tx,
        }
    }

    /// Broadcast an event.
    fn broadcast(&self, event: DispenseEvent) {
        tracing::debug!("{}", event.description());
        let _ = self.event_tx.send(event);
    }

    fn enqueue(
        &mut self,
        patient: PatientRef,
        prescriptions: Vec<PrescriptionRef>,
    ) -> Result<Job, DispenseError> {
        let job = Job::new(&patient, prescriptions)?;
        self.queue.enqueue(job.clone());

        tracing::info!(
            "Enqueued job {} for {} ({} medications)",
            job.id,
            job.patient_name,
            job.prescriptions.len()
        );
        self.broadcast(DispenseEvent::JobEnqueued {
            job: job.clone(),
            timestamp: Utc::now(),
        });
        Ok(job)
    }

    fn start(&mut self, myself: &ActorRef<EngineMessage>, job_id: JobId) -> Result<Job, DispenseError> {
        if let Some(active) = self.run.active_job_id {
            tracing::warn!("Rejected start of job {}: job {} is running", job_id, active);
            return Err(DispenseError::AlreadyBusy { active });
        }

        let job = self
            .queue
            .get(job_id)
            .ok_or_else(|| DispenseError::NotFound(format!("Job not found: {job_id}")))?;
        if job.status != JobStatus::Waiting {
            return Err(DispenseError::InvalidState {
                job_id,
                status: job.status,
            });
        }
        let from_index = job.current_index;

        self.queue.update_status(job_id, JobStatus::Processing);
        self.generation += 1;
        self.run = RunState {
            active_job_id: Some(job_id),
            busy: true,
        };

        tracing::info!("Started job {} at item {}", job_id, from_index);
        self.broadcast(DispenseEvent::JobStarted {
            job_id,
            from_index,
            timestamp: Utc::now(),
        });

        self.begin_item(myself, job_id, from_index);
        self.snapshot(job_id)
    }

    fn pause(&mut self) -> Option<Job> {
        let job_id = self.run.active_job_id?;

        if let Some(attempt_id) = self.active_attempt.take() {
            self.set_phase(attempt_id, AttemptPhase::Error, PAUSED_NOTE.to_string());
        }
        self.queue.update_status(job_id, JobStatus::Waiting);
        self.end_run();

        let job = self.queue.get(job_id).cloned()?;
        tracing::info!("Paused job {} at item {}", job_id, job.current_index);
        self.broadcast(DispenseEvent::JobPaused {
            job_id,
            index: job.current_index,
            timestamp: Utc::now(),
        });
        Some(job)
    }

    /// Run the pipeline step for a timer expiry, unless it belongs to a run
    /// that has since ended.
    fn step(&mut self, myself: &ActorRef<EngineMessage>, step: PipelineStep) {
        if step.generation != self.generation || self.run.active_job_id != Some(step.job_id) {
            tracing::debug!(
                "Ignoring stale {:?} for job {} (generation {} != {})",
                step.stage,
                step.job_id,
                step.generation,
                self.generation
            );
            return;
        }

        match step.stage {
            Stage::Acknowledge { attempt_id } => {
                let Some(attempt) = self.history.get(attempt_id) else {
                    tracing::error!("Attempt {} vanished from history", attempt_id);
                    return;
                };
                let note = attempt.dispensing_note();
                if self.set_phase(attempt_id, AttemptPhase::InProgress, note) {
                    self.schedule(
                        myself,
                        step.job_id,
                        self.config.dispense_delay,
                        Stage::Resolve { attempt_id },
                    );
                }
            }

            Stage::Resolve { attempt_id } => {
                let Some(attempt) = self.history.get(attempt_id).cloned() else {
                    tracing::error!("Attempt {} vanished from history", attempt_id);
                    return;
                };
                self.active_attempt = None;

                if self.outcome.succeeds(&attempt) {
                    self.set_phase(attempt_id, AttemptPhase::Completed, attempt.success_note());
                    let next = self
                        .queue
                        .get(step.job_id)
                        .map_or(0, |job| job.current_index + 1);
                    self.queue.advance_index(step.job_id, next);
                    self.schedule(
                        myself,
                        step.job_id,
                        self.config.settle_delay,
                        Stage::Next { index: next },
                    );
                } else {
                    let error = attempt.fault_note();
                    self.set_phase(attempt_id, AttemptPhase::Error, error.clone());
                    self.fail(step.job_id, error);
                }
            }

            Stage::Next { index } => self.begin_item(myself, step.job_id, index),
        }
    }

    /// Start dispensing the prescription at `index`, or complete the job when
    /// none is left.
    fn begin_item(&mut self, myself: &ActorRef<EngineMessage>, job_id: JobId, index: usize) {
        let Some(job) = self.queue.get(job_id) else {
            return;
        };

        let Some(prescription) = job.prescription(index).cloned() else {
            self.complete(job_id, index);
            return;
        };

        self.queue.advance_index(job_id, index);
        let Some(job) = self.queue.get(job_id) else {
            return;
        };
        let attempt = DispenseAttempt::pending(job, &prescription);
        let attempt_id = self.history.append(attempt.clone());
        self.active_attempt = Some(attempt_id);

        let now = Utc::now();
        self.broadcast(DispenseEvent::JobProgressed {
            job_id,
            index,
            timestamp: now,
        });
        self.broadcast(DispenseEvent::AttemptRecorded {
            attempt,
            timestamp: now,
        });

        self.schedule(
            myself,
            job_id,
            self.config.command_delay,
            Stage::Acknowledge { attempt_id },
        );
    }

    fn complete(&mut self, job_id: JobId, index: usize) {
        self.queue.advance_index(job_id, index);
        self.queue.update_status(job_id, JobStatus::Completed);
        self.end_run();

        let dispensed = self
            .queue
            .get(job_id)
            .map_or(index, Job::dispensed_count);
        tracing::info!("Job {} completed ({} dispensed)", job_id, dispensed);
        self.broadcast(DispenseEvent::JobCompleted {
            job_id,
            dispensed,
            timestamp: Utc::now(),
        });
    }

    fn fail(&mut self, job_id: JobId, error: String) {
        self.queue.update_status(job_id, JobStatus::Error);
        self.end_run();

        let index = self.queue.get(job_id).map_or(0, |job| job.current_index);
        tracing::warn!("Job {} halted at item {}: {}", job_id, index, error);
        self.broadcast(DispenseEvent::JobFailed {
            job_id,
            index,
            error,
            timestamp: Utc::now(),
        });
    }

    fn end_run(&mut self) {
        self.generation += 1;
        self.run = RunState::default();
        self.active_attempt = None;
    }

    /// Advance an attempt's phase and announce it. Returns false if the store
    /// refused the transition.
    fn set_phase(&mut self, attempt_id: AttemptId, phase: AttemptPhase, note: String) -> bool {
        let old_phase = match self.history.get(attempt_id) {
            Some(attempt) => attempt.phase,
            None => AttemptPhase::Pending,
        };

        match self.history.update_phase(attempt_id, phase, note) {
            Ok(attempt) => {
                let event = DispenseEvent::AttemptPhaseChanged {
                    attempt_id,
                    job_id: attempt.job_id,
                    old_phase,
                    new_phase: phase,
                    note: attempt.note.clone(),
                    timestamp: Utc::now(),
                };
                self.broadcast(event);
                true
            }
            Err(e) => {
                tracing::error!("Failed to move attempt {} to {}: {}", attempt_id, phase, e);
                false
            }
        }
    }

    fn schedule(
        &self,
        myself: &ActorRef<EngineMessage>,
        job_id: JobId,
        delay: std::time::Duration,
        stage: Stage,
    ) {
        self.timer.schedule(
            delay,
            myself.clone(),
            PipelineStep {
                job_id,
                generation: self.generation,
                stage,
            },
        );
    }

    fn snapshot(&self, job_id: JobId) -> Result<Job, DispenseError> {
        self.queue
            .get(job_id)
            .cloned()
            .ok_or_else(|| DispenseError::NotFound(format!("Job not found: {job_id}")))
    }
}

/// Actor that owns the queue and history stores and runs at most one job.
pub struct DispenseActor;

impl Actor for DispenseActor {
    type Msg = EngineMessage;
    type State = DispenseActorState;
    type Arguments = DispenseArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting dispense engine (D1={:?}, D2={:?}, D3={:?})",
            args.config.command_delay,
            args.config.dispense_delay,
            args.config.settle_delay
        );
        Ok(DispenseActorState::new(args))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EngineMessage::Enqueue {
                patient,
                prescriptions,
                reply,
            } => {
                let _ = reply.send(state.enqueue(patient, prescriptions));
            }

            EngineMessage::Start { job_id, reply } => {
                let _ = reply.send(state.start(&myself, job_id));
            }

            EngineMessage::Pause { reply } => {
                let _ = reply.send(state.pause());
            }

            EngineMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.queue.get(job_id).cloned());
            }

            EngineMessage::ListJobs {
                status_filter,
                reply,
            } => {
                let jobs: Vec<Job> = state
                    .queue
                    .list_ordered()
                    .iter()
                    .filter(|j| status_filter.is_none_or(|s| j.status == s))
                    .cloned()
                    .collect();
                let _ = reply.send(jobs);
            }

            EngineMessage::NextWaiting { reply } => {
                let _ = reply.send(state.queue.next_waiting().cloned());
            }

            EngineMessage::History { limit, reply } => {
                let _ = reply.send(state.history.tail(limit).to_vec());
            }

            EngineMessage::BoxHistory {
                box_number,
                limit,
                reply,
            } => {
                let _ = reply.send(state.history.tail_for_box(box_number, limit));
            }

            EngineMessage::JobHistory { job_id, reply } => {
                let _ = reply.send(state.history.for_job(job_id));
            }

            EngineMessage::GetStats { reply } => {
                let _ = reply.send(state.queue.stats());
            }

            EngineMessage::GetRunState { reply } => {
                let _ = reply.send(state.run);
            }

            EngineMessage::Step(step) => state.step(&myself, step),

            EngineMessage::Shutdown => {
                tracing::info!("Shutting down dispense engine");
                state.pause();
                myself.stop(None);
            }
        }

        Ok(())
    }
}
