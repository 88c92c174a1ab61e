//! Timer sources that deliver pipeline steps back to the engine.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ractor::ActorRef;

use crate::messages::{EngineMessage, PipelineStep};

/// Schedules a pipeline step to be delivered after a delay.
///
/// Implementations must not block. Delivery to a stopped engine is dropped.
pub trait Timer: Send + Sync + 'static {
    fn schedule(&self, delay: Duration, target: ActorRef<EngineMessage>, step: PipelineStep);
}

/// Wall-clock timer backed by the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, target: ActorRef<EngineMessage>, step: PipelineStep) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if target.send_message(EngineMessage::Step(step)).is_err() {
                tracing::debug!("Engine stopped before step for job {} fired", step.job_id);
            }
        });
    }
}

struct Scheduled {
    due: Duration,
    seq: u64,
    target: ActorRef<EngineMessage>,
    step: PipelineStep,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    pending: Vec<Scheduled>,
}

/// Virtual-time timer. Nothing fires until the owner advances it.
///
/// Steps fire in deadline order, ties broken by scheduling order.
#[derive(Default)]
pub struct ManualTimer {
    inner: Mutex<ManualState>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since the timer was created.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of steps waiting to fire.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Deadline of the earliest pending step, relative to now.
    pub fn next_delay(&self) -> Option<Duration> {
        let state = self.lock();
        state
            .pending
            .iter()
            .map(|s| s.due.saturating_sub(state.now))
            .min()
    }

    /// Jump to the earliest deadline and fire that step.
    ///
    /// Returns false when nothing is pending.
    pub fn fire_next(&self) -> bool {
        let fired = {
            let mut state = self.lock();
            let Some(pos) = state
                .pending
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| (s.due, s.seq))
                .map(|(i, _)| i)
            else {
                return false;
            };
            let scheduled = state.pending.remove(pos);
            state.now = state.now.max(scheduled.due);
            scheduled
        };
        let _ = fired
            .target
            .send_message(EngineMessage::Step(fired.step));
        true
    }

    /// Move time forward by `by`, firing every step already scheduled
    /// within that window. Returns how many fired.
    ///
    /// Steps scheduled by the engine in response are not fired until the
    /// next call, since the engine handles them asynchronously.
    pub fn advance(&self, by: Duration) -> usize {
        let mut due = {
            let mut state = self.lock();
            let until = state.now + by;
            let (ready, waiting): (Vec<_>, Vec<_>) =
                state.pending.drain(..).partition(|s| s.due <= until);
            state.pending = waiting;
            state.now = until;
            ready
        };
        due.sort_by_key(|s| (s.due, s.seq));
        let count = due.len();
        for scheduled in due {
            let _ = scheduled
                .target
                .send_message(EngineMessage::Step(scheduled.step));
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, target: ActorRef<EngineMessage>, step: PipelineStep) {
        let mut state = self.lock();
        state.seq += 1;
        let scheduled = Scheduled {
            due: state.now + delay,
            seq: state.seq,
            target,
            step,
        };
        state.pending.push(scheduled);
    }
}
