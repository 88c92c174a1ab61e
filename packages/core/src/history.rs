//! Append-only log of dispense attempts.

use std::collections::HashMap;

use chrono::Utc;

use crate::attempt::{AttemptId, AttemptPhase, DispenseAttempt};
use crate::error::DispenseError;
use crate::job::{BoxNumber, JobId};

/// Attempt history in append order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<DispenseAttempt>,
    index: HashMap<AttemptId, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt and return its id.
    pub fn append(&mut self, attempt: DispenseAttempt) -> AttemptId {
        let id = attempt.id;
        self.index.insert(id, self.records.len());
        self.records.push(attempt);
        id
    }

    pub fn get(&self, id: AttemptId) -> Option<&DispenseAttempt> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    /// Move an attempt to a later phase and replace its note.
    ///
    /// Unknown ids fail with `NotFound`; a transition that would regress,
    /// skip `InProgress` on the way to `Completed`, or touch a terminal
    /// attempt fails with `InvalidArgument`.
    pub fn update_phase(
        &mut self,
        id: AttemptId,
        phase: AttemptPhase,
        note: impl Into<String>,
    ) -> Result<&DispenseAttempt, DispenseError> {
        let i = *self
            .index
            .get(&id)
            .ok_or_else(|| DispenseError::NotFound(format!("Attempt not found: {id}")))?;
        let record = &mut self.records[i];

        if !record.phase.can_advance_to(phase) {
            return Err(DispenseError::InvalidArgument(format!(
                "attempt {id} cannot move from {} to {phase}",
                record.phase
            )));
        }

        record.phase = phase;
        record.note = Some(note.into());
        record.updated_at = Utc::now();
        Ok(record)
    }

    /// The last `n` attempts, oldest first.
    pub fn tail(&self, n: usize) -> &[DispenseAttempt] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// The last `n` attempts dispensed from one box, oldest first.
    pub fn tail_for_box(&self, box_number: BoxNumber, n: usize) -> Vec<DispenseAttempt> {
        let mut matching: Vec<DispenseAttempt> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.box_number == box_number)
            .take(n)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    /// All attempts recorded for a job, oldest first.
    pub fn for_job(&self, job_id: JobId) -> Vec<DispenseAttempt> {
        self.records
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
