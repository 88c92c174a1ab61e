//! History records for individual dispensing attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::job::{BoxNumber, Job, JobId, PrescriptionRef};

/// Unique identifier for a dispense attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub Ulid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of a single attempt. An attempt only moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    /// Command queued for the dispenser.
    #[default]
    Pending,
    /// Dispenser acknowledged and is releasing medication.
    InProgress,
    /// Medication was released.
    Completed,
    /// The dispenser reported a fault.
    Error,
}

impl AttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptPhase::Completed | AttemptPhase::Error)
    }

    /// Check whether `next` is a legal successor of this phase.
    ///
    /// `Pending` may only be acknowledged or interrupted; `Completed` is
    /// reachable from `InProgress` alone. Terminal phases accept nothing.
    pub fn can_advance_to(&self, next: AttemptPhase) -> bool {
        matches!(
            (self, next),
            (AttemptPhase::Pending, AttemptPhase::InProgress | AttemptPhase::Error)
                | (AttemptPhase::InProgress, AttemptPhase::Completed | AttemptPhase::Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptPhase::Pending => "pending",
            AttemptPhase::InProgress => "in_progress",
            AttemptPhase::Completed => "completed",
            AttemptPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record of one prescription's dispensing lifecycle within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseAttempt {
    pub id: AttemptId,
    pub job_id: JobId,
    pub prescription_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub medication_name: String,
    pub dosage: String,
    pub box_number: BoxNumber,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub phase: AttemptPhase,
    /// Latest response from the dispenser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DispenseAttempt {
    /// Create a pending attempt for one prescription of a job.
    pub fn pending(job: &Job, prescription: &PrescriptionRef) -> Self {
        let now = Utc::now();
        Self {
            id: AttemptId::new(),
            job_id: job.id,
            prescription_id: prescription.prescription_id.clone(),
            patient_id: job.patient_id.clone(),
            patient_name: job.patient_name.clone(),
            medication_name: prescription.medication_name.clone(),
            dosage: prescription.dosage.clone(),
            box_number: prescription.box_number,
            created_at: now,
            updated_at: now,
            phase: AttemptPhase::Pending,
            note: None,
        }
    }

    /// Dispenser response once the command is acknowledged.
    pub fn dispensing_note(&self) -> String {
        format!("Dispensing from Box {}...", self.box_number)
    }

    /// Dispenser response after a successful release.
    pub fn success_note(&self) -> String {
        format!(
            "Successfully dispensed {} of {} from Box {}",
            self.dosage, self.medication_name, self.box_number
        )
    }

    /// Dispenser response after a fault.
    pub fn fault_note(&self) -> String {
        format!(
            "Error: Box {} jam detected. Manual intervention required.",
            self.box_number
        )
    }
}
