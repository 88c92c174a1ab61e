//! Job domain types for queued dispensing work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::DispenseError;
use crate::prescription::{PatientRef, Prescription};

/// Number of physical medication compartments on the dispenser.
pub const BOX_COUNT: u8 = 3;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the dispenser's fixed compartments, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BoxNumber(u8);

impl BoxNumber {
    /// Get the raw compartment number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// All valid compartments in ascending order.
    pub fn all() -> impl Iterator<Item = BoxNumber> {
        (1..=BOX_COUNT).map(BoxNumber)
    }
}

impl TryFrom<u8> for BoxNumber {
    type Error = DispenseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=BOX_COUNT).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DispenseError::InvalidArgument(format!(
                "box number {value} is out of range (expected 1..={BOX_COUNT})"
            )))
        }
    }
}

impl From<BoxNumber> for u8 {
    fn from(value: BoxNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for BoxNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued and may be started.
    #[default]
    Waiting,
    /// Job is being dispensed.
    Processing,
    /// Every prescription was dispensed.
    Completed,
    /// A dispense fault halted the job.
    Error,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable copy of a prescription taken when the job was enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionRef {
    pub prescription_id: String,
    pub medication_name: String,
    pub dosage: String,
    pub box_number: BoxNumber,
}

impl PrescriptionRef {
    /// Create a reference, validating the box number.
    pub fn new(
        prescription_id: impl Into<String>,
        medication_name: impl Into<String>,
        dosage: impl Into<String>,
        box_number: u8,
    ) -> Result<Self, DispenseError> {
        Ok(Self {
            prescription_id: prescription_id.into(),
            medication_name: medication_name.into(),
            dosage: dosage.into(),
            box_number: BoxNumber::try_from(box_number)?,
        })
    }

    /// Capture the dispensing-relevant fields of a prescription.
    pub fn snapshot(prescription: &Prescription) -> Result<Self, DispenseError> {
        Self::new(
            prescription.id.clone(),
            prescription.medication_name.clone(),
            prescription.dosage.clone(),
            prescription.box_number,
        )
    }
}

/// A job is one patient's ordered set of prescriptions awaiting dispensing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    pub patient_id: String,
    pub patient_name: String,
    /// Prescriptions in dispensing order.
    pub prescriptions: Vec<PrescriptionRef>,
    /// Current status.
    pub status: JobStatus,
    /// Index of the prescription being (or next to be) dispensed.
    #[serde(default)]
    pub current_index: usize,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new waiting job.
    ///
    /// Fails with `InvalidArgument` when `prescriptions` is empty.
    pub fn new(
        patient: &PatientRef,
        prescriptions: Vec<PrescriptionRef>,
    ) -> Result<Self, DispenseError> {
        if prescriptions.is_empty() {
            return Err(DispenseError::InvalidArgument(format!(
                "no prescriptions supplied for patient {}",
                patient.id
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            prescriptions,
            status: JobStatus::Waiting,
            current_index: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// The prescription at `index`, if the job has one there.
    pub fn prescription(&self, index: usize) -> Option<&PrescriptionRef> {
        self.prescriptions.get(index)
    }

    /// Number of prescriptions already dispensed.
    pub fn dispensed_count(&self) -> usize {
        match self.status {
            JobStatus::Completed => self.prescriptions.len(),
            _ => self.current_index,
        }
    }

    /// Check whether the cursor has passed the last prescription.
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.prescriptions.len()
    }
}
