//! Prescription source records supplied by the ward collaborators.

use serde::{Deserialize, Serialize};

/// The patient a job dispenses for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
}

impl PatientRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Lifecycle of a prescription as tracked by the ward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
    Pending,
}

/// A prescription as authored on the ward.
///
/// The engine never holds on to these; jobs keep a [`crate::PrescriptionRef`]
/// snapshot instead, so later edits do not leak into queued work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub medication_id: String,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub prescribed_by: String,
    pub status: PrescriptionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Raw compartment number; validated when the job is enqueued.
    pub box_number: u8,
}

impl Prescription {
    /// Create an active prescription with the fields the dispenser needs.
    pub fn new(
        id: impl Into<String>,
        patient: &PatientRef,
        medication_name: impl Into<String>,
        dosage: impl Into<String>,
        box_number: u8,
    ) -> Self {
        let id = id.into();
        Self {
            medication_id: id.clone(),
            id,
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            medication_name: medication_name.into(),
            dosage: dosage.into(),
            frequency: String::new(),
            duration: String::new(),
            prescribed_by: String::new(),
            status: PrescriptionStatus::Active,
            notes: String::new(),
            box_number,
        }
    }

    /// Set the dosing schedule.
    pub fn with_schedule(mut self, frequency: impl Into<String>, duration: impl Into<String>) -> Self {
        self.frequency = frequency.into();
        self.duration = duration.into();
        self
    }

    /// Set the prescriber.
    pub fn with_prescriber(mut self, prescribed_by: impl Into<String>) -> Self {
        self.prescribed_by = prescribed_by.into();
        self
    }

    /// Set free-form notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: PrescriptionStatus) -> Self {
        self.status = status;
        self
    }

    /// Check if the prescription may be dispensed.
    pub fn is_active(&self) -> bool {
        self.status == PrescriptionStatus::Active
    }
}

/// Select a patient's active prescriptions, preserving input order.
pub fn select_dispensable<'a>(
    patient_id: &str,
    prescriptions: &'a [Prescription],
) -> Vec<&'a Prescription> {
    prescriptions
        .iter()
        .filter(|p| p.patient_id == patient_id && p.is_active())
        .collect()
}
