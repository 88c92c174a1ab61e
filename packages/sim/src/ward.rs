//! Seed ward data for the simulation.

use dispense_core::{PatientRef, Prescription, PrescriptionStatus};

fn sarah() -> PatientRef {
    PatientRef::new("1", "Sarah Johnson")
}

fn michael() -> PatientRef {
    PatientRef::new("2", "Michael Chen")
}

fn emily() -> PatientRef {
    PatientRef::new("3", "Emily Rodriguez")
}

pub fn patients() -> Vec<PatientRef> {
    vec![sarah(), michael(), emily()]
}

pub fn prescriptions() -> Vec<Prescription> {
    let (sarah, michael, emily) = (sarah(), michael(), emily());

    vec![
        Prescription::new("1", &sarah, "Metformin", "500mg", 1)
            .with_schedule("Twice daily", "30 days")
            .with_prescriber("Dr. Smith")
            .with_notes("Take with meals to reduce GI upset"),
        Prescription::new("2", &michael, "Lisinopril", "10mg", 2)
            .with_schedule("Once daily", "60 days")
            .with_prescriber("Dr. Williams")
            .with_notes("Monitor blood pressure regularly"),
        Prescription::new("3", &emily, "Albuterol", "90mcg", 3)
            .with_schedule("As needed", "90 days")
            .with_prescriber("Dr. Johnson")
            .with_notes("Use for asthma symptoms"),
        Prescription::new("4", &sarah, "Lisinopril", "5mg", 2)
            .with_schedule("Once daily", "30 days")
            .with_prescriber("Dr. Smith"),
        Prescription::new("5", &emily, "Metformin", "850mg", 1)
            .with_schedule("Once daily", "14 days")
            .with_prescriber("Dr. Johnson")
            .with_status(PrescriptionStatus::Cancelled),
    ]
}
