use std::sync::Arc;

use dispense_core::{DispenseConfig, DispenseError, PatientRef, Prescription};
use engine::{DispenseEngine, DispenseOutcome, ManualTimer};

pub const MEDICATIONS: [(&str, &str, u8); 3] = [
    ("Metformin", "500mg", 1),
    ("Lisinopril", "10mg", 2),
    ("Albuterol", "90mcg", 3),
];

pub fn patient(id: &str) -> PatientRef {
    PatientRef::new(id, format!("Patient {id}"))
}

/// `count` active prescriptions cycling through the three boxes,
/// with ids `rx-0`, `rx-1`, ...
pub fn prescriptions(patient: &PatientRef, count: usize) -> Vec<Prescription> {
    (0..count)
        .map(|i| {
            let (name, dosage, box_number) = MEDICATIONS[i % MEDICATIONS.len()];
            Prescription::new(format!("rx-{i}"), patient, name, dosage, box_number)
        })
        .collect()
}

pub async fn manual_engine(
    outcome: impl DispenseOutcome,
) -> Result<(DispenseEngine, Arc<ManualTimer>), DispenseError> {
    let timer = Arc::new(ManualTimer::new());
    let (engine, _handle) =
        DispenseEngine::spawn_with(DispenseConfig::default(), timer.clone(), Arc::new(outcome))
            .await?;
    Ok((engine, timer))
}

/// Fire the next timer and wait until the engine has handled it.
pub async fn tick(engine: &DispenseEngine, timer: &ManualTimer) -> Result<bool, DispenseError> {
    if !timer.fire_next() {
        return Ok(false);
    }
    // Mailbox order guarantees the step is handled before this reply.
    engine.run_state().await?;
    Ok(true)
}

/// Fire timers until none are pending.
pub async fn run_to_idle(engine: &DispenseEngine, timer: &ManualTimer) -> Result<usize, DispenseError> {
    let mut fired = 0;
    while tick(engine, timer).await? {
        fired += 1;
        assert!(fired < 10_000, "pipeline never settled");
    }
    Ok(fired)
}
