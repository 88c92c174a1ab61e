//! Simulated ward dispensing run.
//!
//! Queues every patient's active prescriptions, then starts the head of the
//! waiting queue until nothing is left. Ctrl-C pauses the running job and
//! exits.

use dispense_core::{DispenseConfig, DispenseEvent, JobId, Prescription, select_dispensable};
use engine::DispenseEngine;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod ward;

const HISTORY_TAIL: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DispenseConfig::from_env()?;
    let (engine, handle) = DispenseEngine::spawn(config).await?;

    let prescriptions = ward::prescriptions();
    for patient in ward::patients() {
        let selected: Vec<Prescription> = select_dispensable(&patient.id, &prescriptions)
            .into_iter()
            .cloned()
            .collect();
        if selected.is_empty() {
            tracing::info!("No active prescriptions for {}", patient.name);
            continue;
        }
        engine.enqueue(patient, &selected).await?;
    }
    tracing::info!("{} patients waiting", engine.waiting_count().await?);

    tokio::select! {
        result = drain_queue(&engine) => result?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(job) = engine.pause().await? {
                tracing::info!("Interrupted; job {} returned to the queue", job.id);
            }
        }
    }

    let stats = engine.stats().await?;
    tracing::info!(
        "Done: {} completed, {} failed, {} waiting",
        stats.completed,
        stats.error,
        stats.waiting
    );
    for attempt in engine.history(HISTORY_TAIL).await?.iter().rev() {
        tracing::info!(
            "{} - {} ({}): {}",
            attempt.patient_name,
            attempt.medication_name,
            attempt.phase,
            attempt.note.as_deref().unwrap_or("")
        );
    }

    engine.shutdown()?;
    handle.await?;
    Ok(())
}

/// Start the oldest waiting job and wait for it to finish, until the queue
/// has no waiting jobs left.
async fn drain_queue(engine: &DispenseEngine) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = engine.subscribe();

    while let Some(job) = engine.next_waiting().await? {
        engine.start(job.id).await?;
        wait_for_terminal(&mut events, job.id).await?;
    }
    Ok(())
}

async fn wait_for_terminal(
    events: &mut broadcast::Receiver<DispenseEvent>,
    job_id: JobId,
) -> Result<(), broadcast::error::RecvError> {
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::info!("{}", event.description());
                if event.job_id() == job_id && event.is_terminal() {
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event stream lagged, skipped {}", skipped);
            }
            Err(e) => return Err(e),
        }
    }
}
