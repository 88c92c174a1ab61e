#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use dispense_core::{
    AttemptPhase, BoxNumber, DispenseAttempt, DispenseConfig, DispenseError, DispenseEvent,
    JobId, JobStatus, PrescriptionRef,
};
use engine::{DispenseEngine, FixedOutcome, FnOutcome, RunState};

use common::{manual_engine, patient, prescriptions, run_to_idle, tick};

#[tokio::test]
async fn success_path_dispenses_every_prescription() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 3)).await?;
    assert_eq!(job.status, JobStatus::Waiting);

    let started = engine.start(job.id).await?;
    assert_eq!(started.status, JobStatus::Processing);
    assert_eq!(started.current_index, 0);
    assert_eq!(engine.job_history(job.id).await?.len(), 1);

    run_to_idle(&engine, &timer).await?;

    let job = engine.job(job.id).await?;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current_index, 3);

    let attempts = engine.job_history(job.id).await?;
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.phase == AttemptPhase::Completed));
    assert_eq!(
        attempts[0].note.as_deref(),
        Some("Successfully dispensed 500mg of Metformin from Box 1")
    );
    let ids: Vec<&str> = attempts.iter().map(|a| a.prescription_id.as_str()).collect();
    assert_eq!(ids, vec!["rx-0", "rx-1", "rx-2"]);

    // D1 + D2 + D3 per prescription.
    assert_eq!(timer.now(), Duration::from_millis(12_000));
    assert_eq!(engine.run_state().await?, RunState::default());
    Ok(())
}

#[tokio::test]
async fn failure_halts_job_without_touching_later_prescriptions() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::failure()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 3)).await?;

    engine.start(job.id).await?;
    run_to_idle(&engine, &timer).await?;

    let job = engine.job(job.id).await?;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.current_index, 0);

    let attempts = engine.history(100).await?;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].phase, AttemptPhase::Error);
    assert_eq!(
        attempts[0].note.as_deref(),
        Some("Error: Box 1 jam detected. Manual intervention required.")
    );
    assert!(!engine.run_state().await?.busy);
    Ok(())
}

#[tokio::test]
async fn fault_mid_job_keeps_earlier_successes() -> Result<(), Box<dyn Error>> {
    let outcome = FnOutcome::new(|a: &DispenseAttempt| a.prescription_id != "rx-1");
    let (engine, timer) = manual_engine(outcome).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 3)).await?;

    engine.start(job.id).await?;
    run_to_idle(&engine, &timer).await?;

    let job = engine.job(job.id).await?;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.current_index, 1);

    let phases: Vec<AttemptPhase> = engine
        .job_history(job.id)
        .await?
        .iter()
        .map(|a| a.phase)
        .collect();
    assert_eq!(phases, vec![AttemptPhase::Completed, AttemptPhase::Error]);
    Ok(())
}

#[tokio::test]
async fn second_start_is_rejected_while_busy() -> Result<(), Box<dyn Error>> {
    let (engine, _timer) = manual_engine(FixedOutcome::success()).await?;
    let a = patient("a");
    let b = patient("b");
    let job_a = engine.enqueue(a.clone(), &prescriptions(&a, 2)).await?;
    let job_b = engine.enqueue(b.clone(), &prescriptions(&b, 1)).await?;

    let (first, second) = tokio::join!(engine.start(job_a.id), engine.start(job_b.id));
    first?;
    assert_eq!(
        second.unwrap_err(),
        DispenseError::AlreadyBusy { active: job_a.id }
    );

    assert_eq!(engine.job(job_b.id).await?.status, JobStatus::Waiting);
    assert_eq!(engine.stats().await?.processing, 1);
    assert_eq!(
        engine.run_state().await?,
        RunState {
            active_job_id: Some(job_a.id),
            busy: true
        }
    );
    Ok(())
}

#[tokio::test]
async fn start_validates_job() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;

    let missing = engine.start(JobId::new()).await.unwrap_err();
    assert!(matches!(missing, DispenseError::NotFound(_)));

    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 1)).await?;
    engine.start(job.id).await?;
    run_to_idle(&engine, &timer).await?;

    let again = engine.start(job.id).await.unwrap_err();
    assert_eq!(
        again,
        DispenseError::InvalidState {
            job_id: job.id,
            status: JobStatus::Completed
        }
    );
    assert!(matches!(
        engine.job(JobId::new()).await,
        Err(DispenseError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn enqueue_rejects_bad_input_without_queueing() -> Result<(), Box<dyn Error>> {
    let (engine, _timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    engine.enqueue(p.clone(), &prescriptions(&p, 1)).await?;

    let empty = engine.enqueue(p.clone(), &[]).await.unwrap_err();
    assert!(matches!(empty, DispenseError::InvalidArgument(_)));

    let mut bad_box = prescriptions(&p, 2);
    bad_box[1].box_number = 4;
    let bad = engine.enqueue(p.clone(), &bad_box).await.unwrap_err();
    assert!(matches!(bad, DispenseError::InvalidArgument(_)));

    let refs_empty = engine.enqueue_refs(p, Vec::new()).await.unwrap_err();
    assert!(matches!(refs_empty, DispenseError::InvalidArgument(_)));

    assert_eq!(engine.jobs().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn pause_stops_all_further_transitions() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 2)).await?;

    engine.start(job.id).await?;
    tick(&engine, &timer).await?;
    assert_eq!(engine.history(1).await?[0].phase, AttemptPhase::InProgress);

    let paused = engine.pause().await?.expect("a job was running");
    assert_eq!(paused.id, job.id);
    assert_eq!(paused.status, JobStatus::Waiting);

    let after_pause = engine.history(100).await?;
    assert_eq!(after_pause.len(), 1);
    assert_eq!(after_pause[0].phase, AttemptPhase::Error);

    // The resolve timer is still pending; firing it must change nothing.
    assert_eq!(timer.pending(), 1);
    run_to_idle(&engine, &timer).await?;

    assert_eq!(engine.history(100).await?, after_pause);
    assert_eq!(engine.job(job.id).await?.status, JobStatus::Waiting);
    assert_eq!(engine.run_state().await?, RunState::default());
    Ok(())
}

#[tokio::test]
async fn pause_is_idempotent() -> Result<(), Box<dyn Error>> {
    let (engine, _timer) = manual_engine(FixedOutcome::success()).await?;
    assert!(engine.pause().await?.is_none());

    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 1)).await?;
    engine.start(job.id).await?;
    assert!(engine.pause().await?.is_some());
    assert!(engine.pause().await?.is_none());
    assert_eq!(engine.job(job.id).await?.status, JobStatus::Waiting);
    Ok(())
}

#[tokio::test]
async fn restart_after_pause_resumes_at_current_index() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 3)).await?;

    engine.start(job.id).await?;
    // Acknowledge and resolve the first prescription; the settle timer is left.
    tick(&engine, &timer).await?;
    tick(&engine, &timer).await?;
    let paused = engine.pause().await?.expect("a job was running");
    assert_eq!(paused.current_index, 1);

    let mut events = engine.subscribe();
    let resumed = engine.start(job.id).await?;
    assert_eq!(resumed.current_index, 1);
    match events.try_recv()? {
        DispenseEvent::JobStarted { from_index, .. } => assert_eq!(from_index, 1),
        other => panic!("unexpected event {other:?}"),
    }

    run_to_idle(&engine, &timer).await?;

    let job = engine.job(job.id).await?;
    assert_eq!(job.status, JobStatus::Completed);
    let attempts = engine.job_history(job.id).await?;
    let ids: Vec<&str> = attempts.iter().map(|a| a.prescription_id.as_str()).collect();
    assert_eq!(ids, vec!["rx-0", "rx-1", "rx-2"]);
    assert!(attempts.iter().all(|a| a.phase == AttemptPhase::Completed));
    Ok(())
}

#[tokio::test]
async fn interrupted_prescription_is_dispensed_again_on_resume() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 2)).await?;

    engine.start(job.id).await?;
    engine.pause().await?;
    engine.start(job.id).await?;
    run_to_idle(&engine, &timer).await?;

    let attempts = engine.job_history(job.id).await?;
    let summary: Vec<(&str, AttemptPhase)> = attempts
        .iter()
        .map(|a| (a.prescription_id.as_str(), a.phase))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("rx-0", AttemptPhase::Error),
            ("rx-0", AttemptPhase::Completed),
            ("rx-1", AttemptPhase::Completed),
        ]
    );
    assert_eq!(engine.job(job.id).await?.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn history_tail_spans_jobs_in_append_order() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let a = patient("a");
    let b = patient("b");
    let job_a = engine.enqueue(a.clone(), &prescriptions(&a, 2)).await?;
    let job_b = engine.enqueue(b.clone(), &prescriptions(&b, 3)).await?;

    assert_eq!(engine.next_waiting().await?.map(|j| j.id), Some(job_a.id));
    engine.start(job_a.id).await?;
    run_to_idle(&engine, &timer).await?;
    assert_eq!(engine.next_waiting().await?.map(|j| j.id), Some(job_b.id));
    engine.start(job_b.id).await?;
    run_to_idle(&engine, &timer).await?;
    assert!(engine.next_waiting().await?.is_none());

    let all = engine.history(100).await?;
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    let owners: Vec<_> = all.iter().map(|a| a.job_id).collect();
    assert_eq!(owners, vec![job_a.id, job_a.id, job_b.id, job_b.id, job_b.id]);

    let last_two = engine.history(2).await?;
    assert_eq!(last_two, all[3..].to_vec());

    let box_one = engine.box_history(BoxNumber::try_from(1)?, 10).await?;
    assert_eq!(box_one.len(), 2);
    assert!(box_one.iter().all(|a| a.box_number.get() == 1));

    let stats = engine.stats().await?;
    assert_eq!(stats.completed, 2);
    assert_eq!(
        engine.jobs_with_status(JobStatus::Completed).await?.len(),
        2
    );
    Ok(())
}

#[tokio::test]
async fn events_follow_the_pipeline() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let mut events = engine.subscribe();
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 1)).await?;
    engine.start(job.id).await?;
    run_to_idle(&engine, &timer).await?;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.job_id(), job.id);
        let kind = match event {
            DispenseEvent::JobEnqueued { .. } => "enqueued".to_string(),
            DispenseEvent::JobStarted { .. } => "started".to_string(),
            DispenseEvent::JobProgressed { index, .. } => format!("item {index}"),
            DispenseEvent::AttemptRecorded { .. } => "recorded".to_string(),
            DispenseEvent::AttemptPhaseChanged { new_phase, .. } => new_phase.to_string(),
            DispenseEvent::JobCompleted { dispensed, .. } => format!("completed {dispensed}"),
            other => panic!("unexpected event {other:?}"),
        };
        kinds.push(kind);
    }
    assert_eq!(
        kinds,
        vec![
            "enqueued",
            "started",
            "item 0",
            "recorded",
            "in_progress",
            "completed",
            "completed 1"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn queued_job_keeps_its_snapshot() -> Result<(), Box<dyn Error>> {
    let (engine, _timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let mut source = prescriptions(&p, 1);
    let job = engine.enqueue(p, &source).await?;

    source[0].dosage = "1000mg".to_string();
    source[0].box_number = 3;

    let queued = engine.job(job.id).await?;
    assert_eq!(
        queued.prescriptions[0],
        PrescriptionRef::new("rx-0", "Metformin", "500mg", 1)?
    );
    Ok(())
}

#[tokio::test]
async fn wall_clock_run_always_terminates() -> Result<(), Box<dyn Error>> {
    let config = DispenseConfig::default()
        .with_delays(
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .with_success_probability(0.5);
    let (engine, _handle) = DispenseEngine::spawn(config).await?;
    let mut events = engine.subscribe();

    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 3)).await?;
    engine.start(job.id).await?;

    let terminal = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if event.is_terminal() => return event.job_status(),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await?;

    let job = engine.job(job.id).await?;
    assert!(job.status.is_terminal());
    assert_eq!(terminal, Some(job.status));
    assert!(!engine.run_state().await?.busy);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_engine() -> Result<(), Box<dyn Error>> {
    let config = DispenseConfig::default();
    let (engine, handle) = DispenseEngine::spawn(config).await?;
    engine.shutdown()?;
    handle.await?;

    assert!(matches!(
        engine.stats().await,
        Err(DispenseError::Engine(_))
    ));
    Ok(())
}

#[tokio::test]
async fn advancing_virtual_time_walks_the_pipeline() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let config = DispenseConfig::default();
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 2)).await?;

    assert_eq!(timer.next_delay(), None);
    engine.start(job.id).await?;
    assert_eq!(timer.next_delay(), Some(config.command_delay));

    // Nothing is due until the command delay has fully elapsed.
    assert_eq!(timer.advance(config.command_delay - Duration::from_millis(1)), 0);
    assert_eq!(timer.next_delay(), Some(Duration::from_millis(1)));
    assert_eq!(timer.advance(Duration::from_millis(1)), 1);
    engine.run_state().await?;
    assert_eq!(engine.history(1).await?[0].phase, AttemptPhase::InProgress);
    assert_eq!(timer.next_delay(), Some(config.dispense_delay));

    assert_eq!(timer.advance(config.dispense_delay), 1);
    engine.run_state().await?;
    assert_eq!(engine.history(1).await?[0].phase, AttemptPhase::Completed);
    assert_eq!(engine.job(job.id).await?.current_index, 1);
    assert_eq!(timer.next_delay(), Some(config.settle_delay));

    assert_eq!(timer.advance(config.settle_delay), 1);
    engine.run_state().await?;
    assert_eq!(engine.history(1).await?[0].prescription_id, "rx-1");

    // A long jump only fires what was already scheduled; the engine's
    // follow-up step waits for the next advance.
    assert_eq!(timer.advance(Duration::from_secs(10)), 1);
    engine.run_state().await?;
    assert_eq!(timer.next_delay(), Some(config.dispense_delay));

    assert_eq!(timer.advance(config.dispense_delay), 1);
    engine.run_state().await?;
    assert_eq!(timer.advance(config.settle_delay), 1);
    engine.run_state().await?;

    assert_eq!(engine.job(job.id).await?.status, JobStatus::Completed);
    assert_eq!(timer.pending(), 0);
    assert_eq!(timer.next_delay(), None);
    assert_eq!(timer.now(), Duration::from_millis(17_000));
    Ok(())
}

#[tokio::test]
async fn pause_during_final_settle_completes_on_restart() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    let p = patient("1");
    let job = engine.enqueue(p.clone(), &prescriptions(&p, 2)).await?;

    engine.start(job.id).await?;
    // Acknowledge, resolve, settle, acknowledge, resolve; the last settle is left.
    for _ in 0..5 {
        tick(&engine, &timer).await?;
    }
    assert_eq!(timer.pending(), 1);

    let paused = engine.pause().await?.expect("a job was running");
    assert_eq!(paused.status, JobStatus::Waiting);
    assert_eq!(paused.current_index, 2);
    let before = engine.history(100).await?;
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|a| a.phase == AttemptPhase::Completed));

    let restarted = engine.start(job.id).await?;
    assert_eq!(restarted.status, JobStatus::Completed);
    assert_eq!(restarted.dispensed_count(), 2);
    assert_eq!(engine.run_state().await?, RunState::default());

    // The settle timer from the paused run is stale.
    run_to_idle(&engine, &timer).await?;
    assert_eq!(engine.history(100).await?, before);
    assert_eq!(engine.job(job.id).await?.status, JobStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn waiting_count_tracks_the_queue() -> Result<(), Box<dyn Error>> {
    let (engine, timer) = manual_engine(FixedOutcome::success()).await?;
    assert_eq!(engine.waiting_count().await?, 0);

    let a = patient("a");
    let b = patient("b");
    let job_a = engine.enqueue(a.clone(), &prescriptions(&a, 1)).await?;
    engine.enqueue(b.clone(), &prescriptions(&b, 1)).await?;
    assert_eq!(engine.waiting_count().await?, 2);

    engine.start(job_a.id).await?;
    assert_eq!(engine.waiting_count().await?, 1);
    engine.pause().await?;
    assert_eq!(engine.waiting_count().await?, 2);

    engine.start(job_a.id).await?;
    run_to_idle(&engine, &timer).await?;
    assert_eq!(engine.waiting_count().await?, 1);
    assert_eq!(engine.stats().await?.completed, 1);
    Ok(())
}
