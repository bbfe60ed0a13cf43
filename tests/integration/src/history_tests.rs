//! Durable cycle history across engine restarts and the scheduler

use crate::fixtures::*;
use orbitwatch_core::{EngineConfig, RiskLevel};
use orbitwatch_engine::{CycleError, CycleHistory, HistoryHealth, Scheduler, GENESIS_FINGERPRINT};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn durable(path: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cycle.history_path = Some(path.to_path_buf());
    config
}

fn cleanup(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        std::fs::remove_file(file).ok();
    }
}

#[test]
fn test_events_are_persisted_with_their_cycle() {
    init_tracing();
    let path = temp_path("history", "db");
    let published = {
        let engine = engine_with(durable(&path), collision_pair());
        engine
            .run_cycle_at(EPOCH - 600.0, &AtomicBool::new(false))
            .unwrap()
    };
    assert!(!published.events.is_empty());

    let history = CycleHistory::open(&path).unwrap();
    assert_eq!(history.health(), &HistoryHealth::Ok);
    assert_eq!(history.latest_version().unwrap(), Some(1));

    let stored = history.load(1).unwrap();
    assert_eq!(stored.fingerprint, published.fingerprint);
    assert_eq!(stored.previous_fingerprint, GENESIS_FINGERPRINT);
    let ids = |events: &[orbitwatch_core::ConjunctionEvent]| {
        events.iter().map(|e| e.event_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&stored.events), ids(&published.events));
    assert!(stored
        .events
        .iter()
        .any(|e| e.risk_level == RiskLevel::Critical && e.maneuver_required));

    drop(history);
    cleanup(&path);
}

#[test]
fn test_restart_continues_the_chain() {
    let path = temp_path("history", "db");
    let first = {
        let engine = engine_with(durable(&path), collision_pair());
        engine.run_cycle_at(EPOCH, &AtomicBool::new(false)).unwrap();
        engine
            .run_cycle_at(EPOCH + 3_600.0, &AtomicBool::new(false))
            .unwrap()
    };
    assert_eq!(first.version, 2);

    let engine = engine_with(durable(&path), collision_pair());
    let restored = engine.latest().expect("restored from history");
    assert_eq!(restored.version, 2);
    assert_eq!(restored.fingerprint, first.fingerprint);

    let next = engine
        .run_cycle_at(EPOCH + 7_200.0, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(next.version, 3);
    assert_eq!(next.previous_fingerprint, first.fingerprint);

    let summaries = engine.history_summaries(10).unwrap();
    let versions: Vec<u64> = summaries.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
    assert_eq!(summaries[0].evaluation_epoch_s, EPOCH + 7_200.0);
    assert_eq!(engine.history_summaries(1).unwrap().len(), 1);

    drop(engine);
    cleanup(&path);
}

#[test]
fn test_lost_events_are_detected_on_restart() {
    let path = temp_path("history", "db");
    {
        let engine = engine_with(durable(&path), collision_pair());
        engine
            .run_cycle_at(EPOCH - 600.0, &AtomicBool::new(false))
            .unwrap();
        engine
            .run_cycle_at(EPOCH + 60.0, &AtomicBool::new(false))
            .unwrap();
    }
    {
        let history = CycleHistory::open(&path).unwrap();
        history
            .__test_execute_raw_sql("DELETE FROM cycle_events WHERE version = 1", &[])
            .unwrap();
    }

    let engine = engine_with(durable(&path), collision_pair());
    match engine.history_health() {
        Some(HistoryHealth::Corrupted {
            last_good_version,
            first_bad_version,
            ..
        }) => {
            assert_eq!(last_good_version, None);
            assert_eq!(first_bad_version, 1);
        }
        other => panic!("expected corrupted history, got {other:?}"),
    }
    // nothing trustworthy to restore, and nothing new is accepted
    assert!(engine.latest().is_none());
    let result = engine.run_cycle_at(EPOCH + 120.0, &AtomicBool::new(false));
    assert!(matches!(result, Err(CycleError::History(_))));
    assert!(engine.latest().is_none());

    drop(engine);
    cleanup(&path);
}

#[tokio::test]
async fn test_scheduler_publishes_and_stops() {
    let path = temp_path("history", "db");
    let engine = Arc::new(engine_with(durable(&path), collision_pair()));
    let (scheduler, shutdown) = Scheduler::new(engine.clone());
    let task = scheduler.spawn();

    let mut waited = Duration::ZERO;
    while engine.latest().is_none() {
        assert!(waited < Duration::from_secs(60), "no cycle published");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(60), task)
        .await
        .expect("scheduler stops")
        .unwrap();

    // the default period is a day, so exactly one cycle ran
    assert_eq!(engine.latest().unwrap().version, 1);
    assert_eq!(engine.history_summaries(10).unwrap().len(), 1);

    drop(engine);
    cleanup(&path);
}
