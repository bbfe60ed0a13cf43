//! Periodic cycle scheduler.
//!
//! Each tick reloads the configuration, runs one cycle on a blocking thread
//! and publishes it. A failed cycle is logged and the next tick tries again.
//! Shutdown raises the cancel flag of the running cycle, so a cycle that has
//! not yet published is abandoned without effect.

use crate::engine::Engine;
use crate::error::CycleError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Handle used to stop a running scheduler. Dropping every handle also stops it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // no receivers left means the scheduler already stopped
        let _ = self.tx.send(true);
    }
}

pub struct Scheduler {
    engine: Arc<Engine>,
    shutdown: watch::Receiver<bool>,
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn period_of(engine: &Engine) -> Duration {
    Duration::from_secs(engine.config().current().cycle.period_secs.max(1))
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>) -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                engine,
                shutdown: rx,
            },
            ShutdownHandle { tx: Arc::new(tx) },
        )
    }

    /// Run on the current tokio runtime until shutdown.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// First cycle runs immediately; later ones every `cycle.period_secs`.
    pub async fn run(mut self) {
        let mut period = period_of(&self.engine);
        let mut ticks = ticker(period);
        let mut cycle_no: u64 = 0;
        info!(period_secs = period.as_secs(), "Cycle scheduler started");

        loop {
            tokio::select! {
                _ = ticks.tick() => {}
                _ = self.shutdown.changed() => break,
            }
            if *self.shutdown.borrow() {
                break;
            }

            cycle_no += 1;
            // a rejected reload is logged by the manager; the last good config stays active
            let _ = self.engine.config().reload();

            let cancel = Arc::new(AtomicBool::new(false));
            let engine = self.engine.clone();
            let flag = cancel.clone();
            let mut job = tokio::task::spawn_blocking(move || engine.run_cycle_now(&flag));

            let result = tokio::select! {
                result = &mut job => result,
                _ = self.shutdown.changed() => {
                    cancel.store(true, Ordering::Relaxed);
                    warn!(cycle = cycle_no, "Shutdown requested, cancelling running cycle");
                    let _ = job.await;
                    break;
                }
            };

            match result {
                Ok(Ok(_)) => {}
                Ok(Err(CycleError::Cancelled)) => {
                    warn!(cycle = cycle_no, "Cycle cancelled; previous snapshot remains authoritative")
                }
                Ok(Err(e)) => {
                    error!(cycle = cycle_no, error = %e, "Cycle aborted; previous snapshot remains authoritative")
                }
                Err(e) => error!(cycle = cycle_no, error = %e, "Cycle task failed"),
            }

            let next = period_of(&self.engine);
            if next != period {
                info!(period_secs = next.as_secs(), "Cycle period changed");
                period = next;
                ticks = ticker(period);
                // the fresh interval fires immediately; consume that tick
                ticks.tick().await;
            }
        }

        info!(cycles = cycle_no, "Cycle scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use orbitwatch_core::{ConfigManager, EngineConfig, KeplerianElements, ObjectType, TrackedObject};

    fn engine() -> Arc<Engine> {
        let objects = vec![TrackedObject::with_elements(
            "1",
            ObjectType::Payload,
            0.0,
            KeplerianElements::circular(700.0, 1.0, 0.0, 0.0),
        )];
        Arc::new(
            Engine::new(
                Arc::new(ConfigManager::new(EngineConfig::default()).unwrap()),
                Arc::new(StaticCatalog::new(objects)),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately_and_shutdown_stops() {
        let engine = engine();
        let (scheduler, shutdown) = Scheduler::new(engine.clone());
        let task = scheduler.spawn();

        let mut waited = 0;
        while engine.latest().is_none() && waited < 200 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waited += 1;
        }
        assert_eq!(engine.latest().unwrap().version, 1);

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        // default period is a day, so no second cycle ran
        assert_eq!(engine.latest().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let engine = engine();
        let (scheduler, shutdown) = Scheduler::new(engine.clone());
        shutdown.shutdown();
        scheduler.run().await;
        assert!(engine.latest().is_none());
    }
}
