//! Engine facade: owns the worker pool, the published-cycle store and the
//! durable history, and ties one cycle run to one atomic publication.

use crate::catalog::CatalogSource;
use crate::cycle::run_cycle;
use crate::error::{CycleError, Result};
use crate::history::{CycleHistory, HistoryHealth};
use crate::store::{CycleSummary, PublishedCycle, SnapshotStore};
use chrono::Utc;
use orbitwatch_core::ConfigManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{error, info};

pub struct Engine {
    config: Arc<ConfigManager>,
    catalog: Arc<dyn CatalogSource>,
    store: SnapshotStore,
    history: Option<Mutex<CycleHistory>>,
    pool: rayon::ThreadPool,
}

impl Engine {
    /// Build the engine from the current configuration.
    ///
    /// When a history path is configured the latest stored cycle is restored,
    /// so readers are served immediately and versioning continues.
    pub fn new(config: Arc<ConfigManager>, catalog: Arc<dyn CatalogSource>) -> Result<Self> {
        let settings = config.current();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.cycle.worker_threads)
            .thread_name(|i| format!("orbitwatch-worker-{i}"))
            .build()?;

        let store = SnapshotStore::new(settings.cycle.history_retention);
        let history = match &settings.cycle.history_path {
            Some(path) => {
                let history = CycleHistory::open(path)?;
                if history.health().is_ok() {
                    if let Some(latest) = history.latest()? {
                        info!(
                            version = latest.version,
                            fingerprint = %latest.fingerprint,
                            "Restored latest cycle from history"
                        );
                        store.restore(latest);
                    }
                } else {
                    error!(health = ?history.health(), "Cycle history is corrupted; publication disabled");
                }
                Some(Mutex::new(history))
            }
            None => None,
        };

        info!(
            catalog = %catalog.describe(),
            worker_threads = pool.current_num_threads(),
            durable_history = history.is_some(),
            "Engine initialised"
        );

        Ok(Self {
            config,
            catalog,
            store,
            history,
            pool,
        })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Latest published cycle, `None` before the first publication.
    pub fn latest(&self) -> Option<Arc<PublishedCycle>> {
        self.store.latest()
    }

    /// `None` when no durable history is configured.
    pub fn history_health(&self) -> Option<HistoryHealth> {
        self.history.as_ref().map(|h| lock(h).health().clone())
    }

    /// Summaries newest first: durable history when configured, otherwise
    /// the in-memory store.
    pub fn history_summaries(&self, limit: usize) -> Result<Vec<CycleSummary>> {
        match &self.history {
            Some(history) => Ok(lock(history).summaries(limit)?),
            None => Ok(self.store.summaries().into_iter().take(limit).collect()),
        }
    }

    /// Run and publish one cycle at the wall-clock epoch.
    pub fn run_cycle_now(&self, cancel: &AtomicBool) -> Result<Arc<PublishedCycle>> {
        let epoch_s = Utc::now().timestamp_millis() as f64 / 1_000.0;
        self.run_cycle_at(epoch_s, cancel)
    }

    /// Fetch the catalog, evaluate it at `evaluation_epoch_s` and publish.
    ///
    /// Any error leaves the previously published cycle in place.
    pub fn run_cycle_at(
        &self,
        evaluation_epoch_s: f64,
        cancel: &AtomicBool,
    ) -> Result<Arc<PublishedCycle>> {
        let started = Instant::now();
        let config = self.config.current();
        let objects = self.catalog.fetch()?;

        let outcome = self
            .pool
            .install(|| run_cycle(&objects, evaluation_epoch_s, &config, cancel))?;

        let published_at_ms = Utc::now().timestamp_millis();
        let cycle = self
            .store
            .publish_with(outcome, published_at_ms, |cycle| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(CycleError::Cancelled);
                }
                if let Some(history) = &self.history {
                    lock(history).append(cycle)?;
                }
                Ok(())
            })?;

        info!(
            version = cycle.version,
            objects = cycle.snapshot.total_tracked,
            events = cycle.events.len(),
            kessler_risk_index = cycle.snapshot.kessler_risk_index,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle published"
        );
        Ok(cycle)
    }
}

fn lock(history: &Mutex<CycleHistory>) -> MutexGuard<'_, CycleHistory> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}
