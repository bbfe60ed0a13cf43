//! Versioned arena of published cycles.
//!
//! Published cycles are immutable and shared as `Arc`s, so a reader holding
//! the latest version keeps a complete snapshot and event set even while the
//! next cycle is being published. Versions increase by one per publication
//! and each cycle records the fingerprint of the one before it.

use crate::cycle::CycleOutcome;
use orbitwatch_core::{ConjunctionEvent, CoreError, PopulationSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Previous fingerprint of the first published cycle
pub const GENESIS_FINGERPRINT: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One published cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedCycle {
    pub version: u64,
    /// Publication wall-clock time (Unix milliseconds)
    pub published_at_ms: i64,
    /// BLAKE3 of the snapshot, hex encoded
    pub fingerprint: String,
    pub previous_fingerprint: String,
    pub snapshot: PopulationSnapshot,
    pub events: Vec<ConjunctionEvent>,
}

/// Headline figures of a published cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub version: u64,
    pub published_at_ms: i64,
    pub fingerprint: String,
    pub evaluation_epoch_s: f64,
    pub total_tracked: u64,
    pub event_count: u64,
    pub kessler_risk_index: f64,
}

impl PublishedCycle {
    pub fn summary(&self) -> CycleSummary {
        CycleSummary {
            version: self.version,
            published_at_ms: self.published_at_ms,
            fingerprint: self.fingerprint.clone(),
            evaluation_epoch_s: self.snapshot.evaluation_epoch_s,
            total_tracked: self.snapshot.total_tracked,
            event_count: self.snapshot.event_count,
            kessler_risk_index: self.snapshot.kessler_risk_index,
        }
    }
}

/// Latest-first store of published cycles, bounded by `retention`
#[derive(Debug)]
pub struct SnapshotStore {
    cycles: RwLock<Vec<Arc<PublishedCycle>>>,
    retention: usize,
}

impl SnapshotStore {
    pub fn new(retention: usize) -> Self {
        Self {
            cycles: RwLock::new(Vec::new()),
            retention: retention.max(1),
        }
    }

    /// Latest complete cycle, `None` before the first publication.
    pub fn latest(&self) -> Option<Arc<PublishedCycle>> {
        self.read().last().cloned()
    }

    pub fn get(&self, version: u64) -> Option<Arc<PublishedCycle>> {
        self.read().iter().find(|c| c.version == version).cloned()
    }

    /// Summaries of retained cycles, newest first.
    pub fn summaries(&self) -> Vec<CycleSummary> {
        self.read().iter().rev().map(|c| c.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Seed the store with a cycle recovered from durable history.
    pub fn restore(&self, cycle: PublishedCycle) {
        let mut cycles = self.write();
        cycles.push(Arc::new(cycle));
        cycles.sort_by_key(|c| c.version);
        self.trim(&mut cycles);
    }

    /// Publish `outcome` as the next version.
    ///
    /// `commit` runs while the store is locked and before the cycle becomes
    /// visible; if it fails nothing is published and its error is returned.
    pub fn publish_with<F, E>(
        &self,
        outcome: CycleOutcome,
        published_at_ms: i64,
        commit: F,
    ) -> Result<Arc<PublishedCycle>, E>
    where
        F: FnOnce(&PublishedCycle) -> Result<(), E>,
        E: From<CoreError>,
    {
        let mut cycles = self.write();
        let (version, previous_fingerprint) = match cycles.last() {
            Some(last) => (last.version + 1, last.fingerprint.clone()),
            None => (1, GENESIS_FINGERPRINT.to_string()),
        };

        let cycle = PublishedCycle {
            version,
            published_at_ms,
            fingerprint: outcome.snapshot.fingerprint()?,
            previous_fingerprint,
            snapshot: outcome.snapshot,
            events: outcome.events,
        };
        commit(&cycle)?;

        let cycle = Arc::new(cycle);
        cycles.push(cycle.clone());
        self.trim(&mut cycles);
        Ok(cycle)
    }

    fn trim(&self, cycles: &mut Vec<Arc<PublishedCycle>>) {
        if cycles.len() > self.retention {
            let excess = cycles.len() - self.retention;
            cycles.drain(..excess);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<PublishedCycle>>> {
        self.cycles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<PublishedCycle>>> {
        self.cycles.write().unwrap_or_else(PoisonError::into_inner)
    }
}
