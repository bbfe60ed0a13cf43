//! Cycle engine for OrbitWatch.
//!
//! Pulls the catalog once per cycle, runs classification, propagation,
//! screening, probability scoring and population aggregation on a rayon
//! worker pool, and publishes the result atomically to an in-memory
//! versioned store and an append-only SQLite history.

pub mod catalog;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod history;
pub mod scheduler;
pub mod store;

pub use catalog::{parse_catalog, CatalogError, CatalogSource, JsonFileCatalog, StaticCatalog};
pub use cycle::{run_cycle, CycleOutcome};
pub use engine::Engine;
pub use error::{CycleError, Result};
pub use history::{CycleHistory, HistoryError, HistoryHealth, HistoryMetrics};
pub use scheduler::{Scheduler, ShutdownHandle};
pub use store::{CycleSummary, PublishedCycle, SnapshotStore, GENESIS_FINGERPRINT};
