//! Core types and utilities for the OrbitWatch population and conjunction-risk engine.
//!
//! This crate provides the shared data model (tracked objects, conjunction events,
//! population snapshots), the validated engine configuration, error types and
//! logging initialisation used across the OrbitWatch workspace.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod snapshot;
pub mod types;

pub use config::{
    CompliancePolicy, ConfigManager, CovarianceModel, CycleSettings, EngineConfig,
    ForecastSettings, HardBodyDefaults, KesslerWeights, ProbabilitySettings,
    PropagationSettings, ReferencePopulation, RegimeBands, RegimeRates, RiskThresholds,
    ScreeningSettings,
};
pub use error::{ConfigError, CoreError, Result};
pub use event::{ConjunctionEvent, ConjunctionEventBuilder, EventError, RiskLevel};
pub use snapshot::{
    ComplianceSummary, CycleDiagnostics, PopulationSnapshot, RegimeStats, ScreeningStats,
};
pub use types::{
    KeplerianElements, Lifetime, ObjectType, OrbitState, PositionUncertainty, Regime,
    StateVector, TrackedObject, MU_EARTH, R_EARTH, SECONDS_PER_DAY, SECONDS_PER_YEAR,
};
