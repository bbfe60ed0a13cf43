//! Population-level analytics for OrbitWatch.
//!
//! Compliance with the 25-year deorbit guideline, per-regime population
//! forecasts and the Kessler Risk Index, rolled up into the cycle's
//! [`PopulationSnapshot`](orbitwatch_core::PopulationSnapshot).

pub mod aggregator;
pub mod compliance;
pub mod forecast;
pub mod lifetime;

pub use aggregator::{build_snapshot, kessler_index, ClassifiedObject, CycleInputs, KesslerInputs};
pub use compliance::{evaluate_compliance, ComplianceStatus};
pub use forecast::{forecast, PopulationCounts, RegimeForecast};
pub use lifetime::{atmospheric_density, estimate_lifetime};
