//! Population snapshot produced once per computation cycle.
//!
//! A snapshot never carries wall-clock data: identical catalog, epoch and
//! configuration always produce byte-identical JSON and therefore the same
//! fingerprint. Publication metadata lives on the engine's published wrapper.

use crate::event::RiskLevel;
use crate::types::Regime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-regime counts, event statistics and projections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub active: u64,
    pub inactive: u64,
    pub debris: u64,
    pub unknown: u64,
    /// Events whose TCA falls in this regime
    pub conjunctions: u64,
    /// Sum of collision probabilities of those events
    pub probability_sum: f64,
    pub projected_active_1y: f64,
    pub projected_active_5y: f64,
    pub projected_total_1y: f64,
    pub projected_total_5y: f64,
    /// projected_total / current_total - 1; `None` when the regime is empty
    pub growth_1y: Option<f64>,
    pub growth_5y: Option<f64>,
}

impl RegimeStats {
    pub fn total(&self) -> u64 {
        self.active + self.inactive + self.debris + self.unknown
    }
}

/// 25-year rule compliance counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Objects the rule was evaluated against (indefinite lifetimes included)
    pub evaluated: u64,
    pub compliant: u64,
    pub non_compliant: u64,
    /// Indefinite lifetimes, excluded from numerator and denominator
    pub indefinite_excluded: u64,
    /// compliant / (compliant + non_compliant); `None` when undefined
    pub rate: Option<f64>,
}

/// Survivors of each screening stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningStats {
    /// Objects with a propagable orbit
    pub screened_objects: u64,
    /// n * (n - 1) / 2 over screened objects
    pub naive_pairs: u64,
    /// Distinct pairs sharing an altitude band
    pub coarse_pairs: u64,
    /// Pairs whose perigee..apogee ranges overlap
    pub apsis_pairs: u64,
    /// Sampled local minima sent to refinement
    pub flagged_minima: u64,
    /// Refined minima within the screening distance
    pub candidates: u64,
}

impl ScreeningStats {
    /// naive_pairs / apsis_pairs; `None` when nothing survived the filters
    pub fn reduction_factor(&self) -> Option<f64> {
        if self.apsis_pairs == 0 {
            return None;
        }
        Some(self.naive_pairs as f64 / self.apsis_pairs as f64)
    }
}

/// Input defects and propagation failures seen during a cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleDiagnostics {
    pub total_objects: u64,
    /// Objects without a usable state (excluded from regime aggregates)
    pub malformed_objects: u64,
    /// Objects with degenerate elements (excluded from screening)
    pub propagation_failures: u64,
    /// Sorted ids of every excluded object
    pub excluded_ids: Vec<String>,
}

/// Population-level summary for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    /// Evaluation epoch (seconds since the Unix epoch)
    pub evaluation_epoch_s: f64,
    /// Screening window length (days)
    pub window_days: f64,
    pub total_tracked: u64,
    pub regimes: BTreeMap<Regime, RegimeStats>,
    /// Bounded 0-10 aggregate collision-cascade risk
    pub kessler_risk_index: f64,
    pub conjunctions_per_day: f64,
    pub event_count: u64,
    pub risk_levels: BTreeMap<RiskLevel, u64>,
    pub maneuvers_required: u64,
    pub compliance: ComplianceSummary,
    /// Objects per year added minus objects decayed, first projected year
    pub net_growth_per_year: f64,
    pub growth_1y: Option<f64>,
    pub growth_5y: Option<f64>,
    pub screening: ScreeningStats,
    pub diagnostics: CycleDiagnostics,
}

impl PopulationSnapshot {
    /// Snapshot with every regime present and all counts zero.
    pub fn empty(evaluation_epoch_s: f64, window_days: f64) -> Self {
        Self {
            evaluation_epoch_s,
            window_days,
            regimes: Regime::ALL
                .iter()
                .map(|r| (*r, RegimeStats::default()))
                .collect(),
            risk_levels: RiskLevel::ALL.iter().map(|l| (*l, 0)).collect(),
            ..Default::default()
        }
    }

    /// Active objects across all regimes
    pub fn active_total(&self) -> u64 {
        self.regimes.values().map(|s| s.active).sum()
    }

    /// Projected active objects across all regimes at +1 year
    pub fn projected_active_1y(&self) -> f64 {
        self.regimes.values().map(|s| s.projected_active_1y).sum()
    }

    /// Projected active objects across all regimes at +5 years
    pub fn projected_active_5y(&self) -> f64 {
        self.regimes.values().map(|s| s.projected_active_5y).sum()
    }

    /// BLAKE3 over the canonical JSON encoding, hex encoded.
    pub fn fingerprint(&self) -> crate::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}
