//! Kessler Risk Index and snapshot assembly.
//!
//! The index maps a weighted sum of three normalised pressures onto a
//! bounded scale with `max * (1 - exp(-raw))`:
//! - density: mean over regimes of population / reference population
//! - collision: summed event probability per object / reference
//! - growth: non-negative net objects per year / reference
//!
//! Each term is non-decreasing in its input and the weights are
//! non-negative, so the index is monotone in every input.

use crate::compliance::evaluate_compliance;
use crate::forecast::{forecast, growth, PopulationCounts};
use orbitwatch_core::{
    ConjunctionEvent, CycleDiagnostics, EngineConfig, KesslerWeights, ObjectType,
    PopulationSnapshot, Regime, RegimeStats, ScreeningStats, TrackedObject,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Inputs of the Kessler Risk Index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KesslerInputs {
    pub regime_population: BTreeMap<Regime, u64>,
    pub probability_sum: f64,
    pub object_count: u64,
    pub net_growth_per_year: f64,
}

/// Kessler Risk Index on `[0, weights.max_index]`.
pub fn kessler_index(inputs: &KesslerInputs, weights: &KesslerWeights) -> f64 {
    let ratios: Vec<f64> = Regime::ALL
        .iter()
        .filter_map(|regime| {
            let reference = weights.reference_population.for_regime(*regime);
            (reference > 0.0).then(|| {
                inputs.regime_population.get(regime).copied().unwrap_or(0) as f64 / reference
            })
        })
        .collect();
    let density = if ratios.is_empty() {
        0.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };

    let collision = if inputs.object_count == 0 {
        0.0
    } else {
        inputs.probability_sum.max(0.0)
            / inputs.object_count as f64
            / weights.reference_probability_per_object
    };

    let growth = inputs.net_growth_per_year.max(0.0) / weights.reference_growth_per_year;

    let raw = weights.density_weight * density
        + weights.probability_weight * collision
        + weights.growth_weight * growth;
    if raw.is_nan() || raw <= 0.0 {
        return 0.0;
    }
    weights.max_index * (1.0 - (-raw).exp())
}

/// An input object with its classification outcome.
///
/// `regime` and `perigee_km` are `None` for objects without a usable state.
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedObject<'a> {
    pub object: &'a TrackedObject,
    pub regime: Option<Regime>,
    pub perigee_km: Option<f64>,
}

/// Everything a cycle hands to the aggregator
pub struct CycleInputs<'a> {
    pub evaluation_epoch_s: f64,
    pub window_days: f64,
    pub objects: &'a [ClassifiedObject<'a>],
    pub events: &'a [ConjunctionEvent],
    pub screening: ScreeningStats,
    pub diagnostics: CycleDiagnostics,
}

fn count_object(stats: &mut RegimeStats, object: &TrackedObject) {
    match object.object_type {
        ObjectType::Debris => stats.debris += 1,
        ObjectType::Unknown => stats.unknown += 1,
        ObjectType::Payload | ObjectType::RocketBody => {
            if object.active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
        }
    }
}

/// Roll classified objects and scored events into the cycle snapshot.
pub fn build_snapshot(inputs: CycleInputs<'_>, config: &EngineConfig) -> PopulationSnapshot {
    let mut snapshot = PopulationSnapshot::empty(inputs.evaluation_epoch_s, inputs.window_days);
    snapshot.total_tracked = inputs.objects.len() as u64;

    for classified in inputs.objects {
        if let Some(regime) = classified.regime {
            if let Some(stats) = snapshot.regimes.get_mut(&regime) {
                count_object(stats, classified.object);
            }
        }
    }

    let mut probability_sum = 0.0;
    for event in inputs.events {
        if let Some(stats) = snapshot.regimes.get_mut(&event.regime) {
            stats.conjunctions += 1;
            stats.probability_sum += event.collision_probability;
        }
        if let Some(count) = snapshot.risk_levels.get_mut(&event.risk_level) {
            *count += 1;
        }
        if event.maneuver_required {
            snapshot.maneuvers_required += 1;
        }
        probability_sum += event.collision_probability;
    }
    snapshot.event_count = inputs.events.len() as u64;
    snapshot.conjunctions_per_day = if inputs.window_days > 0.0 {
        inputs.events.len() as f64 / inputs.window_days
    } else {
        0.0
    };

    let (mut current_total, mut total_1y, mut total_5y) = (0.0, 0.0, 0.0);
    let mut net_growth = 0.0;
    for (regime, stats) in snapshot.regimes.iter_mut() {
        let counts = PopulationCounts::from_stats(stats);
        let outlook = forecast(&counts, config.forecast.rates(*regime));
        stats.projected_active_1y = outlook.one_year.active;
        stats.projected_active_5y = outlook.five_year.active;
        stats.projected_total_1y = outlook.one_year.total();
        stats.projected_total_5y = outlook.five_year.total();
        stats.growth_1y = outlook.growth_1y;
        stats.growth_5y = outlook.growth_5y;

        current_total += counts.total();
        total_1y += outlook.one_year.total();
        total_5y += outlook.five_year.total();
        net_growth += outlook.net_growth_per_year;
    }
    snapshot.net_growth_per_year = net_growth;
    snapshot.growth_1y = growth(current_total, total_1y);
    snapshot.growth_5y = growth(current_total, total_5y);

    snapshot.compliance = evaluate_compliance(
        inputs.objects.iter().map(|c| (c.object, c.perigee_km)),
        &config.compliance,
    );

    let kessler = KesslerInputs {
        regime_population: snapshot.regimes.iter().map(|(r, s)| (*r, s.total())).collect(),
        probability_sum,
        object_count: snapshot.regimes.values().map(RegimeStats::total).sum(),
        net_growth_per_year: net_growth,
    };
    snapshot.kessler_risk_index = kessler_index(&kessler, &config.kessler);

    snapshot.screening = inputs.screening;
    snapshot.diagnostics = inputs.diagnostics;

    debug!(
        objects = snapshot.total_tracked,
        events = snapshot.event_count,
        kessler_risk_index = snapshot.kessler_risk_index,
        "Snapshot aggregated"
    );
    snapshot
}
