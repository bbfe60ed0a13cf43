//! One evaluation cycle over a catalog snapshot.
//!
//! classify + propagate (parallel per object) -> screen (parallel per band
//! group) -> score (parallel per candidate) -> aggregate. Every parallel stage
//! collects into index order, so the outcome depends only on the catalog, the
//! epoch and the configuration.

use crate::error::{CycleError, Result};
use orbitwatch_conjunction::{screen, ProbabilityEstimator, ScreeningTarget};
use orbitwatch_core::{
    ConjunctionEvent, CycleDiagnostics, EngineConfig, PopulationSnapshot, Regime, TrackedObject,
};
use orbitwatch_orbit::{classify, KeplerOrbit};
use orbitwatch_population::{build_snapshot, ClassifiedObject, CycleInputs};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Snapshot and scored events of a completed, not yet published cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub snapshot: PopulationSnapshot,
    pub events: Vec<ConjunctionEvent>,
}

enum Defect {
    Duplicate,
    Malformed(String),
    Propagation(String),
}

struct Prepared {
    regime: Option<Regime>,
    perigee_km: Option<f64>,
    orbit: Option<KeplerOrbit>,
    defect: Option<Defect>,
}

impl Prepared {
    fn excluded(defect: Defect) -> Self {
        Self {
            regime: None,
            perigee_km: None,
            orbit: None,
            defect: Some(defect),
        }
    }
}

fn prepare(object: &TrackedObject, epoch_s: f64, config: &EngineConfig) -> Prepared {
    let regime = match classify(object, &config.regimes) {
        Ok(regime) => regime,
        Err(e) => return Prepared::excluded(Defect::Malformed(e.to_string())),
    };

    let orbit = KeplerOrbit::from_object(object, &config.propagation)
        .and_then(|orbit| orbit.rebase(epoch_s, &config.propagation));
    match orbit {
        Ok(orbit) => Prepared {
            regime: Some(regime),
            perigee_km: Some(orbit.perigee_altitude_km()),
            orbit: Some(orbit),
            defect: None,
        },
        // still counted in its regime, only kept out of screening
        Err(e) => Prepared {
            regime: Some(regime),
            perigee_km: None,
            orbit: None,
            defect: Some(Defect::Propagation(e.to_string())),
        },
    }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(CycleError::Cancelled);
    }
    Ok(())
}

/// Evaluate `objects` at `evaluation_epoch_s` on the current rayon pool.
///
/// Later records reusing an earlier id are dropped as input defects. Raising
/// `cancel` aborts with [`CycleError::Cancelled`] at the next stage boundary.
pub fn run_cycle(
    objects: &[TrackedObject],
    evaluation_epoch_s: f64,
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<CycleOutcome> {
    let mut seen = HashSet::with_capacity(objects.len());
    let duplicate: Vec<bool> = objects.iter().map(|o| !seen.insert(o.id.as_str())).collect();

    let prepared: Vec<Prepared> = objects
        .par_iter()
        .zip(duplicate.par_iter())
        .map(|(object, &duplicate)| {
            if duplicate {
                Prepared::excluded(Defect::Duplicate)
            } else {
                prepare(object, evaluation_epoch_s, config)
            }
        })
        .collect();

    let mut diagnostics = CycleDiagnostics {
        total_objects: objects.len() as u64,
        ..Default::default()
    };
    for (object, prepared) in objects.iter().zip(&prepared) {
        match &prepared.defect {
            None => continue,
            Some(Defect::Duplicate) => {
                diagnostics.malformed_objects += 1;
                warn!(object_id = %object.id, "Duplicate catalog id, record dropped");
            }
            Some(Defect::Malformed(e)) => {
                diagnostics.malformed_objects += 1;
                warn!(object_id = %object.id, error = %e, "Object excluded: malformed state");
            }
            Some(Defect::Propagation(e)) => {
                diagnostics.propagation_failures += 1;
                warn!(object_id = %object.id, error = %e, "Object excluded from screening: propagation failed");
            }
        }
        diagnostics.excluded_ids.push(object.id.clone());
    }
    diagnostics.excluded_ids.sort();
    diagnostics.excluded_ids.dedup();
    check_cancelled(cancel)?;

    let targets: Vec<ScreeningTarget> = objects
        .iter()
        .zip(&prepared)
        .filter_map(|(object, p)| {
            p.orbit
                .as_ref()
                .map(|orbit| ScreeningTarget::new(object.id.clone(), orbit.clone()))
        })
        .collect();
    let screening = screen(
        &targets,
        evaluation_epoch_s,
        &config.screening,
        &config.regimes,
        cancel,
    )?;
    check_cancelled(cancel)?;

    let by_id: HashMap<&str, &TrackedObject> = objects
        .iter()
        .zip(&duplicate)
        .filter(|(_, &duplicate)| !duplicate)
        .map(|(o, _)| (o.id.as_str(), o))
        .collect();
    let lookup = |id: &str| {
        by_id
            .get(id)
            .copied()
            .ok_or_else(|| CycleError::UnknownObject(id.to_string()))
    };

    let estimator = ProbabilityEstimator::new(&config.probability, &config.regimes);
    let events: Vec<ConjunctionEvent> = screening
        .candidates
        .par_iter()
        .map(|candidate| {
            let primary = lookup(&candidate.primary_id)?;
            let secondary = lookup(&candidate.secondary_id)?;
            Ok(estimator.assess(candidate, primary, secondary)?)
        })
        .collect::<Result<Vec<_>>>()?;
    check_cancelled(cancel)?;

    let classified: Vec<ClassifiedObject> = objects
        .iter()
        .zip(&prepared)
        .map(|(object, p)| ClassifiedObject {
            object,
            regime: p.regime,
            perigee_km: p.perigee_km,
        })
        .collect();

    let snapshot = build_snapshot(
        CycleInputs {
            evaluation_epoch_s,
            window_days: config.screening.window_days(),
            objects: &classified,
            events: &events,
            screening: screening.stats,
            diagnostics,
        },
        config,
    );

    debug!(
        objects = objects.len(),
        screened = targets.len(),
        events = events.len(),
        "Cycle evaluated"
    );
    Ok(CycleOutcome { snapshot, events })
}
