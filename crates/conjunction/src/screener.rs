//! Pairwise conjunction screening.
//!
//! Stages, cheapest first:
//! 1. Coarse filter: every object is placed in each altitude band its padded
//!    perigee..apogee range touches. Only objects sharing a band are paired,
//!    and a pair is handled by the first band it shares.
//! 2. Apsis filter: a pair whose altitude ranges are further apart than the
//!    screening distance can never come that close.
//! 3. Fine filter: relative distance is sampled on a fixed time grid and
//!    local minima that could still dip below the screening distance within
//!    one step are flagged. The first and last samples count as minima when
//!    they are below their only neighbour.
//! 4. Refinement: golden-section search around each flagged sample, bracketed
//!    by its neighbours and so never leaving the window.
//!
//! Band groups are screened in parallel on the current rayon pool. Results are
//! merged and sorted, so output does not depend on scheduling.

use orbitwatch_core::{Regime, RegimeBands, ScreeningSettings, ScreeningStats, StateVector};
use orbitwatch_orbit::{classify_altitude, KeplerOrbit};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Screening errors
#[derive(Debug, Error, PartialEq)]
pub enum ScreeningError {
    #[error("Invalid screening settings: {0}")]
    InvalidSettings(&'static str),

    #[error("Duplicate object id in screening set: {0}")]
    DuplicateId(String),

    #[error("Screening cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScreeningError>;

/// An object with a propagable orbit
#[derive(Debug, Clone)]
pub struct ScreeningTarget {
    pub id: String,
    pub orbit: KeplerOrbit,
}

impl ScreeningTarget {
    pub fn new(id: impl Into<String>, orbit: KeplerOrbit) -> Self {
        Self {
            id: id.into(),
            orbit,
        }
    }
}

/// A refined close approach within the screening distance.
///
/// The primary is always the object with the lexicographically smaller id.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub primary_id: String,
    pub secondary_id: String,
    /// Time of closest approach (s since the Unix epoch)
    pub tca_s: f64,
    pub miss_distance_km: f64,
    pub relative_velocity_km_s: f64,
    pub primary_state: StateVector,
    pub secondary_state: StateVector,
}

impl Candidate {
    /// Secondary position relative to the primary at TCA (km)
    pub fn relative_position(&self) -> [f64; 3] {
        sub(&self.secondary_state.position_km, &self.primary_state.position_km)
    }

    /// Secondary velocity relative to the primary at TCA (km/s)
    pub fn relative_velocity(&self) -> [f64; 3] {
        sub(&self.secondary_state.velocity_km_s, &self.primary_state.velocity_km_s)
    }
}

/// Candidates sorted by (TCA, primary, secondary) plus per-stage counts
#[derive(Debug, Clone, Default)]
pub struct ScreeningOutput {
    pub candidates: Vec<Candidate>,
    pub stats: ScreeningStats,
}

struct BandGroup {
    regime: Regime,
    band: i64,
    members: Vec<usize>,
}

#[derive(Default)]
struct GroupResult {
    coarse_pairs: u64,
    apsis_pairs: u64,
    flagged_minima: u64,
    candidates: Vec<Candidate>,
}

struct Span {
    perigee_km: f64,
    apogee_km: f64,
    first_band: i64,
    last_band: i64,
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm(a: &[f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn check_settings(settings: &ScreeningSettings) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(settings.screening_distance_km) {
        return Err(ScreeningError::InvalidSettings("screening distance must be positive"));
    }
    if !positive(settings.band_width_km) {
        return Err(ScreeningError::InvalidSettings("band width must be positive"));
    }
    if !positive(settings.window_hours) || !positive(settings.time_step_s) {
        return Err(ScreeningError::InvalidSettings("window and time step must be positive"));
    }
    if !positive(settings.refine_time_tolerance_s) || settings.refine_max_iterations == 0 {
        return Err(ScreeningError::InvalidSettings("refinement tolerance must be positive"));
    }
    Ok(())
}

/// Screen all pairs of `targets` over the window starting at `window_start_s`.
///
/// Returns [`ScreeningError::Cancelled`] if `cancel` is raised before the
/// merge; partial results are discarded.
pub fn screen(
    targets: &[ScreeningTarget],
    window_start_s: f64,
    settings: &ScreeningSettings,
    bands: &RegimeBands,
    cancel: &AtomicBool,
) -> Result<ScreeningOutput> {
    check_settings(settings)?;

    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(target.id.as_str()) {
            return Err(ScreeningError::DuplicateId(target.id.clone()));
        }
    }

    let pad = settings.screening_distance_km;
    let width = settings.band_width_km;
    let spans: Vec<Span> = targets
        .iter()
        .map(|t| {
            let perigee_km = t.orbit.perigee_altitude_km();
            let apogee_km = t.orbit.apogee_altitude_km();
            Span {
                perigee_km,
                apogee_km,
                first_band: ((perigee_km - pad) / width).floor() as i64,
                last_band: ((apogee_km + pad) / width).floor() as i64,
            }
        })
        .collect();

    let mut by_band: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (index, span) in spans.iter().enumerate() {
        for band in span.first_band..=span.last_band {
            by_band.entry(band).or_default().push(index);
        }
    }
    let groups: Vec<BandGroup> = by_band
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(band, members)| BandGroup {
            regime: classify_altitude((band as f64 + 0.5) * width, bands),
            band,
            members,
        })
        .collect();

    let grid = sample_times(window_start_s, settings);
    let results: Vec<GroupResult> = groups
        .par_iter()
        .map(|group| screen_group(group, targets, &spans, &grid, settings, cancel))
        .collect();

    if cancel.load(Ordering::Relaxed) {
        return Err(ScreeningError::Cancelled);
    }

    let n = targets.len() as u64;
    let mut output = ScreeningOutput {
        candidates: Vec::new(),
        stats: ScreeningStats {
            screened_objects: n,
            naive_pairs: n * n.saturating_sub(1) / 2,
            ..Default::default()
        },
    };
    for result in results {
        output.stats.coarse_pairs += result.coarse_pairs;
        output.stats.apsis_pairs += result.apsis_pairs;
        output.stats.flagged_minima += result.flagged_minima;
        output.candidates.extend(result.candidates);
    }
    output.candidates.sort_by(|a, b| {
        a.tca_s
            .total_cmp(&b.tca_s)
            .then_with(|| a.primary_id.cmp(&b.primary_id))
            .then_with(|| a.secondary_id.cmp(&b.secondary_id))
    });
    output.stats.candidates = output.candidates.len() as u64;

    debug!(
        objects = output.stats.screened_objects,
        naive_pairs = output.stats.naive_pairs,
        coarse_pairs = output.stats.coarse_pairs,
        apsis_pairs = output.stats.apsis_pairs,
        flagged = output.stats.flagged_minima,
        candidates = output.stats.candidates,
        "Screening complete"
    );
    Ok(output)
}

/// Sample times from the window start to its end inclusive.
fn sample_times(start_s: f64, settings: &ScreeningSettings) -> Vec<f64> {
    let window = settings.window_s();
    let steps = (window / settings.time_step_s).ceil() as usize;
    (0..=steps)
        .map(|k| start_s + (k as f64 * settings.time_step_s).min(window))
        .collect()
}

fn screen_group(
    group: &BandGroup,
    targets: &[ScreeningTarget],
    spans: &[Span],
    grid: &[f64],
    settings: &ScreeningSettings,
    cancel: &AtomicBool,
) -> GroupResult {
    let mut result = GroupResult::default();
    if cancel.load(Ordering::Relaxed) {
        return result;
    }

    for (pos, &i) in group.members.iter().enumerate() {
        for &j in &group.members[pos + 1..] {
            let (si, sj) = (&spans[i], &spans[j]);
            // handled by the first band the pair shares
            if si.first_band.max(sj.first_band) != group.band {
                continue;
            }
            result.coarse_pairs += 1;

            let gap = si.perigee_km.max(sj.perigee_km) - si.apogee_km.min(sj.apogee_km);
            if gap > settings.screening_distance_km {
                continue;
            }
            result.apsis_pairs += 1;

            let (primary, secondary) = if targets[i].id <= targets[j].id {
                (&targets[i], &targets[j])
            } else {
                (&targets[j], &targets[i])
            };
            let flagged = fine_filter(primary, secondary, grid, settings);
            result.flagged_minima += flagged.len() as u64;

            let last = grid.len() - 1;
            let mut found: Vec<Candidate> = Vec::new();
            for (k, sampled) in flagged {
                let lo = grid[k.saturating_sub(1)];
                let hi = grid[(k + 1).min(last)];
                let candidate = refine(primary, secondary, lo, hi, grid[k], sampled, settings);
                if candidate.miss_distance_km > settings.screening_distance_km {
                    continue;
                }
                match found.last_mut() {
                    Some(last) if candidate.tca_s - last.tca_s < settings.time_step_s => {
                        if candidate.miss_distance_km < last.miss_distance_km {
                            *last = candidate;
                        }
                    }
                    _ => found.push(candidate),
                }
            }
            result.candidates.extend(found);
        }
    }

    if !result.candidates.is_empty() {
        debug!(
            regime = %group.regime,
            band = group.band,
            candidates = result.candidates.len(),
            "Band group produced candidates"
        );
    }
    result
}

/// Grid indices of local minima worth refining, with their sampled distance.
///
/// A minimum on the first or last sample may sit on the window boundary or
/// just beyond it; refinement clamps it to the window.
fn fine_filter(
    primary: &ScreeningTarget,
    secondary: &ScreeningTarget,
    grid: &[f64],
    settings: &ScreeningSettings,
) -> Vec<(usize, f64)> {
    let samples: Vec<(f64, f64)> = grid
        .iter()
        .map(|&t| {
            let a = primary.orbit.state_at(t);
            let b = secondary.orbit.state_at(t);
            (
                norm(&sub(&b.position_km, &a.position_km)),
                norm(&sub(&b.velocity_km_s, &a.velocity_km_s)),
            )
        })
        .collect();

    let mut flagged = Vec::new();
    if samples.len() < 2 {
        return flagged;
    }
    let last = samples.len() - 1;
    for (k, &(d, v)) in samples.iter().enumerate() {
        let prev = k.checked_sub(1).map(|i| samples[i]);
        let next = (k < last).then(|| samples[k + 1]);
        let is_minimum = match (prev, next) {
            (Some((d_prev, _)), Some((d_next, _))) => d < d_prev && d <= d_next,
            (None, Some((d_next, _))) => d < d_next,
            (Some((d_prev, _)), None) => d < d_prev,
            (None, None) => false,
        };
        if !is_minimum {
            continue;
        }
        let v_max = [prev, next]
            .iter()
            .flatten()
            .fold(v, |acc, &(_, v_n)| acc.max(v_n));
        if d - v_max * settings.time_step_s <= settings.screening_distance_km {
            flagged.push((k, d));
        }
    }
    flagged
}

fn separation_sq(primary: &ScreeningTarget, secondary: &ScreeningTarget, t: f64) -> f64 {
    let a = primary.orbit.state_at(t);
    let b = secondary.orbit.state_at(t);
    let d = sub(&b.position_km, &a.position_km);
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

/// Golden-section search for the separation minimum inside `[lo, hi]`.
fn refine(
    primary: &ScreeningTarget,
    secondary: &ScreeningTarget,
    mut lo: f64,
    mut hi: f64,
    sample_t: f64,
    sample_distance: f64,
    settings: &ScreeningSettings,
) -> Candidate {
    let f = |t: f64| separation_sq(primary, secondary, t);
    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    for _ in 0..settings.refine_max_iterations {
        if hi - lo <= settings.refine_time_tolerance_s {
            break;
        }
        if f1 < f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = f(x2);
        }
    }

    let mut tca = 0.5 * (lo + hi);
    // a bracket that is not unimodal can walk away from the sampled minimum
    if f(tca).sqrt() > sample_distance {
        tca = sample_t;
    }

    let primary_state = primary.orbit.state_at(tca);
    let secondary_state = secondary.orbit.state_at(tca);
    Candidate {
        primary_id: primary.id.clone(),
        secondary_id: secondary.id.clone(),
        tca_s: tca,
        miss_distance_km: norm(&sub(&secondary_state.position_km, &primary_state.position_km)),
        relative_velocity_km_s: norm(&sub(
            &secondary_state.velocity_km_s,
            &primary_state.velocity_km_s,
        )),
        primary_state,
        secondary_state,
    }
}
