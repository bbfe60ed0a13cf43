//! Collision probability estimation.
//!
//! Each object's radial / in-track / cross-track sigmas are rotated into the
//! inertial frame at TCA, the two covariances are summed and the result is
//! projected onto the encounter plane (normal to the relative velocity). The
//! probability is the mass of the projected 2D Gaussian that falls inside the
//! combined hard-body disk centred on the miss vector.

use crate::screener::Candidate;
use orbitwatch_core::{
    ConjunctionEvent, ConjunctionEventBuilder, CovarianceModel, EventError,
    PositionUncertainty, ProbabilitySettings, RegimeBands, RiskLevel, StateVector,
    TrackedObject,
};
use orbitwatch_orbit::classify_altitude;
use std::f64::consts::{PI, SQRT_2};

/// Variances below this (km^2) carry no usable information.
const MIN_VARIANCE_KM2: f64 = 1e-18;

type Vec3 = [f64; 3];
type Mat3 = [[f64; 3]; 3];

fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn scale(a: &Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn unit(a: &Vec3) -> Option<Vec3> {
    let n = dot(a, a).sqrt();
    (n > 0.0 && n.is_finite()).then(|| scale(a, 1.0 / n))
}

fn mat_vec(m: &Mat3, v: &Vec3) -> Vec3 {
    [dot(&m[0], v), dot(&m[1], v), dot(&m[2], v)]
}

/// Exponentially scaled modified Bessel function of the first kind, order zero:
/// `exp(-|x|) * I0(x)`. Polynomial fits from Abramowitz & Stegun 9.8.1-9.8.2.
pub fn bessel_i0e(x: f64) -> f64 {
    let ax = x.abs();
    if ax <= 3.75 {
        let t = (ax / 3.75).powi(2);
        let i0 = 1.0
            + t * (3.515_622_9
                + t * (3.089_942_4
                    + t * (1.206_749_2 + t * (0.265_973_2 + t * (0.036_076_8 + t * 0.004_581_3)))));
        i0 * (-ax).exp()
    } else {
        let t = 3.75 / ax;
        let poly = 0.398_942_28
            + t * (0.013_285_92
                + t * (0.002_253_19
                    + t * (-0.001_575_65
                        + t * (0.009_162_81
                            + t * (-0.020_577_06
                                + t * (0.026_355_37 + t * (-0.016_476_33 + t * 0.003_923_77)))))));
        poly / ax.sqrt()
    }
}

/// Complementary error function (Chebyshev fit, fractional error below 1.2e-7).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.265_512_23
            + t * (1.000_023_68
                + t * (0.374_091_96
                    + t * (0.096_784_18
                        + t * (-0.186_288_06
                            + t * (0.278_868_07
                                + t * (-1.135_203_98
                                    + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
            .exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// P(lo <= Z <= hi) for a standard normal Z, without cancellation in the tails.
fn normal_interval(lo: f64, hi: f64) -> f64 {
    if lo >= 0.0 {
        0.5 * (erfc(lo / SQRT_2) - erfc(hi / SQRT_2))
    } else if hi <= 0.0 {
        0.5 * (erfc(-hi / SQRT_2) - erfc(-lo / SQRT_2))
    } else {
        1.0 - 0.5 * (erfc(-lo / SQRT_2) + erfc(hi / SQRT_2))
    }
}

/// Composite Simpson's rule over `[a, b]` with `steps` rounded up to even.
fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64, steps: u32) -> f64 {
    let n = (steps.max(2) + 1) & !1;
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for k in 1..n {
        let weight = if k % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + k as f64 * h);
    }
    sum * h / 3.0
}

/// Probability that a circular 2D Gaussian (sigma per axis) centred `miss_km`
/// away falls inside a disk of radius `hbr_km`.
pub fn collision_probability_isotropic(miss_km: f64, sigma_km: f64, hbr_km: f64, steps: u32) -> f64 {
    if hbr_km <= 0.0 {
        return 0.0;
    }
    let var = sigma_km * sigma_km;
    let integrand = |r: f64| {
        // exp(-(r^2 + m^2) / 2s^2) * I0(rm / s^2), rewritten with the scaled Bessel
        // function so large arguments stay finite
        r / var * (-(r - miss_km).powi(2) / (2.0 * var)).exp() * bessel_i0e(r * miss_km / var)
    };
    simpson(integrand, 0.0, hbr_km, steps).clamp(0.0, 1.0)
}

/// Combined covariance projected onto the encounter plane.
///
/// The x axis points along the miss vector, y completes the plane and the
/// implicit z axis is the relative velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncounterGeometry {
    pub miss_km: f64,
    /// [[xx, xy], [xy, yy]] (km^2)
    pub covariance: [[f64; 2]; 2],
}

/// Inertial covariance of one object from its RIC sigmas.
fn inertial_covariance(state: &StateVector, sigma: &PositionUncertainty) -> Option<Mat3> {
    let radial = unit(&state.position_km)?;
    let cross_track = unit(&cross(&state.position_km, &state.velocity_km_s))?;
    let in_track = cross(&cross_track, &radial);

    let mut cov = [[0.0; 3]; 3];
    for (axis, s) in [
        (radial, sigma.radial_km),
        (in_track, sigma.in_track_km),
        (cross_track, sigma.cross_track_km),
    ] {
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += s * s * axis[i] * axis[j];
            }
        }
    }
    Some(cov)
}

impl EncounterGeometry {
    /// Project both objects' uncertainty into the encounter plane of `candidate`.
    ///
    /// `None` when the frame is undefined (zero relative velocity or a
    /// degenerate state).
    pub fn project(
        candidate: &Candidate,
        primary: &PositionUncertainty,
        secondary: &PositionUncertainty,
    ) -> Option<Self> {
        let c1 = inertial_covariance(&candidate.primary_state, primary)?;
        let c2 = inertial_covariance(&candidate.secondary_state, secondary)?;
        let mut combined = [[0.0; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                combined[i][j] = c1[i][j] + c2[i][j];
            }
        }

        let z = unit(&candidate.relative_velocity())?;
        let dr = candidate.relative_position();
        let in_plane = {
            let along = dot(&dr, &z);
            [dr[0] - along * z[0], dr[1] - along * z[1], dr[2] - along * z[2]]
        };
        let miss_km = dot(&in_plane, &in_plane).sqrt();
        let x = match unit(&in_plane) {
            Some(x) if miss_km > 1e-12 => x,
            // direct hit: any in-plane axis will do
            _ => {
                let helper = if z[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
                unit(&cross(&z, &helper))?
            }
        };
        let y = cross(&z, &x);

        let cx = mat_vec(&combined, &x);
        let cy = mat_vec(&combined, &y);
        Some(Self {
            miss_km,
            covariance: [[dot(&x, &cx), dot(&x, &cy)], [dot(&y, &cx), dot(&y, &cy)]],
        })
    }

    /// Mean of the two in-plane variances (km^2)
    pub fn mean_variance(&self) -> f64 {
        0.5 * (self.covariance[0][0] + self.covariance[1][1])
    }
}

/// Probability from the full in-plane covariance, integrated numerically over
/// the hard-body disk.
pub fn collision_probability_diagonal(geometry: &EncounterGeometry, hbr_km: f64, steps: u32) -> f64 {
    if hbr_km <= 0.0 {
        return 0.0;
    }
    let [[a, b], [_, c]] = geometry.covariance;
    // rotate to the principal axes of the projected covariance
    let theta = 0.5 * (2.0 * b).atan2(a - c);
    let (sin_t, cos_t) = theta.sin_cos();
    let var_u = a * cos_t * cos_t + 2.0 * b * sin_t * cos_t + c * sin_t * sin_t;
    let var_v = a * sin_t * sin_t - 2.0 * b * sin_t * cos_t + c * cos_t * cos_t;
    if var_u <= MIN_VARIANCE_KM2 || var_v <= MIN_VARIANCE_KM2 {
        return 0.0;
    }
    let (sigma_u, sigma_v) = (var_u.sqrt(), var_v.sqrt());
    let miss_u = geometry.miss_km * cos_t;
    let miss_v = -geometry.miss_km * sin_t;

    let integrand = |x: f64| {
        let half_chord = (hbr_km * hbr_km - x * x).max(0.0).sqrt();
        let density = (-(x - miss_u).powi(2) / (2.0 * var_u)).exp() / ((2.0 * PI).sqrt() * sigma_u);
        density * normal_interval((miss_v - half_chord) / sigma_v, (miss_v + half_chord) / sigma_v)
    };
    simpson(integrand, -hbr_km, hbr_km, steps).clamp(0.0, 1.0)
}

/// Probability, risk level and action flag for one close approach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityEstimate {
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Miss-distance fallback was used
    pub low_confidence: bool,
    pub maneuver_required: bool,
}

/// Turns screening candidates into scored conjunction events
pub struct ProbabilityEstimator<'a> {
    settings: &'a ProbabilitySettings,
    bands: &'a RegimeBands,
}

impl<'a> ProbabilityEstimator<'a> {
    pub fn new(settings: &'a ProbabilitySettings, bands: &'a RegimeBands) -> Self {
        Self { settings, bands }
    }

    /// Catalog hard-body radius, or the configured default for the object type (m)
    pub fn hard_body_radius_m(&self, object: &TrackedObject) -> f64 {
        match object.hard_body_radius_m {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => self.settings.hard_body.for_type(object.object_type),
        }
    }

    fn fallback(&self, miss_km: f64) -> (f64, bool) {
        let p = (-miss_km / self.settings.fallback_length_km).exp();
        (p.clamp(0.0, 1.0), true)
    }

    pub fn estimate(
        &self,
        candidate: &Candidate,
        primary: &TrackedObject,
        secondary: &TrackedObject,
    ) -> ProbabilityEstimate {
        let hbr_km = (self.hard_body_radius_m(primary) + self.hard_body_radius_m(secondary)) / 1000.0;
        let steps = self.settings.integration_steps;

        let sigmas = match (&primary.uncertainty, &secondary.uncertainty) {
            (Some(a), Some(b)) if a.is_valid() && b.is_valid() => Some((a, b)),
            _ => None,
        };
        let geometry = sigmas.and_then(|(a, b)| EncounterGeometry::project(candidate, a, b));

        let (probability, low_confidence) = match geometry {
            Some(g) if g.mean_variance() > MIN_VARIANCE_KM2 => match self.settings.covariance_model {
                CovarianceModel::Isotropic => (
                    collision_probability_isotropic(g.miss_km, g.mean_variance().sqrt(), hbr_km, steps),
                    false,
                ),
                CovarianceModel::Diagonal => {
                    let [[a, _], [_, c]] = g.covariance;
                    if a.min(c) > MIN_VARIANCE_KM2 {
                        (collision_probability_diagonal(&g, hbr_km, steps), false)
                    } else {
                        self.fallback(candidate.miss_distance_km)
                    }
                }
            },
            _ => self.fallback(candidate.miss_distance_km),
        };

        ProbabilityEstimate {
            probability,
            risk_level: self.settings.thresholds.classify(probability),
            low_confidence,
            maneuver_required: probability >= self.settings.maneuver_threshold,
        }
    }

    /// Score a candidate and build its event.
    pub fn assess(
        &self,
        candidate: &Candidate,
        primary: &TrackedObject,
        secondary: &TrackedObject,
    ) -> Result<ConjunctionEvent, EventError> {
        let estimate = self.estimate(candidate, primary, secondary);
        let altitude_km = candidate.primary_state.altitude_km();
        ConjunctionEventBuilder::new(&candidate.primary_id, &candidate.secondary_id, candidate.tca_s)
            .miss_distance_km(candidate.miss_distance_km)
            .relative_velocity_km_s(candidate.relative_velocity_km_s)
            .probability(estimate.probability, estimate.risk_level, estimate.low_confidence)
            .location(altitude_km, classify_altitude(altitude_km, self.bands))
            .combined_hard_body_radius_m(self.hard_body_radius_m(primary) + self.hard_body_radius_m(secondary))
            .maneuver_required(estimate.maneuver_required)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitwatch_core::{KeplerianElements, ObjectType, Regime, R_EARTH};

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs().max(1e-300)
    }

    /// Head-on geometry at 500 km: primary along +y, secondary along +z, 5 m radial miss.
    fn candidate(miss_km: f64) -> Candidate {
        let r = R_EARTH + 500.0;
        let v = (orbitwatch_core::MU_EARTH / r).sqrt();
        Candidate {
            primary_id: "A".into(),
            secondary_id: "B".into(),
            tca_s: 1_200.0,
            miss_distance_km: miss_km,
            relative_velocity_km_s: v * SQRT_2,
            primary_state: StateVector {
                position_km: [r, 0.0, 0.0],
                velocity_km_s: [0.0, v, 0.0],
            },
            secondary_state: StateVector {
                position_km: [r + miss_km, 0.0, 0.0],
                velocity_km_s: [0.0, 0.0, v],
            },
        }
    }

    fn object(id: &str, sigma_km: Option<f64>) -> TrackedObject {
        let mut obj = TrackedObject::with_elements(
            id,
            ObjectType::Payload,
            0.0,
            KeplerianElements::circular(500.0, 0.0, 0.0, 0.0),
        )
        .hard_body_radius(5.0);
        obj.uncertainty = sigma_km.map(PositionUncertainty::isotropic);
        obj
    }

    #[test]
    fn test_bessel_i0e_reference_values() {
        assert!(close(bessel_i0e(0.0), 1.0, 1e-7));
        assert!(close(bessel_i0e(1.0), 0.465_759_607_593_640_4, 1e-6));
        assert!(close(bessel_i0e(-1.0), 0.465_759_607_593_640_4, 1e-6));
        assert!(close(bessel_i0e(10.0), 0.127_833_337_163_328_9, 1e-6));
    }

    #[test]
    fn test_isotropic_zero_miss_matches_closed_form() {
        let (sigma, hbr): (f64, f64) = (0.1, 0.02);
        let expected = 1.0 - (-(hbr * hbr) / (2.0 * sigma * sigma)).exp();
        let p = collision_probability_isotropic(0.0, sigma, hbr, 200);
        assert!(close(p, expected, 1e-6), "{p} vs {expected}");
    }

    #[test]
    fn test_isotropic_far_miss_is_negligible() {
        let p = collision_probability_isotropic(5.0, 0.1, 0.02, 200);
        assert!(p < 1e-100);
        assert!(p >= 0.0);
    }

    #[test]
    fn test_diagonal_agrees_with_isotropic_for_circular_covariance() {
        let geometry = EncounterGeometry {
            miss_km: 0.05,
            covariance: [[0.005, 0.0], [0.0, 0.005]],
        };
        let iso = collision_probability_isotropic(0.05, 0.005f64.sqrt(), 0.01, 400);
        let diag = collision_probability_diagonal(&geometry, 0.01, 400);
        assert!(close(diag, iso, 5e-3), "{diag} vs {iso}");
    }

    #[test]
    fn test_diagonal_respects_covariance_orientation() {
        let along_miss = EncounterGeometry {
            miss_km: 0.5,
            covariance: [[1.0, 0.0], [0.0, 0.01]],
        };
        let across_miss = EncounterGeometry {
            miss_km: 0.5,
            covariance: [[0.01, 0.0], [0.0, 1.0]],
        };
        assert!(
            collision_probability_diagonal(&along_miss, 0.01, 200)
                > 100.0 * collision_probability_diagonal(&across_miss, 0.01, 200)
        );
    }

    #[test]
    fn test_projection_of_isotropic_sigmas() {
        let g = EncounterGeometry::project(
            &candidate(0.005),
            &PositionUncertainty::isotropic(0.05),
            &PositionUncertainty::isotropic(0.05),
        )
        .unwrap();
        assert!(close(g.miss_km, 0.005, 1e-9));
        assert!(close(g.covariance[0][0], 0.005, 1e-9));
        assert!(close(g.covariance[1][1], 0.005, 1e-9));
        assert!(g.covariance[0][1].abs() < 1e-15);
    }

    #[test]
    fn test_collision_course_is_critical() {
        let settings = ProbabilitySettings::default();
        let bands = RegimeBands::default();
        let estimator = ProbabilityEstimator::new(&settings, &bands);

        let event = estimator
            .assess(&candidate(0.005), &object("A", Some(0.05)), &object("B", Some(0.05)))
            .unwrap();
        assert!(event.collision_probability > settings.thresholds.critical);
        assert!(close(event.collision_probability, 0.00998, 0.01));
        assert_eq!(event.risk_level, RiskLevel::Critical);
        assert!(event.maneuver_required);
        assert!(!event.low_confidence);
        assert_eq!(event.regime, Regime::Leo);
        assert_eq!(event.combined_hard_body_radius_m, 10.0);
    }

    #[test]
    fn test_missing_uncertainty_uses_fallback() {
        let settings = ProbabilitySettings::default();
        let bands = RegimeBands::default();
        let estimator = ProbabilityEstimator::new(&settings, &bands);

        let estimate = estimator.estimate(&candidate(0.005), &object("A", Some(0.05)), &object("B", None));
        assert!(estimate.low_confidence);
        assert!(close(estimate.probability, (-0.1f64).exp(), 1e-12));
        assert_eq!(estimate.risk_level, RiskLevel::Critical);

        let far = estimator.estimate(&candidate(4.0), &object("A", None), &object("B", None));
        assert!(far.probability < settings.thresholds.moderate);
        assert!(!far.maneuver_required);
    }

    #[test]
    fn test_diagonal_model_on_collision_course() {
        let settings = ProbabilitySettings {
            covariance_model: CovarianceModel::Diagonal,
            ..Default::default()
        };
        let bands = RegimeBands::default();
        let estimator = ProbabilityEstimator::new(&settings, &bands);
        let estimate = estimator.estimate(&candidate(0.005), &object("A", Some(0.05)), &object("B", Some(0.05)));
        assert!(close(estimate.probability, 0.00998, 0.01));
        assert!(!estimate.low_confidence);
    }

    #[test]
    fn test_default_hard_body_radius_by_type() {
        let settings = ProbabilitySettings::default();
        let bands = RegimeBands::default();
        let estimator = ProbabilityEstimator::new(&settings, &bands);
        let mut debris = TrackedObject::unparsed("D");
        debris.object_type = ObjectType::Debris;
        assert_eq!(estimator.hard_body_radius_m(&debris), settings.hard_body.debris_m);
        debris.hard_body_radius_m = Some(-1.0);
        assert_eq!(estimator.hard_body_radius_m(&debris), settings.hard_body.debris_m);
        assert_eq!(estimator.hard_body_radius_m(&debris.hard_body_radius(1.5)), 1.5);
    }
}
