//! Closed-form two-body propagation.
//!
//! A [`KeplerOrbit`] holds validated elements at a reference epoch together
//! with the quantities that do not change along the orbit (mean motion,
//! semi-latus rectum, PQW rotation). Evaluating a state at any time only
//! advances the mean anomaly and solves Kepler's equation, so arbitrarily
//! long intervals cost the same as short ones.

use crate::elements::{
    mean_to_true_anomaly, normalize_angle, perifocal_state, pqw_rotation, state_to_elements,
};
use orbitwatch_core::{
    KeplerianElements, OrbitState, PropagationSettings, StateVector, TrackedObject,
    SECONDS_PER_DAY,
};
use thiserror::Error;
use tracing::debug;

/// Reasons an orbit cannot be propagated
#[derive(Debug, Error, PartialEq)]
pub enum PropagationError {
    #[error("Object has no orbit state")]
    MissingState,

    #[error("Orbit state contains non-finite values")]
    NonFinite,

    #[error("Orbit is not bound (eccentricity {0})")]
    Unbound(f64),

    #[error("Semi-major axis must be positive, got {0} km")]
    NonPositiveAxis(f64),

    #[error("Degenerate state vector: {0}")]
    Degenerate(&'static str),
}

/// Result type alias for orbit operations
pub type Result<T> = std::result::Result<T, PropagationError>;

/// A bound two-body orbit ready for repeated evaluation
#[derive(Debug, Clone)]
pub struct KeplerOrbit {
    elements: KeplerianElements,
    epoch_s: f64,
    mean_motion: f64,
    semi_latus_rectum: f64,
    rotation: [[f64; 3]; 3],
    tolerance: f64,
    max_iterations: u32,
}

impl KeplerOrbit {
    /// Validate elements and precompute the invariants of the orbit.
    pub fn new(
        elements: KeplerianElements,
        epoch_s: f64,
        settings: &PropagationSettings,
    ) -> Result<Self> {
        if !elements.is_finite() || !epoch_s.is_finite() {
            return Err(PropagationError::NonFinite);
        }
        if elements.semi_major_axis_km <= 0.0 {
            return Err(PropagationError::NonPositiveAxis(elements.semi_major_axis_km));
        }
        if !(0.0..1.0).contains(&elements.eccentricity) {
            return Err(PropagationError::Unbound(elements.eccentricity));
        }

        let e = elements.eccentricity;
        Ok(Self {
            elements,
            epoch_s,
            mean_motion: elements.mean_motion(),
            semi_latus_rectum: elements.semi_major_axis_km * (1.0 - e * e),
            rotation: pqw_rotation(
                elements.inclination_rad,
                elements.raan_rad,
                elements.arg_perigee_rad,
            ),
            tolerance: settings.kepler_tolerance,
            max_iterations: settings.kepler_max_iterations,
        })
    }

    /// Build from either state form. Cartesian states are converted first.
    pub fn from_state(
        state: &OrbitState,
        epoch_s: f64,
        settings: &PropagationSettings,
    ) -> Result<Self> {
        let elements = match state {
            OrbitState::Keplerian(elements) => *elements,
            OrbitState::Cartesian(sv) => state_to_elements(sv)?,
        };
        Self::new(elements, epoch_s, settings)
    }

    pub fn from_object(object: &TrackedObject, settings: &PropagationSettings) -> Result<Self> {
        let state = object.state.as_ref().ok_or(PropagationError::MissingState)?;
        Self::from_state(state, object.epoch_s, settings)
    }

    /// Same orbit referenced to another epoch. Intervals longer than the
    /// configured maximum are still propagated, only logged.
    pub fn rebase(&self, epoch_s: f64, settings: &PropagationSettings) -> Result<Self> {
        if !epoch_s.is_finite() {
            return Err(PropagationError::NonFinite);
        }
        let interval_days = (epoch_s - self.epoch_s).abs() / SECONDS_PER_DAY;
        if interval_days > settings.max_interval_days {
            debug!(
                interval_days,
                max_interval_days = settings.max_interval_days,
                "Propagating across a long interval"
            );
        }
        let mut rebased = self.clone();
        rebased.elements = self.elements_at(epoch_s);
        rebased.epoch_s = epoch_s;
        Ok(rebased)
    }

    pub fn elements(&self) -> &KeplerianElements {
        &self.elements
    }

    pub fn epoch_s(&self) -> f64 {
        self.epoch_s
    }

    /// Mean motion (rad/s)
    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }

    pub fn perigee_altitude_km(&self) -> f64 {
        self.elements.perigee_altitude_km()
    }

    pub fn apogee_altitude_km(&self) -> f64 {
        self.elements.apogee_altitude_km()
    }

    /// Mean anomaly at `t` (s since the Unix epoch), wrapped to [0, 2pi)
    pub fn mean_anomaly_at(&self, t: f64) -> f64 {
        normalize_angle(self.elements.mean_anomaly_rad + self.mean_motion * (t - self.epoch_s))
    }

    /// Elements at `t`. Only the mean anomaly changes.
    pub fn elements_at(&self, t: f64) -> KeplerianElements {
        KeplerianElements {
            mean_anomaly_rad: self.mean_anomaly_at(t),
            ..self.elements
        }
    }

    /// Inertial state at `t`
    pub fn state_at(&self, t: f64) -> StateVector {
        let e = self.elements.eccentricity;
        let nu = mean_to_true_anomaly(
            self.mean_anomaly_at(t),
            e,
            self.tolerance,
            self.max_iterations,
        );
        perifocal_state(self.semi_latus_rectum, e, nu, &self.rotation)
    }
}
