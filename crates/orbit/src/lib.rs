//! Orbital mechanics for OrbitWatch.
//!
//! Closed-form two-body propagation, Cartesian/Keplerian conversion and
//! regime classification. Everything here is pure and allocation-free so it
//! can run inside the engine's worker pool without coordination.

pub mod classifier;
pub mod elements;
pub mod propagator;

pub use classifier::{classify, classify_altitude, classify_range, ClassifyError};
pub use elements::{
    elements_to_state, mean_to_eccentric_anomaly, mean_to_true_anomaly, normalize_angle,
    state_to_elements,
};
pub use propagator::{KeplerOrbit, PropagationError, Result};
