//! Conjunction screening and collision probability for OrbitWatch.
//!
//! [`screener`] reduces the O(n^2) pair space with altitude bucketing and an
//! apsis filter before sampling relative distance and refining each local
//! minimum to a time of closest approach. [`probability`] turns a refined
//! close approach into a collision probability, risk level and event.

pub mod probability;
pub mod screener;

pub use probability::{
    bessel_i0e, collision_probability_diagonal, collision_probability_isotropic,
    EncounterGeometry, ProbabilityEstimate, ProbabilityEstimator,
};
pub use screener::{screen, Candidate, ScreeningError, ScreeningOutput, ScreeningTarget};
