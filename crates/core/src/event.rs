//! Conjunction events produced by a screening cycle.
//!
//! Events are immutable once built. A later cycle supersedes them with a
//! fresh event set; the history store keeps the old ones for trend analysis.

use crate::types::Regime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrete risk level derived from collision probability.
///
/// Variants are declared in ascending order so `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Errors raised when an event would violate its invariants
#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("Conjunction requires two distinct objects, got {0} twice")]
    SameObject(String),

    #[error("Miss distance must be finite and non-negative, got {0}")]
    InvalidMissDistance(f64),

    #[error("Collision probability must lie in [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("Maneuver cannot be executed for event {0}: no maneuver was required")]
    ManeuverNotRequired(String),
}

/// Predicted close approach between two tracked objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionEvent {
    /// Deterministic identifier: `primary:secondary:tca_ms`
    pub event_id: String,
    pub primary_id: String,
    pub secondary_id: String,
    /// Time of closest approach (seconds since the Unix epoch)
    pub tca_epoch_s: f64,
    pub miss_distance_km: f64,
    pub relative_velocity_km_s: f64,
    pub collision_probability: f64,
    pub risk_level: RiskLevel,
    /// Probability came from the miss-distance fallback, not a covariance model
    pub low_confidence: bool,
    /// Altitude of the primary at TCA (km)
    pub altitude_km: f64,
    pub regime: Regime,
    pub combined_hard_body_radius_m: f64,
    pub maneuver_required: bool,
    pub maneuver_executed: bool,
}

impl ConjunctionEvent {
    /// Return a copy of this event with the maneuver marked as executed.
    ///
    /// Executed implies required; events that never required a maneuver are rejected.
    pub fn with_maneuver_executed(&self) -> Result<ConjunctionEvent, EventError> {
        if !self.maneuver_required {
            return Err(EventError::ManeuverNotRequired(self.event_id.clone()));
        }
        let mut executed = self.clone();
        executed.maneuver_executed = true;
        Ok(executed)
    }

    /// True if `id` is either party of the conjunction
    pub fn involves(&self, id: &str) -> bool {
        self.primary_id == id || self.secondary_id == id
    }
}

/// Builder for conjunction events.
pub struct ConjunctionEventBuilder {
    event: ConjunctionEvent,
}

impl ConjunctionEventBuilder {
    /// Start an event for a pair at a given TCA.
    pub fn new(primary_id: impl Into<String>, secondary_id: impl Into<String>, tca_epoch_s: f64) -> Self {
        let primary_id = primary_id.into();
        let secondary_id = secondary_id.into();
        let event_id = format!(
            "{}:{}:{}",
            primary_id,
            secondary_id,
            (tca_epoch_s * 1000.0).round() as i64
        );
        Self {
            event: ConjunctionEvent {
                event_id,
                primary_id,
                secondary_id,
                tca_epoch_s,
                miss_distance_km: 0.0,
                relative_velocity_km_s: 0.0,
                collision_probability: 0.0,
                risk_level: RiskLevel::Low,
                low_confidence: false,
                altitude_km: 0.0,
                regime: Regime::Other,
                combined_hard_body_radius_m: 0.0,
                maneuver_required: false,
                maneuver_executed: false,
            },
        }
    }

    pub fn miss_distance_km(mut self, miss_km: f64) -> Self {
        self.event.miss_distance_km = miss_km;
        self
    }

    pub fn relative_velocity_km_s(mut self, speed: f64) -> Self {
        self.event.relative_velocity_km_s = speed;
        self
    }

    pub fn probability(mut self, probability: f64, risk_level: RiskLevel, low_confidence: bool) -> Self {
        self.event.collision_probability = probability;
        self.event.risk_level = risk_level;
        self.event.low_confidence = low_confidence;
        self
    }

    pub fn location(mut self, altitude_km: f64, regime: Regime) -> Self {
        self.event.altitude_km = altitude_km;
        self.event.regime = regime;
        self
    }

    pub fn combined_hard_body_radius_m(mut self, radius_m: f64) -> Self {
        self.event.combined_hard_body_radius_m = radius_m;
        self
    }

    pub fn maneuver_required(mut self, required: bool) -> Self {
        self.event.maneuver_required = required;
        self
    }

    /// Validate invariants and build the event.
    pub fn build(self) -> Result<ConjunctionEvent, EventError> {
        let event = self.event;
        if event.primary_id == event.secondary_id {
            return Err(EventError::SameObject(event.primary_id));
        }
        if !event.miss_distance_km.is_finite() || event.miss_distance_km < 0.0 {
            return Err(EventError::InvalidMissDistance(event.miss_distance_km));
        }
        if !(0.0..=1.0).contains(&event.collision_probability) {
            return Err(EventError::InvalidProbability(event.collision_probability));
        }
        Ok(event)
    }
}
