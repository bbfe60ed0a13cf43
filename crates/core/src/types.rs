//! Tracked-object data model and physical constants.
//!
//! Units throughout the workspace: kilometres, kilometres per second,
//! seconds and radians. Hard-body radii are carried in metres because
//! catalogs publish them that way.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Earth gravitational parameter (km^3/s^2)
pub const MU_EARTH: f64 = 398_600.4418;
/// Earth equatorial radius (km)
pub const R_EARTH: f64 = 6_378.137;
/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;
/// Seconds per Julian year
pub const SECONDS_PER_YEAR: f64 = 365.25 * SECONDS_PER_DAY;

/// Catalog object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Spacecraft
    #[serde(alias = "PAYLOAD")]
    Payload,
    /// Spent launch-vehicle stage
    #[serde(alias = "ROCKET BODY", alias = "ROCKET_BODY")]
    RocketBody,
    /// Fragmentation or mission-related debris
    #[serde(alias = "DEBRIS")]
    Debris,
    /// Unidentified object
    #[serde(alias = "UNKNOWN", alias = "TBA")]
    Unknown,
}

impl Default for ObjectType {
    fn default() -> Self {
        ObjectType::Unknown
    }
}

/// Coarse orbital regime. Always derived from state, never stored on the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    #[serde(rename = "LEO")]
    Leo,
    #[serde(rename = "MEO")]
    Meo,
    #[serde(rename = "GEO")]
    Geo,
    #[serde(rename = "OTHER")]
    Other,
}

impl Regime {
    /// All regimes in reporting order
    pub const ALL: [Regime; 4] = [Regime::Leo, Regime::Meo, Regime::Geo, Regime::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Leo => "LEO",
            Regime::Meo => "MEO",
            Regime::Geo => "GEO",
            Regime::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classical Keplerian elements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeplerianElements {
    /// Semi-major axis (km)
    pub semi_major_axis_km: f64,
    /// Eccentricity (dimensionless)
    pub eccentricity: f64,
    /// Inclination (rad)
    pub inclination_rad: f64,
    /// Right ascension of ascending node (rad)
    pub raan_rad: f64,
    /// Argument of perigee (rad)
    pub arg_perigee_rad: f64,
    /// Mean anomaly at epoch (rad)
    pub mean_anomaly_rad: f64,
}

impl KeplerianElements {
    /// Circular orbit at the given altitude, convenient for fixtures.
    pub fn circular(altitude_km: f64, inclination_rad: f64, raan_rad: f64, mean_anomaly_rad: f64) -> Self {
        Self {
            semi_major_axis_km: R_EARTH + altitude_km,
            eccentricity: 0.0,
            inclination_rad,
            raan_rad,
            arg_perigee_rad: 0.0,
            mean_anomaly_rad,
        }
    }

    /// Perigee altitude above the equatorial radius (km)
    pub fn perigee_altitude_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity) - R_EARTH
    }

    /// Apogee altitude above the equatorial radius (km). Infinite for open orbits.
    pub fn apogee_altitude_km(&self) -> f64 {
        if self.eccentricity >= 1.0 {
            return f64::INFINITY;
        }
        self.semi_major_axis_km * (1.0 + self.eccentricity) - R_EARTH
    }

    /// Mean motion (rad/s)
    pub fn mean_motion(&self) -> f64 {
        (MU_EARTH / self.semi_major_axis_km.powi(3)).sqrt()
    }

    /// Orbital period (s)
    pub fn period_s(&self) -> f64 {
        TAU / self.mean_motion()
    }

    /// True when every element is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.semi_major_axis_km,
            self.eccentricity,
            self.inclination_rad,
            self.raan_rad,
            self.arg_perigee_rad,
            self.mean_anomaly_rad,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Cartesian state in an Earth-centred inertial frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    /// Position (km)
    pub position_km: [f64; 3],
    /// Velocity (km/s)
    pub velocity_km_s: [f64; 3],
}

impl StateVector {
    /// Position magnitude (km)
    pub fn radius_km(&self) -> f64 {
        norm(&self.position_km)
    }

    /// Velocity magnitude (km/s)
    pub fn speed_km_s(&self) -> f64 {
        norm(&self.velocity_km_s)
    }

    /// Altitude above the equatorial radius (km)
    pub fn altitude_km(&self) -> f64 {
        self.radius_km() - R_EARTH
    }

    pub fn is_finite(&self) -> bool {
        self.position_km
            .iter()
            .chain(self.velocity_km_s.iter())
            .all(|v| v.is_finite())
    }
}

fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Orbit state as supplied by the catalog feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrbitState {
    Keplerian(KeplerianElements),
    Cartesian(StateVector),
}

/// 1-sigma position uncertainty in the object's radial / in-track / cross-track frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUncertainty {
    pub radial_km: f64,
    pub in_track_km: f64,
    pub cross_track_km: f64,
}

impl PositionUncertainty {
    /// Same sigma on every axis
    pub fn isotropic(sigma_km: f64) -> Self {
        Self {
            radial_km: sigma_km,
            in_track_km: sigma_km,
            cross_track_km: sigma_km,
        }
    }

    /// Usable only when every sigma is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.radial_km, self.in_track_km, self.cross_track_km]
            .iter()
            .all(|s| s.is_finite() && *s >= 0.0)
    }
}

/// Remaining orbital lifetime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Finite remaining lifetime in years (non-negative)
    Years(f64),
    /// Very high, stable orbit with no meaningful decay
    Indefinite,
}

impl Lifetime {
    /// Build a finite lifetime, clamping negative values to zero.
    pub fn years(years: f64) -> Self {
        Lifetime::Years(years.max(0.0))
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, Lifetime::Indefinite)
    }
}

/// A catalogued space object. Read-only input to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// Unique catalog identifier
    pub id: String,
    #[serde(default)]
    pub object_type: ObjectType,
    /// Epoch of `state` (seconds since the Unix epoch)
    #[serde(default)]
    pub epoch_s: f64,
    /// Missing or malformed state excludes the object from everything but raw totals
    #[serde(default)]
    pub state: Option<OrbitState>,
    /// Physical hard-body radius (m)
    #[serde(default)]
    pub hard_body_radius_m: Option<f64>,
    #[serde(default)]
    pub uncertainty: Option<PositionUncertainty>,
    #[serde(default)]
    pub lifetime: Option<Lifetime>,
    #[serde(default)]
    pub active: bool,
}

impl TrackedObject {
    /// Object with Keplerian state, used heavily by tests and fixtures.
    pub fn with_elements(
        id: impl Into<String>,
        object_type: ObjectType,
        epoch_s: f64,
        elements: KeplerianElements,
    ) -> Self {
        Self {
            id: id.into(),
            object_type,
            epoch_s,
            state: Some(OrbitState::Keplerian(elements)),
            hard_body_radius_m: None,
            uncertainty: None,
            lifetime: None,
            active: false,
        }
    }

    /// Placeholder for a catalog record that could not be parsed.
    pub fn unparsed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object_type: ObjectType::Unknown,
            epoch_s: 0.0,
            state: None,
            hard_body_radius_m: None,
            uncertainty: None,
            lifetime: None,
            active: false,
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn hard_body_radius(mut self, radius_m: f64) -> Self {
        self.hard_body_radius_m = Some(radius_m);
        self
    }

    pub fn uncertainty(mut self, uncertainty: PositionUncertainty) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apsis_altitudes() {
        let elements = KeplerianElements {
            semi_major_axis_km: R_EARTH + 1000.0,
            eccentricity: 0.05,
            inclination_rad: 0.9,
            raan_rad: 0.0,
            arg_perigee_rad: 0.0,
            mean_anomaly_rad: 0.0,
        };
        let a = elements.semi_major_axis_km;
        assert!((elements.perigee_altitude_km() - (a * 0.95 - R_EARTH)).abs() < 1e-9);
        assert!((elements.apogee_altitude_km() - (a * 1.05 - R_EARTH)).abs() < 1e-9);
    }

    #[test]
    fn test_leo_period_is_about_ninety_minutes() {
        let elements = KeplerianElements::circular(400.0, 0.9, 0.0, 0.0);
        let minutes = elements.period_s() / 60.0;
        assert!((minutes - 92.6).abs() < 0.5, "period {minutes} min");
    }

    #[test]
    fn test_object_type_accepts_satcat_spelling() {
        let ty: ObjectType = serde_json::from_str("\"ROCKET BODY\"").unwrap();
        assert_eq!(ty, ObjectType::RocketBody);
        let ty: ObjectType = serde_json::from_str("\"debris\"").unwrap();
        assert_eq!(ty, ObjectType::Debris);
    }

    #[test]
    fn test_tracked_object_defaults_for_sparse_record() {
        let obj: TrackedObject = serde_json::from_str(r#"{"id":"99999"}"#).unwrap();
        assert_eq!(obj.object_type, ObjectType::Unknown);
        assert!(obj.state.is_none());
        assert!(!obj.active);
    }

    #[test]
    fn test_orbit_state_tagging() {
        let json = r#"{"kind":"cartesian","position_km":[7000.0,0.0,0.0],"velocity_km_s":[0.0,7.5,0.0]}"#;
        let state: OrbitState = serde_json::from_str(json).unwrap();
        match state {
            OrbitState::Cartesian(sv) => assert!((sv.altitude_km() - (7000.0 - R_EARTH)).abs() < 1e-9),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_lifetime_never_negative() {
        assert_eq!(Lifetime::years(-3.0), Lifetime::Years(0.0));
        assert!(Lifetime::Indefinite.is_indefinite());
    }
}
