//! Configuration management for OrbitWatch.
//!
//! Every tunable of the engine (regime bands, screening thresholds, risk
//! cutoffs, forecast rates, Kessler weights) lives in one validated
//! [`EngineConfig`]. A cycle reads the configuration once at start, so a
//! reload never changes the parameters of a cycle already running.

use crate::error::ConfigError;
use crate::event::RiskLevel;
use crate::types::{ObjectType, Regime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Altitude bands used by the orbit classifier (km above the equatorial radius)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeBands {
    pub leo_upper_km: f64,
    pub meo_lower_km: f64,
    pub meo_upper_km: f64,
    pub geo_altitude_km: f64,
    pub geo_tolerance_km: f64,
}

impl Default for RegimeBands {
    fn default() -> Self {
        Self {
            leo_upper_km: 2_000.0,
            meo_lower_km: 2_000.0,
            meo_upper_km: 35_586.0,
            geo_altitude_km: 35_786.0,
            geo_tolerance_km: 200.0,
        }
    }
}

/// Closed-form propagation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationSettings {
    /// Intervals longer than this are still propagated, but logged
    pub max_interval_days: f64,
    /// Convergence tolerance for Kepler's equation (rad)
    pub kepler_tolerance: f64,
    pub kepler_max_iterations: u32,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            max_interval_days: 30.0,
            kepler_tolerance: 1e-12,
            kepler_max_iterations: 50,
        }
    }
}

/// Conjunction screening settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningSettings {
    /// Refined miss distances above this are not reported (km)
    pub screening_distance_km: f64,
    /// Width of the coarse-filter altitude bands (km)
    pub band_width_km: f64,
    /// Evaluation window length from the cycle epoch (hours)
    pub window_hours: f64,
    /// Fine-filter sampling step (s)
    pub time_step_s: f64,
    /// Golden-section bracket width at which TCA refinement stops (s)
    pub refine_time_tolerance_s: f64,
    pub refine_max_iterations: u32,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            screening_distance_km: 5.0,
            band_width_km: 50.0,
            window_hours: 24.0,
            time_step_s: 30.0,
            refine_time_tolerance_s: 1e-5,
            refine_max_iterations: 200,
        }
    }
}

impl ScreeningSettings {
    pub fn window_s(&self) -> f64 {
        self.window_hours * 3_600.0
    }

    pub fn window_days(&self) -> f64 {
        self.window_hours / 24.0
    }
}

/// Shape of the combined covariance in the encounter plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceModel {
    /// One averaged sigma, closed-form circular integral
    Isotropic,
    /// Two in-plane sigmas, numerical 2D integral
    Diagonal,
}

/// Probability cutoffs for the discrete risk levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub moderate: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 1e-3,
            high: 1e-4,
            moderate: 1e-5,
        }
    }
}

impl RiskThresholds {
    /// Map a probability to its risk level. Non-decreasing in `probability`.
    pub fn classify(&self, probability: f64) -> RiskLevel {
        if probability >= self.critical {
            RiskLevel::Critical
        } else if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Hard-body radius used when the catalog omits one (m)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardBodyDefaults {
    pub payload_m: f64,
    pub rocket_body_m: f64,
    pub debris_m: f64,
    pub unknown_m: f64,
}

impl Default for HardBodyDefaults {
    fn default() -> Self {
        Self {
            payload_m: 2.0,
            rocket_body_m: 3.0,
            debris_m: 0.25,
            unknown_m: 0.5,
        }
    }
}

impl HardBodyDefaults {
    pub fn for_type(&self, object_type: ObjectType) -> f64 {
        match object_type {
            ObjectType::Payload => self.payload_m,
            ObjectType::RocketBody => self.rocket_body_m,
            ObjectType::Debris => self.debris_m,
            ObjectType::Unknown => self.unknown_m,
        }
    }
}

/// Collision probability settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilitySettings {
    pub covariance_model: CovarianceModel,
    pub thresholds: RiskThresholds,
    /// Probability at or above which a maneuver is required
    pub maneuver_threshold: f64,
    /// Length scale of the miss-distance fallback (km)
    pub fallback_length_km: f64,
    /// Subintervals for the numerical integrals (rounded up to even)
    pub integration_steps: u32,
    pub hard_body: HardBodyDefaults,
}

impl Default for ProbabilitySettings {
    fn default() -> Self {
        Self {
            covariance_model: CovarianceModel::Isotropic,
            thresholds: RiskThresholds::default(),
            maneuver_threshold: 1e-4,
            fallback_length_km: 0.05,
            integration_steps: 200,
            hard_body: HardBodyDefaults::default(),
        }
    }
}

/// 25-year rule and lifetime estimation
/// Finest accepted decay integration step (km)
pub const MIN_LIFETIME_STEP_KM: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
    pub max_lifetime_years: f64,
    /// Mass over drag area (kg/m^2) for lifetime estimation
    pub ballistic_coefficient_kg_m2: f64,
    /// Perigees above this altitude get an indefinite lifetime (km)
    pub indefinite_perigee_km: f64,
    /// Altitude treated as re-entry (km)
    pub reentry_altitude_km: f64,
    /// Altitude step of the decay integration (km)
    pub lifetime_step_km: f64,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            max_lifetime_years: 25.0,
            ballistic_coefficient_kg_m2: 50.0,
            indefinite_perigee_km: 2_000.0,
            reentry_altitude_km: 100.0,
            lifetime_step_km: 5.0,
        }
    }
}

/// Annual rates for one regime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeRates {
    /// Fixed new active objects per year
    pub launches_per_year: f64,
    /// New active objects per year as a fraction of the active fleet
    pub launch_growth_rate: f64,
    /// Fraction of active objects that end their mission each year
    pub retirement_rate: f64,
    /// Fraction of inactive, debris and unknown objects re-entering each year
    pub decay_rate: f64,
}

impl Default for RegimeRates {
    fn default() -> Self {
        Self {
            launches_per_year: 0.0,
            launch_growth_rate: 0.0,
            retirement_rate: 0.0,
            decay_rate: 0.0,
        }
    }
}

impl RegimeRates {
    fn new(launch_growth_rate: f64, retirement_rate: f64, decay_rate: f64) -> Self {
        Self {
            launches_per_year: 0.0,
            launch_growth_rate,
            retirement_rate,
            decay_rate,
        }
    }
}

/// Per-regime population forecast rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub leo: RegimeRates,
    pub meo: RegimeRates,
    pub geo: RegimeRates,
    pub other: RegimeRates,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            leo: RegimeRates::new(0.15, 0.10, 0.05),
            meo: RegimeRates::new(0.03, 0.05, 0.0005),
            geo: RegimeRates::new(0.02, 0.05, 0.0),
            other: RegimeRates::new(0.02, 0.08, 0.02),
        }
    }
}

impl ForecastSettings {
    pub fn rates(&self, regime: Regime) -> &RegimeRates {
        match regime {
            Regime::Leo => &self.leo,
            Regime::Meo => &self.meo,
            Regime::Geo => &self.geo,
            Regime::Other => &self.other,
        }
    }
}

/// Reference populations for the density term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePopulation {
    pub leo: f64,
    pub meo: f64,
    pub geo: f64,
    pub other: f64,
}

impl Default for ReferencePopulation {
    fn default() -> Self {
        Self {
            leo: 20_000.0,
            meo: 1_000.0,
            geo: 1_500.0,
            other: 2_000.0,
        }
    }
}

impl ReferencePopulation {
    pub fn for_regime(&self, regime: Regime) -> f64 {
        match regime {
            Regime::Leo => self.leo,
            Regime::Meo => self.meo,
            Regime::Geo => self.geo,
            Regime::Other => self.other,
        }
    }
}

/// Kessler Risk Index weights and references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KesslerWeights {
    pub density_weight: f64,
    pub probability_weight: f64,
    pub growth_weight: f64,
    pub reference_population: ReferencePopulation,
    /// Summed probability per tracked object that counts as one unit of risk
    pub reference_probability_per_object: f64,
    /// Net objects per year that counts as one unit of risk
    pub reference_growth_per_year: f64,
    /// Upper bound of the index scale
    pub max_index: f64,
}

impl Default for KesslerWeights {
    fn default() -> Self {
        Self {
            density_weight: 1.0,
            probability_weight: 1.0,
            growth_weight: 0.5,
            reference_population: ReferencePopulation::default(),
            reference_probability_per_object: 1e-6,
            reference_growth_per_year: 2_000.0,
            max_index: 10.0,
        }
    }
}

/// Cycle scheduling and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleSettings {
    pub period_secs: u64,
    /// Worker threads for the compute pool; 0 uses one per core
    pub worker_threads: usize,
    /// SQLite history location; in-memory history only when unset
    pub history_path: Option<PathBuf>,
    /// Published cycles kept in memory
    pub history_retention: usize,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            period_secs: 86_400,
            worker_threads: 0,
            history_path: None,
            history_retention: 30,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub regimes: RegimeBands,
    pub propagation: PropagationSettings,
    pub screening: ScreeningSettings,
    pub probability: ProbabilitySettings,
    pub compliance: CompliancePolicy,
    pub forecast: ForecastSettings,
    pub kessler: KesslerWeights,
    pub cycle: CycleSettings,
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(field, format!("must be a positive number, got {value}")));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(field, format!("must be non-negative, got {value}")));
    }
    Ok(())
}

fn fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, format!("must lie in [0, 1], got {value}")));
    }
    Ok(())
}

impl EngineConfig {
    /// Parse a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.regimes;
        positive("regimes.leo_upper_km", r.leo_upper_km)?;
        positive("regimes.geo_altitude_km", r.geo_altitude_km)?;
        non_negative("regimes.geo_tolerance_km", r.geo_tolerance_km)?;
        if !(r.meo_lower_km >= r.leo_upper_km) {
            return Err(ConfigError::invalid("regimes.meo_lower_km", "must not be below leo_upper_km"));
        }
        if !(r.meo_upper_km > r.meo_lower_km) {
            return Err(ConfigError::invalid("regimes.meo_upper_km", "must exceed meo_lower_km"));
        }
        if !(r.geo_altitude_km - r.geo_tolerance_km >= r.meo_upper_km) {
            return Err(ConfigError::invalid("regimes.geo_tolerance_km", "GEO band overlaps the MEO band"));
        }

        let p = &self.propagation;
        positive("propagation.max_interval_days", p.max_interval_days)?;
        positive("propagation.kepler_tolerance", p.kepler_tolerance)?;
        if p.kepler_max_iterations == 0 {
            return Err(ConfigError::invalid("propagation.kepler_max_iterations", "must be non-zero"));
        }

        let s = &self.screening;
        positive("screening.screening_distance_km", s.screening_distance_km)?;
        positive("screening.band_width_km", s.band_width_km)?;
        positive("screening.window_hours", s.window_hours)?;
        positive("screening.time_step_s", s.time_step_s)?;
        positive("screening.refine_time_tolerance_s", s.refine_time_tolerance_s)?;
        if s.time_step_s * 2.0 > s.window_s() {
            return Err(ConfigError::invalid("screening.time_step_s", "window must span at least two steps"));
        }
        if s.refine_max_iterations == 0 {
            return Err(ConfigError::invalid("screening.refine_max_iterations", "must be non-zero"));
        }

        let pr = &self.probability;
        let t = &pr.thresholds;
        positive("probability.thresholds.moderate", t.moderate)?;
        fraction("probability.thresholds.critical", t.critical)?;
        if !(t.moderate <= t.high && t.high <= t.critical) {
            return Err(ConfigError::invalid(
                "probability.thresholds",
                "cutoffs must satisfy moderate <= high <= critical",
            ));
        }
        fraction("probability.maneuver_threshold", pr.maneuver_threshold)?;
        positive("probability.fallback_length_km", pr.fallback_length_km)?;
        if pr.integration_steps < 2 {
            return Err(ConfigError::invalid("probability.integration_steps", "must be at least 2"));
        }
        positive("probability.hard_body.payload_m", pr.hard_body.payload_m)?;
        positive("probability.hard_body.rocket_body_m", pr.hard_body.rocket_body_m)?;
        positive("probability.hard_body.debris_m", pr.hard_body.debris_m)?;
        positive("probability.hard_body.unknown_m", pr.hard_body.unknown_m)?;

        let c = &self.compliance;
        positive("compliance.max_lifetime_years", c.max_lifetime_years)?;
        positive("compliance.ballistic_coefficient_kg_m2", c.ballistic_coefficient_kg_m2)?;
        positive("compliance.indefinite_perigee_km", c.indefinite_perigee_km)?;
        non_negative("compliance.reentry_altitude_km", c.reentry_altitude_km)?;
        positive("compliance.lifetime_step_km", c.lifetime_step_km)?;
        if c.lifetime_step_km < MIN_LIFETIME_STEP_KM {
            return Err(ConfigError::invalid(
                "compliance.lifetime_step_km",
                format!("must be at least {MIN_LIFETIME_STEP_KM} km"),
            ));
        }

        for regime in Regime::ALL {
            let rates = self.forecast.rates(regime);
            let prefix = format!("forecast.{}", regime.as_str().to_lowercase());
            non_negative(&format!("{prefix}.launches_per_year"), rates.launches_per_year)?;
            non_negative(&format!("{prefix}.launch_growth_rate"), rates.launch_growth_rate)?;
            fraction(&format!("{prefix}.retirement_rate"), rates.retirement_rate)?;
            fraction(&format!("{prefix}.decay_rate"), rates.decay_rate)?;
        }

        let k = &self.kessler;
        non_negative("kessler.density_weight", k.density_weight)?;
        non_negative("kessler.probability_weight", k.probability_weight)?;
        non_negative("kessler.growth_weight", k.growth_weight)?;
        positive("kessler.reference_probability_per_object", k.reference_probability_per_object)?;
        positive("kessler.reference_growth_per_year", k.reference_growth_per_year)?;
        positive("kessler.max_index", k.max_index)?;
        for regime in Regime::ALL {
            non_negative(
                &format!("kessler.reference_population.{}", regime.as_str().to_lowercase()),
                k.reference_population.for_regime(regime),
            )?;
        }

        if self.cycle.period_secs == 0 {
            return Err(ConfigError::invalid("cycle.period_secs", "must be non-zero"));
        }
        if self.cycle.history_retention == 0 {
            return Err(ConfigError::invalid("cycle.history_retention", "must keep at least one cycle"));
        }

        Ok(())
    }
}

/// Holds the active configuration and falls back to the last-known-good one
/// whenever a reload fails to parse or validate.
pub struct ConfigManager {
    path: Option<PathBuf>,
    current: RwLock<Arc<EngineConfig>>,
}

impl ConfigManager {
    /// Manager over an in-memory configuration (no file to reload from).
    pub fn new(initial: EngineConfig) -> Result<Self, ConfigError> {
        initial.validate()?;
        Ok(Self {
            path: None,
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Manager backed by a TOML file. The first load must succeed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let initial = EngineConfig::from_file(&path)?;
        info!(path = %path.display(), "Loaded engine configuration");
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Configuration to use for the next cycle.
    pub fn current(&self) -> Arc<EngineConfig> {
        // A poisoned lock still holds a complete, validated Arc.
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the backing file. On error the previous configuration stays active.
    pub fn reload(&self) -> Result<Arc<EngineConfig>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(self.current());
        };
        match EngineConfig::from_file(path) {
            Ok(config) => Ok(self.swap(config)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Configuration reload rejected, keeping last-known-good"
                );
                Err(e)
            }
        }
    }

    /// Validate and activate a candidate configuration.
    pub fn apply(&self, candidate: EngineConfig) -> Result<Arc<EngineConfig>, ConfigError> {
        if let Err(e) = candidate.validate() {
            warn!(error = %e, "Configuration update rejected, keeping last-known-good");
            return Err(e);
        }
        Ok(self.swap(candidate))
    }

    fn swap(&self, config: EngineConfig) -> Arc<EngineConfig> {
        let config = Arc::new(config);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = config.clone();
        config
    }
}
