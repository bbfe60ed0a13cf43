//! Per-regime population forecast.
//!
//! One yearly step per regime:
//! - launches    = launches_per_year + launch_growth_rate * active
//! - retirements = retirement_rate * active
//! - decays      = decay_rate * each non-active class
//!
//! Retired objects move to the inactive class; decayed objects leave the
//! population. Every class is floored at zero after each step.

use orbitwatch_core::{RegimeRates, RegimeStats};

/// Object counts of one regime. Fractional once projected.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PopulationCounts {
    pub active: f64,
    pub inactive: f64,
    pub debris: f64,
    pub unknown: f64,
}

impl PopulationCounts {
    pub fn from_stats(stats: &RegimeStats) -> Self {
        Self {
            active: stats.active as f64,
            inactive: stats.inactive as f64,
            debris: stats.debris as f64,
            unknown: stats.unknown as f64,
        }
    }

    pub fn total(&self) -> f64 {
        self.active + self.inactive + self.debris + self.unknown
    }

    /// Advance one year.
    pub fn step(&self, rates: &RegimeRates) -> Self {
        let launches = rates.launches_per_year + rates.launch_growth_rate * self.active;
        let retirements = rates.retirement_rate * self.active;
        let survive = 1.0 - rates.decay_rate;
        Self {
            active: (self.active + launches - retirements).max(0.0),
            inactive: (self.inactive * survive + retirements).max(0.0),
            debris: (self.debris * survive).max(0.0),
            unknown: (self.unknown * survive).max(0.0),
        }
    }

    /// Advance `years` yearly steps.
    pub fn project(&self, rates: &RegimeRates, years: u32) -> Self {
        (0..years).fold(*self, |counts, _| counts.step(rates))
    }
}

/// 1- and 5-year outlook for one regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeForecast {
    pub one_year: PopulationCounts,
    pub five_year: PopulationCounts,
    /// Objects added minus objects decayed over the first year
    pub net_growth_per_year: f64,
    pub growth_1y: Option<f64>,
    pub growth_5y: Option<f64>,
}

/// Relative change of `projected` over `current`; `None` for an empty regime.
pub(crate) fn growth(current: f64, projected: f64) -> Option<f64> {
    (current > 0.0).then(|| projected / current - 1.0)
}

pub fn forecast(current: &PopulationCounts, rates: &RegimeRates) -> RegimeForecast {
    let one_year = current.step(rates);
    let five_year = one_year.project(rates, 4);
    RegimeForecast {
        one_year,
        five_year,
        net_growth_per_year: one_year.total() - current.total(),
        growth_1y: growth(current.total(), one_year.total()),
        growth_5y: growth(current.total(), five_year.total()),
    }
}
