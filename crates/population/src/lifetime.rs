//! Remaining orbital lifetime from atmospheric drag.
//!
//! The orbit is treated as circular at perigee and decayed in fixed altitude
//! steps with da/dt = -rho * sqrt(mu * a) / BC until it reaches the re-entry
//! altitude. Good enough to sort objects either side of a 25-year line, not
//! for re-entry prediction.

use orbitwatch_core::{CompliancePolicy, Lifetime, MU_EARTH, R_EARTH, SECONDS_PER_YEAR};

/// (base altitude km, density kg/m^3, scale height km), Vallado table 8-4
const ATMOSPHERE: &[(f64, f64, f64)] = &[
    (0.0, 1.225, 7.249),
    (25.0, 3.899e-2, 6.349),
    (30.0, 1.774e-2, 6.682),
    (40.0, 3.972e-3, 7.554),
    (50.0, 1.057e-3, 8.382),
    (60.0, 3.206e-4, 7.714),
    (70.0, 8.770e-5, 6.549),
    (80.0, 1.905e-5, 5.799),
    (90.0, 3.396e-6, 5.382),
    (100.0, 5.297e-7, 5.877),
    (110.0, 9.661e-8, 7.263),
    (120.0, 2.438e-8, 9.473),
    (130.0, 8.484e-9, 12.636),
    (140.0, 3.845e-9, 16.149),
    (150.0, 2.070e-9, 22.523),
    (180.0, 5.464e-10, 29.740),
    (200.0, 2.789e-10, 37.105),
    (250.0, 7.248e-11, 45.546),
    (300.0, 2.418e-11, 53.628),
    (350.0, 9.518e-12, 53.298),
    (400.0, 3.725e-12, 58.515),
    (450.0, 1.585e-12, 60.828),
    (500.0, 6.967e-13, 63.822),
    (600.0, 1.454e-13, 71.835),
    (700.0, 3.614e-14, 88.667),
    (800.0, 1.170e-14, 124.64),
    (900.0, 5.245e-15, 181.05),
    (1000.0, 3.019e-15, 268.00),
];

/// Upper bound on decay integration steps per object
const MAX_DECAY_STEPS: f64 = 20_000.0;

/// Exponential-atmosphere density (kg/m^3). The top layer is extrapolated
/// with its own scale height.
pub fn atmospheric_density(altitude_km: f64) -> f64 {
    if altitude_km <= 0.0 {
        return ATMOSPHERE[0].1;
    }
    let layer = ATMOSPHERE
        .iter()
        .rev()
        .find(|(base, _, _)| *base <= altitude_km)
        .unwrap_or(&ATMOSPHERE[0]);
    let (base, rho0, scale_height) = *layer;
    rho0 * (-(altitude_km - base) / scale_height).exp()
}

/// Estimate remaining lifetime for an object with the given perigee altitude.
pub fn estimate_lifetime(perigee_km: f64, policy: &CompliancePolicy) -> Lifetime {
    if !perigee_km.is_finite() || perigee_km > policy.indefinite_perigee_km {
        return Lifetime::Indefinite;
    }
    if perigee_km <= policy.reentry_altitude_km {
        return Lifetime::years(0.0);
    }

    let mu = MU_EARTH * 1e9;
    // bounds the loop for policies that bypassed validation
    let step_km = policy
        .lifetime_step_km
        .max((perigee_km - policy.reentry_altitude_km) / MAX_DECAY_STEPS);
    let mut altitude = perigee_km;
    let mut seconds = 0.0;
    while altitude > policy.reentry_altitude_km {
        let step = step_km.min(altitude - policy.reentry_altitude_km);
        let mid = altitude - step / 2.0;
        let a_m = (R_EARTH + mid) * 1000.0;
        let decay_m_s = atmospheric_density(mid) * (mu * a_m).sqrt() / policy.ballistic_coefficient_kg_m2;
        seconds += step * 1000.0 / decay_m_s;
        altitude -= step;
    }
    Lifetime::years(seconds / SECONDS_PER_YEAR)
}
