//! Conversions between Keplerian elements and Cartesian state vectors.

use crate::propagator::PropagationError;
use orbitwatch_core::{KeplerianElements, StateVector, MU_EARTH};
use std::f64::consts::{PI, TAU};

/// Below this eccentricity the orbit is treated as circular.
const CIRCULAR_EPS: f64 = 1e-10;
/// Below this node-vector magnitude (km^2/s) the orbit is treated as equatorial.
const EQUATORIAL_EPS: f64 = 1e-9;

/// Normalize angle to [0, 2pi).
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle % TAU;
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// Solve Kepler's equation M = E - e sin(E) for the eccentric anomaly (Newton-Raphson).
pub fn mean_to_eccentric_anomaly(mean_anomaly: f64, e: f64, tol: f64, max_iter: u32) -> f64 {
    let m = normalize_angle(mean_anomaly);
    let mut ea = if e < 0.8 { m } else { PI };

    for _ in 0..max_iter {
        let f = ea - e * ea.sin() - m;
        let fp = 1.0 - e * ea.cos();
        let delta = f / fp;
        ea -= delta;
        if delta.abs() < tol {
            break;
        }
    }
    ea
}

/// Convert mean anomaly to true anomaly.
pub fn mean_to_true_anomaly(mean_anomaly: f64, e: f64, tol: f64, max_iter: u32) -> f64 {
    let ea = mean_to_eccentric_anomaly(mean_anomaly, e, tol, max_iter);
    2.0 * ((1.0 + e).sqrt() * (ea / 2.0).sin()).atan2((1.0 - e).sqrt() * (ea / 2.0).cos())
}

fn true_to_mean_anomaly(nu: f64, e: f64) -> f64 {
    let ea = 2.0 * ((1.0 - e).sqrt() * (nu / 2.0).sin()).atan2((1.0 + e).sqrt() * (nu / 2.0).cos());
    normalize_angle(ea - e * ea.sin())
}

/// Perifocal (PQW) to inertial rotation for the given orientation angles.
pub(crate) fn pqw_rotation(inclination: f64, raan: f64, arg_perigee: f64) -> [[f64; 3]; 3] {
    let (sin_raan, cos_raan) = raan.sin_cos();
    let (sin_aop, cos_aop) = arg_perigee.sin_cos();
    let (sin_i, cos_i) = inclination.sin_cos();

    [
        [
            cos_raan * cos_aop - sin_raan * sin_aop * cos_i,
            -cos_raan * sin_aop - sin_raan * cos_aop * cos_i,
            sin_raan * sin_i,
        ],
        [
            sin_raan * cos_aop + cos_raan * sin_aop * cos_i,
            -sin_raan * sin_aop + cos_raan * cos_aop * cos_i,
            -cos_raan * sin_i,
        ],
        [sin_aop * sin_i, cos_aop * sin_i, cos_i],
    ]
}

/// Inertial state at true anomaly `nu` using a precomputed PQW rotation.
pub(crate) fn perifocal_state(
    semi_latus_rectum: f64,
    e: f64,
    nu: f64,
    rotation: &[[f64; 3]; 3],
) -> StateVector {
    let (sin_nu, cos_nu) = nu.sin_cos();
    let r_pf = semi_latus_rectum / (1.0 + e * cos_nu);
    let r_pqw = [r_pf * cos_nu, r_pf * sin_nu];
    let v_factor = (MU_EARTH / semi_latus_rectum).sqrt();
    let v_pqw = [-v_factor * sin_nu, v_factor * (e + cos_nu)];

    let mut position_km = [0.0; 3];
    let mut velocity_km_s = [0.0; 3];
    for j in 0..3 {
        position_km[j] = rotation[j][0] * r_pqw[0] + rotation[j][1] * r_pqw[1];
        velocity_km_s[j] = rotation[j][0] * v_pqw[0] + rotation[j][1] * v_pqw[1];
    }
    StateVector {
        position_km,
        velocity_km_s,
    }
}

/// Keplerian elements to an inertial state vector.
pub fn elements_to_state(elements: &KeplerianElements, tol: f64, max_iter: u32) -> StateVector {
    let e = elements.eccentricity;
    let nu = mean_to_true_anomaly(elements.mean_anomaly_rad, e, tol, max_iter);
    let p = elements.semi_major_axis_km * (1.0 - e * e);
    let rotation = pqw_rotation(
        elements.inclination_rad,
        elements.raan_rad,
        elements.arg_perigee_rad,
    );
    perifocal_state(p, e, nu, &rotation)
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Angle between two vectors in [0, pi], robust to rounding past +-1.
fn angle_between(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (dot(a, b) / (norm(a) * norm(b))).clamp(-1.0, 1.0).acos()
}

/// Inertial state vector to Keplerian elements.
///
/// Circular orbits get a zero argument of perigee with the anomaly measured
/// from the node; equatorial orbits get a zero RAAN with angles measured from
/// the inertial x axis.
pub fn state_to_elements(state: &StateVector) -> Result<KeplerianElements, PropagationError> {
    if !state.is_finite() {
        return Err(PropagationError::NonFinite);
    }
    let r = state.position_km;
    let v = state.velocity_km_s;
    let r_mag = norm(&r);
    let v_mag = norm(&v);
    if r_mag <= 0.0 {
        return Err(PropagationError::Degenerate("zero position vector"));
    }

    let h = cross(&r, &v);
    let h_mag = norm(&h);
    if h_mag <= f64::EPSILON * r_mag * v_mag.max(1.0) {
        return Err(PropagationError::Degenerate("rectilinear trajectory"));
    }

    let energy = v_mag * v_mag / 2.0 - MU_EARTH / r_mag;
    let rv = dot(&r, &v);
    let coef_r = v_mag * v_mag - MU_EARTH / r_mag;
    let e_vec = [
        (coef_r * r[0] - rv * v[0]) / MU_EARTH,
        (coef_r * r[1] - rv * v[1]) / MU_EARTH,
        (coef_r * r[2] - rv * v[2]) / MU_EARTH,
    ];
    let e = norm(&e_vec);
    if e >= 1.0 || energy >= 0.0 {
        return Err(PropagationError::Unbound(e));
    }
    let a = -MU_EARTH / (2.0 * energy);

    let inclination = (h[2] / h_mag).clamp(-1.0, 1.0).acos();
    // Retrograde equatorial orbits see the x-y plane mirrored.
    let spin = if h[2] >= 0.0 { 1.0 } else { -1.0 };

    let node = [-h[1], h[0], 0.0];
    let node_mag = norm(&node);
    let equatorial = node_mag < EQUATORIAL_EPS * h_mag.max(1.0);
    let circular = e < CIRCULAR_EPS;

    let raan = if equatorial {
        0.0
    } else {
        let raan = (node[0] / node_mag).clamp(-1.0, 1.0).acos();
        if node[1] < 0.0 {
            TAU - raan
        } else {
            raan
        }
    };

    let arg_perigee = if circular {
        0.0
    } else if equatorial {
        normalize_angle((spin * e_vec[1]).atan2(e_vec[0]))
    } else {
        let w = angle_between(&node, &e_vec);
        if e_vec[2] < 0.0 {
            TAU - w
        } else {
            w
        }
    };

    let true_anomaly = if !circular {
        let nu = angle_between(&e_vec, &r);
        if rv < 0.0 {
            TAU - nu
        } else {
            nu
        }
    } else if !equatorial {
        // argument of latitude
        let u = angle_between(&node, &r);
        if r[2] < 0.0 {
            TAU - u
        } else {
            u
        }
    } else {
        // true longitude
        normalize_angle((spin * r[1]).atan2(r[0]))
    };

    Ok(KeplerianElements {
        semi_major_axis_km: a,
        eccentricity: if circular { 0.0 } else { e },
        inclination_rad: inclination,
        raan_rad: raan,
        arg_perigee_rad: arg_perigee,
        mean_anomaly_rad: true_to_mean_anomaly(true_anomaly, if circular { 0.0 } else { e }),
    })
}
