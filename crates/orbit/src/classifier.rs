//! Orbital regime classification.
//!
//! An orbit belongs to a regime only when its whole perigee..apogee altitude
//! range lies inside that regime's band. Transfer orbits, Molniya-type orbits
//! and anything sub-orbital fall through to [`Regime::Other`].

use crate::elements::state_to_elements;
use orbitwatch_core::{OrbitState, Regime, RegimeBands, TrackedObject};
use thiserror::Error;

/// Malformed input that prevents classification
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("Object {0} has no orbit state")]
    MissingState(String),

    #[error("Object {0} has non-finite orbit state")]
    NonFinite(String),
}

/// Regime of an orbit spanning `perigee_km..=apogee_km` altitude.
pub fn classify_range(perigee_km: f64, apogee_km: f64, bands: &RegimeBands) -> Regime {
    if !(perigee_km.is_finite() && apogee_km.is_finite()) || perigee_km < 0.0 {
        return Regime::Other;
    }
    if apogee_km <= bands.leo_upper_km {
        return Regime::Leo;
    }
    if perigee_km >= bands.meo_lower_km && apogee_km <= bands.meo_upper_km {
        return Regime::Meo;
    }
    let geo_low = bands.geo_altitude_km - bands.geo_tolerance_km;
    let geo_high = bands.geo_altitude_km + bands.geo_tolerance_km;
    if perigee_km >= geo_low && apogee_km <= geo_high {
        return Regime::Geo;
    }
    Regime::Other
}

/// Regime of a single altitude, used for the location of a close approach.
pub fn classify_altitude(altitude_km: f64, bands: &RegimeBands) -> Regime {
    classify_range(altitude_km, altitude_km, bands)
}

/// Classify a catalog object from its current state.
pub fn classify(object: &TrackedObject, bands: &RegimeBands) -> Result<Regime, ClassifyError> {
    let state = object
        .state
        .as_ref()
        .ok_or_else(|| ClassifyError::MissingState(object.id.clone()))?;

    let (perigee, apogee) = match state {
        OrbitState::Keplerian(elements) => {
            if !elements.is_finite() {
                return Err(ClassifyError::NonFinite(object.id.clone()));
            }
            (elements.perigee_altitude_km(), elements.apogee_altitude_km())
        }
        OrbitState::Cartesian(sv) => {
            if !sv.is_finite() {
                return Err(ClassifyError::NonFinite(object.id.clone()));
            }
            match state_to_elements(sv) {
                Ok(elements) => (elements.perigee_altitude_km(), elements.apogee_altitude_km()),
                // unbound or rectilinear: no altitude band can contain it
                Err(_) => return Ok(Regime::Other),
            }
        }
    };

    Ok(classify_range(perigee, apogee, bands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitwatch_core::{KeplerianElements, ObjectType, StateVector, R_EARTH};

    fn bands() -> RegimeBands {
        RegimeBands::default()
    }

    fn object(elements: KeplerianElements) -> TrackedObject {
        TrackedObject::with_elements("1", ObjectType::Payload, 0.0, elements)
    }

    #[test]
    fn test_standard_regimes() {
        let b = bands();
        assert_eq!(classify_range(400.0, 420.0, &b), Regime::Leo);
        assert_eq!(classify_range(20_100.0, 20_300.0, &b), Regime::Meo);
        assert_eq!(classify_range(35_780.0, 35_790.0, &b), Regime::Geo);
    }

    #[test]
    fn test_ranges_crossing_bands_are_other() {
        let b = bands();
        // geostationary transfer orbit
        assert_eq!(classify_range(250.0, 35_786.0, &b), Regime::Other);
        // just above the MEO ceiling, short of the GEO band
        assert_eq!(classify_range(35_500.0, 35_590.0, &b), Regime::Other);
        // sub-surface perigee
        assert_eq!(classify_range(-10.0, 300.0, &b), Regime::Other);
        assert_eq!(classify_range(f64::NAN, 300.0, &b), Regime::Other);
    }

    #[test]
    fn test_boundary_altitude_goes_to_lower_band() {
        let b = bands();
        assert_eq!(classify_altitude(2_000.0, &b), Regime::Leo);
        assert_eq!(classify_altitude(2_000.1, &b), Regime::Meo);
        assert_eq!(classify_altitude(35_786.0 + 200.0, &b), Regime::Geo);
        assert_eq!(classify_altitude(40_000.0, &b), Regime::Other);
    }

    #[test]
    fn test_classify_keplerian_object() {
        let leo = object(KeplerianElements::circular(550.0, 0.9, 0.0, 0.0));
        assert_eq!(classify(&leo, &bands()), Ok(Regime::Leo));

        let geo = object(KeplerianElements::circular(35_786.0, 0.0, 0.0, 0.0));
        assert_eq!(classify(&geo, &bands()), Ok(Regime::Geo));

        let hyperbolic = object(KeplerianElements {
            eccentricity: 1.2,
            ..KeplerianElements::circular(500.0, 0.0, 0.0, 0.0)
        });
        assert_eq!(classify(&hyperbolic, &bands()), Ok(Regime::Other));
    }

    #[test]
    fn test_classify_cartesian_object() {
        let r = R_EARTH + 20_200.0;
        let v = (orbitwatch_core::MU_EARTH / r).sqrt();
        let mut obj = TrackedObject::unparsed("GPS");
        obj.state = Some(OrbitState::Cartesian(StateVector {
            position_km: [r, 0.0, 0.0],
            velocity_km_s: [0.0, v * 0.5, v * 0.866_025_403_784_438_6],
        }));
        assert_eq!(classify(&obj, &bands()), Ok(Regime::Meo));
    }

    #[test]
    fn test_malformed_state_is_reported() {
        let missing = TrackedObject::unparsed("404");
        assert_eq!(
            classify(&missing, &bands()),
            Err(ClassifyError::MissingState("404".into()))
        );

        let nan = object(KeplerianElements::circular(f64::NAN, 0.0, 0.0, 0.0));
        assert_eq!(classify(&nan, &bands()), Err(ClassifyError::NonFinite("1".into())));
    }
}
