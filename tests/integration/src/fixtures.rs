//! Catalog fixtures shared by the integration scenarios

use orbitwatch_core::{ConfigManager, EngineConfig, KeplerianElements, ObjectType, TrackedObject};
use orbitwatch_engine::{Engine, StaticCatalog};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::PathBuf;
use std::sync::Arc;

/// Fixture epoch (2023-11-14T22:13:20Z)
pub const EPOCH: f64 = 1_700_000_000.0;

/// Geostationary altitude (km)
pub const GEO_ALTITUDE_KM: f64 = 35_786.0;

pub fn init_tracing() {
    // only the first caller installs a subscriber
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn circular(
    id: &str,
    object_type: ObjectType,
    altitude_km: f64,
    inclination_rad: f64,
    raan_rad: f64,
    mean_anomaly_rad: f64,
) -> TrackedObject {
    TrackedObject::with_elements(
        id,
        object_type,
        EPOCH,
        KeplerianElements::circular(altitude_km, inclination_rad, raan_rad, mean_anomaly_rad),
    )
}

pub fn geo(id: &str, longitude_rad: f64) -> TrackedObject {
    circular(id, ObjectType::Payload, GEO_ALTITUDE_KM, 0.0, 0.0, longitude_rad).active(true)
}

/// Equatorial and polar 550 km orbits crossing the x axis together at
/// [`EPOCH`], the secondary 5 m higher. 5 m hard-body radius each.
pub fn collision_pair() -> Vec<TrackedObject> {
    vec![
        circular("SAT-A", ObjectType::Payload, 550.0, 0.0, 0.0, 0.0)
            .active(true)
            .hard_body_radius(5.0),
        circular("DEB-B", ObjectType::Debris, 550.005, FRAC_PI_2, 0.0, 0.0).hard_body_radius(5.0),
    ]
}

/// `shells` circular LEO shells 40 km apart with `per_shell` objects each,
/// spread over planes and phases, plus `geo_slots` GEO objects.
pub fn shells_catalog(shells: usize, per_shell: usize, geo_slots: usize) -> Vec<TrackedObject> {
    let mut objects = Vec::with_capacity(shells * per_shell + geo_slots);
    for shell in 0..shells {
        let altitude = 400.0 + 40.0 * shell as f64;
        for k in 0..per_shell {
            let phase = k as f64 / per_shell as f64;
            objects.push(circular(
                &format!("L{shell:02}-{k:02}"),
                if k % 3 == 0 { ObjectType::Debris } else { ObjectType::Payload },
                altitude,
                0.3 + 0.7 * phase,
                TAU * phase,
                TAU * ((phase * 7.0) % 1.0),
            ));
        }
    }
    for slot in 0..geo_slots {
        objects.push(geo(&format!("G{slot:02}"), TAU * slot as f64 / geo_slots as f64));
    }
    objects
}

pub fn engine_with(config: EngineConfig, objects: Vec<TrackedObject>) -> Engine {
    Engine::new(
        Arc::new(ConfigManager::new(config).expect("fixture config is valid")),
        Arc::new(StaticCatalog::new(objects)),
    )
    .expect("engine builds")
}

pub fn engine(objects: Vec<TrackedObject>) -> Engine {
    engine_with(EngineConfig::default(), objects)
}

/// Unique path under the system temp directory
pub fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{prefix}_{}.{extension}", uuid::Uuid::new_v4()))
}
