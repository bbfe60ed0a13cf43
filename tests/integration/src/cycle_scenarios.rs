//! Full-cycle scenarios through the engine facade

use crate::fixtures::*;
use orbitwatch_core::{
    ConfigManager, EngineConfig, Lifetime, ObjectType, Regime, RiskLevel, TrackedObject,
};
use orbitwatch_engine::{CatalogSource, Engine, JsonFileCatalog, PublishedCycle};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn run(engine: &Engine, epoch: f64) -> Arc<PublishedCycle> {
    engine
        .run_cycle_at(epoch, &AtomicBool::new(false))
        .expect("cycle publishes")
}

#[test]
fn test_collision_course_requires_maneuver() {
    init_tracing();
    let engine = engine(collision_pair());
    // window opens ten minutes before the crossing
    let cycle = run(&engine, EPOCH - 600.0);

    let closest = cycle
        .events
        .iter()
        .min_by(|a, b| a.miss_distance_km.total_cmp(&b.miss_distance_km))
        .expect("crossing detected");
    assert_eq!(closest.primary_id, "DEB-B");
    assert_eq!(closest.secondary_id, "SAT-A");
    assert!((closest.tca_epoch_s - EPOCH).abs() < 0.01, "tca {}", closest.tca_epoch_s);
    assert!((closest.miss_distance_km - 0.005).abs() < 1e-3);
    assert_eq!(closest.combined_hard_body_radius_m, 10.0);
    assert!(closest.collision_probability > 1e-3);
    assert_eq!(closest.risk_level, RiskLevel::Critical);
    assert!(closest.maneuver_required);
    assert!(!closest.maneuver_executed);
    assert_eq!(closest.regime, Regime::Leo);

    for event in &cycle.events {
        assert!((0.0..=1.0).contains(&event.collision_probability));
        assert!(event.miss_distance_km >= 0.0);
    }

    let snapshot = &cycle.snapshot;
    assert_eq!(snapshot.event_count, cycle.events.len() as u64);
    assert_eq!(snapshot.regimes[&Regime::Leo].conjunctions, snapshot.event_count);
    assert!(snapshot.risk_levels[&RiskLevel::Critical] >= 1);
    assert!(snapshot.maneuvers_required >= 1);
    assert_eq!(snapshot.conjunctions_per_day, cycle.events.len() as f64);
    assert!(snapshot.kessler_risk_index > 0.0);
}

#[test]
fn test_crossing_on_cycle_boundary_is_reported() {
    let engine = engine(collision_pair());
    let window_s = EngineConfig::default().screening.window_s();

    // consecutive daily cycles meeting exactly at the crossing
    for start in [EPOCH - window_s, EPOCH] {
        let cycle = run(&engine, start);
        let at_boundary = cycle
            .events
            .iter()
            .find(|e| (e.tca_epoch_s - EPOCH).abs() < 0.01)
            .unwrap_or_else(|| panic!("crossing missing from cycle starting at {start}"));
        assert_eq!(at_boundary.risk_level, RiskLevel::Critical);
        assert!(at_boundary.maneuver_required);
    }
    assert_eq!(engine.latest().unwrap().version, 2);
}

#[test]
fn test_collision_course_with_covariance_is_not_low_confidence() {
    let uncertainty = orbitwatch_core::PositionUncertainty {
        radial_km: 0.05,
        in_track_km: 0.2,
        cross_track_km: 0.05,
    };
    let objects: Vec<TrackedObject> = collision_pair()
        .into_iter()
        .map(|o| o.uncertainty(uncertainty))
        .collect();
    let cycle = run(&engine(objects), EPOCH - 600.0);
    let closest = cycle
        .events
        .iter()
        .min_by(|a, b| a.miss_distance_km.total_cmp(&b.miss_distance_km))
        .unwrap();
    assert!(!closest.low_confidence);
    assert!(closest.collision_probability > 0.0 && closest.collision_probability < 1.0);
}

#[test]
fn test_lone_geo_object_has_no_coarse_candidates() {
    let objects = vec![
        geo("GEO-1", 1.2),
        circular("LEO-1", ObjectType::Payload, 700.0, 1.7, 0.0, 0.0),
    ];
    let cycle = run(&engine(objects), EPOCH);
    let stats = &cycle.snapshot.screening;
    assert_eq!(stats.screened_objects, 2);
    assert_eq!(stats.naive_pairs, 1);
    assert_eq!(stats.coarse_pairs, 0);
    assert!(cycle.events.is_empty());
    assert_eq!(cycle.snapshot.regimes[&Regime::Geo].active, 1);
}

#[test]
fn test_three_of_four_compliant() {
    let retired = |id: &str, object_type: ObjectType, altitude: f64, lifetime: Lifetime| {
        circular(id, object_type, altitude, 1.0, 0.0, 0.0).lifetime(lifetime)
    };
    let objects = vec![
        retired("P-1", ObjectType::Payload, 450.0, Lifetime::years(4.0)),
        retired("P-2", ObjectType::Payload, 600.0, Lifetime::years(18.0)),
        retired("R-1", ObjectType::RocketBody, 650.0, Lifetime::years(24.9)),
        retired("R-2", ObjectType::RocketBody, 900.0, Lifetime::years(140.0)),
        retired("P-3", ObjectType::Payload, 20_200.0, Lifetime::Indefinite),
        // not subject to the guideline
        retired("P-4", ObjectType::Payload, 800.0, Lifetime::years(90.0)).active(true),
        retired("D-1", ObjectType::Debris, 850.0, Lifetime::years(200.0)),
    ];
    let compliance = run(&engine(objects), EPOCH).snapshot.compliance.clone();
    assert_eq!(compliance.compliant, 3);
    assert_eq!(compliance.non_compliant, 1);
    assert_eq!(compliance.indefinite_excluded, 1);
    assert_eq!(compliance.rate, Some(0.75));
    assert!(compliance.compliant + compliance.non_compliant <= compliance.evaluated);
}

#[test]
fn test_empty_catalog_cycle() {
    let cycle = run(&engine(Vec::new()), EPOCH);
    let snapshot = &cycle.snapshot;
    assert_eq!(cycle.version, 1);
    assert!(cycle.events.is_empty());
    assert_eq!(snapshot.total_tracked, 0);
    assert_eq!(snapshot.kessler_risk_index, 0.0);
    assert_eq!(snapshot.conjunctions_per_day, 0.0);
    assert_eq!(snapshot.projected_active_1y(), 0.0);
    assert_eq!(snapshot.projected_active_5y(), 0.0);
    assert_eq!(snapshot.compliance.rate, None);
    assert_eq!(snapshot.screening.naive_pairs, 0);
}

#[test]
fn test_rerun_yields_identical_fingerprint() {
    let objects = shells_catalog(6, 6, 4);
    let a = run(&engine(objects.clone()), EPOCH);
    let b = run(&engine(objects.clone()), EPOCH);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.events, b.events);

    // worker count does not change the outcome
    let mut single = EngineConfig::default();
    single.cycle.worker_threads = 1;
    let c = run(&engine_with(single, objects), EPOCH);
    assert_eq!(a.fingerprint, c.fingerprint);
}

#[test]
fn test_coarse_and_apsis_filters_cut_pairs_by_an_order_of_magnitude() {
    let objects = shells_catalog(25, 8, 20);
    let cycle = run(&engine(objects), EPOCH);
    let stats = &cycle.snapshot.screening;

    assert_eq!(stats.screened_objects, 220);
    assert_eq!(stats.naive_pairs, 220 * 219 / 2);
    assert!(stats.coarse_pairs >= stats.apsis_pairs);
    // same-shell pairs and GEO slot pairs survive, nothing across shells
    assert_eq!(stats.apsis_pairs, 25 * 28 + 190);
    assert!(stats.reduction_factor().unwrap() >= 10.0);
}

#[test]
fn test_regime_counts_match_the_classifier() {
    init_tracing();
    let objects = shells_catalog(4, 5, 3);
    let config = EngineConfig::default();
    let mut expected: BTreeMap<Regime, u64> = BTreeMap::new();
    for object in &objects {
        let regime = orbitwatch_orbit::classify(object, &config.regimes).unwrap();
        *expected.entry(regime).or_default() += 1;
    }
    tracing::info!(?expected, "Classified fixture catalog");

    let cycle = run(&engine_with(config, objects), EPOCH);
    for (regime, stats) in &cycle.snapshot.regimes {
        let counted = stats.active + stats.inactive + stats.debris + stats.unknown;
        assert_eq!(counted, expected.get(regime).copied().unwrap_or(0), "{regime:?}");
    }
    assert_eq!(cycle.snapshot.regimes[&Regime::Leo].debris, 4 * 2);
}

#[test]
fn test_malformed_records_degrade_to_raw_counts() {
    let path = temp_path("catalog", "json");
    let catalog = serde_json::json!([
        {
            "id": "25544",
            "object_type": "payload",
            "epoch_s": EPOCH,
            "active": true,
            "state": { "kind": "keplerian", "semi_major_axis_km": 6798.0, "eccentricity": 0.0005,
                       "inclination_rad": 0.9, "raan_rad": 0.1, "arg_perigee_rad": 0.0, "mean_anomaly_rad": 0.0 }
        },
        {
            "id": "43013",
            "object_type": "rocket_body",
            "epoch_s": EPOCH,
            "state": { "kind": "cartesian", "position_km": [42164.0, 0.0, 0.0], "velocity_km_s": [0.0, 3.0747, 0.0] }
        },
        { "id": "broken-1", "state": { "kind": "keplerian" } },
        { "id": "escape", "epoch_s": EPOCH,
          "state": { "kind": "keplerian", "semi_major_axis_km": 7000.0, "eccentricity": 1.5,
                     "inclination_rad": 0.2, "raan_rad": 0.0, "arg_perigee_rad": 0.0, "mean_anomaly_rad": 0.0 } },
        "not even an object"
    ]);
    std::fs::write(&path, catalog.to_string()).unwrap();

    let source = JsonFileCatalog::new(&path);
    assert_eq!(source.fetch().unwrap().len(), 5);

    let engine = Engine::new(
        Arc::new(ConfigManager::new(EngineConfig::default()).unwrap()),
        Arc::new(source),
    )
    .unwrap();
    let cycle = run(&engine, EPOCH);
    let snapshot = &cycle.snapshot;

    assert_eq!(snapshot.total_tracked, 5);
    assert_eq!(snapshot.diagnostics.malformed_objects, 2);
    assert_eq!(snapshot.diagnostics.propagation_failures, 1);
    assert_eq!(
        snapshot.diagnostics.excluded_ids,
        vec!["broken-1", "escape", "record-4"]
    );
    assert_eq!(snapshot.screening.screened_objects, 2);
    assert_eq!(snapshot.regimes[&Regime::Leo].active, 1);
    assert_eq!(snapshot.regimes[&Regime::Geo].inactive, 1);
    // the unbound orbit still counts in its regime
    assert_eq!(snapshot.regimes[&Regime::Other].unknown, 1);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_failed_fetch_keeps_previous_snapshot() {
    let path = temp_path("catalog", "json");
    std::fs::write(&path, serde_json::json!([]).to_string()).unwrap();
    let engine = Engine::new(
        Arc::new(ConfigManager::new(EngineConfig::default()).unwrap()),
        Arc::new(JsonFileCatalog::new(&path)),
    )
    .unwrap();
    run(&engine, EPOCH);

    std::fs::remove_file(&path).ok();
    let result = engine.run_cycle_at(EPOCH + 60.0, &AtomicBool::new(false));
    assert!(matches!(result, Err(orbitwatch_engine::CycleError::Catalog(_))));
    assert_eq!(engine.latest().unwrap().version, 1);
    assert_eq!(engine.latest().unwrap().snapshot.evaluation_epoch_s, EPOCH);
}

#[test]
fn test_config_change_applies_to_next_cycle() {
    let manager = Arc::new(ConfigManager::new(EngineConfig::default()).unwrap());
    let engine = Engine::new(
        manager.clone(),
        Arc::new(orbitwatch_engine::StaticCatalog::new(collision_pair())),
    )
    .unwrap();
    let before = run(&engine, EPOCH - 600.0);
    assert!(before.events.iter().any(|e| e.risk_level == RiskLevel::Critical));

    let mut strict = EngineConfig::default();
    strict.screening.screening_distance_km = 0.001;
    manager.apply(strict).unwrap();
    let after = run(&engine, EPOCH - 600.0);
    assert!(after.events.is_empty());
    assert_eq!(after.version, 2);

    let mut invalid = EngineConfig::default();
    invalid.screening.screening_distance_km = -1.0;
    assert!(manager.apply(invalid).is_err());
    assert_eq!(manager.current().screening.screening_distance_km, 0.001);
}
