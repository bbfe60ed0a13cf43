//! Screening throughput benchmarks
//!
//! Measures the full screening pipeline on synthetic LEO shells:
//! - Coarse and apsis filtering on growing catalogs
//! - Fine filtering and refinement of a dense shell

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orbitwatch_conjunction::{screen, ScreeningTarget};
use orbitwatch_core::{KeplerianElements, PropagationSettings, RegimeBands, ScreeningSettings};
use orbitwatch_orbit::KeplerOrbit;
use std::sync::atomic::AtomicBool;

/// Deterministic spread of circular orbits between 400 and 1400 km.
fn synthetic_catalog(size: usize) -> Vec<ScreeningTarget> {
    let settings = PropagationSettings::default();
    (0..size)
        .map(|k| {
            let f = k as f64;
            let elements = KeplerianElements::circular(
                400.0 + (f * 37.0) % 1000.0,
                (f * 0.13) % std::f64::consts::PI,
                (f * 0.71) % std::f64::consts::TAU,
                (f * 1.37) % std::f64::consts::TAU,
            );
            let orbit = KeplerOrbit::new(elements, 0.0, &settings).expect("valid synthetic orbit");
            ScreeningTarget::new(format!("OBJ-{k:05}"), orbit)
        })
        .collect()
}

fn bench_screening_catalog_size(c: &mut Criterion) {
    let settings = ScreeningSettings {
        window_hours: 2.0,
        ..Default::default()
    };
    let bands = RegimeBands::default();
    let cancel = AtomicBool::new(false);

    for size in [100usize, 500, 1000] {
        let targets = synthetic_catalog(size);
        c.bench_with_input(BenchmarkId::new("screen_catalog", size), &targets, |b, targets| {
            b.iter(|| black_box(screen(targets, 0.0, &settings, &bands, &cancel).expect("screening")));
        });
    }
}

criterion_group!(benches, bench_screening_catalog_size);
criterion_main!(benches);
