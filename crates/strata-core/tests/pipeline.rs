use std::time::{Duration, Instant};

use strata_core::erosion::DropletScheduling;
use strata_core::fractal::{billow, ridge};
use strata_core::source::{OpenSimplexNoise, PerlinNoise, SimplexNoise};
use strata_core::{
    ErosionParams, FractalKind, FractalNoise, FractalParams, Grid, HydraulicErosion, Mixer,
    NoiseSource,
};

/// Returns `value` everywhere.
#[derive(Clone)]
struct Constant(f64);

impl NoiseSource for Constant {
    fn evaluate(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }
    fn seed(&self) -> f64 {
        0.0
    }
    fn set_seed(&mut self, _seed: f64) {}
    fn normalize_output(&self) -> bool {
        false
    }
    fn set_normalize_output(&mut self, _normalize: bool) {}
}

fn wait_for(mixer: &Mixer) -> Grid {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if let Some(grid) = mixer.try_get_result(false) {
            return grid;
        }
        assert!(Instant::now() < deadline, "background pass never committed");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn terrain_mixer(seed: f64) -> Mixer {
    let params = FractalParams::new(5).with_persistence(0.45);
    let mut m = Mixer::with_size(48, 40).unwrap();
    m.add_layer(FractalNoise::new(PerlinNoise::new(seed), FractalKind::Sum, params), 0.03);
    m.combine_layer(
        FractalNoise::new(
            SimplexNoise::new(seed + 1.0),
            FractalKind::RidgedMultifractal { offset: 1.0 },
            FractalParams::new(4),
        ),
        0.05,
    )
    .mask_source(OpenSimplexNoise::new(seed).normalized(true), 0.02);
    m.subtract_layer(
        FractalNoise::new(PerlinNoise::new(seed + 2.0), FractalKind::Billow, params),
        0.08,
    )
    .scale(0.3);
    m.tier(8, 0.7);
    m
}

#[test]
fn four_by_four_scenario() {
    let mut m = Mixer::new(4, 4, 0.0).unwrap();
    m.add_layer(Constant(0.5), 1.0);
    let g = m.apply(false).unwrap();
    assert!(g.data.iter().all(|&v| v == 0.5), "add: {:?}", g.data);

    m.invert();
    let g = m.apply(false).unwrap();
    assert!(g.data.iter().all(|&v| v == -0.5), "invert: {:?}", g.data);

    m.tier(4, 0.0);
    let g = m.apply(false).unwrap();
    assert!(g.data.iter().all(|&v| v == -0.5), "tier: {:?}", g.data);
    assert_eq!(g.data.len(), 16);
}

#[test]
fn fractal_pipeline_is_deterministic_across_paths() {
    let sync = terrain_mixer(3.0).apply(false).unwrap();
    assert_eq!(sync, terrain_mixer(3.0).apply(false).unwrap());
    assert_ne!(sync, terrain_mixer(4.0).apply(false).unwrap());
    assert!(sync.data.iter().all(|v| (-1.0..=1.0).contains(v)));

    let mut m = terrain_mixer(3.0);
    assert!(m.apply_async(4));
    assert_eq!(wait_for(&m), sync);

    let normalized = m.try_get_result(true).unwrap();
    assert!(normalized.data.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn ridge_is_exact_complement_of_billow() {
    let params = FractalParams::new(6);
    let mut noise = PerlinNoise::new(9.0);
    for i in 0..64 {
        let (x, y) = (i as f64 * 0.37, i as f64 * 0.11 + 2.0);
        let b = billow(&mut noise, x, y, &params, true);
        assert_eq!(ridge(&mut noise, x, y, &params, true), 1.0 - b);
    }
    assert!(!noise.normalize_output());
}

#[test]
fn eroded_pipeline_matches_between_paths() {
    let build = || {
        let mut m = terrain_mixer(1.5);
        m.attach_erosion_seeded(2_000, 77).unwrap();
        m
    };
    let sync = build().apply(false).unwrap();
    assert!(sync.data.iter().all(|v| (-1.0..=1.0).contains(v)));

    let mut m = build();
    assert!(m.apply_async(3));
    assert_eq!(wait_for(&m), sync);
}

#[test]
fn erosion_conserves_mass_when_serialized() {
    let base = terrain_mixer(2.0).apply(false).unwrap();
    let mut heights: Vec<f64> = base.data.iter().map(|v| v + 1.0).collect();
    let before: f64 = heights.iter().sum();

    let params = ErosionParams { scheduling: DropletScheduling::Sequential, ..Default::default() };
    let mut sim = HydraulicErosion::new(base.width, base.height, 5, params).unwrap();
    let stats = sim.erode(&mut heights, 5_000).unwrap();

    assert!(stats.total_deposited <= stats.total_eroded + 1e-9);
    let after: f64 = heights.iter().sum();
    let drift = after - (before - stats.total_eroded + stats.total_deposited);
    assert!(drift.abs() < 1e-6, "mass drift {drift}");
}

#[test]
fn batched_erosion_runs_in_mixer() {
    let params = ErosionParams {
        scheduling: DropletScheduling::Batched { batch_size: 128 },
        ..Default::default()
    };
    let run = || {
        let mut m = terrain_mixer(6.0);
        m.attach_erosion_with(1_000, 3, params.clone()).unwrap();
        m.apply(false).unwrap()
    };
    let a = run();
    assert_eq!(a, run());
    assert!(a.data.iter().all(|v| (-1.0..=1.0).contains(v)));
}
