//! Multi-octave derivations over a single-octave [`NoiseSource`].
//!
//! Every driver sums `octaves` samples, multiplying frequency by `lacunarity`
//! and amplitude by `persistence` after each one, starting from
//! `init_frequency` and amplitude 1. The source is sampled in signed mode
//! through [`SignedOutput`], which puts its flag back when the call returns.
use serde::{Deserialize, Serialize};

use crate::source::{NoiseSource, SignedOutput};

/// Octave stack configuration shared by all four drivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalParams {
    pub octaves: u32,
    /// Per-octave amplitude multiplier.
    pub persistence: f64,
    /// Per-octave frequency multiplier.
    pub lacunarity: f64,
    pub init_frequency: f64,
}

impl FractalParams {
    /// `octaves` with persistence 0.5, lacunarity 2 and starting frequency 1.
    pub fn new(octaves: u32) -> Self {
        Self { octaves, persistence: 0.5, lacunarity: 2.0, init_frequency: 1.0 }
    }

    pub fn with_persistence(mut self, persistence: f64) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_lacunarity(mut self, lacunarity: f64) -> Self {
        self.lacunarity = lacunarity;
        self
    }

    pub fn with_init_frequency(mut self, init_frequency: f64) -> Self {
        self.init_frequency = init_frequency;
        self
    }
}

/// Run the octave loop, folding each `(sample, amplitude)` pair through `term`.
fn accumulate<N, T>(noise: &mut N, x: f64, y: f64, params: &FractalParams, mut term: T) -> f64
where
    N: NoiseSource + ?Sized,
    T: FnMut(f64, f64) -> f64,
{
    let signed = SignedOutput::new(noise);
    let mut total = 0.0;
    let mut freq = params.init_frequency;
    let mut amp = 1.0;
    for _ in 0..params.octaves {
        total += term(signed.evaluate(x * freq, y * freq), amp);
        freq *= params.lacunarity;
        amp *= params.persistence;
    }
    total
}

/// Fractal Brownian motion: Σ amp · noise(x·f, y·f).
///
/// Clamped to [-1, 1]; remapped to [0, 1] via `(v + 1) / 2` when `normalize`.
pub fn fractal_sum<N: NoiseSource + ?Sized>(
    noise: &mut N,
    x: f64,
    y: f64,
    params: &FractalParams,
    normalize: bool,
) -> f64 {
    let total = accumulate(noise, x, y, params, |v, amp| v * amp).clamp(-1.0, 1.0);
    if normalize { (total + 1.0) / 2.0 } else { total }
}

/// Billow: Σ |noise · amp|.
///
/// The clamped sum is already non-negative, so the normalized form is returned
/// as-is and the signed form is `v * 2 - 1`.
pub fn billow<N: NoiseSource + ?Sized>(
    noise: &mut N,
    x: f64,
    y: f64,
    params: &FractalParams,
    normalize: bool,
) -> f64 {
    let total = accumulate(noise, x, y, params, |v, amp| (v * amp).abs()).clamp(-1.0, 1.0);
    if normalize { total } else { total * 2.0 - 1.0 }
}

/// Ridged multifractal: Σ (offset − |noise · amp|)².
///
/// Larger `offset` gives sharper, denser ridges. Both output forms derive from
/// the same clamped accumulation: normalized returns it directly, signed
/// returns `v * 2 - 1`.
pub fn ridged_multifractal<N: NoiseSource + ?Sized>(
    noise: &mut N,
    x: f64,
    y: f64,
    params: &FractalParams,
    offset: f64,
    normalize: bool,
) -> f64 {
    let total = accumulate(noise, x, y, params, |v, amp| {
        let n = offset - (v * amp).abs();
        n * n
    })
    .clamp(-1.0, 1.0);
    if normalize { total } else { total * 2.0 - 1.0 }
}

/// Ridge: the complement of [`billow`].
///
/// Normalized is `1 - billow(true)`. Signed is `1 - billow(false) - 1`, which
/// is deliberately not the negation of the normalized form.
pub fn ridge<N: NoiseSource + ?Sized>(
    noise: &mut N,
    x: f64,
    y: f64,
    params: &FractalParams,
    normalize: bool,
) -> f64 {
    if normalize {
        1.0 - billow(noise, x, y, params, true)
    } else {
        1.0 - billow(noise, x, y, params, false) - 1.0
    }
}

// ── Fractal sources ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FractalKind {
    Sum,
    Billow,
    RidgedMultifractal { offset: f64 },
    Ridge,
}

/// A fractal derivation packaged as a [`NoiseSource`], so it can drive a
/// mixer layer or mask like any primitive.
///
/// Each evaluation works on a private clone of the inner source, which keeps
/// concurrent readers from ever observing each other's flag overrides.
/// `seed` reads and writes go to the inner source.
#[derive(Debug, Clone)]
pub struct FractalNoise<N> {
    source: N,
    kind: FractalKind,
    params: FractalParams,
    normalize_output: bool,
}

impl<N: NoiseSource + Clone> FractalNoise<N> {
    pub fn new(source: N, kind: FractalKind, params: FractalParams) -> Self {
        Self { source, kind, params, normalize_output: false }
    }

    pub fn normalized(mut self, normalize: bool) -> Self {
        self.normalize_output = normalize;
        self
    }

    pub fn params(&self) -> &FractalParams {
        &self.params
    }

    pub fn source(&self) -> &N {
        &self.source
    }
}

impl<N: NoiseSource + Clone> NoiseSource for FractalNoise<N> {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        let mut source = self.source.clone();
        let p = &self.params;
        let norm = self.normalize_output;
        match self.kind {
            FractalKind::Sum => fractal_sum(&mut source, x, y, p, norm),
            FractalKind::Billow => billow(&mut source, x, y, p, norm),
            FractalKind::RidgedMultifractal { offset } => {
                ridged_multifractal(&mut source, x, y, p, offset, norm)
            }
            FractalKind::Ridge => ridge(&mut source, x, y, p, norm),
        }
    }

    fn seed(&self) -> f64 {
        self.source.seed()
    }

    fn set_seed(&mut self, seed: f64) {
        self.source.set_seed(seed);
    }

    fn normalize_output(&self) -> bool {
        self.normalize_output
    }

    fn set_normalize_output(&mut self, normalize: bool) {
        self.normalize_output = normalize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::Fixed;
    use crate::source::PerlinNoise;
    use approx::assert_relative_eq;

    fn grid_points() -> impl Iterator<Item = (f64, f64)> {
        (0..24).flat_map(|i| (0..24).map(move |j| (i as f64 * 0.37 + 0.11, j as f64 * 0.23 + 0.05)))
    }

    #[test]
    fn single_octave_sum_is_clamped_sample() {
        let p = FractalParams::new(1);
        for v in [-1.7, -0.4, 0.0, 0.3, 1.2] {
            let mut src = Fixed::new(v);
            assert_eq!(fractal_sum(&mut src, 3.0, 4.0, &p, false), v.clamp(-1.0, 1.0));
            assert_eq!(
                fractal_sum(&mut src, 3.0, 4.0, &p, true),
                (v.clamp(-1.0, 1.0) + 1.0) / 2.0
            );
        }
    }

    #[test]
    fn sum_weights_octaves_by_persistence() {
        let mut src = Fixed::new(0.4);
        let p = FractalParams::new(3).with_persistence(0.5);
        assert_relative_eq!(fractal_sum(&mut src, 0.0, 0.0, &p, false), 0.4 * 1.75);
    }

    #[test]
    fn frequency_follows_lacunarity() {
        use crate::source::testing::Ramp;
        // Ramp is linear, so octave i samples at freq 2·3^i.
        let mut src = Ramp::default();
        let p = FractalParams::new(2)
            .with_persistence(1.0)
            .with_lacunarity(3.0)
            .with_init_frequency(2.0);
        let expected = (1.0 * 0.1 * 2.0) + (1.0 * 0.1 * 6.0);
        assert_relative_eq!(fractal_sum(&mut src, 1.0, 0.0, &p, false), expected, epsilon = 1e-12);
    }

    #[test]
    fn every_driver_restores_normalize_flag() {
        let p = FractalParams::new(4);
        for start in [true, false] {
            let mut src = PerlinNoise::new(2.0).normalized(start);
            fractal_sum(&mut src, 0.3, 0.7, &p, true);
            assert_eq!(src.normalize_output(), start);
            billow(&mut src, 0.3, 0.7, &p, false);
            assert_eq!(src.normalize_output(), start);
            ridged_multifractal(&mut src, 0.3, 0.7, &p, 1.0, true);
            assert_eq!(src.normalize_output(), start);
            ridge(&mut src, 0.3, 0.7, &p, false);
            assert_eq!(src.normalize_output(), start);
        }
    }

    #[test]
    fn drivers_sample_signed_even_when_source_normalized() {
        // A normalized source would report 0.75 for 0.5; the driver must see 0.5.
        let mut src = PerlinNoise::new(5.0).normalized(true);
        let reference = PerlinNoise::new(5.0);
        let p = FractalParams::new(1);
        for (x, y) in grid_points() {
            assert_eq!(
                fractal_sum(&mut src, x, y, &p, false),
                reference.evaluate(x, y).clamp(-1.0, 1.0)
            );
        }
    }

    #[test]
    fn ridge_is_exact_complement_of_billow() {
        let mut src = PerlinNoise::new(9.0);
        let p = FractalParams::new(5);
        for (x, y) in grid_points() {
            let r = ridge(&mut src, x, y, &p, true);
            let b = billow(&mut src, x, y, &p, true);
            assert_eq!(r, 1.0 - b, "ridge law broken at ({x}, {y})");
        }
    }

    #[test]
    fn ridge_signed_branch_keeps_extra_offset() {
        let mut src = Fixed::new(0.5);
        let p = FractalParams::new(1);
        // billow(true) = 0.5, billow(false) = 0.0
        assert_eq!(ridge(&mut src, 0.0, 0.0, &p, true), 0.5);
        assert_eq!(ridge(&mut src, 0.0, 0.0, &p, false), 0.0);
    }

    #[test]
    fn billow_ranges() {
        let mut src = PerlinNoise::new(1.0);
        let p = FractalParams::new(6);
        for (x, y) in grid_points() {
            let n = billow(&mut src, x, y, &p, true);
            let s = billow(&mut src, x, y, &p, false);
            assert!((0.0..=1.0).contains(&n), "normalized billow {n}");
            assert!((-1.0..=1.0).contains(&s), "signed billow {s}");
            assert_relative_eq!(s, n * 2.0 - 1.0);
        }
    }

    #[test]
    fn ridged_multifractal_single_octave() {
        let mut src = Fixed::new(0.5);
        let p = FractalParams::new(1);
        // (1 - 0.5)^2 = 0.25
        assert_relative_eq!(ridged_multifractal(&mut src, 0.0, 0.0, &p, 1.0, true), 0.25);
        assert_relative_eq!(ridged_multifractal(&mut src, 0.0, 0.0, &p, 1.0, false), -0.5);
    }

    #[test]
    fn ridged_multifractal_clamps_large_offsets() {
        let mut src = Fixed::new(0.0);
        let p = FractalParams::new(3);
        assert_eq!(ridged_multifractal(&mut src, 0.0, 0.0, &p, 2.0, true), 1.0);
        assert_eq!(ridged_multifractal(&mut src, 0.0, 0.0, &p, 2.0, false), 1.0);
    }

    #[test]
    fn fractal_noise_matches_free_function() {
        let inner = PerlinNoise::new(4.0).normalized(true);
        let p = FractalParams::new(5).with_persistence(0.6);
        let fractal = FractalNoise::new(inner.clone(), FractalKind::Ridge, p).normalized(true);
        let mut direct = inner;
        for (x, y) in grid_points() {
            assert_eq!(fractal.evaluate(x, y), ridge(&mut direct, x, y, &p, true));
        }
        assert!(fractal.source().normalize_output(), "inner flag untouched");
    }

    #[test]
    fn fractal_noise_seed_delegates_to_inner() {
        let mut fractal =
            FractalNoise::new(PerlinNoise::new(1.0), FractalKind::Sum, FractalParams::new(3));
        let before = fractal.evaluate(0.37, 0.91);
        fractal.set_seed(8.0);
        assert_eq!(fractal.source().seed(), 8.0);
        assert_ne!(fractal.evaluate(0.37, 0.91), before);
    }
}
