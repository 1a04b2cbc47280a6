//! Adapters that expose `noise` crate primitives through [`NoiseSource`].
//!
//! The primitive's permutation table is built once; the seed is fed in as the
//! third sampling axis, so reseeding slides through a 3D field instead of
//! rebuilding it.
use noise::{NoiseFn, OpenSimplex, Perlin, Simplex, SuperSimplex};

use super::NoiseSource;

pub type PerlinNoise = SeededNoise<Perlin>;
pub type SimplexNoise = SeededNoise<Simplex>;
pub type OpenSimplexNoise = SeededNoise<OpenSimplex>;
pub type SuperSimplexNoise = SeededNoise<SuperSimplex>;

#[derive(Debug, Clone)]
pub struct SeededNoise<F> {
    primitive: F,
    seed: f64,
    normalize_output: bool,
}

impl<F: Default> SeededNoise<F> {
    /// Signed output at the given seed, using the primitive's default table.
    pub fn new(seed: f64) -> Self {
        Self::with_primitive(F::default(), seed)
    }
}

impl<F> SeededNoise<F> {
    pub fn with_primitive(primitive: F, seed: f64) -> Self {
        Self { primitive, seed, normalize_output: false }
    }

    pub fn normalized(mut self, normalize: bool) -> Self {
        self.normalize_output = normalize;
        self
    }
}

impl<F> NoiseSource for SeededNoise<F>
where
    F: NoiseFn<f64, 3> + Send + Sync,
{
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        // Gradient primitives overshoot ±1 slightly at some lattice offsets.
        let v = self.primitive.get([x, y, self.seed]).clamp(-1.0, 1.0);
        if self.normalize_output { (v + 1.0) / 2.0 } else { v }
    }

    fn seed(&self) -> f64 {
        self.seed
    }

    fn set_seed(&mut self, seed: f64) {
        self.seed = seed;
    }

    fn normalize_output(&self) -> bool {
        self.normalize_output
    }

    fn set_normalize_output(&mut self, normalize: bool) {
        self.normalize_output = normalize;
    }
}
