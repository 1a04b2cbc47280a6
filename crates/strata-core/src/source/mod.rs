//! The noise capability every layer, mask and fractal driver consumes.
//!
//! A source evaluates a scalar at a 2D coordinate and exposes two knobs: a
//! seed and a normalize-output flag. With the flag set, `evaluate` returns a
//! value in [0, 1]; otherwise in [-1, 1].
pub mod seeded;

pub use seeded::{OpenSimplexNoise, PerlinNoise, SeededNoise, SimplexNoise, SuperSimplexNoise};

use std::ops::{Deref, DerefMut};

pub trait NoiseSource: Send + Sync {
    fn evaluate(&self, x: f64, y: f64) -> f64;

    fn seed(&self) -> f64;

    /// Changing the seed must change subsequent evaluations deterministically
    /// without rebuilding any lookup tables.
    fn set_seed(&mut self, seed: f64);

    fn normalize_output(&self) -> bool;

    fn set_normalize_output(&mut self, normalize: bool);
}

impl<N: NoiseSource + ?Sized> NoiseSource for Box<N> {
    fn evaluate(&self, x: f64, y: f64) -> f64 {
        (**self).evaluate(x, y)
    }

    fn seed(&self) -> f64 {
        (**self).seed()
    }

    fn set_seed(&mut self, seed: f64) {
        (**self).set_seed(seed)
    }

    fn normalize_output(&self) -> bool {
        (**self).normalize_output()
    }

    fn set_normalize_output(&mut self, normalize: bool) {
        (**self).set_normalize_output(normalize)
    }
}

/// Forces a source into signed output for the guard's lifetime.
///
/// The caller-visible flag is snapshotted on construction and written back on
/// drop, so it is restored on every exit path, unwinding included.
pub struct SignedOutput<'a, N: NoiseSource + ?Sized> {
    noise: &'a mut N,
    saved: bool,
}

impl<'a, N: NoiseSource + ?Sized> SignedOutput<'a, N> {
    pub fn new(noise: &'a mut N) -> Self {
        let saved = noise.normalize_output();
        noise.set_normalize_output(false);
        Self { noise, saved }
    }
}

impl<N: NoiseSource + ?Sized> Deref for SignedOutput<'_, N> {
    type Target = N;

    fn deref(&self) -> &N {
        self.noise
    }
}

impl<N: NoiseSource + ?Sized> DerefMut for SignedOutput<'_, N> {
    fn deref_mut(&mut self) -> &mut N {
        self.noise
    }
}

impl<N: NoiseSource + ?Sized> Drop for SignedOutput<'_, N> {
    fn drop(&mut self) {
        self.noise.set_normalize_output(self.saved);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::NoiseSource;

    /// Returns the same value everywhere, ignoring seed and normalize flag.
    #[derive(Debug, Clone)]
    pub struct Fixed {
        pub value: f64,
        pub seed: f64,
        pub normalize: bool,
    }

    impl Fixed {
        pub fn new(value: f64) -> Self {
            Self { value, seed: 0.0, normalize: false }
        }
    }

    impl NoiseSource for Fixed {
        fn evaluate(&self, _x: f64, _y: f64) -> f64 {
            self.value
        }
        fn seed(&self) -> f64 {
            self.seed
        }
        fn set_seed(&mut self, seed: f64) {
            self.seed = seed;
        }
        fn normalize_output(&self) -> bool {
            self.normalize
        }
        fn set_normalize_output(&mut self, normalize: bool) {
            self.normalize = normalize;
        }
    }

    /// `x * 0.1 - y * 0.05`, signed or remapped to [0, 1] per the flag.
    #[derive(Debug, Clone, Default)]
    pub struct Ramp {
        pub normalize: bool,
    }

    impl NoiseSource for Ramp {
        fn evaluate(&self, x: f64, y: f64) -> f64 {
            let v = (x * 0.1 - y * 0.05).clamp(-1.0, 1.0);
            if self.normalize { (v + 1.0) / 2.0 } else { v }
        }
        fn seed(&self) -> f64 {
            0.0
        }
        fn set_seed(&mut self, _seed: f64) {}
        fn normalize_output(&self) -> bool {
            self.normalize
        }
        fn set_normalize_output(&mut self, normalize: bool) {
            self.normalize = normalize;
        }
    }
}
