//! Pipeline actions and their per-cell semantics.
//!
//! Every action maps the current value of one cell to its next value and reads
//! nothing else from the grid, so a pass can be split over disjoint cell
//! ranges freely. All results are clamped to [-1, 1].
use std::fmt;
use std::sync::Arc;

use crate::grid::Grid;
use crate::source::NoiseSource;

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    // Endpoint-exact form: t = 0 gives `a`, t = 1 gives `b`.
    a * (1.0 - t) + b * t
}

// ── Blend operations ──────────────────────────────────────────────────────────

/// How a layer's value merges with the cell it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    /// `(c + v) / 2`
    Combine,
    /// `c + v`
    Add,
    /// `c - v`
    Subtract,
    /// `c * v`
    Multiply,
    /// `c / v`; a zero divisor becomes the smallest positive subnormal.
    Divide,
    /// `v` when `v > c`, otherwise `c`.
    OnlyHigher,
    /// `v` when `v < c`, otherwise `c`.
    OnlyLower,
}

impl BlendOp {
    /// What a fully masked layer value becomes, chosen so that mask = 1
    /// leaves the cell unchanged.
    pub fn blend_target(self, cell: f64) -> f64 {
        match self {
            BlendOp::Combine | BlendOp::OnlyHigher | BlendOp::OnlyLower => cell,
            BlendOp::Add | BlendOp::Subtract => 0.0,
            BlendOp::Multiply | BlendOp::Divide => 1.0,
        }
    }

    /// Unclamped combination of the cell with a post-mask layer value.
    pub fn combine(self, cell: f64, value: f64) -> f64 {
        match self {
            BlendOp::Combine => (cell + value) / 2.0,
            BlendOp::Add => cell + value,
            BlendOp::Subtract => cell - value,
            BlendOp::Multiply => cell * value,
            BlendOp::Divide => {
                let divisor = if value == 0.0 { f64::from_bits(1) } else { value };
                cell / divisor
            }
            BlendOp::OnlyHigher => {
                if value > cell { value } else { cell }
            }
            BlendOp::OnlyLower => {
                if value < cell { value } else { cell }
            }
        }
    }
}

// ── Masks ─────────────────────────────────────────────────────────────────────

/// Per-cell blend weight in [0, 1]; 0 applies the layer fully.
#[derive(Clone)]
pub enum Mask {
    Constant(f64),
    /// Sampled at `(x * scale, y * scale)` using the source's own output mode.
    Source { noise: Arc<dyn NoiseSource>, scale: f64 },
    /// Already resampled to the mixer's resolution.
    Grid(Grid),
}

impl Mask {
    pub fn value_at(&self, x: usize, y: usize) -> f64 {
        let raw = match self {
            Mask::Constant(v) => *v,
            Mask::Source { noise, scale } => noise.evaluate(x as f64 * scale, y as f64 * scale),
            Mask::Grid(grid) => grid.get(y, x),
        };
        raw.clamp(0.0, 1.0)
    }
}

impl Default for Mask {
    fn default() -> Self {
        Mask::Constant(0.0)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mask::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Mask::Source { scale, .. } => {
                f.debug_struct("Source").field("scale", scale).finish_non_exhaustive()
            }
            Mask::Grid(grid) => f
                .debug_struct("Grid")
                .field("width", &grid.width)
                .field("height", &grid.height)
                .finish_non_exhaustive(),
        }
    }
}

// ── Layers ────────────────────────────────────────────────────────────────────

/// A noise source blended into the grid.
///
/// Returned by the mixer's layer calls so mask and modifiers can be chained:
///
/// ```
/// # use strata_core::mixer::Mixer;
/// # use strata_core::source::PerlinNoise;
/// let mut mixer = Mixer::new(8, 8, 0.0).unwrap();
/// mixer
///     .add_layer(PerlinNoise::new(1.0), 0.1)
///     .mask_constant(0.25)
///     .inverse()
///     .shift(0.1);
/// ```
#[derive(Clone)]
pub struct Layer {
    op: BlendOp,
    noise: Arc<dyn NoiseSource>,
    noise_scale: f64,
    mask: Mask,
    inverse: bool,
    scale: Option<f64>,
    shift: Option<f64>,
    width: usize,
    height: usize,
}

impl Layer {
    pub(crate) fn new(
        op: BlendOp,
        noise: Arc<dyn NoiseSource>,
        noise_scale: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            op,
            noise,
            noise_scale,
            mask: Mask::default(),
            inverse: false,
            scale: None,
            shift: None,
            width,
            height,
        }
    }

    pub fn op(&self) -> BlendOp {
        self.op
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn mask_constant(&mut self, value: f64) -> &mut Self {
        self.mask = Mask::Constant(value);
        self
    }

    pub fn mask_source<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Self {
        self.mask = Mask::Source { noise: Arc::new(noise), scale };
        self
    }

    /// Use a precomputed mask. A mask of a different size is bilinearly
    /// resampled to the mixer's resolution.
    pub fn mask_grid(&mut self, grid: &Grid) -> &mut Self {
        self.mask = Mask::Grid(grid.resample(self.width, self.height));
        self
    }

    /// Negate the layer's value before scaling and shifting.
    pub fn inverse(&mut self) -> &mut Self {
        self.inverse = true;
        self
    }

    pub fn scale(&mut self, amount: f64) -> &mut Self {
        self.scale = Some(amount);
        self
    }

    pub fn shift(&mut self, amount: f64) -> &mut Self {
        self.shift = Some(amount);
        self
    }

    fn modified(&self, mut value: f64) -> f64 {
        if self.inverse {
            value = -value;
        }
        if let Some(s) = self.scale {
            value *= s;
        }
        if let Some(s) = self.shift {
            value += s;
        }
        value
    }

    pub fn execute(&self, cell: f64, x: usize, y: usize) -> f64 {
        let raw = self.noise.evaluate(x as f64 * self.noise_scale, y as f64 * self.noise_scale);
        let value = self.modified(raw);
        let blended = lerp(value, self.op.blend_target(cell), self.mask.value_at(x, y));
        self.op.combine(cell, blended).clamp(-1.0, 1.0)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("op", &self.op)
            .field("noise_scale", &self.noise_scale)
            .field("mask", &self.mask)
            .field("inverse", &self.inverse)
            .field("scale", &self.scale)
            .field("shift", &self.shift)
            .finish_non_exhaustive()
    }
}

// ── Tiers ─────────────────────────────────────────────────────────────────────

/// Snaps cells toward `N + 1` evenly spaced levels across [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Tiers {
    levels: Vec<f64>,
    effect: f64,
}

impl Tiers {
    /// `amount` of 0 is treated as 1. `effect` runs from 0 (full snap) to 1
    /// (no change) and is clamped to that range.
    pub fn new(amount: u32, effect: f64) -> Self {
        let n = amount.max(1);
        let step = 2.0 / n as f64;
        let levels = (0..=n).map(|i| -1.0 + step * i as f64).collect();
        Self { levels, effect: effect.clamp(0.0, 1.0) }
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Nearest level; ties go to the lower one.
    fn closest(&self, value: f64) -> f64 {
        let mut best = self.levels[0];
        for &level in &self.levels[1..] {
            if (level - value).abs() < (best - value).abs() {
                best = level;
            }
        }
        best
    }

    pub fn apply(&self, cell: f64) -> f64 {
        lerp(self.closest(cell), cell, self.effect).clamp(-1.0, 1.0)
    }
}

// ── Actions ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Action {
    Fill(f64),
    Layer(Layer),
    Tier(Tiers),
    Shift(f64),
    Scale(f64),
    Invert,
}

impl Action {
    /// Next value of the cell at column `x`, row `y`.
    pub fn execute(&self, cell: f64, x: usize, y: usize) -> f64 {
        match self {
            Action::Fill(v) => v.clamp(-1.0, 1.0),
            Action::Layer(layer) => layer.execute(cell, x, y),
            Action::Tier(tiers) => tiers.apply(cell),
            Action::Shift(amount) => (cell + amount).clamp(-1.0, 1.0),
            Action::Scale(amount) => (cell * amount).clamp(-1.0, 1.0),
            Action::Invert => (-cell).clamp(-1.0, 1.0),
        }
    }
}
