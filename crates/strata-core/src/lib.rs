//! Layered 2D noise composition with droplet erosion.
//!
//! - [`source`]: the noise contract plus adapters over the `noise` crate.
//! - [`fractal`]: octave drivers (sum, billow, ridged multifractal, ridge).
//! - [`mixer`]: the compositing engine with sync and chunked execution.
//! - [`erosion`]: hydraulic droplet erosion over a flat height buffer.
pub mod erosion;
pub mod error;
pub mod fractal;
pub mod grid;
pub mod mixer;
pub mod source;

pub use erosion::{DropletScheduling, ErosionParams, ErosionStats, HydraulicErosion};
pub use error::{ErosionError, MixerError};
pub use fractal::{FractalKind, FractalNoise, FractalParams};
pub use grid::Grid;
pub use mixer::{BlendOp, Mixer};
pub use source::NoiseSource;
