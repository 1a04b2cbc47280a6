//! Particle-based hydraulic erosion.
//!
//! Each iteration spawns one water droplet at a random position on a row-major
//! height buffer. The droplet runs downhill picking up sediment and drops it
//! when it slows or climbs. The erosion footprint table is built
//! once per simulator so repeated passes over the same dimensions only pay
//! for the droplets.
pub mod brush;
mod droplet;
pub mod params;

pub use brush::{BrushEntry, ErosionBrush};
pub use params::{DropletScheduling, ErosionParams};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::ErosionError;
use droplet::{simulate, DropletOutcome, SnapshotDelta};

/// Summary of one [`HydraulicErosion::erode`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErosionStats {
    pub droplets: u32,
    pub total_eroded: f64,
    pub total_deposited: f64,
}

impl ErosionStats {
    fn record(&mut self, outcome: DropletOutcome) {
        self.droplets += 1;
        self.total_eroded += outcome.eroded;
        self.total_deposited += outcome.deposited;
    }
}

#[derive(Debug, Clone)]
pub struct HydraulicErosion {
    width: usize,
    height: usize,
    params: ErosionParams,
    brush: ErosionBrush,
    rng: StdRng,
}

impl HydraulicErosion {
    /// Build a simulator for `width × height` maps. Both sides must be at
    /// least 2 and the brush radius at least 1.
    pub fn new(
        width: usize,
        height: usize,
        seed: u64,
        params: ErosionParams,
    ) -> Result<Self, ErosionError> {
        let brush = ErosionBrush::new(width, height, params.erosion_radius)?;
        Ok(Self { width, height, params, brush, rng: StdRng::seed_from_u64(seed) })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn params(&self) -> &ErosionParams {
        &self.params
    }

    /// Swap tuning; the brush table is rebuilt only when the radius changes.
    pub fn set_params(&mut self, params: ErosionParams) -> Result<(), ErosionError> {
        if params.erosion_radius != self.brush.radius() {
            self.brush = ErosionBrush::new(self.width, self.height, params.erosion_radius)?;
        }
        self.params = params;
        Ok(())
    }

    /// Run `iterations` droplets over `map` in place.
    ///
    /// Spawn positions are drawn from the simulator's own generator in
    /// droplet order, so a seed fixes the spawn sequence under either
    /// scheduling mode.
    pub fn erode(&mut self, map: &mut [f64], iterations: u32) -> Result<ErosionStats, ErosionError> {
        let expected = self.width * self.height;
        if map.len() != expected {
            return Err(ErosionError::MapSizeMismatch { expected, actual: map.len() });
        }

        let stats = match self.params.scheduling {
            DropletScheduling::Sequential => self.erode_sequential(map, iterations),
            DropletScheduling::Batched { batch_size } => {
                self.erode_batched(map, iterations, batch_size.max(1))
            }
        };

        log::debug!(
            "erosion: {} droplets on {}x{}, eroded {:.4}, deposited {:.4}",
            stats.droplets,
            self.width,
            self.height,
            stats.total_eroded,
            stats.total_deposited,
        );
        Ok(stats)
    }

    fn spawn(&mut self) -> (f64, f64) {
        let x = self.rng.gen::<f64>() * (self.width - 1) as f64;
        let y = self.rng.gen::<f64>() * (self.height - 1) as f64;
        (x, y)
    }

    fn erode_sequential(&mut self, map: &mut [f64], iterations: u32) -> ErosionStats {
        let mut stats = ErosionStats::default();
        for _ in 0..iterations {
            let start = self.spawn();
            let outcome =
                simulate(map, self.width, self.height, &self.brush, &self.params, start);
            stats.record(outcome);
        }
        stats
    }

    // ── Batched scheduling ────────────────────────────────────────────────────

    fn erode_batched(&mut self, map: &mut [f64], iterations: u32, batch_size: usize) -> ErosionStats {
        let mut stats = ErosionStats::default();
        let mut remaining = iterations as usize;

        while remaining > 0 {
            let count = remaining.min(batch_size);
            remaining -= count;

            let starts: Vec<(f64, f64)> = (0..count).map(|_| self.spawn()).collect();
            let snapshot = map.to_vec();
            let (width, height) = (self.width, self.height);
            let brush = &self.brush;
            let params = &self.params;

            let results: Vec<(DropletOutcome, Vec<(usize, f64)>)> = starts
                .par_iter()
                .map(|&start| {
                    let mut target = SnapshotDelta::new(&snapshot);
                    let outcome = simulate(&mut target, width, height, brush, params, start);
                    (outcome, target.into_heights())
                })
                .collect();

            // Merge in droplet order. A node no earlier droplet of this batch
            // changed takes the droplet's height as-is; otherwise the droplet's
            // net change is added. Two droplets digging the same node can
            // overdraw it: the node stops at zero and the overdraw is taken
            // back out of the eroded total so the stats keep matching the map.
            for (mut outcome, heights) in results {
                for (index, height) in heights {
                    let merged = if map[index] == snapshot[index] {
                        height
                    } else {
                        map[index] + (height - snapshot[index])
                    };
                    if merged < 0.0 {
                        outcome.eroded += merged;
                    }
                    map[index] = merged.max(0.0);
                }
                stats.record(outcome);
            }
        }
        stats
    }
}
