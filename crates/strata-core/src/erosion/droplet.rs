//! Single-droplet lifecycle.
//!
//! A droplet spawns at a continuous position, follows the bilinear gradient
//! with inertia, and on each step either deposits surplus sediment onto the
//! four corners of the cell it left or erodes the brush footprint around that
//! cell. The kernel is written against [`Terrain`] so the same code drives
//! in-place sequential erosion and snapshot-plus-delta batched erosion.
use std::collections::HashMap;

use super::brush::ErosionBrush;
use super::params::ErosionParams;

/// Height storage a droplet reads and writes.
pub(crate) trait Terrain {
    fn height_at(&self, index: usize) -> f64;

    fn deposit(&mut self, index: usize, amount: f64);

    /// Removes at most `amount` from the node, never below zero. Returns what
    /// was actually taken.
    fn take(&mut self, index: usize, amount: f64) -> f64;
}

impl Terrain for [f64] {
    #[inline]
    fn height_at(&self, index: usize) -> f64 {
        self[index]
    }

    #[inline]
    fn deposit(&mut self, index: usize, amount: f64) {
        self[index] += amount;
    }

    #[inline]
    fn take(&mut self, index: usize, amount: f64) -> f64 {
        let taken = self[index].min(amount).max(0.0);
        self[index] -= taken;
        taken
    }
}

/// Read-only snapshot plus this droplet's own edits.
///
/// A droplet sees its own deposits and takes exactly as it would on a live
/// buffer, but never the edits of other droplets in the same batch.
pub(crate) struct SnapshotDelta<'a> {
    snapshot: &'a [f64],
    touched: HashMap<usize, f64>,
}

impl<'a> SnapshotDelta<'a> {
    pub fn new(snapshot: &'a [f64]) -> Self {
        Self { snapshot, touched: HashMap::new() }
    }

    fn node(&mut self, index: usize) -> &mut f64 {
        let snapshot = self.snapshot;
        self.touched.entry(index).or_insert_with(|| snapshot[index])
    }

    /// Final heights of every node this droplet touched, in index order.
    pub fn into_heights(self) -> Vec<(usize, f64)> {
        let mut heights: Vec<(usize, f64)> = self.touched.into_iter().collect();
        heights.sort_unstable_by_key(|&(index, _)| index);
        heights
    }
}

impl Terrain for SnapshotDelta<'_> {
    #[inline]
    fn height_at(&self, index: usize) -> f64 {
        self.touched.get(&index).copied().unwrap_or(self.snapshot[index])
    }

    #[inline]
    fn deposit(&mut self, index: usize, amount: f64) {
        *self.node(index) += amount;
    }

    #[inline]
    fn take(&mut self, index: usize, amount: f64) -> f64 {
        let node = self.node(index);
        let taken = node.min(amount).max(0.0);
        *node -= taken;
        taken
    }
}

/// Mass moved by one droplet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DropletOutcome {
    pub eroded: f64,
    pub deposited: f64,
}

struct HeightAndGradient {
    height: f64,
    gradient_x: f64,
    gradient_y: f64,
}

/// Bilinear height and gradient inside the cell containing `(pos_x, pos_y)`.
fn height_and_gradient<T: Terrain + ?Sized>(
    terrain: &T,
    width: usize,
    pos_x: f64,
    pos_y: f64,
) -> HeightAndGradient {
    let coord_x = pos_x as usize;
    let coord_y = pos_y as usize;
    let x = pos_x - coord_x as f64;
    let y = pos_y - coord_y as f64;

    let nw_index = coord_y * width + coord_x;
    let nw = terrain.height_at(nw_index);
    let ne = terrain.height_at(nw_index + 1);
    let sw = terrain.height_at(nw_index + width);
    let se = terrain.height_at(nw_index + width + 1);

    HeightAndGradient {
        height: nw * (1.0 - x) * (1.0 - y) + ne * x * (1.0 - y) + sw * (1.0 - x) * y + se * x * y,
        gradient_x: (ne - nw) * (1.0 - y) + (se - sw) * y,
        gradient_y: (sw - nw) * (1.0 - x) + (se - ne) * x,
    }
}

/// Run one droplet from `start` until it stalls, leaves the interior, or
/// exhausts its lifetime.
///
/// `start` must lie in `[0, width − 1) × [0, height − 1)`.
pub(crate) fn simulate<T: Terrain + ?Sized>(
    terrain: &mut T,
    width: usize,
    height: usize,
    brush: &ErosionBrush,
    params: &ErosionParams,
    start: (f64, f64),
) -> DropletOutcome {
    let (mut pos_x, mut pos_y) = start;
    let mut dir_x = 0.0;
    let mut dir_y = 0.0;
    let mut speed = params.initial_speed;
    let mut water = params.initial_water_volume;
    let mut sediment = 0.0;
    let mut outcome = DropletOutcome::default();

    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;

    for _ in 0..params.max_droplet_lifetime {
        let node_x = pos_x as usize;
        let node_y = pos_y as usize;
        let droplet_index = node_y * width + node_x;
        let cell_offset_x = pos_x - node_x as f64;
        let cell_offset_y = pos_y - node_y as f64;

        let hg = height_and_gradient(terrain, width, pos_x, pos_y);

        dir_x = dir_x * params.inertia - hg.gradient_x * (1.0 - params.inertia);
        dir_y = dir_y * params.inertia - hg.gradient_y * (1.0 - params.inertia);
        let len = (dir_x * dir_x + dir_y * dir_y).sqrt();
        if len != 0.0 {
            dir_x /= len;
            dir_y /= len;
        }
        pos_x += dir_x;
        pos_y += dir_y;

        // Stalled on a flat, or stepped off the interior.
        if (dir_x == 0.0 && dir_y == 0.0)
            || pos_x < 0.0
            || pos_x >= max_x
            || pos_y < 0.0
            || pos_y >= max_y
        {
            break;
        }

        let new_height = height_and_gradient(terrain, width, pos_x, pos_y).height;
        let delta_height = new_height - hg.height;

        let capacity = (-delta_height * speed * water * params.sediment_capacity_factor)
            .max(params.min_sediment_capacity);

        if sediment > capacity || delta_height > 0.0 {
            // Uphill: fill the pit behind us. Downhill: drop the surplus.
            let amount = if delta_height > 0.0 {
                delta_height.min(sediment)
            } else {
                (sediment - capacity) * params.deposit_speed
            };
            sediment -= amount;

            terrain.deposit(droplet_index, amount * (1.0 - cell_offset_x) * (1.0 - cell_offset_y));
            terrain.deposit(droplet_index + 1, amount * cell_offset_x * (1.0 - cell_offset_y));
            terrain.deposit(droplet_index + width, amount * (1.0 - cell_offset_x) * cell_offset_y);
            terrain.deposit(droplet_index + width + 1, amount * cell_offset_x * cell_offset_y);
            outcome.deposited += amount;
        } else {
            // Never dig deeper than the drop just descended.
            let amount = ((capacity - sediment) * params.erode_speed).min(-delta_height);
            for entry in brush.entries(droplet_index) {
                let taken = terrain.take(entry.index, amount * entry.weight);
                sediment += taken;
                outcome.eroded += taken;
            }
        }

        speed = (speed * speed + delta_height.abs() * params.gravity).sqrt();
        water *= 1.0 - params.evaporate_speed;
    }

    outcome
}
