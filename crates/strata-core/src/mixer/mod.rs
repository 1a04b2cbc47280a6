//! Layer compositing engine.
//!
//! A [`Mixer`] owns a committed grid and an ordered list of [`Action`]s. Each
//! compute pass runs every action over every cell of the committed grid, then
//! the optional erosion stage, and commits the result. Passes accumulate: a
//! mixer built with a fill value re-fills on every pass, one copied from
//! another mixer starts from the copied grid and builds on it.
//!
//! Two execution paths produce identical grids:
//! - [`Mixer::apply`] runs on the calling thread and returns a copy.
//! - [`Mixer::apply_async`] hands the pass to a rayon task and returns at
//!   once. That task splits the cells into contiguous chunks, spawns all but
//!   the last, runs the last itself, and whoever finishes the final chunk
//!   erodes and commits. Poll with [`Mixer::try_get_result`].
//!
//! While a background pass is in flight every compute call fails fast. A pass
//! that panics is dropped without committing and releases the mixer.
pub mod action;
pub mod chunked;

pub use action::{Action, BlendOp, Layer, Mask, Tiers};
pub use chunked::ChunkPlan;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::erosion::{ErosionParams, ErosionStats, HydraulicErosion};
use crate::error::{ErosionError, MixerError};
use crate::grid::Grid;
use crate::source::NoiseSource;
use chunked::{lock, ChunkedPass};

// ── Shared state ──────────────────────────────────────────────────────────────

struct ErosionStage {
    simulator: HydraulicErosion,
    iterations: u32,
}

impl ErosionStage {
    /// Lift the grid to non-negative heights, erode, drop it back, clamp.
    fn run(&mut self, grid: &mut Grid) -> Result<ErosionStats, ErosionError> {
        let mut heights: Vec<f64> = grid.data.iter().map(|v| v + 1.0).collect();
        let stats = self.simulator.erode(&mut heights, self.iterations)?;
        grid.data = heights.into_iter().map(|h| h - 1.0).collect();
        grid.clamp_in_place(-1.0, 1.0);
        Ok(stats)
    }
}

struct Committed {
    grid: Grid,
    computed: bool,
}

/// State visible to background workers.
struct Shared {
    committed: Mutex<Committed>,
    erosion: Mutex<Option<ErosionStage>>,
    busy: AtomicBool,
}

impl Shared {
    fn new(grid: Grid) -> Self {
        Self {
            committed: Mutex::new(Committed { grid, computed: false }),
            erosion: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    fn post_process(&self, grid: &mut Grid) -> Result<(), ErosionError> {
        if let Some(stage) = lock(&self.erosion).as_mut() {
            stage.run(grid)?;
        }
        Ok(())
    }

    fn commit(&self, grid: Grid) {
        let mut committed = lock(&self.committed);
        committed.grid = grid;
        committed.computed = true;
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

fn run_actions(actions: &[Action], width: usize, offset: usize, cells: &mut [f64]) {
    for action in actions {
        for (i, cell) in cells.iter_mut().enumerate() {
            let index = offset + i;
            *cell = action.execute(*cell, index % width, index / width);
        }
    }
}

// ── Mixer ─────────────────────────────────────────────────────────────────────

pub struct Mixer {
    width: usize,
    height: usize,
    actions: Vec<Action>,
    /// The most recently pushed layer, still open to builder calls. It joins
    /// `actions` as soon as anything else is queued or a pass starts.
    open_layer: Option<Layer>,
    erosion_attached: bool,
    shared: Arc<Shared>,
}

impl Mixer {
    /// A `width × height` mixer whose pipeline starts with `Fill(fill)`.
    pub fn new(width: usize, height: usize, fill: f64) -> Result<Self, MixerError> {
        let mut mixer = Self::from_grid(width, height, Grid::new(width, height, 0.0))?;
        mixer.fill(fill);
        Ok(mixer)
    }

    /// Same as [`Mixer::new`] with a fill of 0.
    pub fn with_size(width: usize, height: usize) -> Result<Self, MixerError> {
        Self::new(width, height, 0.0)
    }

    /// A new mixer starting from `other`'s committed grid, with an empty
    /// pipeline and no erosion stage.
    pub fn from_mixer(other: &Mixer) -> Self {
        let grid = lock(&other.shared.committed).grid.clone();
        Self::with_shared(other.width, other.height, grid)
    }

    fn from_grid(width: usize, height: usize, grid: Grid) -> Result<Self, MixerError> {
        if width == 0 || height == 0 {
            return Err(MixerError::EmptyGrid { width, height });
        }
        Ok(Self::with_shared(width, height, grid))
    }

    fn with_shared(width: usize, height: usize, grid: Grid) -> Self {
        Self {
            width,
            height,
            actions: Vec::new(),
            open_layer: None,
            erosion_attached: false,
            shared: Arc::new(Shared::new(grid)),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The queued pipeline, in execution order.
    pub fn actions(&mut self) -> &[Action] {
        self.seal();
        &self.actions
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    fn seal(&mut self) {
        if let Some(layer) = self.open_layer.take() {
            self.actions.push(Action::Layer(layer));
        }
    }

    fn queue(&mut self, action: Action) -> &mut Self {
        self.seal();
        self.actions.push(action);
        self
    }

    // ── Pipeline building ─────────────────────────────────────────────────────

    /// Append a layer sampling `noise` at `(x * scale, y * scale)`.
    pub fn push_layer<N: NoiseSource + 'static>(
        &mut self,
        op: BlendOp,
        noise: N,
        scale: f64,
    ) -> &mut Layer {
        self.push_shared_layer(op, Arc::new(noise), scale)
    }

    /// Like [`Mixer::push_layer`] for a source shared with other layers.
    pub fn push_shared_layer(
        &mut self,
        op: BlendOp,
        noise: Arc<dyn NoiseSource>,
        scale: f64,
    ) -> &mut Layer {
        self.seal();
        self.open_layer.insert(Layer::new(op, noise, scale, self.width, self.height))
    }

    pub fn combine_layer<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Layer {
        self.push_layer(BlendOp::Combine, noise, scale)
    }

    pub fn add_layer<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Layer {
        self.push_layer(BlendOp::Add, noise, scale)
    }

    pub fn subtract_layer<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Layer {
        self.push_layer(BlendOp::Subtract, noise, scale)
    }

    pub fn multiply_layer<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Layer {
        self.push_layer(BlendOp::Multiply, noise, scale)
    }

    pub fn divide_layer<N: NoiseSource + 'static>(&mut self, noise: N, scale: f64) -> &mut Layer {
        self.push_layer(BlendOp::Divide, noise, scale)
    }

    pub fn only_higher_layer<N: NoiseSource + 'static>(
        &mut self,
        noise: N,
        scale: f64,
    ) -> &mut Layer {
        self.push_layer(BlendOp::OnlyHigher, noise, scale)
    }

    pub fn only_lower_layer<N: NoiseSource + 'static>(
        &mut self,
        noise: N,
        scale: f64,
    ) -> &mut Layer {
        self.push_layer(BlendOp::OnlyLower, noise, scale)
    }

    pub fn fill(&mut self, value: f64) -> &mut Self {
        self.queue(Action::Fill(value))
    }

    /// Snap toward `amount + 1` levels; `effect` 0 snaps fully, 1 not at all.
    pub fn tier(&mut self, amount: u32, effect: f64) -> &mut Self {
        self.queue(Action::Tier(Tiers::new(amount, effect)))
    }

    pub fn shift(&mut self, amount: f64) -> &mut Self {
        self.queue(Action::Shift(amount))
    }

    pub fn scale(&mut self, amount: f64) -> &mut Self {
        self.queue(Action::Scale(amount))
    }

    pub fn invert(&mut self) -> &mut Self {
        self.queue(Action::Invert)
    }

    // ── Erosion stage ─────────────────────────────────────────────────────────

    /// Erode after every pass with default parameters and a random seed.
    pub fn attach_erosion(&mut self, iterations: u32) -> Result<(), MixerError> {
        self.attach_erosion_with(iterations, rand::random(), ErosionParams::default())
    }

    pub fn attach_erosion_seeded(&mut self, iterations: u32, seed: u64) -> Result<(), MixerError> {
        self.attach_erosion_with(iterations, seed, ErosionParams::default())
    }

    /// Replaces any previously attached stage. Fails if the grid is too small
    /// for droplets or the parameters are degenerate, and while a background
    /// pass is running.
    pub fn attach_erosion_with(
        &mut self,
        iterations: u32,
        seed: u64,
        params: ErosionParams,
    ) -> Result<(), MixerError> {
        if self.is_busy() {
            return Err(MixerError::Conflict);
        }
        let simulator = HydraulicErosion::new(self.width, self.height, seed, params)?;
        *lock(&self.shared.erosion) = Some(ErosionStage { simulator, iterations });
        self.erosion_attached = true;
        Ok(())
    }

    pub fn detach_erosion(&mut self) -> Result<(), MixerError> {
        if self.is_busy() {
            return Err(MixerError::Conflict);
        }
        *lock(&self.shared.erosion) = None;
        self.erosion_attached = false;
        Ok(())
    }

    /// Answers without waiting on a background pass that is eroding.
    pub fn has_erosion(&self) -> bool {
        self.erosion_attached
    }

    // ── Compute ───────────────────────────────────────────────────────────────

    /// Run the pipeline on the calling thread and return a copy of the
    /// committed grid, remapped to [0, 1] when `normalize` is set.
    pub fn apply(&mut self, normalize: bool) -> Result<Grid, MixerError> {
        let grid = self.apply_committed()?;
        Ok(if normalize { grid.normalized() } else { grid })
    }

    /// Single-precision variant of [`Mixer::apply`].
    pub fn apply_f32(&mut self, normalize: bool) -> Result<Grid<f32>, MixerError> {
        Ok(self.apply_committed()?.to_f32(normalize))
    }

    fn apply_committed(&mut self) -> Result<Grid, MixerError> {
        if self.is_busy() {
            return Err(MixerError::Conflict);
        }
        self.seal();
        log::debug!(
            "mixer: applying {} actions to {}x{}",
            self.actions.len(),
            self.width,
            self.height
        );

        let mut grid = lock(&self.shared.committed).grid.clone();
        run_actions(&self.actions, self.width, 0, &mut grid.data);
        self.shared.post_process(&mut grid)?;
        self.shared.commit(grid.clone());
        Ok(grid)
    }

    /// Start a chunked pass over at most `thread_budget` workers (0 counts as
    /// 1, and the budget never exceeds the rayon pool). Returns `false`
    /// without doing anything if a pass is already in flight.
    ///
    /// Returns as soon as the pass is queued; no action, chunk or erosion
    /// work runs on the calling thread.
    pub fn apply_async(&mut self, thread_budget: usize) -> bool {
        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.seal();

        let cells = self.width * self.height;
        let workers = thread_budget.max(1).min(rayon::current_num_threads());
        let plan = ChunkPlan::new(cells, workers);
        log::debug!(
            "mixer: chunked pass of {} actions over {} chunks ({}x{})",
            self.actions.len(),
            plan.len(),
            self.width,
            self.height
        );

        let pass = Arc::new(ChunkedPass::new(self.width, self.height, plan.len()));
        let dispatch = Dispatch {
            width: self.width,
            plan,
            actions: self.actions.clone().into(),
            pass,
            shared: Arc::clone(&self.shared),
        };
        rayon::spawn(move || dispatch.run());
        true
    }

    /// The committed grid, or `None` while a background pass is running or
    /// before any pass has completed.
    pub fn try_get_result(&self, normalize: bool) -> Option<Grid> {
        let grid = self.ready_grid()?;
        Some(if normalize { grid.normalized() } else { grid })
    }

    /// Single-precision variant of [`Mixer::try_get_result`].
    pub fn try_get_result_f32(&self, normalize: bool) -> Option<Grid<f32>> {
        Some(self.ready_grid()?.to_f32(normalize))
    }

    fn ready_grid(&self) -> Option<Grid> {
        if self.is_busy() {
            return None;
        }
        let committed = lock(&self.shared.committed);
        committed.computed.then(|| committed.grid.clone())
    }
}

// ── Background pass ───────────────────────────────────────────────────────────

/// Everything a background pass needs, moved into its first rayon task.
struct Dispatch {
    width: usize,
    plan: ChunkPlan,
    actions: Arc<[Action]>,
    pass: Arc<ChunkedPass>,
    shared: Arc<Shared>,
}

impl Dispatch {
    fn run(self) {
        let base = lock(&self.shared.committed).grid.clone();
        let chunks = self.plan.len();
        let last = chunks - 1;

        for (index, range) in self.plan.ranges().iter().enumerate() {
            let cells = base.data[range.clone()].to_vec();
            let job = ChunkJob {
                index,
                offset: range.start,
                width: self.width,
                chunks,
                actions: Arc::clone(&self.actions),
                pass: Arc::clone(&self.pass),
                shared: Arc::clone(&self.shared),
            };
            if index == last {
                job.run(cells);
            } else {
                rayon::spawn(move || job.run(cells));
            }
        }
    }
}

struct ChunkJob {
    index: usize,
    offset: usize,
    width: usize,
    chunks: usize,
    actions: Arc<[Action]>,
    pass: Arc<ChunkedPass>,
    shared: Arc<Shared>,
}

impl ChunkJob {
    fn run(self, mut cells: Vec<f64>) {
        let computed = panic::catch_unwind(AssertUnwindSafe(|| {
            run_actions(&self.actions, self.width, self.offset, &mut cells);
        }));
        if computed.is_err() {
            if self.pass.fail() {
                log::error!("mixer: chunk {} panicked, background pass dropped", self.index);
                self.shared.release();
            }
            return;
        }

        let Some(mut grid) = self.pass.complete(self.index, cells) else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.shared.post_process(&mut grid))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("mixer: erosion skipped for background pass: {e}"),
            Err(_) => {
                log::error!("mixer: erosion panicked, background pass dropped");
                self.shared.release();
                return;
            }
        }
        self.shared.commit(grid);
        self.shared.release();
        log::info!("mixer: background pass committed ({} chunks)", self.chunks);
    }
}
