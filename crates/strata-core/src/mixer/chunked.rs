//! Bookkeeping for the chunked background pass.
//!
//! The flattened cell range is cut into contiguous chunks; each worker owns a
//! copy of its chunk's cells, runs the whole action list over it, and hands
//! the result back here. Whoever delivers the last chunk gets the assembled
//! grid. A chunk that panics fails the whole pass, and no grid is assembled.
use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::grid::Grid;

/// The guarded values are plain numbers, so a panic elsewhere cannot leave
/// them half-updated in a way later readers care about.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    ranges: Vec<Range<usize>>,
}

impl ChunkPlan {
    /// Split `cells` into `count` chunks of `cells / count`; the last chunk
    /// takes the remainder. `count` is clamped to `1..=cells` so no chunk is
    /// empty.
    pub fn new(cells: usize, count: usize) -> Self {
        let count = count.clamp(1, cells.max(1));
        let size = cells / count;
        let ranges = (0..count)
            .map(|i| {
                let start = i * size;
                let end = if i + 1 == count { cells } else { start + size };
                start..end
            })
            .collect();
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }
}

struct PassState {
    done: Vec<bool>,
    chunks: Vec<Vec<f64>>,
    failed: bool,
}

pub(crate) struct ChunkedPass {
    width: usize,
    height: usize,
    state: Mutex<PassState>,
}

impl ChunkedPass {
    pub fn new(width: usize, height: usize, chunks: usize) -> Self {
        Self {
            width,
            height,
            state: Mutex::new(PassState {
                done: vec![false; chunks],
                chunks: vec![Vec::new(); chunks],
                failed: false,
            }),
        }
    }

    /// Record chunk `index` as finished. Returns the assembled grid to the
    /// caller that completes the final chunk, `None` to everyone else and to
    /// every caller once the pass has failed.
    pub fn complete(&self, index: usize, cells: Vec<f64>) -> Option<Grid> {
        let mut state = lock(&self.state);
        if state.failed {
            return None;
        }
        state.chunks[index] = cells;
        state.done[index] = true;
        if !state.done.iter().all(|&d| d) {
            return None;
        }
        let data = std::mem::take(&mut state.chunks).concat();
        Some(Grid { data, width: self.width, height: self.height })
    }

    /// Abandon the pass. Returns `true` only for the first failure, so exactly
    /// one caller releases the mixer.
    pub fn fail(&self) -> bool {
        let mut state = lock(&self.state);
        !std::mem::replace(&mut state.failed, true)
    }
}
