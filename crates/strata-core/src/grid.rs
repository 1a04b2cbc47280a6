use serde::{Deserialize, Serialize};

/// A 2D scalar field stored row-major: `data[row * width + col]`.
///
/// The mixer keeps its working values in a `Grid<f64>`; result consumers that
/// want single precision take a `Grid<f32>` via [`Grid::to_f32`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T = f64> {
    /// Row-major cell values.
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

impl<T: Copy> Grid<T> {
    /// Create a new grid filled with the given value.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Wrap an existing row-major buffer. Returns `None` when the length does
    /// not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        (data.len() == width * height).then_some(Self { data, width, height })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Grid<f64> {
    /// Sample at a continuous `(col, row)` position with bilinear interpolation.
    /// Positions are clamped to the grid extent.
    pub fn sample(&self, col: f64, row: f64) -> f64 {
        let fx = col.clamp(0.0, (self.width - 1) as f64);
        let fy = row.clamp(0.0, (self.height - 1) as f64);

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let v00 = self.get(y0, x0);
        let v10 = self.get(y0, x1);
        let v01 = self.get(y1, x0);
        let v11 = self.get(y1, x1);

        v00 * (1.0 - tx) * (1.0 - ty)
            + v10 * tx * (1.0 - ty)
            + v01 * (1.0 - tx) * ty
            + v11 * tx * ty
    }

    /// Bilinearly resample to `width × height`. Corners map onto corners, so
    /// the four corner values survive exactly. Returns a clone when the size
    /// already matches.
    pub fn resample(&self, width: usize, height: usize) -> Grid<f64> {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.is_empty() {
            return Grid::new(width, height, 0.0);
        }

        let step = |src: usize, dst: usize| {
            if dst > 1 { (src - 1) as f64 / (dst - 1) as f64 } else { 0.0 }
        };
        let sx = step(self.width, width);
        let sy = step(self.height, height);

        let mut out = Grid::new(width, height, 0.0);
        for r in 0..height {
            for c in 0..width {
                out.set(r, c, self.sample(c as f64 * sx, r as f64 * sy));
            }
        }
        out
    }

    /// Copy remapped from [-1, 1] to [0, 1] via `(v + 1) / 2`.
    pub fn normalized(&self) -> Grid<f64> {
        Grid {
            data: self.data.iter().map(|&v| (v + 1.0) / 2.0).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// Single-precision copy, optionally normalized to [0, 1].
    pub fn to_f32(&self, normalize: bool) -> Grid<f32> {
        let data = if normalize {
            self.data.iter().map(|&v| ((v + 1.0) / 2.0) as f32).collect()
        } else {
            self.data.iter().map(|&v| v as f32).collect()
        };
        Grid { data, width: self.width, height: self.height }
    }

    pub fn clamp_in_place(&mut self, lo: f64, hi: f64) {
        for v in &mut self.data {
            *v = v.clamp(lo, hi);
        }
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_corners_return_exact_values() {
        let mut g: Grid = Grid::new(4, 4, 0.0);
        g.set(0, 0, 0.1);
        g.set(0, 3, 0.2);
        g.set(3, 0, 0.3);
        g.set(3, 3, 0.4);

        assert!((g.sample(0.0, 0.0) - 0.1).abs() < 1e-12);
        assert!((g.sample(3.0, 0.0) - 0.2).abs() < 1e-12);
        assert!((g.sample(0.0, 3.0) - 0.3).abs() < 1e-12);
        assert!((g.sample(3.0, 3.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn sample_midpoint_averages_neighbours() {
        let mut g: Grid = Grid::new(2, 1, 0.0);
        g.set(0, 1, 1.0);
        assert!((g.sample(0.5, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn resample_preserves_corners_and_size() {
        let mut g: Grid = Grid::new(2, 2, 0.0);
        g.set(0, 1, 1.0);
        g.set(1, 0, 0.5);
        g.set(1, 1, 0.25);

        let big = g.resample(5, 3);
        assert_eq!((big.width, big.height), (5, 3));
        assert_eq!(big.get(0, 0), 0.0);
        assert_eq!(big.get(0, 4), 1.0);
        assert_eq!(big.get(2, 0), 0.5);
        assert_eq!(big.get(2, 4), 0.25);
        // Interior values stay within the source range.
        assert!(big.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn normalized_and_f32_copies_match() {
        let g: Grid = Grid::from_vec(2, 1, vec![-1.0, 0.5]).unwrap();
        assert_eq!(g.normalized().data, vec![0.0, 0.75]);
        assert_eq!(g.to_f32(true).data, vec![0.0f32, 0.75]);
        assert_eq!(g.to_f32(false).data, vec![-1.0f32, 0.5]);
    }

    #[test]
    fn clamp_in_place_bounds_values() {
        let mut g: Grid = Grid::from_vec(4, 1, vec![-1.5, -0.25, 0.75, 2.0]).unwrap();
        g.clamp_in_place(-1.0, 1.0);
        assert_eq!(g.data, vec![-1.0, -0.25, 0.75, 1.0]);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Grid::from_vec(3, 3, vec![0.0f64; 8]).is_none());
    }
}
