//! Precomputed erosion footprints.
//!
//! For every cell, the brush lists each in-bounds cell whose squared offset is
//! below `radius²`, weighted by `1 − dist / radius` and normalized to sum 1.
//! Cells are independent, so the table is built in parallel.
use rayon::prelude::*;

use crate::error::ErosionError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushEntry {
    pub index: usize,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct ErosionBrush {
    radius: u32,
    cells: Vec<Vec<BrushEntry>>,
}

impl ErosionBrush {
    pub fn new(width: usize, height: usize, radius: u32) -> Result<Self, ErosionError> {
        if width < 2 || height < 2 {
            return Err(ErosionError::InvalidDimensions { width, height });
        }
        if radius == 0 {
            return Err(ErosionError::InvalidRadius(radius));
        }

        let cells = (0..width * height)
            .into_par_iter()
            .map(|i| cell_brush(i % width, i / width, width, height, radius))
            .collect();

        Ok(Self { radius, cells })
    }

    #[inline]
    pub fn entries(&self, cell: usize) -> &[BrushEntry] {
        &self.cells[cell]
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

fn cell_brush(cx: usize, cy: usize, width: usize, height: usize, radius: u32) -> Vec<BrushEntry> {
    let r = radius as i64;
    let r_f = radius as f64;
    let mut entries = Vec::new();
    let mut weight_sum = 0.0;

    for dy in -r..=r {
        for dx in -r..=r {
            let sqr_dst = dx * dx + dy * dy;
            if sqr_dst >= r * r {
                continue;
            }
            let x = cx as i64 + dx;
            let y = cy as i64 + dy;
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                continue;
            }
            let weight = 1.0 - (sqr_dst as f64).sqrt() / r_f;
            weight_sum += weight;
            entries.push(BrushEntry { index: y as usize * width + x as usize, weight });
        }
    }

    for e in &mut entries {
        e.weight /= weight_sum;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one_everywhere() {
        let brush = ErosionBrush::new(12, 9, 3).unwrap();
        for cell in 0..12 * 9 {
            let sum: f64 = brush.entries(cell).iter().map(|e| e.weight).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn interior_and_corner_footprints() {
        let brush = ErosionBrush::new(16, 16, 3).unwrap();
        // x² + y² < 9 admits 25 offsets.
        assert_eq!(brush.entries(8 * 16 + 8).len(), 25);
        // Corner keeps only the in-bounds quadrant: 3×3.
        assert_eq!(brush.entries(0).len(), 9);
    }

    #[test]
    fn centre_weighs_most() {
        let brush = ErosionBrush::new(16, 16, 3).unwrap();
        let centre = 8 * 16 + 8;
        let entries = brush.entries(centre);
        let own = entries.iter().find(|e| e.index == centre).unwrap().weight;
        assert!(entries.iter().all(|e| e.weight <= own));
    }

    #[test]
    fn radius_one_touches_only_the_cell() {
        let brush = ErosionBrush::new(4, 4, 1).unwrap();
        assert_eq!(brush.entries(5), &[BrushEntry { index: 5, weight: 1.0 }]);
    }

    #[test]
    fn rejects_degenerate_configuration() {
        assert_eq!(
            ErosionBrush::new(0, 10, 3).unwrap_err(),
            ErosionError::InvalidDimensions { width: 0, height: 10 }
        );
        assert_eq!(
            ErosionBrush::new(1, 10, 3).unwrap_err(),
            ErosionError::InvalidDimensions { width: 1, height: 10 }
        );
        assert_eq!(ErosionBrush::new(8, 8, 0).unwrap_err(), ErosionError::InvalidRadius(0));
    }
}
