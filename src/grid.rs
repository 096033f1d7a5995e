//! Spatial bucketing of centerline samples for fast distance queries.

use crate::track::Vec2;
use std::collections::HashMap;

/// Cell spans wider than this fall back to a linear scan
const MAX_CELL_SPAN: i64 = 16;

/// Uniform grid index over track samples
///
/// Each sample index is stored in the cell containing its point. Queries
/// only visit the cells overlapping the search square, so a lookup with a
/// radius equal to the cell size touches at most 3x3 cells.
#[derive(Clone, Debug)]
pub struct SampleIndex {
    cell_size: f64,
    /// cells[(cx, cy)] contains indices of samples in that cell
    cells: HashMap<(i64, i64), Vec<usize>>,
    len: usize,
}

impl SampleIndex {
    /// Create an empty index with the given cell size
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    #[inline]
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Insert a sample index at the given position
    #[inline]
    pub fn insert(&mut self, point: &Vec2, idx: usize) {
        let cell = self.cell_of(point.x, point.y);
        self.cells.entry(cell).or_default().push(idx);
        self.len += 1;
    }

    /// Replace the contents with `points`, indexed by position in the slice
    pub fn rebuild(&mut self, points: &[Vec2]) {
        self.clear();
        for (idx, point) in points.iter().enumerate() {
            self.insert(point, idx);
        }
    }

    /// Number of indexed samples
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Call `visit` with the contents of every cell overlapping the square
    /// of `radius` around `center`
    fn for_each_cell<F>(&self, center: &Vec2, radius: f64, mut visit: F)
    where
        F: FnMut(&[usize]),
    {
        if !center.x.is_finite() || !center.y.is_finite() || !radius.is_finite() {
            return;
        }

        let (x_min, y_min) = self.cell_of(center.x - radius, center.y - radius);
        let (x_max, y_max) = self.cell_of(center.x + radius, center.y + radius);

        if x_max.saturating_sub(x_min) > MAX_CELL_SPAN || y_max.saturating_sub(y_min) > MAX_CELL_SPAN {
            for cell in self.cells.values() {
                visit(cell);
            }
            return;
        }

        for cy in y_min..=y_max {
            for cx in x_min..=x_max {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    visit(cell);
                }
            }
        }
    }

    /// Query all sample indices in cells overlapping the square of `radius` around `center`
    pub fn query_radius(&self, center: &Vec2, radius: f64) -> Vec<usize> {
        let mut results = Vec::new();
        self.for_each_cell(center, radius, |cell| results.extend_from_slice(cell));
        results
    }

    /// Distance from `center` to the closest of `points` that lies within `radius`
    ///
    /// `points` must be the slice the index was built from. Runs once per car
    /// per tick and does not allocate.
    pub fn nearest_within(&self, points: &[Vec2], center: &Vec2, radius: f64) -> Option<f64> {
        let mut best: Option<f64> = None;
        self.for_each_cell(center, radius, |cell| {
            for p in cell.iter().filter_map(|&idx| points.get(idx)) {
                let d = (p - center).norm();
                if d <= radius && best.map_or(true, |b| d < b) {
                    best = Some(d);
                }
            }
        });
        best
    }
}

impl Default for SampleIndex {
    fn default() -> Self {
        Self::new(1.0)
    }
}
