// occupancy.rs — Spacing grid for feature placement.
//
// Square buckets of side `min_feature_separation` tile the image. Each
// bucket lists the points placed in it. A candidate is accepted when
//   - its own bucket is empty, and
//   - no listed point in the 3×3 buckets around it is closer than the
//     bucket side.
// Anything farther than one bucket away is at least one side length off,
// so the 3×3 block is all that needs checking.

/// Bucketed point set answering "is (x, y) far enough from everything?".
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    buckets: Vec<Vec<(f32, f32)>>,
    cols: usize,
    rows: usize,
    spacing: f32,
    extent: (f32, f32),
}

impl OccupancyGrid {
    /// Grid over a `width × height` image with buckets of side `spacing`.
    ///
    /// # Panics
    /// Panics if `spacing` is not positive. Configuration validation
    /// rejects such values before a grid is built.
    pub fn new(width: usize, height: usize, spacing: f32) -> Self {
        assert!(spacing > 0.0, "spacing must be positive, got {spacing}");
        let cols = ((width as f32 / spacing).ceil() as usize).max(1);
        let rows = ((height as f32 / spacing).ceil() as usize).max(1);
        OccupancyGrid {
            buckets: vec![Vec::new(); cols * rows],
            cols,
            rows,
            spacing,
            extent: (width as f32, height as f32),
        }
    }

    /// Record a placed point. Points off the image are dropped.
    pub fn mark(&mut self, x: f32, y: f32) {
        if let Some(b) = self.bucket(x, y) {
            self.buckets[b].push((x, y));
        }
    }

    /// Whether a new point may go at (x, y).
    pub fn accepts(&self, x: f32, y: f32) -> bool {
        let Some(b) = self.bucket(x, y) else {
            return false;
        };
        if !self.buckets[b].is_empty() {
            return false;
        }

        let (col, row) = (b % self.cols, b / self.cols);
        let limit2 = self.spacing * self.spacing;
        let rows = row.saturating_sub(1)..=(row + 1).min(self.rows - 1);
        rows.flat_map(|r| {
            let cols = col.saturating_sub(1)..=(col + 1).min(self.cols - 1);
            cols.map(move |c| r * self.cols + c)
        })
        .flat_map(|i| self.buckets[i].iter())
        .all(|&(px, py)| (px - x).powi(2) + (py - y).powi(2) >= limit2)
    }

    /// Number of points recorded.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    fn bucket(&self, x: f32, y: f32) -> Option<usize> {
        let inside = x >= 0.0 && y >= 0.0 && x < self.extent.0 && y < self.extent.1;
        if !inside {
            return None;
        }
        let col = ((x / self.spacing) as usize).min(self.cols - 1);
        let row = ((y / self.spacing) as usize).min(self.rows - 1);
        Some(row * self.cols + col)
    }
}
