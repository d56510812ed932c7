//! Uniform-grid spatial index over an origin-centered world.
//!
//! Organism nodes are bucketed into fixed-size cells each tick. Queries walk
//! a ring of cells around the probe point, so lookup cost is bounded by local
//! density rather than population size. Each cell holds a bounded number of
//! entries; inserts past that bound are dropped and counted, which keeps the
//! structure allocation-free in the hot path at the price of a documented
//! density ceiling.

use ordered_float::OrderedFloat;
use thiserror::Error;

/// Errors surfaced while configuring the spatial index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid index configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Shared contract for neighborhood lookups used by the world tick.
///
/// `rebuild` consumes `(x, y, active)` tuples; inactive entries are skipped
/// so dead organisms never appear in query results. The visitor receives the
/// entry index and its squared distance from the probe point. Candidates from
/// the full cell ring are reported, including ones slightly beyond `radius`;
/// callers that need an exact disc must filter on the reported distance.
pub trait NeighborhoodIndex {
    fn rebuild(&mut self, entries: &[(f32, f32, bool)]);

    fn neighbors_within(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    idx: u32,
    x: f32,
    y: f32,
}

/// Dense uniform grid with a fixed per-cell entry budget.
#[derive(Debug)]
pub struct UniformGridIndex {
    cell_size: f32,
    cols: usize,
    rows: usize,
    world_left: f32,
    world_bottom: f32,
    capacity: usize,
    counts: Vec<u16>,
    slots: Vec<Entry>,
    dropped_inserts: u64,
}

impl UniformGridIndex {
    /// Builds an empty index covering a `world_width` x `world_height` region
    /// centered on the origin.
    pub fn new(
        cell_size: f32,
        world_width: f32,
        world_height: f32,
        cell_capacity: usize,
    ) -> Result<Self, IndexError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if !(world_width.is_finite() && world_width > 0.0)
            || !(world_height.is_finite() && world_height > 0.0)
        {
            return Err(IndexError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        if cell_capacity == 0 || cell_capacity > u16::MAX as usize {
            return Err(IndexError::InvalidConfig(
                "cell_capacity must be in 1..=65535",
            ));
        }
        let cols = (world_width / cell_size).ceil() as usize;
        let rows = (world_height / cell_size).ceil() as usize;
        Ok(Self {
            cell_size,
            cols,
            rows,
            world_left: -world_width / 2.0,
            world_bottom: -world_height / 2.0,
            capacity: cell_capacity,
            counts: vec![0; cols * rows],
            slots: vec![
                Entry {
                    idx: 0,
                    x: 0.0,
                    y: 0.0,
                };
                cols * rows * cell_capacity
            ],
            dropped_inserts: 0,
        })
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Inserts dropped so far because a cell was full or the point lay
    /// outside the world.
    #[must_use]
    pub fn dropped_inserts(&self) -> u64 {
        self.dropped_inserts
    }

    /// Empties every cell. Drop statistics are retained across clears so a
    /// tick can read the running total after rebuilding.
    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    fn cell_of(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let cx = ((x - self.world_left) / self.cell_size).floor();
        let cy = ((y - self.world_bottom) / self.cell_size).floor();
        if cx < 0.0 || cy < 0.0 {
            return None;
        }
        let (cx, cy) = (cx as usize, cy as usize);
        if cx >= self.cols || cy >= self.rows {
            return None;
        }
        Some((cx, cy))
    }

    /// Adds one entry. Out-of-bounds points and full cells are dropped
    /// silently; `dropped_inserts` records how many.
    pub fn insert(&mut self, idx: usize, x: f32, y: f32) {
        let Some((cx, cy)) = self.cell_of(x, y) else {
            self.dropped_inserts += 1;
            return;
        };
        let cell = cy * self.cols + cx;
        let count = self.counts[cell] as usize;
        if count >= self.capacity {
            self.dropped_inserts += 1;
            return;
        }
        self.slots[cell * self.capacity + count] = Entry {
            idx: idx as u32,
            x,
            y,
        };
        self.counts[cell] = (count + 1) as u16;
    }

    /// Visits every stored entry in the cell containing `(x, y)` plus `ring`
    /// cells in each direction. Probe points outside the world visit the
    /// nearest in-bounds cells.
    pub fn for_each_in_ring(&self, x: f32, y: f32, ring: usize, visitor: &mut dyn FnMut(usize)) {
        let cx = (((x - self.world_left) / self.cell_size).floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let cy = (((y - self.world_bottom) / self.cell_size).floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;
        let x0 = cx.saturating_sub(ring);
        let x1 = (cx + ring).min(self.cols - 1);
        let y0 = cy.saturating_sub(ring);
        let y1 = (cy + ring).min(self.rows - 1);
        for gy in y0..=y1 {
            for gx in x0..=x1 {
                let cell = gy * self.cols + gx;
                let count = self.counts[cell] as usize;
                let base = cell * self.capacity;
                for slot in &self.slots[base..base + count] {
                    visitor(slot.idx as usize);
                }
            }
        }
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, entries: &[(f32, f32, bool)]) {
        self.clear();
        for (idx, &(x, y, active)) in entries.iter().enumerate() {
            if active {
                self.insert(idx, x, y);
            }
        }
    }

    fn neighbors_within(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let ring = (radius / self.cell_size).ceil().max(1.0) as usize;
        let cx = (((x - self.world_left) / self.cell_size).floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let cy = (((y - self.world_bottom) / self.cell_size).floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;
        let x0 = cx.saturating_sub(ring);
        let x1 = (cx + ring).min(self.cols - 1);
        let y0 = cy.saturating_sub(ring);
        let y1 = (cy + ring).min(self.rows - 1);
        for gy in y0..=y1 {
            for gx in x0..=x1 {
                let cell = gy * self.cols + gx;
                let count = self.counts[cell] as usize;
                let base = cell * self.capacity;
                for slot in &self.slots[base..base + count] {
                    let dx = slot.x - x;
                    let dy = slot.y - y;
                    visitor(slot.idx as usize, OrderedFloat(dx * dx + dy * dy));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_index() -> UniformGridIndex {
        UniformGridIndex::new(10.0, 100.0, 100.0, 4).unwrap()
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(UniformGridIndex::new(0.0, 100.0, 100.0, 4).is_err());
        assert!(UniformGridIndex::new(10.0, -1.0, 100.0, 4).is_err());
        assert!(UniformGridIndex::new(10.0, 100.0, 100.0, 0).is_err());
    }

    #[test]
    fn negative_coordinates_map_to_cells() {
        let mut index = small_index();
        index.insert(7, -45.0, -45.0);
        let mut seen = Vec::new();
        index.for_each_in_ring(-45.0, -45.0, 0, &mut |idx| seen.push(idx));
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn out_of_bounds_insert_is_dropped_and_counted() {
        let mut index = small_index();
        index.insert(0, 500.0, 0.0);
        index.insert(1, 0.0, -500.0);
        assert_eq!(index.dropped_inserts(), 2);
        let mut seen = 0usize;
        index.for_each_in_ring(0.0, 0.0, 10, &mut |_| seen += 1);
        assert_eq!(seen, 0);
    }

    #[test]
    fn full_cell_drops_overflow() {
        let mut index = small_index();
        for i in 0..6 {
            index.insert(i, 1.0, 1.0);
        }
        assert_eq!(index.dropped_inserts(), 2);
        let mut seen = 0usize;
        index.for_each_in_ring(1.0, 1.0, 0, &mut |_| seen += 1);
        assert_eq!(seen, 4);
    }

    #[test]
    fn rebuild_skips_inactive_entries() {
        let mut index = small_index();
        let entries = vec![
            (0.0, 0.0, true),
            (2.0, 2.0, false),
            (25.0, 25.0, true),
        ];
        index.rebuild(&entries);
        let mut seen = Vec::new();
        index.neighbors_within(0.0, 0.0, 60.0, &mut |idx, _| seen.push(idx));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 2]);
    }

    #[test]
    fn neighbors_report_squared_distance() {
        let mut index = small_index();
        index.insert(3, 3.0, 4.0);
        let mut hits = Vec::new();
        index.neighbors_within(0.0, 0.0, 10.0, &mut |idx, d2| hits.push((idx, d2)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 3);
        assert!((hits[0].1.into_inner() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_bounds_query_clamps_to_border_cells() {
        let mut index = small_index();
        index.insert(9, 49.0, 49.0);
        let mut seen = Vec::new();
        index.neighbors_within(200.0, 200.0, 15.0, &mut |idx, _| seen.push(idx));
        assert_eq!(seen, vec![9]);
    }

    #[test]
    fn clear_empties_cells_but_keeps_drop_total() {
        let mut index = small_index();
        index.insert(0, 500.0, 500.0);
        index.insert(1, 0.0, 0.0);
        index.clear();
        assert_eq!(index.dropped_inserts(), 1);
        let mut seen = 0usize;
        index.for_each_in_ring(0.0, 0.0, 10, &mut |_| seen += 1);
        assert_eq!(seen, 0);
    }
}
