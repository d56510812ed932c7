//! Substrate nutrient field.
//!
//! A Perlin terrain generated once from the run seed gives each cell a
//! natural fertility level. Plants draw the pool down as they grow, fish
//! waste tops it up, and every cell slowly drifts back toward its terrain
//! value. The field keeps running deposit/withdrawal totals so hosts and
//! tests can audit the nutrient cycle.

use libnoise::{Generator, Source};
use serde::{Deserialize, Serialize};

use crate::config::TidepoolConfig;

const TERRAIN_NOISE_SCALE: f64 = 0.004;

/// Growth multiplier breakpoints: barren, poor, fertile, rich.
const POOR_SOIL: f32 = 0.15;
const FAIR_SOIL: f32 = 0.3;
const RICH_SOIL: f32 = 0.6;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NutritionField {
    cell_size: f32,
    cols: usize,
    rows: usize,
    world_left: f32,
    world_bottom: f32,
    half_width: f32,
    half_height: f32,
    regen_rate: f32,
    /// Fertility ceiling each cell regenerates toward.
    terrain: Vec<f32>,
    current: Vec<f32>,
    deposited_total: f64,
    depleted_total: f64,
}

/// Maps local nutrition to a multiplier on plant growth probability.
/// Barren substrate nearly halts growth; rich substrate triples it.
#[must_use]
pub fn growth_modifier(nutrition: f32) -> f32 {
    let n = nutrition.clamp(0.0, 1.0);
    if n < POOR_SOIL {
        0.05
    } else if n < FAIR_SOIL {
        let t = (n - POOR_SOIL) / (FAIR_SOIL - POOR_SOIL);
        0.05 + t * (0.5 - 0.05)
    } else if n < RICH_SOIL {
        let t = (n - FAIR_SOIL) / (RICH_SOIL - FAIR_SOIL);
        0.5 + t * (1.5 - 0.5)
    } else {
        let t = (n - RICH_SOIL) / (1.0 - RICH_SOIL);
        1.5 + t * (3.0 - 1.5)
    }
}

impl NutritionField {
    /// Generates the terrain and initial levels from `seed`.
    #[must_use]
    pub fn generate(config: &TidepoolConfig, seed: u64) -> Self {
        let cell_size = config.nutrition_cell_size;
        let cols = (config.world_width / cell_size).ceil() as usize;
        let rows = (config.world_height / cell_size).ceil() as usize;
        let world_left = -config.half_width();
        let world_bottom = -config.half_height();

        let noise = Source::improved_perlin(seed);
        let mut terrain = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = f64::from(world_left + (col as f32 + 0.5) * cell_size);
                let y = f64::from(world_bottom + (row as f32 + 0.5) * cell_size);
                let sample =
                    noise.sample([x * TERRAIN_NOISE_SCALE, y * TERRAIN_NOISE_SCALE]) as f32;
                terrain.push((sample * 0.5 + 0.5).clamp(0.0, 1.0));
            }
        }

        Self {
            cell_size,
            cols,
            rows,
            world_left,
            world_bottom,
            half_width: config.half_width(),
            half_height: config.half_height(),
            regen_rate: config.nutrition_regen_rate,
            current: terrain.clone(),
            terrain,
            deposited_total: 0.0,
            depleted_total: 0.0,
        }
    }

    fn cell_of(&self, x: f32, y: f32) -> Option<usize> {
        if x < -self.half_width
            || x > self.half_width
            || y < -self.half_height
            || y > self.half_height
        {
            return None;
        }
        let col = (((x - self.world_left) / self.cell_size) as usize).min(self.cols - 1);
        let row = (((y - self.world_bottom) / self.cell_size) as usize).min(self.rows - 1);
        Some(row * self.cols + col)
    }

    /// Nutrition at a point; zero outside the world.
    #[must_use]
    pub fn value_at(&self, x: f32, y: f32) -> f32 {
        self.cell_of(x, y).map_or(0.0, |cell| self.current[cell])
    }

    /// Removes up to `amount` spread over a disc, quadratic falloff from the
    /// center. Returns how much was actually removed; cells never go below
    /// zero, so depleted ground yields less.
    pub fn deplete(&mut self, x: f32, y: f32, amount: f32, radius: f32) -> f32 {
        let removed = self.splat(x, y, -amount, radius);
        self.depleted_total += f64::from(-removed);
        -removed
    }

    /// Adds up to `amount` over a disc. Returns how much landed; saturated
    /// cells absorb nothing.
    pub fn deposit(&mut self, x: f32, y: f32, amount: f32, radius: f32) -> f32 {
        let added = self.splat(x, y, amount, radius);
        self.deposited_total += f64::from(added);
        added
    }

    /// Applies a signed amount over a disc, returning the signed total that
    /// actually changed cell values.
    fn splat(&mut self, x: f32, y: f32, amount: f32, radius: f32) -> f32 {
        if radius <= 0.0 || amount == 0.0 {
            return 0.0;
        }
        let min_col = (((x - radius - self.world_left) / self.cell_size).floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let max_col = (((x + radius - self.world_left) / self.cell_size).floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let min_row = (((y - radius - self.world_bottom) / self.cell_size).floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;
        let max_row = (((y + radius - self.world_bottom) / self.cell_size).floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;

        // Weight cells so the disc integrates to roughly `amount`.
        let mut weights = Vec::new();
        let mut weight_sum = 0.0f32;
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let cx = self.world_left + (col as f32 + 0.5) * self.cell_size;
                let cy = self.world_bottom + (row as f32 + 0.5) * self.cell_size;
                let dx = cx - x;
                let dy = cy - y;
                let r2 = (dx * dx + dy * dy) / (radius * radius);
                if r2 <= 1.0 {
                    let w = 1.0 - r2;
                    weights.push((row * self.cols + col, w));
                    weight_sum += w;
                }
            }
        }
        if weight_sum <= 0.0 {
            return 0.0;
        }
        let mut applied = 0.0f32;
        for (cell, w) in weights {
            let share = amount * w / weight_sum;
            let before = self.current[cell];
            let after = (before + share).clamp(0.0, 1.0);
            applied += after - before;
            self.current[cell] = after;
        }
        applied
    }

    /// Drifts every cell a small step back toward its terrain value.
    pub fn regenerate(&mut self) {
        for (cell, terrain) in self.current.iter_mut().zip(self.terrain.iter()) {
            *cell += (terrain - *cell) * self.regen_rate;
        }
    }

    /// Total nutrition successfully deposited since construction.
    #[must_use]
    pub fn deposited_total(&self) -> f64 {
        self.deposited_total
    }

    /// Total nutrition successfully withdrawn since construction.
    #[must_use]
    pub fn depleted_total(&self) -> f64 {
        self.depleted_total
    }

    /// Sum of all cell values right now.
    #[must_use]
    pub fn pool_total(&self) -> f64 {
        self.current.iter().map(|v| f64::from(*v)).sum()
    }

    /// Iterates `(x, y, level)` per cell center, for renderers.
    pub fn iter_cells(&self) -> impl Iterator<Item = (f32, f32, f32)> + '_ {
        self.current.iter().enumerate().map(move |(i, level)| {
            let col = i % self.cols;
            let row = i / self.cols;
            (
                self.world_left + (col as f32 + 0.5) * self.cell_size,
                self.world_bottom + (row as f32 + 0.5) * self.cell_size,
                *level,
            )
        })
    }
}
