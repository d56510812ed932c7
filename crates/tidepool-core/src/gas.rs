//! Dissolved oxygen field.
//!
//! Each tick the field computes a target level per cell from the living
//! producers, then blends the current level toward that target. Overlapping
//! producers saturate rather than stack: a cell's target is the maximum
//! single contribution, never a sum. The blend is asymmetric so oxygen
//! appears quickly around new growth but lingers after a producer dies.

use serde::{Deserialize, Serialize};

use crate::config::TidepoolConfig;

/// Fraction of the radius with full-strength contribution.
const FALLOFF_INNER: f32 = 0.3;
/// End of the cubic mid segment, as a fraction of the radius.
const FALLOFF_MID: f32 = 0.6;
/// Contribution remaining at the mid/outer boundary.
const FALLOFF_KNEE: f32 = 0.4;

/// One oxygen producer for the current tick.
#[derive(Clone, Copy, Debug)]
pub struct GasSource {
    pub x: f32,
    pub y: f32,
    /// Peak contribution at the producer's position.
    pub strength: f32,
    pub radius: f32,
    /// Suppressed producers (bleached coral) contribute nothing this tick.
    pub suppressed: bool,
}

/// Scalar oxygen grid with current and target layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GasField {
    cell_size: f32,
    cols: usize,
    rows: usize,
    world_left: f32,
    world_bottom: f32,
    half_width: f32,
    half_height: f32,
    baseline: f32,
    max_level: f32,
    rise_rate: f32,
    fall_rate: f32,
    decay: f32,
    current: Vec<f32>,
    target: Vec<f32>,
}

/// Contribution multiplier at normalized distance `r` from a producer.
/// Full strength through the inner segment, cubic decay through the middle,
/// quadratic decay to zero at the edge.
#[must_use]
pub fn radial_falloff(r: f32) -> f32 {
    if r <= FALLOFF_INNER {
        1.0
    } else if r <= FALLOFF_MID {
        let t = (r - FALLOFF_INNER) / (FALLOFF_MID - FALLOFF_INNER);
        1.0 - (1.0 - FALLOFF_KNEE) * t * t * t
    } else if r <= 1.0 {
        let t = (r - FALLOFF_MID) / (1.0 - FALLOFF_MID);
        FALLOFF_KNEE * (1.0 - t) * (1.0 - t)
    } else {
        0.0
    }
}

impl GasField {
    #[must_use]
    pub fn new(config: &TidepoolConfig) -> Self {
        let cell_size = config.gas_cell_size;
        let cols = (config.world_width / cell_size).ceil() as usize;
        let rows = (config.world_height / cell_size).ceil() as usize;
        Self {
            cell_size,
            cols,
            rows,
            world_left: -config.half_width(),
            world_bottom: -config.half_height(),
            half_width: config.half_width(),
            half_height: config.half_height(),
            baseline: config.gas_baseline,
            max_level: config.gas_max_level,
            rise_rate: config.gas_rise_rate,
            fall_rate: config.gas_fall_rate,
            decay: config.gas_decay,
            current: vec![config.gas_baseline; cols * rows],
            target: vec![0.0; cols * rows],
        }
    }

    /// Advances the field one tick: recomputes targets from `sources`, then
    /// blends current levels toward them.
    pub fn update(&mut self, sources: &[GasSource]) {
        self.target.fill(0.0);
        for source in sources {
            if source.suppressed || source.strength <= 0.0 || source.radius <= 0.0 {
                continue;
            }
            self.stamp(source);
        }
        for (cell, target) in self.current.iter_mut().zip(self.target.iter()) {
            let delta = target - *cell;
            // Background decay only bleeds off falling cells; rising cells
            // converge on the target itself.
            let step = if delta > 0.0 {
                delta * self.rise_rate
            } else {
                delta * self.fall_rate - self.decay
            };
            *cell = (*cell + step).clamp(0.0, self.max_level);
        }
    }

    fn stamp(&mut self, source: &GasSource) {
        let min_col = (((source.x - source.radius - self.world_left) / self.cell_size)
            .floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let max_col = (((source.x + source.radius - self.world_left) / self.cell_size)
            .floor() as i64)
            .clamp(0, self.cols as i64 - 1) as usize;
        let min_row = (((source.y - source.radius - self.world_bottom) / self.cell_size)
            .floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;
        let max_row = (((source.y + source.radius - self.world_bottom) / self.cell_size)
            .floor() as i64)
            .clamp(0, self.rows as i64 - 1) as usize;
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let cx = self.world_left + (col as f32 + 0.5) * self.cell_size;
                let cy = self.world_bottom + (row as f32 + 0.5) * self.cell_size;
                let dx = cx - source.x;
                let dy = cy - source.y;
                let r = (dx * dx + dy * dy).sqrt() / source.radius;
                let contribution = source.strength * radial_falloff(r);
                let cell = &mut self.target[row * self.cols + col];
                if contribution > *cell {
                    *cell = contribution;
                }
            }
        }
    }

    /// Current oxygen level at a point. Points outside the world read the
    /// configured baseline.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if x < -self.half_width
            || x > self.half_width
            || y < -self.half_height
            || y > self.half_height
        {
            return self.baseline;
        }
        let col = (((x - self.world_left) / self.cell_size) as usize).min(self.cols - 1);
        let row = (((y - self.world_bottom) / self.cell_size) as usize).min(self.rows - 1);
        self.current[row * self.cols + col]
    }

    #[must_use]
    pub fn baseline(&self) -> f32 {
        self.baseline
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TidepoolConfig {
        TidepoolConfig {
            world_width: 320.0,
            world_height: 320.0,
            ..TidepoolConfig::default()
        }
    }

    fn producer(x: f32, y: f32) -> GasSource {
        GasSource {
            x,
            y,
            strength: 1.0,
            radius: 80.0,
            suppressed: false,
        }
    }

    #[test]
    fn falloff_segments_join_continuously() {
        assert_eq!(radial_falloff(0.0), 1.0);
        assert_eq!(radial_falloff(0.3), 1.0);
        assert!((radial_falloff(0.6) - 0.4).abs() < 1e-6);
        assert!(radial_falloff(1.0).abs() < 1e-6);
        assert_eq!(radial_falloff(1.5), 0.0);
        // Monotonically non-increasing across the whole range.
        let mut prev = 1.0f32;
        for i in 0..=100 {
            let v = radial_falloff(i as f32 / 100.0);
            assert!(v <= prev + 1e-6);
            prev = v;
        }
    }

    #[test]
    fn overlapping_producers_take_max_not_sum() {
        let mut field = GasField::new(&test_config());
        let sources = vec![producer(0.0, 0.0), producer(4.0, 0.0)];
        // Converge toward the target.
        for _ in 0..200 {
            field.update(&sources);
        }
        // Both producers cover the origin at near-full strength; a summing
        // field would overshoot 1.0 before clamping, a max field stays at
        // the single-producer level.
        let single = {
            let mut f = GasField::new(&test_config());
            let s = vec![producer(0.0, 0.0)];
            for _ in 0..200 {
                f.update(&s);
            }
            f.sample(0.0, 0.0)
        };
        assert!((field.sample(0.0, 0.0) - single).abs() < 1e-3);
    }

    #[test]
    fn levels_stay_within_bounds() {
        let config = test_config();
        let mut field = GasField::new(&config);
        let sources = vec![GasSource {
            strength: 5.0,
            ..producer(0.0, 0.0)
        }];
        for _ in 0..500 {
            field.update(&sources);
            for (_, _, level) in field.iter_cells() {
                assert!((0.0..=config.gas_max_level).contains(&level));
            }
        }
    }

    #[test]
    fn rises_faster_than_it_falls() {
        let mut field = GasField::new(&test_config());
        let sources = vec![producer(0.0, 0.0)];
        let start = field.sample(0.0, 0.0);
        field.update(&sources);
        let risen = field.sample(0.0, 0.0) - start;
        // Let it converge, then remove the producer.
        for _ in 0..300 {
            field.update(&sources);
        }
        let peak = field.sample(0.0, 0.0);
        field.update(&[]);
        let fallen = peak - field.sample(0.0, 0.0);
        assert!(risen > fallen * 2.0, "rise {risen} vs fall {fallen}");
    }

    #[test]
    fn rising_cells_settle_on_the_target() {
        let config = test_config();
        let mut field = GasField::new(&config);
        let sources = vec![producer(0.0, 0.0)];
        for _ in 0..400 {
            field.update(&sources);
        }
        // The stamped target at the producer center is its full strength;
        // decay applies only while falling, so the steady state matches the
        // target instead of undershooting it.
        let target = config.gas_max_level.min(1.0);
        assert!(
            (field.sample(0.0, 0.0) - target).abs() < 1e-4,
            "steady state {} vs target {}",
            field.sample(0.0, 0.0),
            target
        );
    }

    #[test]
    fn decays_to_zero_without_producers() {
        let mut field = GasField::new(&test_config());
        for _ in 0..10_000 {
            field.update(&[]);
        }
        for (_, _, level) in field.iter_cells() {
            assert!(level.abs() < 1e-4);
        }
    }

    #[test]
    fn suppressed_producer_contributes_nothing() {
        let mut field = GasField::new(&test_config());
        let suppressed = vec![GasSource {
            suppressed: true,
            ..producer(0.0, 0.0)
        }];
        let before = field.sample(0.0, 0.0);
        field.update(&suppressed);
        assert!(field.sample(0.0, 0.0) <= before);
    }

    #[test]
    fn out_of_bounds_sample_reads_baseline() {
        let config = test_config();
        let field = GasField::new(&config);
        assert_eq!(field.sample(5_000.0, 0.0), config.gas_baseline);
        assert_eq!(field.sample(0.0, -5_000.0), config.gas_baseline);
    }
}
