//! Static water flow field.
//!
//! Generated once at world construction from the run seed and never mutated
//! afterwards, so sampling is read-only and trivially shareable. The field
//! layers a broad circulation current, mid-scale turbulence, fine eddies and
//! a handful of vortices, then fades everything to zero toward the tank
//! walls so nothing drives fish into the boundary.

use libnoise::{Generator, Source};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::config::TidepoolConfig;

const BASE_NOISE_SCALE: f64 = 0.008;
const TURBULENCE_NOISE_SCALE: f64 = 0.02;
const EDDY_NOISE_SCALE: f64 = 0.05;
const BASE_STRENGTH_MIN: f32 = 0.4;
const BASE_STRENGTH_SPAN: f32 = 0.3;
const TURBULENCE_STRENGTH: f32 = 0.8;
const EDDY_STRENGTH: f32 = 0.6;
const VORTEX_STRENGTH: f32 = 1.2;

#[derive(Clone, Copy, Debug)]
struct Vortex {
    x: f32,
    y: f32,
    radius: f32,
    spin: f32,
}

/// Immutable grid of water velocity vectors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowField {
    cell_size: f32,
    cols: usize,
    rows: usize,
    world_left: f32,
    world_bottom: f32,
    half_width: f32,
    half_height: f32,
    max_magnitude: f32,
    cells: Vec<[f32; 2]>,
}

impl FlowField {
    /// Synthesizes the field for `config` from `seed`. The same seed always
    /// produces the same field.
    #[must_use]
    pub fn generate(config: &TidepoolConfig, seed: u64) -> Self {
        let cell_size = config.flow_cell_size;
        let cols = (config.world_width / cell_size).ceil() as usize;
        let rows = (config.world_height / cell_size).ceil() as usize;
        let world_left = -config.half_width();
        let world_bottom = -config.half_height();

        let base_angle = Source::improved_perlin(seed);
        let base_strength = Source::improved_perlin(seed.wrapping_add(1));
        let turbulence_angle = Source::improved_perlin(seed.wrapping_add(2));
        let turbulence_strength = Source::improved_perlin(seed.wrapping_add(3));
        let eddy_angle = Source::improved_perlin(seed.wrapping_add(4));
        let eddy_strength = Source::improved_perlin(seed.wrapping_add(5));

        let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(6));
        let vortices: Vec<Vortex> = (0..config.flow_vortex_count)
            .map(|_| Vortex {
                x: rng.gen_range(-config.half_width() * 0.7..=config.half_width() * 0.7),
                y: rng.gen_range(-config.half_height() * 0.7..=config.half_height() * 0.7),
                radius: rng.gen_range(
                    config.world_height * 0.08..=config.world_height * 0.2,
                ),
                spin: if rng.gen_bool(0.5) { 1.0 } else { -1.0 },
            })
            .collect();

        let margin = config.flow_edge_margin.max(1) as f32;
        let mut cells = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x = world_left + (col as f32 + 0.5) * cell_size;
                let y = world_bottom + (row as f32 + 0.5) * cell_size;
                let px = f64::from(x);
                let py = f64::from(y);

                let angle = PI * base_angle
                    .sample([px * BASE_NOISE_SCALE, py * BASE_NOISE_SCALE])
                    as f32;
                let strength = BASE_STRENGTH_MIN
                    + BASE_STRENGTH_SPAN
                        * (0.5
                            + 0.5
                                * base_strength.sample([
                                    px * BASE_NOISE_SCALE,
                                    py * BASE_NOISE_SCALE,
                                ]) as f32);
                let mut vx = angle.cos() * strength;
                let mut vy = angle.sin() * strength;

                let t_angle = PI * turbulence_angle.sample([
                    px * TURBULENCE_NOISE_SCALE,
                    py * TURBULENCE_NOISE_SCALE,
                ]) as f32;
                let t_strength = TURBULENCE_STRENGTH
                    * (turbulence_strength.sample([
                        px * TURBULENCE_NOISE_SCALE,
                        py * TURBULENCE_NOISE_SCALE,
                    ]) as f32)
                        .abs();
                vx += t_angle.cos() * t_strength;
                vy += t_angle.sin() * t_strength;

                let e_angle = PI
                    * eddy_angle.sample([px * EDDY_NOISE_SCALE, py * EDDY_NOISE_SCALE])
                        as f32;
                let e_strength = EDDY_STRENGTH
                    * (eddy_strength.sample([px * EDDY_NOISE_SCALE, py * EDDY_NOISE_SCALE])
                        as f32)
                        .abs();
                vx += e_angle.cos() * e_strength;
                vy += e_angle.sin() * e_strength;

                for vortex in &vortices {
                    let dx = x - vortex.x;
                    let dy = y - vortex.y;
                    let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
                    let pull = VORTEX_STRENGTH * (-dist / (vortex.radius * 0.5)).exp();
                    // Tangential direction around the vortex center.
                    vx += vortex.spin * (-dy / dist) * pull;
                    vy += vortex.spin * (dx / dist) * pull;
                }

                let border_cells = (col.min(cols - 1 - col).min(row).min(rows - 1 - row))
                    as f32;
                let attenuation = (border_cells / margin).min(1.0);
                vx *= attenuation;
                vy *= attenuation;

                let magnitude = (vx * vx + vy * vy).sqrt();
                if magnitude > config.flow_max_magnitude {
                    let scale = config.flow_max_magnitude / magnitude;
                    vx *= scale;
                    vy *= scale;
                }
                cells.push([vx, vy]);
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
            max_magnitude: config.flow_max_magnitude,
            cells,
        }
    }

    /// Water velocity at a point, nearest-cell lookup. Points outside the
    /// world read as still water.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> (f32, f32) {
        if x < -self.half_width
            || x > self.half_width
            || y < -self.half_height
            || y > self.half_height
        {
            return (0.0, 0.0);
        }
        let col = (((x - self.world_left) / self.cell_size) as usize).min(self.cols - 1);
        let row = (((y - self.world_bottom) / self.cell_size) as usize).min(self.rows - 1);
        let cell = self.cells[row * self.cols + col];
        (cell[0], cell[1])
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn max_magnitude(&self) -> f32 {
        self.max_magnitude
    }

    /// Iterates `(x, y, vx, vy)` per cell center, for renderers.
    pub fn iter_cells(&self) -> impl Iterator<Item = (f32, f32, f32, f32)> + '_ {
        self.cells.iter().enumerate().map(move |(i, v)| {
            let col = i % self.cols;
            let row = i / self.cols;
            (
                self.world_left + (col as f32 + 0.5) * self.cell_size,
                self.world_bottom + (row as f32 + 0.5) * self.cell_size,
                v[0],
                v[1],
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TidepoolConfig {
        TidepoolConfig {
            world_width: 400.0,
            world_height: 300.0,
            ..TidepoolConfig::default()
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let config = test_config();
        let a = FlowField::generate(&config, 42);
        let b = FlowField::generate(&config, 42);
        for ((x, y, avx, avy), (_, _, bvx, bvy)) in a.iter_cells().zip(b.iter_cells()) {
            assert_eq!(avx, bvx, "vx differs at ({x}, {y})");
            assert_eq!(avy, bvy, "vy differs at ({x}, {y})");
        }
    }

    #[test]
    fn different_seeds_differ() {
        let config = test_config();
        let a = FlowField::generate(&config, 1);
        let b = FlowField::generate(&config, 2);
        let identical = a
            .iter_cells()
            .zip(b.iter_cells())
            .all(|((_, _, avx, avy), (_, _, bvx, bvy))| avx == bvx && avy == bvy);
        assert!(!identical);
    }

    #[test]
    fn magnitude_never_exceeds_limit() {
        let config = test_config();
        let field = FlowField::generate(&config, 7);
        for (_, _, vx, vy) in field.iter_cells() {
            let mag = (vx * vx + vy * vy).sqrt();
            assert!(mag <= config.flow_max_magnitude + 1e-4, "magnitude {mag}");
        }
    }

    #[test]
    fn out_of_bounds_sample_is_still_water() {
        let field = FlowField::generate(&test_config(), 3);
        assert_eq!(field.sample(1_000.0, 0.0), (0.0, 0.0));
        assert_eq!(field.sample(0.0, -1_000.0), (0.0, 0.0));
    }

    #[test]
    fn border_cells_are_attenuated() {
        let config = test_config();
        let field = FlowField::generate(&config, 11);
        // The outermost ring of cells has zero border distance and must be
        // fully damped.
        let (vx, vy) = field.sample(-config.half_width() + 1.0, 0.0);
        assert!((vx * vx + vy * vy).sqrt() < 1e-6);
    }
}
