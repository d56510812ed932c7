//! World configuration and organism type records.
//!
//! The core never parses files; a host loads or builds these structs and
//! hands them to [`crate::World::new`], which validates them once. Invalid
//! configuration is the only fatal error class in the crate.

use serde::{Deserialize, Serialize};

use crate::WorldError;

/// Enables or disables individual pipeline stages. The stage order never
/// changes; disabling a stage skips its work for the tick.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StageToggles {
    pub gas_update: bool,
    pub corpse_decay: bool,
    pub agents: bool,
    pub plant_growth: bool,
    pub bleaching: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            gas_update: true,
            corpse_decay: true,
            agents: true,
            plant_growth: true,
            bleaching: true,
        }
    }
}

/// Presentation-only flags. Toggling these never changes simulation results;
/// they exist so hosts can persist what the user chose to look at.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FieldVisibility {
    pub flow: bool,
    pub gas: bool,
    pub nutrition: bool,
}

impl Default for FieldVisibility {
    fn default() -> Self {
        Self {
            flow: false,
            gas: true,
            nutrition: false,
        }
    }
}

/// Static parameters of one plant species.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlantType {
    pub name: String,
    /// Base per-tick chance that an eligible node sprouts a branch, before
    /// the local nutrition modifier is applied.
    pub growth_probability: f32,
    /// Distance from parent at which a new branch node is placed.
    pub branch_distance: f32,
    pub max_branches: u8,
    /// Nodes at or past this age stop branching.
    pub age_mature: u32,
    /// Energy transferred to a fish that eats one node.
    pub nutrition_value: f32,
    pub oxygen_production: f32,
    pub oxygen_radius: f32,
    /// Nutrition drawn from the substrate when a branch sprouts.
    pub depletion_amount: f32,
    pub depletion_radius: f32,
    /// Ticks during which a freshly planted seed cannot be eaten.
    pub seed_immunity_ticks: u32,
    /// Coral-flagged species are subject to heat bleaching.
    pub is_coral: bool,
    pub color: [f32; 3],
}

impl PlantType {
    /// A mid-sized kelp-like species, handy for tests and demo seeding.
    #[must_use]
    pub fn kelp() -> Self {
        Self {
            name: "kelp".to_owned(),
            growth_probability: 0.015,
            branch_distance: 14.0,
            max_branches: 3,
            age_mature: 2_400,
            nutrition_value: 0.35,
            oxygen_production: 0.85,
            oxygen_radius: 90.0,
            depletion_amount: 0.08,
            depletion_radius: 24.0,
            seed_immunity_ticks: 600,
            is_coral: false,
            color: [0.18, 0.55, 0.25],
        }
    }

    /// A slow, heat-sensitive coral species.
    #[must_use]
    pub fn coral() -> Self {
        Self {
            name: "coral".to_owned(),
            growth_probability: 0.004,
            branch_distance: 9.0,
            max_branches: 5,
            age_mature: 6_000,
            nutrition_value: 0.15,
            oxygen_production: 1.0,
            oxygen_radius: 70.0,
            depletion_amount: 0.05,
            depletion_radius: 18.0,
            seed_immunity_ticks: 900,
            is_coral: true,
            color: [0.85, 0.45, 0.5],
        }
    }
}

/// Static parameters of one fish species.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FishType {
    pub name: String,
    pub max_speed: f32,
    /// Acceleration applied per unit of thrust output.
    pub thrust: f32,
    /// Maximum heading change per tick, radians.
    pub max_turn: f32,
    pub eat_radius: f32,
    pub sense_radius: f32,
    /// Relative menace on the reef, `-1.0` (harmless) to `1.0` (apex).
    /// A fish hunts neighbors with lower values and flees higher ones.
    pub danger_level: f32,
    pub is_predator: bool,
    /// Scales how strongly the flow field pushes this species.
    pub flow_sensitivity: f32,
    /// Oxygen level below which the fish is stressed.
    pub oxygen_comfort: f32,
    pub stomach_capacity: f32,
    /// Stomach fill fraction that triggers defecation.
    pub defecation_threshold: f32,
    pub max_age: u32,
    pub corpse_decay_ticks: u32,
    /// Successful feeding events a predator needs before reproducing.
    pub reproduction_feed_count: u32,
    pub color: [f32; 3],
}

impl FishType {
    /// A small grazing herbivore.
    #[must_use]
    pub fn grazer() -> Self {
        Self {
            name: "grazer".to_owned(),
            max_speed: 2.4,
            thrust: 0.22,
            max_turn: 0.28,
            eat_radius: 12.0,
            sense_radius: 140.0,
            danger_level: -0.5,
            is_predator: false,
            flow_sensitivity: 1.0,
            oxygen_comfort: 0.35,
            stomach_capacity: 1.0,
            defecation_threshold: 0.7,
            max_age: 18_000,
            corpse_decay_ticks: 1_200,
            reproduction_feed_count: 0,
            color: [0.95, 0.65, 0.2],
        }
    }

    /// A mid-sized hunter that preys on grazers.
    #[must_use]
    pub fn hunter() -> Self {
        Self {
            name: "hunter".to_owned(),
            max_speed: 3.1,
            thrust: 0.3,
            max_turn: 0.22,
            eat_radius: 15.0,
            sense_radius: 180.0,
            danger_level: 0.6,
            is_predator: true,
            flow_sensitivity: 0.6,
            oxygen_comfort: 0.3,
            stomach_capacity: 1.6,
            defecation_threshold: 0.8,
            max_age: 24_000,
            corpse_decay_ticks: 1_800,
            reproduction_feed_count: 4,
            color: [0.55, 0.6, 0.8],
        }
    }
}

/// Tunable world parameters. Defaults describe a 1200x800 tank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TidepoolConfig {
    pub world_width: f32,
    pub world_height: f32,

    pub index_cell_size: f32,
    pub index_cell_capacity: usize,

    pub flow_cell_size: f32,
    pub flow_max_magnitude: f32,
    pub flow_vortex_count: usize,
    /// Border band, in flow cells, over which currents fade to zero.
    pub flow_edge_margin: usize,

    pub gas_cell_size: f32,
    /// Level reported for samples outside the world.
    pub gas_baseline: f32,
    pub gas_max_level: f32,
    /// Blend fraction applied when a cell rises toward its target.
    pub gas_rise_rate: f32,
    /// Blend fraction applied when a cell falls toward its target.
    pub gas_fall_rate: f32,
    /// Constant per-tick loss, independent of the target.
    pub gas_decay: f32,

    pub nutrition_cell_size: f32,
    /// Per-tick fraction by which cells drift back toward their terrain value.
    pub nutrition_regen_rate: f32,

    pub max_nodes: usize,
    pub max_agents: usize,
    /// Upper bound on branch sprouts per tick across all plants.
    pub growth_budget_per_tick: usize,
    pub history_limit: usize,

    /// Heat stress in degrees above the bleaching threshold. Zero disables
    /// bleaching entirely.
    pub temperature: f32,
    /// Per-degree per-tick bleaching probability for coral nodes.
    pub bleach_rate: f32,

    /// Fixed seed for reproducible runs; `None` draws one from the OS.
    pub rng_seed: Option<u64>,
    pub stages: StageToggles,
    pub visibility: FieldVisibility,
}

impl Default for TidepoolConfig {
    fn default() -> Self {
        Self {
            world_width: 1_200.0,
            world_height: 800.0,
            index_cell_size: 25.0,
            index_cell_capacity: 48,
            flow_cell_size: 16.0,
            flow_max_magnitude: 3.0,
            flow_vortex_count: 3,
            flow_edge_margin: 20,
            gas_cell_size: 16.0,
            gas_baseline: 0.3,
            gas_max_level: 1.0,
            gas_rise_rate: 0.35,
            gas_fall_rate: 0.02,
            gas_decay: 0.0008,
            nutrition_cell_size: 20.0,
            nutrition_regen_rate: 0.0005,
            max_nodes: 4_096,
            max_agents: 256,
            growth_budget_per_tick: 8,
            history_limit: 256,
            temperature: 0.0,
            bleach_rate: 0.0004,
            rng_seed: None,
            stages: StageToggles::default(),
            visibility: FieldVisibility::default(),
        }
    }
}

impl TidepoolConfig {
    /// Checks every invariant the simulation relies on. Called once by
    /// [`crate::World::new`]; hosts may call it earlier to fail fast.
    pub fn validate(&self) -> Result<(), WorldError> {
        fn positive(value: f32, what: &'static str) -> Result<(), WorldError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(WorldError::InvalidConfig(what))
            }
        }
        fn fraction(value: f32, what: &'static str) -> Result<(), WorldError> {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(WorldError::InvalidConfig(what))
            }
        }

        positive(self.world_width, "world_width must be positive")?;
        positive(self.world_height, "world_height must be positive")?;
        positive(self.index_cell_size, "index_cell_size must be positive")?;
        positive(self.flow_cell_size, "flow_cell_size must be positive")?;
        positive(self.gas_cell_size, "gas_cell_size must be positive")?;
        positive(
            self.nutrition_cell_size,
            "nutrition_cell_size must be positive",
        )?;
        positive(
            self.flow_max_magnitude,
            "flow_max_magnitude must be positive",
        )?;
        positive(self.gas_max_level, "gas_max_level must be positive")?;
        fraction(self.gas_baseline, "gas_baseline must be in 0..=1")?;
        fraction(self.gas_rise_rate, "gas_rise_rate must be in 0..=1")?;
        fraction(self.gas_fall_rate, "gas_fall_rate must be in 0..=1")?;
        fraction(self.gas_decay, "gas_decay must be in 0..=1")?;
        fraction(
            self.nutrition_regen_rate,
            "nutrition_regen_rate must be in 0..=1",
        )?;
        if self.gas_baseline > self.gas_max_level {
            return Err(WorldError::InvalidConfig(
                "gas_baseline must not exceed gas_max_level",
            ));
        }
        if self.index_cell_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "index_cell_capacity must be nonzero",
            ));
        }
        if self.max_nodes == 0 {
            return Err(WorldError::InvalidConfig("max_nodes must be nonzero"));
        }
        if self.max_agents == 0 {
            return Err(WorldError::InvalidConfig("max_agents must be nonzero"));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(WorldError::InvalidConfig(
                "temperature must be finite and non-negative",
            ));
        }
        fraction(self.bleach_rate, "bleach_rate must be in 0..=1")?;
        Ok(())
    }

    /// Half-extent of the world on the x axis. World space is centered on
    /// the origin, so valid x runs `-half_width()..=half_width()`.
    #[must_use]
    pub fn half_width(&self) -> f32 {
        self.world_width / 2.0
    }

    #[must_use]
    pub fn half_height(&self) -> f32 {
        self.world_height / 2.0
    }

    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= -self.half_width()
            && x <= self.half_width()
            && y >= -self.half_height()
            && y <= self.half_height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(TidepoolConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_nonpositive_dimensions() {
        let mut config = TidepoolConfig::default();
        config.world_width = 0.0;
        assert!(config.validate().is_err());

        let mut config = TidepoolConfig::default();
        config.world_height = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_baseline_above_max() {
        let mut config = TidepoolConfig::default();
        config.gas_baseline = 1.5;
        config.gas_max_level = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let mut config = TidepoolConfig::default();
        config.gas_rise_rate = 1.2;
        assert!(config.validate().is_err());

        let mut config = TidepoolConfig::default();
        config.nutrition_regen_rate = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn contains_uses_centered_bounds() {
        let config = TidepoolConfig::default();
        assert!(config.contains(-599.0, 399.0));
        assert!(!config.contains(601.0, 0.0));
        assert!(!config.contains(0.0, -401.0));
    }
}
