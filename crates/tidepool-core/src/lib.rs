//! Deterministic reef ecosystem simulation core.
//!
//! The world is a 2D origin-centered tank holding branching plant structures
//! and autonomous fish. Plants are graphs of nodes linked by chains; fish are
//! single body nodes driven by a pluggable control policy. Three scalar/vector
//! fields shape behavior: a static water flow field, a dynamic dissolved
//! oxygen field fed by living plants, and a nutrient field that gates plant
//! growth and absorbs fish waste.
//!
//! All simulation state lives in [`world::World`]; one call to
//! [`world::World::step`] advances exactly one tick through a fixed
//! single-threaded stage pipeline. Every run with the same seed, config, and
//! input sequence is bit-for-bit reproducible.

pub mod agent;
pub mod config;
pub mod flow;
pub mod gas;
pub mod node;
pub mod nutrition;
pub mod policy;
pub mod world;

use thiserror::Error;

pub use agent::{Agent, AgentId};
pub use config::{FieldVisibility, FishType, PlantType, StageToggles, TidepoolConfig};
pub use flow::FlowField;
pub use gas::{GasField, GasSource};
pub use node::{Chain, ChainArena, ChainId, Node, NodeArena, NodeId, NodeKind};
pub use nutrition::NutritionField;
pub use policy::{ControlInputs, ControlOutputs, ControlPolicy, FnPolicy};
pub use world::{FaultCounters, Tick, TickSummary, World};

/// Errors raised while constructing a world. Construction is the only fatal
/// failure point; once built, a world absorbs runtime faults by repairing
/// state and counting them.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("spatial index setup failed: {0}")]
    Index(#[from] tidepool_index::IndexError),
}

/// Wraps an angle into `(-PI, PI]`.
#[must_use]
pub fn wrap_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    angle
}
