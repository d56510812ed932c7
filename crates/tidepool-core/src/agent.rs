//! Fish agent runtime state.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::node::NodeId;
use crate::policy::{ControlInputs, ControlOutputs};
use crate::world::Tick;

new_key_type! {
    /// Stable handle to a fish agent.
    pub struct AgentId;
}

/// Mutable per-fish state. Species parameters live in
/// [`crate::FishType`]; this struct holds only what changes at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    /// Body node in the shared arena. Checked for liveness every tick; a
    /// stale body deactivates the agent.
    pub body: NodeId,
    pub fish_type: u16,
    /// Heading in radians, wrapped to `(-PI, PI]`.
    pub heading: f32,
    /// Sensor snapshot from the most recent tick, kept for observers.
    pub sensors: ControlInputs,
    /// Policy outputs from the most recent tick.
    pub outputs: ControlOutputs,
    pub energy: f32,
    pub stomach: f32,
    /// Oxygen sampled at the body position last tick.
    pub oxygen: f32,
    pub last_reward: f32,
    pub total_reward: f32,
    /// Plant species most recently eaten; seeds planted on defecation
    /// inherit it.
    pub last_eaten_plant: Option<u16>,
    /// Feeding events since the last reproduction (predators only).
    pub feed_count: u32,
    pub birth_tick: Tick,
    pub age: u32,
    /// Set while the fish is actively biting; damps movement this tick.
    pub eating: bool,
}

impl Agent {
    #[must_use]
    pub fn new(body: NodeId, fish_type: u16, heading: f32, birth_tick: Tick) -> Self {
        Self {
            body,
            fish_type,
            heading,
            sensors: ControlInputs::default(),
            outputs: ControlOutputs::default(),
            energy: 1.0,
            stomach: 0.0,
            oxygen: 0.0,
            last_reward: 0.0,
            total_reward: 0.0,
            last_eaten_plant: None,
            feed_count: 0,
            birth_tick,
            age: 0,
            eating: false,
        }
    }

    /// Stomach fill as a fraction of `capacity`.
    #[must_use]
    pub fn fullness(&self, capacity: f32) -> f32 {
        if capacity > 0.0 {
            (self.stomach / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullness_is_clamped() {
        let mut agent = Agent::new(0, 0, 0.0, Tick(0));
        agent.stomach = 2.0;
        assert_eq!(agent.fullness(1.0), 1.0);
        agent.stomach = 0.25;
        assert!((agent.fullness(1.0) - 0.25).abs() < 1e-6);
        assert_eq!(agent.fullness(0.0), 0.0);
    }
}
