//! Control policy seam.
//!
//! The world computes a sensor snapshot per fish per tick and asks a policy
//! for motor outputs. Policies must be pure: same inputs, same outputs, no
//! interior state and no randomness. The `phase` input exists so a policy
//! can vary behavior over time without breaking that contract.

use serde::{Deserialize, Serialize};

/// Sensor snapshot handed to the policy. Vector components are unit-length
/// directions in the fish's body frame, x ahead and y to the left, so a
/// positive `*_dy` means "turn left toward it". Distances are normalized by
/// the sensing radius.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInputs {
    /// Direction to the nearest food item, zero when none sensed.
    pub plant_dx: f32,
    pub plant_dy: f32,
    /// Normalized distance to that plant; `1.0` means none in range.
    pub plant_distance: f32,
    /// Dissolved oxygen at the body position, `0..=1`.
    pub oxygen: f32,
    /// Direction to the most significant other fish, zero when alone.
    pub threat_dx: f32,
    pub threat_dy: f32,
    /// Signed menace balance against that fish: positive when this fish
    /// out-dangers it (prey), negative when outmatched (threat). Scaled by
    /// proximity, so a distant threat reads near zero.
    pub danger: f32,
    /// `1.0` starving, `0.0` full.
    pub hunger: f32,
    /// Monotonic per-agent clock, radians-friendly. Drives wander patterns.
    pub phase: f32,
}

/// Motor command returned by the policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlOutputs {
    /// Heading change request in `-1..=1`, scaled by the species turn limit.
    pub turn: f32,
    /// Forward effort in `0..=1`.
    pub thrust: f32,
    /// Bite intent in `0..=1`; values above `0.5` trigger an eat attempt.
    pub eat: f32,
}

impl ControlOutputs {
    /// Clamps every channel into its documented range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            turn: self.turn.clamp(-1.0, 1.0),
            thrust: self.thrust.clamp(0.0, 1.0),
            eat: self.eat.clamp(0.0, 1.0),
        }
    }
}

/// Decision function mapping one sensor snapshot to one motor command.
pub trait ControlPolicy: Send {
    fn decide(&self, inputs: &ControlInputs) -> ControlOutputs;
}

/// Adapts a plain function into a policy. Handy for tests and benches.
pub struct FnPolicy<F>(pub F);

impl<F> ControlPolicy for FnPolicy<F>
where
    F: Fn(&ControlInputs) -> ControlOutputs + Send,
{
    fn decide(&self, inputs: &ControlInputs) -> ControlOutputs {
        (self.0)(inputs)
    }
}
