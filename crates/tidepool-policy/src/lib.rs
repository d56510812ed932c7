//! Heuristic fish controller.
//!
//! A fixed priority ladder drives every fish: flee a stronger fish, hunt a
//! weaker one, head for food when hungry, otherwise wander. The policy is a
//! pure function of its inputs; the wander pattern comes from the caller's
//! `phase` clock rather than any internal randomness, so replays with the
//! same sensor stream reproduce exactly.

use tidepool_core::{ControlInputs, ControlOutputs, ControlPolicy};

/// Danger below this reads as a credible threat; the fish flees.
const FLEE_THRESHOLD: f32 = -0.2;
/// Danger above this reads as catchable prey; the fish hunts.
const HUNT_THRESHOLD: f32 = 0.2;
/// Danger above this means the prey is close enough to bite.
const STRIKE_THRESHOLD: f32 = 0.5;
/// Normalized food distance below which the fish slows down and bites.
const BITE_RANGE: f32 = 0.1;
/// Normalized food distance below which the fish eases off full thrust.
const APPROACH_RANGE: f32 = 0.4;
/// Hunger below this makes food uninteresting.
const APPETITE: f32 = 0.2;
/// Oxygen below this pushes the fish to move and find better water.
const OXYGEN_LOW: f32 = 0.2;
/// Oxygen above this lets the fish idle.
const OXYGEN_RICH: f32 = 0.8;

/// The standard reef controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicPolicy;

/// Bearing of a body-frame direction as a turn command in `-1..=1`.
/// Zero means dead ahead, `1.0` a full about-face to the left.
fn bearing(dx: f32, dy: f32) -> f32 {
    if dx == 0.0 && dy == 0.0 {
        0.0
    } else {
        dy.atan2(dx) / std::f32::consts::PI
    }
}

impl ControlPolicy for HeuristicPolicy {
    fn decide(&self, inputs: &ControlInputs) -> ControlOutputs {
        let mut out = if inputs.danger < FLEE_THRESHOLD {
            // Run directly away from the threat, flat out.
            ControlOutputs {
                turn: bearing(-inputs.threat_dx, -inputs.threat_dy),
                thrust: 1.0,
                eat: 0.0,
            }
        } else if inputs.danger > HUNT_THRESHOLD {
            // Close on the prey; slow down and bite once on top of it.
            let striking = inputs.danger > STRIKE_THRESHOLD;
            ControlOutputs {
                turn: bearing(inputs.threat_dx, inputs.threat_dy),
                thrust: if striking { 0.3 } else { 0.9 },
                eat: if striking { 1.0 } else { 0.0 },
            }
        } else if inputs.plant_distance < 1.0 && inputs.hunger > APPETITE {
            // Food in range and worth the trip.
            let turn = bearing(inputs.plant_dx, inputs.plant_dy);
            if inputs.plant_distance < BITE_RANGE {
                ControlOutputs {
                    turn,
                    thrust: 0.2,
                    eat: 1.0,
                }
            } else if inputs.plant_distance < APPROACH_RANGE {
                ControlOutputs {
                    turn,
                    thrust: 0.6,
                    eat: 0.0,
                }
            } else {
                ControlOutputs {
                    turn,
                    thrust: 0.9,
                    eat: 0.0,
                }
            }
        } else {
            // Nothing pressing: meander on the phase clock.
            ControlOutputs {
                turn: 0.4 * (inputs.phase * 0.7).sin(),
                thrust: 0.35 + 0.15 * (inputs.phase * 0.23).cos(),
                eat: 0.0,
            }
        };

        // Oxygen shapes effort regardless of the tier: stressed fish push
        // harder to relocate, saturated fish relax.
        if inputs.oxygen < OXYGEN_LOW {
            out.thrust = out.thrust.max(0.8);
        } else if inputs.oxygen > OXYGEN_RICH && inputs.danger >= FLEE_THRESHOLD {
            out.thrust *= 0.7;
        }
        out.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> ControlInputs {
        ControlInputs {
            plant_distance: 1.0,
            oxygen: 0.5,
            hunger: 0.8,
            ..ControlInputs::default()
        }
    }

    #[test]
    fn same_inputs_same_outputs() {
        let policy = HeuristicPolicy;
        let inputs = ControlInputs {
            plant_dx: 0.6,
            plant_dy: -0.8,
            plant_distance: 0.3,
            danger: 0.1,
            phase: 123.4,
            ..base_inputs()
        };
        assert_eq!(policy.decide(&inputs), policy.decide(&inputs));
    }

    #[test]
    fn flees_a_superior_threat() {
        let policy = HeuristicPolicy;
        // Threat dead ahead.
        let inputs = ControlInputs {
            threat_dx: 1.0,
            threat_dy: 0.0,
            danger: -0.6,
            ..base_inputs()
        };
        let out = policy.decide(&inputs);
        assert_eq!(out.thrust, 1.0);
        assert_eq!(out.eat, 0.0);
        // Away from dead-ahead is a full about-face.
        assert!(out.turn.abs() > 0.9);
    }

    #[test]
    fn hunts_and_strikes_weaker_prey() {
        let policy = HeuristicPolicy;
        let far = ControlInputs {
            threat_dx: 0.0,
            threat_dy: 1.0,
            danger: 0.3,
            ..base_inputs()
        };
        let chasing = policy.decide(&far);
        assert_eq!(chasing.eat, 0.0);
        assert!(chasing.thrust > 0.8);
        assert!(chasing.turn > 0.3, "should turn left toward prey");

        let close = ControlInputs {
            danger: 0.7,
            ..far
        };
        let striking = policy.decide(&close);
        assert_eq!(striking.eat, 1.0);
        assert!(striking.thrust < chasing.thrust);
    }

    #[test]
    fn seeks_food_when_hungry_and_bites_in_range() {
        let policy = HeuristicPolicy;
        let near = ControlInputs {
            plant_dx: 1.0,
            plant_dy: 0.0,
            plant_distance: 0.05,
            ..base_inputs()
        };
        let out = policy.decide(&near);
        assert_eq!(out.eat, 1.0);
        assert!(out.thrust < 0.5);

        let far = ControlInputs {
            plant_distance: 0.8,
            ..near
        };
        let out = policy.decide(&far);
        assert_eq!(out.eat, 0.0);
        assert!(out.thrust > 0.8);
    }

    #[test]
    fn ignores_food_when_full() {
        let policy = HeuristicPolicy;
        let inputs = ControlInputs {
            plant_dx: 1.0,
            plant_distance: 0.05,
            hunger: 0.05,
            ..base_inputs()
        };
        let out = policy.decide(&inputs);
        assert_eq!(out.eat, 0.0);
    }

    #[test]
    fn fleeing_outranks_hunger() {
        let policy = HeuristicPolicy;
        let inputs = ControlInputs {
            plant_dx: 1.0,
            plant_distance: 0.05,
            threat_dx: -1.0,
            danger: -0.5,
            ..base_inputs()
        };
        let out = policy.decide(&inputs);
        assert_eq!(out.eat, 0.0);
        assert_eq!(out.thrust, 1.0);
    }

    #[test]
    fn low_oxygen_forces_effort() {
        let policy = HeuristicPolicy;
        let inputs = ControlInputs {
            oxygen: 0.05,
            hunger: 0.0,
            ..base_inputs()
        };
        let out = policy.decide(&inputs);
        assert!(out.thrust >= 0.8);
    }

    #[test]
    fn wander_varies_with_phase_only() {
        let policy = HeuristicPolicy;
        let calm = ControlInputs {
            hunger: 0.0,
            ..base_inputs()
        };
        let a = policy.decide(&ControlInputs { phase: 1.0, ..calm });
        let b = policy.decide(&ControlInputs { phase: 40.0, ..calm });
        assert_ne!(a.turn, b.turn);
    }
}
