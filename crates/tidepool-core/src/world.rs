//! World state and the tick pipeline.
//!
//! One [`World::step`] call runs a fixed sequence of stages in a single
//! thread: index rebuild, gas update, corpse decay, the agent loop, plant
//! growth, bleaching, then summary. Agents read the field state computed at
//! the start of the tick; anything they change lands in what later stages
//! and the next tick observe. Runtime faults never abort a tick: stale
//! references deactivate their holder, capacity overflows drop the spawn,
//! and both are counted in [`FaultCounters`].

use std::collections::VecDeque;
use std::f32::consts::PI;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, warn};

use tidepool_index::{NeighborhoodIndex, UniformGridIndex};

use crate::agent::{Agent, AgentId};
use crate::config::{FieldVisibility, FishType, PlantType, TidepoolConfig};
use crate::flow::FlowField;
use crate::gas::{GasField, GasSource};
use crate::node::{Chain, ChainArena, ChainId, Node, NodeArena, NodeId, NodeKind};
use crate::nutrition::{growth_modifier, NutritionField};
use crate::policy::{ControlInputs, ControlPolicy};
use crate::{wrap_angle, WorldError};

/// Velocity retained per tick from water resistance.
const WATER_DRAG: f32 = 0.95;
/// Couples flow velocity into fish velocity, before species sensitivity.
const FLOW_INFLUENCE: f32 = 0.03;
/// Reward charged once per tick while touching a wall.
const BOUNDARY_PENALTY: f32 = -0.01;
/// Velocity retained while actively biting.
const EATING_DRAG: f32 = 0.2;
/// Eat output above this triggers a bite attempt.
const EAT_TRIGGER: f32 = 0.5;
/// Nutrition a predator strips from a corpse per bite.
const CORPSE_BITE: f32 = 0.25;
/// Base nutrition loaded into a fresh corpse.
const CORPSE_NUTRITION: f32 = 0.5;
/// Fraction of stomach contents released per defecation.
const DEFECATION_FRACTION: f32 = 0.5;
const DEFECATION_RADIUS: f32 = 30.0;
/// Chance a herbivore's waste carries a viable seed.
const SEED_PLANT_CHANCE: f64 = 0.3;
const EAT_REWARD: f32 = 0.5;
const PLANT_PROXIMITY_REWARD: f32 = 0.002;
const OXYGEN_STRESS_PENALTY: f32 = 0.005;
/// Menace advantage a predator needs before striking live prey.
const HUNT_MARGIN: f32 = 0.2;
/// Baseline metabolic energy drain per tick.
const METABOLISM: f32 = 0.0005;

/// Monotonic tick counter.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

/// Recoverable faults absorbed since construction.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct FaultCounters {
    /// Agents removed because their body reference went stale.
    pub orphaned_agents: u64,
    /// Organisms removed because they referenced an unknown type id.
    pub invalid_type_refs: u64,
    /// Spawns dropped because an arena or the population cap was full.
    pub dropped_spawns: u64,
    /// Index inserts dropped for cell overflow or out-of-bounds positions.
    pub dropped_index_inserts: u64,
}

/// Per-tick digest appended to the world history.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub plant_nodes: usize,
    pub corpse_nodes: usize,
    pub fish: usize,
    pub chains: usize,
    pub births: u32,
    pub deaths: u32,
    pub growth_events: u32,
    pub seeds_planted: u32,
    pub bleach_events: u32,
    /// Running field totals, for nutrient-cycle audits.
    pub nutrition_deposited: f64,
    pub nutrition_depleted: f64,
    /// Running fish totals: nutrition eaten vs. nutrition returned as waste.
    pub nutrition_consumed: f64,
    pub nutrition_defecated: f64,
}

#[derive(Default)]
struct StageEvents {
    births: u32,
    deaths: u32,
    growth_events: u32,
    seeds_planted: u32,
    bleach_events: u32,
}

/// The complete simulation state.
pub struct World {
    config: TidepoolConfig,
    plant_types: Vec<PlantType>,
    fish_types: Vec<FishType>,
    nodes: NodeArena,
    chains: ChainArena,
    agents: SlotMap<AgentId, Agent>,
    index: UniformGridIndex,
    flow: FlowField,
    gas: GasField,
    nutrition: NutritionField,
    policy: Box<dyn ControlPolicy>,
    rng: SmallRng,
    tick: Tick,
    temperature: f32,
    visibility: FieldVisibility,
    faults: FaultCounters,
    /// Nutrition moved into fish stomachs since construction.
    nutrition_consumed: f64,
    /// Nutrition actually returned to the field by defecation. Tracked from
    /// what the field absorbed, not what left the stomach, so saturated
    /// cells do not inflate the ledger.
    nutrition_defecated: f64,
    history: VecDeque<TickSummary>,
    position_scratch: Vec<(f32, f32, bool)>,
    gas_scratch: Vec<GasSource>,
}

impl World {
    /// Builds a world from validated configuration. This is the only place
    /// errors are fatal; a constructed world never fails a `step`.
    pub fn new(
        config: TidepoolConfig,
        plant_types: Vec<PlantType>,
        fish_types: Vec<FishType>,
        policy: Box<dyn ControlPolicy>,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        if plant_types.is_empty() {
            return Err(WorldError::InvalidConfig(
                "at least one plant type is required",
            ));
        }
        if fish_types.is_empty() {
            return Err(WorldError::InvalidConfig(
                "at least one fish type is required",
            ));
        }
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let index = UniformGridIndex::new(
            config.index_cell_size,
            config.world_width,
            config.world_height,
            config.index_cell_capacity,
        )?;
        let flow = FlowField::generate(&config, seed);
        let gas = GasField::new(&config);
        let nutrition = NutritionField::generate(&config, seed.wrapping_mul(0x9E37_79B9));
        Ok(Self {
            nodes: NodeArena::with_capacity(config.max_nodes),
            chains: ChainArena::default(),
            agents: SlotMap::with_key(),
            rng: SmallRng::seed_from_u64(seed.wrapping_add(1)),
            tick: Tick(0),
            temperature: config.temperature,
            visibility: config.visibility,
            faults: FaultCounters::default(),
            nutrition_consumed: 0.0,
            nutrition_defecated: 0.0,
            history: VecDeque::with_capacity(config.history_limit),
            position_scratch: Vec::new(),
            gas_scratch: Vec::new(),
            index,
            flow,
            gas,
            nutrition,
            plant_types,
            fish_types,
            policy,
            config,
        })
    }

    /// Advances the simulation exactly one tick and returns its digest.
    pub fn step(&mut self) -> TickSummary {
        self.tick.0 += 1;
        let mut events = StageEvents::default();
        self.stage_rebuild_index();
        if self.config.stages.gas_update {
            self.stage_gas_update();
        }
        if self.config.stages.corpse_decay {
            self.stage_corpse_decay();
        }
        if self.config.stages.agents {
            self.stage_agents(&mut events);
        }
        if self.config.stages.plant_growth {
            self.stage_plant_growth(&mut events);
        }
        if self.config.stages.bleaching {
            self.stage_bleaching(&mut events);
        }
        let summary = self.summarize(&events);
        if self.history.len() >= self.config.history_limit.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(summary);
        summary
    }

    fn stage_rebuild_index(&mut self) {
        self.nodes.fill_positions(&mut self.position_scratch);
        self.index.rebuild(&self.position_scratch);
        self.faults.dropped_index_inserts = self.index.dropped_inserts();
    }

    fn stage_gas_update(&mut self) {
        self.gas_scratch.clear();
        let mut bad_types: Vec<NodeId> = Vec::new();
        for (id, node) in self.nodes.iter_live() {
            let NodeKind::Plant { plant_type } = node.kind else {
                continue;
            };
            if node.corpse {
                continue;
            }
            let Some(pt) = self.plant_types.get(plant_type as usize) else {
                bad_types.push(id);
                continue;
            };
            self.gas_scratch.push(GasSource {
                x: node.x,
                y: node.y,
                strength: pt.oxygen_production,
                radius: pt.oxygen_radius,
                suppressed: node.bleached,
            });
        }
        for id in bad_types {
            warn!(node = id, "plant references unknown type; removing");
            self.faults.invalid_type_refs += 1;
            self.nodes.deactivate(id);
            self.chains.remove_for_node(id);
        }
        self.gas.update(&self.gas_scratch);
    }

    fn stage_corpse_decay(&mut self) {
        let mut expired: Vec<NodeId> = Vec::new();
        for id in 0..self.nodes.len() {
            if let Some(node) = self.nodes.get_mut(id) {
                if node.corpse {
                    node.decay_timer = node.decay_timer.saturating_sub(1);
                    if node.decay_timer == 0 {
                        expired.push(id);
                    }
                }
            }
        }
        for id in expired {
            self.nodes.deactivate(id);
            self.chains.remove_for_node(id);
        }
    }

    fn stage_agents(&mut self, events: &mut StageEvents) {
        let keys: Vec<AgentId> = self.agents.keys().collect();
        let mut pending_spawns: Vec<(f32, f32, u16)> = Vec::new();

        for id in keys {
            let Some(agent) = self.agents.get(id).cloned() else {
                continue;
            };
            let body = agent.body;

            // Step 1: repair stale references.
            let body_ok = self
                .nodes
                .get(body)
                .is_some_and(|n| matches!(n.kind, NodeKind::Fish { .. }));
            if !body_ok {
                warn!(agent = ?id, node = body, "fish body reference went stale; removing agent");
                self.faults.orphaned_agents += 1;
                self.agents.remove(id);
                continue;
            }
            if self.nodes.get(body).is_some_and(|n| n.corpse) {
                // Killed earlier this tick or last tick; the corpse decays
                // on its own.
                self.agents.remove(id);
                events.deaths += 1;
                continue;
            }
            let Some(ft) = self.fish_types.get(agent.fish_type as usize).cloned() else {
                warn!(agent = ?id, fish_type = agent.fish_type, "unknown fish type; removing agent");
                self.faults.invalid_type_refs += 1;
                self.nodes.deactivate(body);
                self.agents.remove(id);
                continue;
            };

            // Step 2: death from old age leaves a corpse in place.
            if agent.age >= ft.max_age {
                if let Some(node) = self.nodes.get_mut(body) {
                    node.corpse = true;
                    node.decay_timer = ft.corpse_decay_ticks.max(1);
                    node.vx = 0.0;
                    node.vy = 0.0;
                    node.stored_nutrition = CORPSE_NUTRITION + agent.stomach;
                }
                self.agents.remove(id);
                events.deaths += 1;
                continue;
            }

            let Some((bx, by)) = self.nodes.get(body).map(|n| (n.x, n.y)) else {
                continue;
            };

            // Step 3: sense.
            let (inputs, food_target, fish_target) = self.sense_agent(body, bx, by, &agent, &ft);

            // Step 4: decide and turn.
            let outputs = self.policy.decide(&inputs).clamped();
            let heading = wrap_angle(agent.heading + outputs.turn * ft.max_turn);

            let mut stomach = agent.stomach;
            let mut energy = agent.energy;
            let mut feed_count = agent.feed_count;
            let mut last_eaten = agent.last_eaten_plant;
            let mut reward = 0.0f32;
            let mut eating = false;

            // Step 5: eat. The eating state (and its movement damping) only
            // engages when a bite intent lines up with a target in range.
            if outputs.eat > EAT_TRIGGER {
                let eat_r2 = ft.eat_radius * ft.eat_radius;
                if let Some((food, d2)) = food_target {
                    if d2 <= eat_r2 {
                        eating = true;
                        let info = self
                            .nodes
                            .get(food)
                            .map(|n| (n.kind, n.is_edible_plant(), n.corpse, n.stored_nutrition));
                        if let Some((kind, edible, corpse, stored)) = info {
                            if !ft.is_predator {
                                if let NodeKind::Plant { plant_type } = kind {
                                    if edible {
                                        let value = self
                                            .plant_types
                                            .get(plant_type as usize)
                                            .map_or(stored, |p| p.nutrition_value);
                                        stomach = (stomach + value).min(ft.stomach_capacity);
                                        energy += value;
                                        last_eaten = Some(plant_type);
                                        reward += EAT_REWARD;
                                        self.nutrition_consumed += f64::from(value);
                                        self.nodes.deactivate(food);
                                        self.chains.remove_for_node(food);
                                    }
                                }
                            } else if corpse && stored > 0.0 {
                                let bite = CORPSE_BITE.min(stored);
                                if let Some(node) = self.nodes.get_mut(food) {
                                    node.stored_nutrition -= bite;
                                }
                                stomach = (stomach + bite).min(ft.stomach_capacity);
                                energy += bite;
                                feed_count += 1;
                                reward += EAT_REWARD * bite;
                                self.nutrition_consumed += f64::from(bite);
                                if stored - bite <= 1e-4 {
                                    self.nodes.deactivate(food);
                                    self.chains.remove_for_node(food);
                                }
                            }
                        }
                    }
                }
                // Predators strike live prey they clearly out-danger.
                if ft.is_predator {
                    if let Some((prey, d2, rel)) = fish_target {
                        if rel > HUNT_MARGIN && d2 <= eat_r2 {
                            eating = true;
                            let decay = match self.nodes.get(prey).map(|n| n.kind) {
                                Some(NodeKind::Fish { fish_type }) => self
                                    .fish_types
                                    .get(fish_type as usize)
                                    .map_or(1, |t| t.corpse_decay_ticks.max(1)),
                                _ => 1,
                            };
                            if let Some(node) = self.nodes.get_mut(prey) {
                                if !node.corpse {
                                    node.corpse = true;
                                    node.decay_timer = decay;
                                    node.vx = 0.0;
                                    node.vy = 0.0;
                                    node.stored_nutrition = CORPSE_NUTRITION;
                                    feed_count += 1;
                                    reward += EAT_REWARD;
                                }
                            }
                        }
                    }
                }
            }

            // Step 6: move.
            let mut wall_contact = false;
            if let Some(node) = self.nodes.get_mut(body) {
                let accel = outputs.thrust * ft.thrust;
                node.vx += heading.cos() * accel;
                node.vy += heading.sin() * accel;
                let (fx, fy) = self.flow.sample(node.x, node.y);
                node.vx += fx * ft.flow_sensitivity * FLOW_INFLUENCE;
                node.vy += fy * ft.flow_sensitivity * FLOW_INFLUENCE;
                if eating {
                    node.vx *= EATING_DRAG;
                    node.vy *= EATING_DRAG;
                }
                node.vx *= WATER_DRAG;
                node.vy *= WATER_DRAG;
                let speed = (node.vx * node.vx + node.vy * node.vy).sqrt();
                if speed > ft.max_speed {
                    let scale = ft.max_speed / speed;
                    node.vx *= scale;
                    node.vy *= scale;
                }
                node.x += node.vx;
                node.y += node.vy;

                let hw = self.config.half_width();
                let hh = self.config.half_height();
                if node.x < -hw {
                    node.x = -hw;
                    node.vx = 0.0;
                    wall_contact = true;
                }
                if node.x > hw {
                    node.x = hw;
                    node.vx = 0.0;
                    wall_contact = true;
                }
                if node.y < -hh {
                    node.y = -hh;
                    node.vy = 0.0;
                    wall_contact = true;
                }
                if node.y > hh {
                    node.y = hh;
                    node.vy = 0.0;
                    wall_contact = true;
                }
            }
            if wall_contact {
                reward += BOUNDARY_PENALTY;
            }

            let (px, py) = self
                .nodes
                .get(body)
                .map_or((bx, by), |n| (n.x, n.y));

            // Step 7: defecate.
            let fullness = if ft.stomach_capacity > 0.0 {
                stomach / ft.stomach_capacity
            } else {
                0.0
            };
            if fullness >= ft.defecation_threshold {
                let release = stomach * DEFECATION_FRACTION;
                let returned = self.nutrition.deposit(px, py, release, DEFECATION_RADIUS);
                self.nutrition_defecated += f64::from(returned);
                stomach -= release;
                if !ft.is_predator {
                    if let Some(ptype) = last_eaten {
                        if self.rng.gen_bool(SEED_PLANT_CHANCE) {
                            if self.plant_seed(px, py, ptype) {
                                events.seeds_planted += 1;
                            }
                        }
                    }
                }
            }

            // Step 8: predators reproduce after enough successful feeds.
            if ft.is_predator
                && ft.reproduction_feed_count > 0
                && feed_count >= ft.reproduction_feed_count
            {
                feed_count = 0;
                let ox = px + self.rng.gen_range(-20.0..20.0);
                let oy = py + self.rng.gen_range(-20.0..20.0);
                pending_spawns.push((ox, oy, agent.fish_type));
            }

            // Step 9: rewards.
            if inputs.oxygen < ft.oxygen_comfort {
                reward -= OXYGEN_STRESS_PENALTY * (ft.oxygen_comfort - inputs.oxygen);
            }
            if !ft.is_predator {
                reward += PLANT_PROXIMITY_REWARD * (1.0 - inputs.plant_distance);
            }
            energy = (energy - METABOLISM * (1.0 + outputs.thrust)).max(0.0);

            // Step 10: commit.
            if let Some(slot) = self.agents.get_mut(id) {
                slot.heading = heading;
                slot.sensors = inputs;
                slot.outputs = outputs;
                slot.stomach = stomach;
                slot.energy = energy;
                slot.oxygen = inputs.oxygen;
                slot.last_reward = reward;
                slot.total_reward += reward;
                slot.last_eaten_plant = last_eaten;
                slot.feed_count = feed_count;
                slot.eating = eating;
                slot.age += 1;
            }
        }

        // Offspring join next tick's loop.
        for (x, y, fish_type) in pending_spawns {
            let x = x.clamp(-self.config.half_width(), self.config.half_width());
            let y = y.clamp(-self.config.half_height(), self.config.half_height());
            if self.spawn_fish(x, y, fish_type).is_some() {
                events.births += 1;
            }
        }
    }

    /// Builds the sensor snapshot for one fish and returns the node ids of
    /// the food and fish it reacted to, with squared distances.
    #[allow(clippy::type_complexity)]
    fn sense_agent(
        &self,
        body: NodeId,
        x: f32,
        y: f32,
        agent: &Agent,
        ft: &FishType,
    ) -> (
        ControlInputs,
        Option<(NodeId, f32)>,
        Option<(NodeId, f32, f32)>,
    ) {
        let sense_r = ft.sense_radius;
        let sense_r2 = sense_r * sense_r;
        let mut best_food: Option<(NodeId, f32)> = None;
        let mut best_fish: Option<(NodeId, f32, f32)> = None;

        self.index.neighbors_within(x, y, sense_r, &mut |idx, d2| {
            if idx == body {
                return;
            }
            let d2 = d2.into_inner();
            if d2 > sense_r2 {
                return;
            }
            let Some(node) = self.nodes.get(idx) else {
                return;
            };
            let is_food = if ft.is_predator {
                node.corpse && node.stored_nutrition > 0.0
            } else {
                node.is_edible_plant()
            };
            if is_food && best_food.map_or(true, |(_, bd)| d2 < bd) {
                best_food = Some((idx, d2));
            }
            if let NodeKind::Fish { fish_type } = node.kind {
                if !node.corpse {
                    let other_danger = self
                        .fish_types
                        .get(fish_type as usize)
                        .map_or(0.0, |t| t.danger_level);
                    let proximity = 1.0 - (d2.sqrt() / sense_r).min(1.0);
                    let rel = (ft.danger_level - other_danger) * proximity;
                    if best_fish.map_or(true, |(_, _, brel)| rel.abs() > brel.abs()) {
                        best_fish = Some((idx, d2, rel));
                    }
                }
            }
        });

        let mut inputs = ControlInputs {
            plant_distance: 1.0,
            oxygen: self.gas.sample(x, y),
            hunger: 1.0 - agent.fullness(ft.stomach_capacity),
            phase: agent.age as f32 * 0.1,
            ..ControlInputs::default()
        };
        // Directions are reported in the fish's body frame (x ahead, y to
        // the left) so the policy can steer without knowing its heading.
        let cos_h = agent.heading.cos();
        let sin_h = agent.heading.sin();
        if let Some((food, d2)) = best_food {
            if let Some(node) = self.nodes.get(food) {
                let dist = d2.sqrt().max(1e-3);
                let dx = (node.x - x) / dist;
                let dy = (node.y - y) / dist;
                inputs.plant_dx = dx * cos_h + dy * sin_h;
                inputs.plant_dy = -dx * sin_h + dy * cos_h;
                inputs.plant_distance = (dist / sense_r).min(1.0);
            }
        }
        if let Some((other, d2, rel)) = best_fish {
            if let Some(node) = self.nodes.get(other) {
                let dist = d2.sqrt().max(1e-3);
                let dx = (node.x - x) / dist;
                let dy = (node.y - y) / dist;
                inputs.threat_dx = dx * cos_h + dy * sin_h;
                inputs.threat_dy = -dx * sin_h + dy * cos_h;
                inputs.danger = rel;
            }
        }
        (inputs, best_food, best_fish)
    }

    fn stage_plant_growth(&mut self, events: &mut StageEvents) {
        // Age plants and run down seed immunity before growth rolls.
        for id in 0..self.nodes.len() {
            if let Some(node) = self.nodes.get_mut(id) {
                if node.is_plant() && !node.corpse {
                    node.age = node.age.saturating_add(1);
                    node.seed_immunity = node.seed_immunity.saturating_sub(1);
                }
            }
        }

        let mut budget = self.config.growth_budget_per_tick;
        let snapshot_len = self.nodes.len();
        for id in 0..snapshot_len {
            if budget == 0 {
                break;
            }
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let NodeKind::Plant { plant_type } = node.kind else {
                continue;
            };
            if node.corpse {
                continue;
            }
            let Some(pt) = self.plant_types.get(plant_type as usize).cloned() else {
                warn!(node = id, "plant references unknown type; removing");
                self.faults.invalid_type_refs += 1;
                self.nodes.deactivate(id);
                self.chains.remove_for_node(id);
                continue;
            };
            if node.branches >= pt.max_branches || node.age >= pt.age_mature {
                continue;
            }
            let (x, y) = (node.x, node.y);
            let modifier = growth_modifier(self.nutrition.value_at(x, y));
            let probability = (pt.growth_probability * modifier).clamp(0.0, 1.0);
            if self.rng.gen::<f32>() >= probability {
                continue;
            }
            let angle = self.rng.gen_range(-PI..PI);
            let cx = x + angle.cos() * pt.branch_distance;
            let cy = y + angle.sin() * pt.branch_distance;
            if !self.config.contains(cx, cy) {
                continue;
            }
            match self
                .nodes
                .spawn(Node::plant(cx, cy, plant_type, pt.nutrition_value))
            {
                Some(child) => {
                    if let Some(parent) = self.nodes.get_mut(id) {
                        parent.branches += 1;
                    }
                    self.chains.add(Chain {
                        a: id,
                        b: child,
                        plant_type,
                        curve_strength: self.rng.gen_range(0.05..0.3),
                        curve_offset: self.rng.gen_range(0.3..0.7),
                        active: true,
                    });
                    self.nutrition
                        .deplete(x, y, pt.depletion_amount, pt.depletion_radius);
                    events.growth_events += 1;
                    budget -= 1;
                }
                None => {
                    debug!(node = id, "node arena full; branch dropped");
                    self.faults.dropped_spawns += 1;
                }
            }
        }
        self.nutrition.regenerate();
    }

    fn stage_bleaching(&mut self, events: &mut StageEvents) {
        if self.temperature <= 0.0 {
            return;
        }
        let probability = (self.temperature * self.config.bleach_rate).min(1.0);
        for id in 0..self.nodes.len() {
            let is_coral = self.nodes.get(id).is_some_and(|node| {
                if node.corpse || node.bleached {
                    return false;
                }
                match node.kind {
                    NodeKind::Plant { plant_type } => self
                        .plant_types
                        .get(plant_type as usize)
                        .map_or(false, |pt| pt.is_coral),
                    NodeKind::Fish { .. } => false,
                }
            });
            if is_coral && self.rng.gen::<f32>() < probability {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.bleached = true;
                    events.bleach_events += 1;
                }
            }
        }
    }

    fn summarize(&self, events: &StageEvents) -> TickSummary {
        let mut plant_nodes = 0;
        let mut corpse_nodes = 0;
        for (_, node) in self.nodes.iter_live() {
            if node.corpse {
                corpse_nodes += 1;
            } else if node.is_plant() {
                plant_nodes += 1;
            }
        }
        TickSummary {
            tick: self.tick,
            plant_nodes,
            corpse_nodes,
            fish: self.agents.len(),
            chains: self.chains.live_count(),
            births: events.births,
            deaths: events.deaths,
            growth_events: events.growth_events,
            seeds_planted: events.seeds_planted,
            bleach_events: events.bleach_events,
            nutrition_deposited: self.nutrition.deposited_total(),
            nutrition_depleted: self.nutrition.depleted_total(),
            nutrition_consumed: self.nutrition_consumed,
            nutrition_defecated: self.nutrition_defecated,
        }
    }

    fn plant_seed(&mut self, x: f32, y: f32, plant_type: u16) -> bool {
        let Some(pt) = self.plant_types.get(plant_type as usize).cloned() else {
            self.faults.invalid_type_refs += 1;
            return false;
        };
        let sx = x + self.rng.gen_range(-10.0..10.0);
        let sy = y + self.rng.gen_range(-10.0..10.0);
        if !self.config.contains(sx, sy) {
            return false;
        }
        let mut seed = Node::plant(sx, sy, plant_type, pt.nutrition_value);
        seed.seed_immunity = pt.seed_immunity_ticks;
        match self.nodes.spawn(seed) {
            Some(_) => true,
            None => {
                self.faults.dropped_spawns += 1;
                false
            }
        }
    }

    // ---- external surface -------------------------------------------------

    /// Places a root plant node. Returns `None` when the position is outside
    /// the world, the type is unknown, or the arena is full.
    pub fn add_plant(&mut self, x: f32, y: f32, plant_type: u16) -> Option<NodeId> {
        let pt = self.plant_types.get(plant_type as usize)?;
        if !self.config.contains(x, y) {
            return None;
        }
        let nutrition = pt.nutrition_value;
        match self.nodes.spawn(Node::plant(x, y, plant_type, nutrition)) {
            Some(id) => Some(id),
            None => {
                self.faults.dropped_spawns += 1;
                None
            }
        }
    }

    /// Links two live plant nodes with a chain. Returns `false` when either
    /// endpoint is dead, not a plant, or the two ids match.
    pub fn add_chain(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let plant_type = match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(na), Some(nb)) if na.is_plant() && nb.is_plant() => match na.kind {
                NodeKind::Plant { plant_type } => plant_type,
                NodeKind::Fish { .. } => return false,
            },
            _ => return false,
        };
        self.chains.add(Chain {
            a,
            b,
            plant_type,
            curve_strength: self.rng.gen_range(0.05..0.3),
            curve_offset: self.rng.gen_range(0.3..0.7),
            active: true,
        });
        true
    }

    /// Spawns a fish of `fish_type` at a position. Returns `None` when the
    /// type is unknown, the position is out of bounds, or a cap is hit.
    pub fn spawn_fish(&mut self, x: f32, y: f32, fish_type: u16) -> Option<AgentId> {
        if self.fish_types.get(fish_type as usize).is_none() {
            return None;
        }
        if !self.config.contains(x, y) {
            return None;
        }
        if self.agents.len() >= self.config.max_agents {
            self.faults.dropped_spawns += 1;
            return None;
        }
        let body = match self.nodes.spawn(Node::fish_body(x, y, fish_type)) {
            Some(id) => id,
            None => {
                self.faults.dropped_spawns += 1;
                return None;
            }
        };
        let heading = self.rng.gen_range(-PI..PI);
        Some(
            self.agents
                .insert(Agent::new(body, fish_type, heading, self.tick)),
        )
    }

    /// Nearest live node within `radius` of a point, with its distance.
    /// Answers reflect the index rebuilt at the start of the last tick plus
    /// any removals since.
    #[must_use]
    pub fn nearest_node_within(&self, x: f32, y: f32, radius: f32) -> Option<(NodeId, f32)> {
        let r2 = radius * radius;
        let mut best: Option<(NodeId, f32)> = None;
        self.index.neighbors_within(x, y, radius, &mut |idx, d2| {
            let d2 = d2.into_inner();
            if d2 > r2 || !self.nodes.is_live(idx) {
                return;
            }
            if best.map_or(true, |(_, bd)| d2 < bd) {
                best = Some((idx, d2));
            }
        });
        best.map(|(id, d2)| (id, d2.sqrt()))
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn config(&self) -> &TidepoolConfig {
        &self.config
    }

    #[must_use]
    pub fn flow(&self) -> &FlowField {
        &self.flow
    }

    #[must_use]
    pub fn gas(&self) -> &GasField {
        &self.gas
    }

    #[must_use]
    pub fn nutrition(&self) -> &NutritionField {
        &self.nutrition
    }

    /// Total nutrition fish have eaten since construction.
    #[must_use]
    pub fn nutrition_consumed(&self) -> f64 {
        self.nutrition_consumed
    }

    /// Total nutrition fish have returned to the field since construction.
    #[must_use]
    pub fn nutrition_defecated(&self) -> f64 {
        self.nutrition_defecated
    }

    #[must_use]
    pub fn fault_counters(&self) -> FaultCounters {
        self.faults
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<TickSummary> {
        &self.history
    }

    #[must_use]
    pub fn visibility(&self) -> FieldVisibility {
        self.visibility
    }

    /// Presentation flags only; never affects simulation results.
    pub fn set_visibility(&mut self, visibility: FieldVisibility) {
        self.visibility = visibility;
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Heat stress takes effect at the next bleaching stage.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature.max(0.0);
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter_live()
    }

    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chains.iter_live()
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    #[must_use]
    pub fn plant_types(&self) -> &[PlantType] {
        &self.plant_types
    }

    #[must_use]
    pub fn fish_types(&self) -> &[FishType] {
        &self.fish_types
    }
}
