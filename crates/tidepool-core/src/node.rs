//! Organism nodes and the chains that connect them.
//!
//! Every physical thing in the tank is a node: each plant is a graph of
//! nodes, each fish owns exactly one body node. Nodes live in a slot arena
//! addressed by plain indices; freed slots are reused, so a held [`NodeId`]
//! can go stale. Stale references are a recoverable fault: holders must check
//! [`NodeArena::is_live`] and repair by deactivating themselves, never by
//! panicking.

use serde::{Deserialize, Serialize};

/// Plain index into the node arena. May dangle after the node dies; resolve
/// through [`NodeArena::get`] before use.
pub type NodeId = usize;

/// Plain index into the chain arena.
pub type ChainId = usize;

/// What a node is part of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Plant { plant_type: u16 },
    Fish { fish_type: u16 },
}

/// One point-mass in the tank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub kind: NodeKind,
    pub active: bool,
    pub age: u32,
    /// Branches already sprouted from this node (plants only).
    pub branches: u8,
    pub corpse: bool,
    /// Ticks until a corpse node is removed.
    pub decay_timer: u32,
    /// Ticks during which this node cannot be eaten or targeted.
    pub seed_immunity: u32,
    /// Energy remaining in the node; corpses are consumed from this pool.
    pub stored_nutrition: f32,
    /// Heat-bleached nodes stop producing oxygen but otherwise live on.
    pub bleached: bool,
}

impl Node {
    #[must_use]
    pub fn plant(x: f32, y: f32, plant_type: u16, nutrition: f32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            kind: NodeKind::Plant { plant_type },
            active: true,
            age: 0,
            branches: 0,
            corpse: false,
            decay_timer: 0,
            seed_immunity: 0,
            stored_nutrition: nutrition,
            bleached: false,
        }
    }

    #[must_use]
    pub fn fish_body(x: f32, y: f32, fish_type: u16) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            kind: NodeKind::Fish { fish_type },
            active: true,
            age: 0,
            branches: 0,
            corpse: false,
            decay_timer: 0,
            seed_immunity: 0,
            stored_nutrition: 0.0,
            bleached: false,
        }
    }

    #[must_use]
    pub fn is_plant(&self) -> bool {
        matches!(self.kind, NodeKind::Plant { .. })
    }

    /// A plant node that a grazer may currently eat.
    #[must_use]
    pub fn is_edible_plant(&self) -> bool {
        self.is_plant() && !self.corpse && self.seed_immunity == 0
    }
}

/// Fixed-capacity slot arena with free-list reuse.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<Node>,
    free: Vec<u32>,
    capacity: usize,
}

impl NodeArena {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity.min(1_024)),
            free: Vec::new(),
            capacity,
        }
    }

    /// Number of slots ever allocated, live or not. Valid ids are `0..len()`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// True when `id` names an in-range, active node.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id).map_or(false, |n| n.active)
    }

    /// Resolves `id` to a live node, or `None` for stale or dead references.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).filter(|n| n.active)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id).filter(|n| n.active)
    }

    /// Adds a node, reusing a freed slot when one exists. Returns `None`
    /// when the arena is at capacity; callers treat that as a silent drop.
    pub fn spawn(&mut self, node: Node) -> Option<NodeId> {
        if let Some(slot) = self.free.pop() {
            let id = slot as usize;
            self.nodes[id] = node;
            return Some(id);
        }
        if self.nodes.len() >= self.capacity {
            return None;
        }
        self.nodes.push(node);
        Some(self.nodes.len() - 1)
    }

    /// Deactivates a node and recycles its slot. Deactivating a dead or
    /// out-of-range id is a no-op.
    pub fn deactivate(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            if node.active {
                node.active = false;
                self.free.push(id as u32);
            }
        }
    }

    /// Iterates `(id, node)` over live nodes only.
    pub fn iter_live(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.active)
    }

    /// Raw slot access, active or not. Used when building index snapshots.
    #[must_use]
    pub fn slot(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Snapshot of `(x, y, active)` per slot, in id order, for index rebuild.
    pub fn fill_positions(&self, out: &mut Vec<(f32, f32, bool)>) {
        out.clear();
        out.extend(self.nodes.iter().map(|n| (n.x, n.y, n.active)));
    }
}

/// Structural link between two plant nodes. Purely visual apart from its
/// lifetime: a chain dies the moment either endpoint does.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Chain {
    pub a: NodeId,
    pub b: NodeId,
    pub plant_type: u16,
    /// How far the rendered curve bows away from the straight segment.
    pub curve_strength: f32,
    /// Where along the segment the bow peaks, `0..1`.
    pub curve_offset: f32,
    pub active: bool,
}

/// Slot arena for chains, same reuse discipline as [`NodeArena`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainArena {
    chains: Vec<Chain>,
    free: Vec<u32>,
}

impl ChainArena {
    pub fn add(&mut self, chain: Chain) -> ChainId {
        if let Some(slot) = self.free.pop() {
            let id = slot as usize;
            self.chains[id] = chain;
            return id;
        }
        self.chains.push(chain);
        self.chains.len() - 1
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.chains.len() - self.free.len()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chains
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active)
    }

    /// Removes every chain touching `node`. Called whenever a node dies so
    /// no chain ever outlives an endpoint.
    pub fn remove_for_node(&mut self, node: NodeId) {
        for (id, chain) in self.chains.iter_mut().enumerate() {
            if chain.active && (chain.a == node || chain.b == node) {
                chain.active = false;
                self.free.push(id as u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_reuses_freed_slots() {
        let mut arena = NodeArena::with_capacity(8);
        let a = arena.spawn(Node::plant(0.0, 0.0, 0, 0.5)).unwrap();
        let b = arena.spawn(Node::plant(1.0, 0.0, 0, 0.5)).unwrap();
        arena.deactivate(a);
        let c = arena.spawn(Node::plant(2.0, 0.0, 0, 0.5)).unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(arena.live_count(), 2);
    }

    #[test]
    fn spawn_at_capacity_returns_none() {
        let mut arena = NodeArena::with_capacity(2);
        assert!(arena.spawn(Node::plant(0.0, 0.0, 0, 0.5)).is_some());
        assert!(arena.spawn(Node::plant(1.0, 0.0, 0, 0.5)).is_some());
        assert!(arena.spawn(Node::plant(2.0, 0.0, 0, 0.5)).is_none());
    }

    #[test]
    fn stale_id_resolves_to_none() {
        let mut arena = NodeArena::with_capacity(4);
        let id = arena.spawn(Node::fish_body(0.0, 0.0, 0)).unwrap();
        arena.deactivate(id);
        assert!(!arena.is_live(id));
        assert!(arena.get(id).is_none());
        assert!(arena.get(999).is_none());
    }

    #[test]
    fn double_deactivate_is_harmless() {
        let mut arena = NodeArena::with_capacity(4);
        let id = arena.spawn(Node::plant(0.0, 0.0, 0, 0.5)).unwrap();
        arena.deactivate(id);
        arena.deactivate(id);
        let again = arena.spawn(Node::plant(1.0, 1.0, 0, 0.5)).unwrap();
        assert_eq!(again, id);
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn chains_die_with_either_endpoint() {
        let mut chains = ChainArena::default();
        chains.add(Chain {
            a: 0,
            b: 1,
            plant_type: 0,
            curve_strength: 0.1,
            curve_offset: 0.5,
            active: true,
        });
        chains.add(Chain {
            a: 1,
            b: 2,
            plant_type: 0,
            curve_strength: 0.1,
            curve_offset: 0.5,
            active: true,
        });
        chains.add(Chain {
            a: 3,
            b: 4,
            plant_type: 0,
            curve_strength: 0.1,
            curve_offset: 0.5,
            active: true,
        });
        chains.remove_for_node(1);
        assert_eq!(chains.live_count(), 1);
        let survivors: Vec<_> = chains.iter_live().map(|(_, c)| (c.a, c.b)).collect();
        assert_eq!(survivors, vec![(3, 4)]);
    }

    #[test]
    fn seed_immunity_blocks_edibility() {
        let mut node = Node::plant(0.0, 0.0, 0, 0.5);
        node.seed_immunity = 10;
        assert!(!node.is_edible_plant());
        node.seed_immunity = 0;
        assert!(node.is_edible_plant());
        node.corpse = true;
        assert!(!node.is_edible_plant());
    }
}
