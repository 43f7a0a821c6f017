mod forces;
mod quadtree;

use std::f32::consts::PI;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::TagGraph;
use crate::geom::{Vec2, vec2};
use crate::util::stable_pair;

use forces::{accumulate_repulsion, resolve_collisions, separation_jitter};
use quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.72;
/// Radial step of the deterministic phyllotaxis spiral used for initial
/// placement.
const INITIAL_RADIUS_STEP: f32 = 10.0;

/// Display radius for a node: grows with the log of its item count, floored
/// so the smallest tags stay visible and draggable.
pub fn node_radius(item_count: u32) -> f32 {
    ((item_count.max(1) as f32).log2() * 4.0).max(5.0)
}

#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    pub width: f32,
    pub height: f32,
    /// Many-body charge; negative repels.
    pub repulsion_strength: f32,
    /// Keeps the inverse-square law finite at very small separations.
    pub repulsion_softening: f32,
    /// Spring rest length for link attraction.
    pub link_distance: f32,
    /// Simulation freezes once alpha decays below this floor.
    pub alpha_min: f32,
    pub alpha_decay: f32,
    /// Alpha target raised while a node is dragged, so the layout re-settles
    /// around the pin instead of freezing mid-gesture.
    pub drag_alpha_target: f32,
    /// Fraction of velocity lost after each integration.
    pub velocity_decay: f32,
    /// Padding added to node radii during collision resolution.
    pub collision_padding: f32,
    /// Collision relaxation passes per step.
    pub collision_passes: usize,
    /// Pull of the layout centroid toward the canvas center; 1 recenters
    /// fully every step.
    pub center_strength: f32,
    /// Hard cap per activation, in case alpha never decays below the floor.
    pub max_steps: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 950.0,
            height: 925.0,
            repulsion_strength: -600.0,
            repulsion_softening: 1.0,
            link_distance: 30.0,
            alpha_min: 0.001,
            // Reaches alpha_min from 1.0 in about 300 steps.
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            drag_alpha_target: 0.3,
            velocity_decay: 0.4,
            collision_padding: 2.0,
            collision_passes: 3,
            center_strength: 1.0,
            max_steps: 1000,
        }
    }
}

/// Mutable simulation state layered over one graph node.
#[derive(Clone, Copy, Debug)]
pub struct SimNode {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Pinned x, held exactly while a drag is in progress; that axis is
    /// excluded from integration.
    pub fx: Option<f32>,
    /// Pinned y, as `fx`.
    pub fy: Option<f32>,
    /// Rendered radius, also used for boundary clamping.
    pub radius: f32,
}

impl SimNode {
    fn pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    Running,
    Settled,
}

/// Per-step position snapshot for rendering collaborators.
#[derive(Clone, Debug, Serialize)]
pub struct LayoutFrame {
    /// (x, y) per node, indexed by node id.
    pub positions: Vec<(f32, f32)>,
    /// (source, target) endpoint coordinates per link, in graph link order.
    pub edges: Vec<((f32, f32), (f32, f32))>,
}

struct StepScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    locked: Vec<bool>,
}

/// Force-directed layout over a tag graph.
///
/// Owns the graph for its lifetime and advances one discrete step at a time;
/// a step is a complete mapping from (positions, velocities, pins) at t to
/// t+1 and is never re-entered. Pin mutations arrive between steps.
pub struct Simulation {
    graph: TagGraph,
    nodes: Vec<SimNode>,
    degrees: Vec<u32>,
    collision_radii: Vec<f32>,
    config: SimConfig,
    alpha: f32,
    alpha_target: f32,
    state: SimState,
    steps_taken: usize,
    scratch: StepScratch,
}

impl Simulation {
    pub fn new(graph: TagGraph, config: SimConfig) -> Self {
        let center = vec2(config.width * 0.5, config.height * 0.5);
        let golden_angle = PI * (3.0 - 5.0_f32.sqrt());

        let nodes: Vec<SimNode> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let spiral_radius = INITIAL_RADIUS_STEP * (0.5 + index as f32).sqrt();
                let angle = index as f32 * golden_angle;
                let (jx, jy) = stable_pair(&node.name);
                SimNode {
                    pos: center + vec2(angle.cos(), angle.sin()) * spiral_radius + vec2(jx, jy),
                    vel: Vec2::ZERO,
                    fx: None,
                    fy: None,
                    radius: node_radius(node.item_count),
                }
            })
            .collect();

        let mut degrees = vec![0u32; nodes.len()];
        for link in &graph.links {
            if link.source < degrees.len() && link.target < degrees.len() {
                degrees[link.source] += 1;
                degrees[link.target] += 1;
            }
        }

        let collision_radii = nodes
            .iter()
            .map(|node| node.radius + config.collision_padding)
            .collect();
        let state = if nodes.is_empty() {
            SimState::Settled
        } else {
            SimState::Running
        };

        Self {
            graph,
            nodes,
            degrees,
            collision_radii,
            config,
            alpha: 1.0,
            alpha_target: 0.0,
            state,
            steps_taken: 0,
            scratch: StepScratch {
                forces: Vec::new(),
                positions: Vec::new(),
                locked: Vec::new(),
            },
        }
    }

    pub fn graph(&self) -> &TagGraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Drag start: hold the node at (x, y) and re-heat the layout so it
    /// settles around the pin.
    pub fn pin(&mut self, node: usize, x: f32, y: f32) {
        let Some(sim_node) = self.nodes.get_mut(node) else {
            warn!(node, "pin for unknown node id");
            return;
        };
        sim_node.fx = Some(x);
        sim_node.fy = Some(y);
        sim_node.pos = vec2(x, y);
        self.alpha_target = self.config.drag_alpha_target;
        if self.state == SimState::Settled {
            self.state = SimState::Running;
            self.steps_taken = 0;
        }
    }

    /// Drag motion: move the held position.
    pub fn move_pin(&mut self, node: usize, x: f32, y: f32) {
        let Some(sim_node) = self.nodes.get_mut(node) else {
            warn!(node, "move for unknown node id");
            return;
        };
        if !sim_node.pinned() {
            debug!(node, "move for an unpinned node; pinning at the target");
        }
        sim_node.fx = Some(x);
        sim_node.fy = Some(y);
        sim_node.pos = vec2(x, y);
    }

    /// Drag end: release the node and let alpha decay back to rest.
    pub fn unpin(&mut self, node: usize) {
        let Some(sim_node) = self.nodes.get_mut(node) else {
            warn!(node, "unpin for unknown node id");
            return;
        };
        sim_node.fx = None;
        sim_node.fy = None;
        self.alpha_target = 0.0;
    }

    /// Advances the simulation one step. Returns false once settled; a
    /// settled simulation mutates nothing.
    pub fn step(&mut self) -> bool {
        if self.state == SimState::Settled {
            return false;
        }

        self.steps_taken += 1;
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

        self.apply_forces();
        self.integrate();
        self.recenter();
        self.resolve_overlaps();
        self.clamp_to_bounds();
        self.assert_pins();

        let cooled = self.alpha < self.config.alpha_min
            && self.alpha_target < self.config.alpha_min;
        if cooled || self.steps_taken >= self.config.max_steps {
            if !cooled {
                debug!(steps = self.steps_taken, "step cap reached; forcing settle");
            }
            self.state = SimState::Settled;
        }
        true
    }

    /// Steps until settled, returning the number of steps taken. Bounded by
    /// the configured step cap.
    pub fn run(&mut self) -> usize {
        let mut steps = 0;
        while self.step() {
            steps += 1;
        }
        steps
    }

    pub fn frame(&self) -> LayoutFrame {
        let positions: Vec<(f32, f32)> = self
            .nodes
            .iter()
            .map(|node| (node.pos.x, node.pos.y))
            .collect();
        let edges = self
            .graph
            .links
            .iter()
            .filter_map(|link| {
                let source = *positions.get(link.source)?;
                let target = *positions.get(link.target)?;
                Some((source, target))
            })
            .collect();
        LayoutFrame { positions, edges }
    }

    fn apply_forces(&mut self) {
        let count = self.nodes.len();
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(count, Vec2::ZERO);
        scratch.positions.clear();
        scratch.positions.extend(self.nodes.iter().map(|node| node.pos));

        let repulsion = self.config.repulsion_strength.abs() * self.alpha;
        if count > 1
            && let Some(tree) = QuadNode::build(&scratch.positions)
        {
            for (index, force) in scratch.forces.iter_mut().enumerate() {
                accumulate_repulsion(
                    &tree,
                    index,
                    &scratch.positions,
                    repulsion,
                    self.config.repulsion_softening,
                    BARNES_HUT_THETA,
                    force,
                );
            }
        }

        // Link attraction toward the rest length. Deliberately weight-agnostic;
        // the degree bias keeps hubs from being yanked around by their leaves.
        for link in &self.graph.links {
            let (source, target) = (link.source, link.target);
            if source >= count || target >= count || source == target {
                continue;
            }

            let delta = scratch.positions[target] - scratch.positions[source];
            let distance_sq = delta.length_sq();
            let (distance, direction) = if distance_sq > 1e-8 {
                let length = distance_sq.sqrt();
                (length, delta / length)
            } else {
                (1e-4, separation_jitter(source, target))
            };

            let degree_source = self.degrees[source].max(1) as f32;
            let degree_target = self.degrees[target].max(1) as f32;
            let strength = 1.0 / degree_source.min(degree_target);
            let bias = degree_source / (degree_source + degree_target);
            let pull = (distance - self.config.link_distance) * strength * self.alpha;

            scratch.forces[target] -= direction * (pull * bias);
            scratch.forces[source] += direction * (pull * (1.0 - bias));
        }
    }

    fn integrate(&mut self) {
        let keep = 1.0 - self.config.velocity_decay;
        for (node, force) in self.nodes.iter_mut().zip(self.scratch.forces.iter()) {
            node.vel += *force;
            if node.fx.is_some() {
                node.vel.x = 0.0;
            }
            if node.fy.is_some() {
                node.vel.y = 0.0;
            }
            node.pos += node.vel;
            node.vel *= keep;
        }
    }

    /// Translates the whole layout so its centroid drifts toward the canvas
    /// center. Operates on positions, not velocities.
    fn recenter(&mut self) {
        let count = self.nodes.len();
        if count == 0 || self.config.center_strength <= 0.0 {
            return;
        }
        let mut centroid = Vec2::ZERO;
        for node in &self.nodes {
            centroid += node.pos;
        }
        centroid /= count as f32;

        let center = vec2(self.config.width * 0.5, self.config.height * 0.5);
        let shift = (centroid - center) * self.config.center_strength;
        if shift.length_sq() < 1e-9 {
            return;
        }
        for node in &mut self.nodes {
            node.pos -= shift;
        }
    }

    fn resolve_overlaps(&mut self) {
        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.positions.extend(self.nodes.iter().map(|node| node.pos));
        scratch.locked.clear();
        scratch.locked.extend(self.nodes.iter().map(SimNode::pinned));

        resolve_collisions(
            &mut scratch.positions,
            &self.collision_radii,
            &scratch.locked,
            self.config.collision_passes,
        );

        for (node, &pos) in self.nodes.iter_mut().zip(scratch.positions.iter()) {
            node.pos = pos;
        }
    }

    fn clamp_to_bounds(&mut self) {
        for node in &mut self.nodes {
            let radius = node.radius;
            node.pos.x = node.pos.x.clamp(radius, (self.config.width - radius).max(radius));
            node.pos.y = node.pos.y.clamp(radius, (self.config.height - radius).max(radius));
        }
    }

    /// Pinned axes are forced to their pin values after every other mutation
    /// in the step, so a pinned node reads back exactly where it was held.
    fn assert_pins(&mut self) {
        for node in &mut self.nodes {
            if let Some(fx) = node.fx {
                node.pos.x = fx;
                node.vel.x = 0.0;
            }
            if let Some(fy) = node.fy {
                node.pos.y = fy;
                node.vel.y = 0.0;
            }
        }
    }
}
