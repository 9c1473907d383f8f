mod forces;
mod octree;

use std::collections::{HashMap, VecDeque};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::EntityModel;
use crate::util::stable_direction;
use forces::{
    CollisionParams, RepulsionParams, accumulate_collision_pairs, accumulate_repulsion_for_node,
};
use octree::OctNode;

/// Ticks after a reheat before low velocity alone may end the run.
const MIN_TICKS_BEFORE_REST: u32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub repulsion: f32,
    pub repulsion_softening: f32,
    pub link_distance: f32,
    pub link_strength: f32,
    pub center_strength: f32,
    pub collision_strength: f32,
    pub collision_radius_scale: f32,
    pub velocity_decay: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub reheat_alpha: f32,
    pub growth_alpha: f32,
    pub cooldown_ticks: u32,
    pub settle_speed: f32,
    pub max_speed: f32,
    pub seed_jitter: f32,
    pub theta: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion: 3000.0,
            repulsion_softening: 100.0,
            link_distance: 30.0,
            link_strength: 1.0,
            center_strength: 0.02,
            collision_strength: 0.7,
            collision_radius_scale: 4.0,
            velocity_decay: 0.4,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            reheat_alpha: 1.0,
            growth_alpha: 0.25,
            cooldown_ticks: 1000,
            settle_speed: 0.01,
            max_speed: 40.0,
            seed_jitter: 6.0,
            theta: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutPhase {
    Cold,
    Running,
    Settled,
    Reheated,
}

impl LayoutPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Running => "running",
            Self::Settled => "settled",
            Self::Reheated => "reheated",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

#[derive(Clone, Debug)]
struct Body {
    id: String,
    position: Vec3,
    velocity: Vec3,
    radius: f32,
    pinned: Option<Vec3>,
}

#[derive(Default)]
struct Scratch {
    impulses: Vec<Vec3>,
    positions: Vec<Vec3>,
    radii: Vec<f32>,
}

/// Velocity-damped 3D force simulation over the entity model's nodes.
///
/// Bodies are index-aligned with the [`EntityModel`] passed to the last
/// [`LayoutEngine::sync`]. Positions survive syncs by id, so growth only
/// adds bodies and re-injects a little energy instead of restarting.
pub struct LayoutEngine {
    config: LayoutConfig,
    bodies: Vec<Body>,
    edges: Vec<(usize, usize, f32)>,
    degrees: Vec<usize>,
    alpha: f32,
    phase: LayoutPhase,
    ticks_since_reheat: u32,
    scratch: Scratch,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            edges: Vec::new(),
            degrees: Vec::new(),
            alpha: 1.0,
            phase: LayoutPhase::Cold,
            ticks_since_reheat: 0,
            scratch: Scratch::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_repulsion(&mut self, repulsion: f32) {
        self.config.repulsion = repulsion.max(0.0);
    }

    pub fn set_link_distance(&mut self, distance: f32) {
        self.config.link_distance = distance.max(1.0);
    }

    pub fn set_velocity_decay(&mut self, decay: f32) {
        self.config.velocity_decay = decay.clamp(0.0, 0.95);
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, LayoutPhase::Settled)
    }

    /// Position of the body at `index`, `None` when unknown or not finite.
    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.bodies
            .get(index)
            .map(|body| body.position)
            .filter(|position| position.is_finite())
    }

    pub fn position_of(&self, id: &str) -> Option<Vec3> {
        let index = self.bodies.iter().position(|body| body.id == id)?;
        self.position(index)
    }

    /// Copy of every known position, safe to hold across frames.
    pub fn export_positions(&self) -> HashMap<String, Vec3> {
        self.bodies
            .iter()
            .filter(|body| body.position.is_finite())
            .map(|body| (body.id.clone(), body.position))
            .collect()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.edges.clear();
        self.degrees.clear();
        self.alpha = 1.0;
        self.ticks_since_reheat = 0;
        self.set_phase(LayoutPhase::Cold);
    }

    /// Restores full energy without touching positions.
    pub fn reheat(&mut self) {
        self.reheat_to(self.config.reheat_alpha);
    }

    /// Raises the energy to at least `alpha`.
    pub fn reheat_to(&mut self, alpha: f32) {
        if self.bodies.is_empty() {
            return;
        }
        self.alpha = self.alpha.max(alpha.clamp(0.0, 1.0));
        self.ticks_since_reheat = 0;
        if self.phase != LayoutPhase::Cold {
            self.set_phase(LayoutPhase::Reheated);
        }
    }

    /// Fixes a body in place; it keeps pushing and pulling others.
    pub fn pin(&mut self, id: &str, position: Vec3) -> bool {
        if !position.is_finite() {
            return false;
        }
        let Some(body) = self.bodies.iter_mut().find(|body| body.id == id) else {
            return false;
        };
        body.pinned = Some(position);
        body.position = position;
        body.velocity = Vec3::ZERO;
        true
    }

    pub fn unpin(&mut self, id: &str) -> bool {
        self.bodies
            .iter_mut()
            .find(|body| body.id == id)
            .is_some_and(|body| body.pinned.take().is_some())
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.bodies
            .iter()
            .any(|body| body.id == id && body.pinned.is_some())
    }

    /// Re-aligns bodies with `model`. Known ids keep position, velocity and
    /// pin; new ids are seeded next to an already placed neighbour, or just
    /// outside the current extent when they have none.
    pub fn sync(&mut self, model: &EntityModel, radii: &[f32]) -> SyncReport {
        let mut prior = std::mem::take(&mut self.bodies)
            .into_iter()
            .map(|body| (body.id.clone(), body))
            .collect::<HashMap<_, _>>();
        let prior_count = prior.len();

        let scale = self.config.collision_radius_scale.max(0.0);
        let mut bodies = Vec::with_capacity(model.len());
        let mut placed = vec![false; model.len()];
        let mut retained = 0usize;

        for (index, entity) in model.nodes.iter().enumerate() {
            let radius = radii.get(index).copied().unwrap_or(1.0) * scale;
            if let Some(mut body) = prior.remove(entity.id()) {
                body.radius = radius;
                placed[index] = body.position.is_finite();
                retained += 1;
                bodies.push(body);
                continue;
            }

            let stored = entity.record.stored_position().map(Vec3::from_array);
            placed[index] = stored.is_some();
            bodies.push(Body {
                id: entity.id().to_owned(),
                position: stored.unwrap_or(Vec3::NAN),
                velocity: Vec3::ZERO,
                radius,
                pinned: None,
            });
        }

        self.bodies = bodies;
        self.seed_unplaced(model, &mut placed);

        self.edges = model
            .edges
            .iter()
            .filter(|edge| edge.source != edge.target)
            .map(|edge| (edge.source, edge.target, edge.weight.clamp(0.0, 10.0)))
            .collect();
        self.degrees = model.nodes.iter().map(|entity| entity.connections).collect();

        let report = SyncReport {
            added: model.len() - retained,
            removed: prior_count - retained,
        };

        if report.added > 0 || report.removed > 0 {
            debug!(added = report.added, removed = report.removed, "layout synced");
            if retained == 0 {
                self.alpha = 1.0;
                self.ticks_since_reheat = 0;
                self.set_phase(LayoutPhase::Cold);
            } else {
                self.reheat_to(self.config.growth_alpha);
            }
        }
        if self.bodies.is_empty() {
            self.set_phase(LayoutPhase::Cold);
        }

        report
    }

    fn seed_unplaced(&mut self, model: &EntityModel, placed: &mut [bool]) {
        let mut queue = placed
            .iter()
            .enumerate()
            .filter_map(|(index, &is_placed)| is_placed.then_some(index))
            .collect::<VecDeque<_>>();

        loop {
            while let Some(anchor) = queue.pop_front() {
                let anchor_position = self.bodies[anchor].position;
                for &neighbor in model.neighbors.get(anchor).into_iter().flatten() {
                    if placed[neighbor] {
                        continue;
                    }
                    self.bodies[neighbor].position = anchor_position
                        + stable_direction(&self.bodies[neighbor].id) * self.config.seed_jitter;
                    placed[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }

            let Some(next) = placed.iter().position(|is_placed| !is_placed) else {
                break;
            };

            let direction = stable_direction(&self.bodies[next].id);
            let heritage = model
                .generation_source_index(next)
                .filter(|&source| placed[source])
                .map(|source| self.bodies[source].position);
            self.bodies[next].position = match heritage {
                Some(anchor) => anchor + direction * self.config.seed_jitter,
                None => self.periphery_seed(placed, direction),
            };
            placed[next] = true;
            queue.push_back(next);
        }
    }

    fn periphery_seed(&self, placed: &[bool], direction: Vec3) -> Vec3 {
        let mut centroid = Vec3::ZERO;
        let mut count = 0usize;
        for (body, _) in self.bodies.iter().zip(placed).filter(|(_, is_placed)| **is_placed) {
            centroid += body.position;
            count += 1;
        }
        if count == 0 {
            return direction * (self.config.seed_jitter * 0.5);
        }
        centroid /= count as f32;

        let extent = self
            .bodies
            .iter()
            .zip(placed)
            .filter(|(_, is_placed)| **is_placed)
            .map(|(body, _)| body.position.distance(centroid) + body.radius)
            .fold(0.0_f32, f32::max);
        centroid + direction * (extent + self.config.link_distance)
    }

    fn set_phase(&mut self, phase: LayoutPhase) {
        if self.phase != phase {
            debug!(from = self.phase.label(), to = phase.label(), "layout phase");
            self.phase = phase;
        }
    }

    /// Advances the simulation one tick. Returns whether anything moved.
    pub fn step(&mut self) -> bool {
        let node_count = self.bodies.len();
        if node_count == 0 {
            return false;
        }

        for (index, body) in self.bodies.iter_mut().enumerate() {
            if !body.position.is_finite() {
                body.position = stable_direction(&body.id) * self.config.seed_jitter
                    + Vec3::splat(index as f32 * 0.001);
                body.velocity = Vec3::ZERO;
            }
        }

        if node_count < 2 {
            for body in &mut self.bodies {
                body.velocity = Vec3::ZERO;
                if let Some(pin) = body.pinned {
                    body.position = pin;
                }
            }
            self.set_phase(LayoutPhase::Settled);
            return false;
        }

        if self.phase == LayoutPhase::Settled {
            return false;
        }
        self.set_phase(LayoutPhase::Running);

        let config = &self.config;
        self.alpha += (0.0 - self.alpha) * config.alpha_decay.clamp(0.0, 1.0);
        let alpha = self.alpha;

        let scratch = &mut self.scratch;
        scratch.impulses.clear();
        scratch.impulses.resize(node_count, Vec3::ZERO);
        scratch.positions.clear();
        scratch.radii.clear();
        let mut max_radius = 0.0_f32;
        for body in &self.bodies {
            scratch.positions.push(body.position);
            scratch.radii.push(body.radius);
            max_radius = max_radius.max(body.radius);
        }

        let impulses = &mut scratch.impulses;
        let positions = &scratch.positions;
        let radii = &scratch.radii;

        if let Some(tree) = OctNode::build(positions) {
            let params = RepulsionParams {
                strength: config.repulsion * alpha,
                softening: config.repulsion_softening.max(0.01),
                theta: config.theta,
            };
            for (index, impulse) in impulses.iter_mut().enumerate() {
                accumulate_repulsion_for_node(&tree, index, positions, params, impulse);
            }

            let max_collision_distance = max_radius * 2.0;
            if max_collision_distance > 0.0 && config.collision_strength > 0.0 {
                accumulate_collision_pairs(
                    &tree,
                    &tree,
                    true,
                    positions,
                    radii,
                    CollisionParams {
                        strength: config.collision_strength,
                        max_distance_sq: max_collision_distance * max_collision_distance,
                    },
                    impulses,
                );
            }
        }

        for &(source, target, weight) in &self.edges {
            if source >= node_count || target >= node_count {
                continue;
            }

            let source_body = &self.bodies[source];
            let target_body = &self.bodies[target];
            let delta = (target_body.position + target_body.velocity)
                - (source_body.position + source_body.velocity);
            let distance = delta.length();
            if distance <= 0.0001 {
                continue;
            }

            let source_degree = self.degrees[source].max(1) as f32;
            let target_degree = self.degrees[target].max(1) as f32;
            let strength =
                config.link_strength * weight / source_degree.min(target_degree);
            let correction =
                delta * ((distance - config.link_distance) / distance * alpha * strength);
            let bias = source_degree / (source_degree + target_degree);

            impulses[target] -= correction * bias;
            impulses[source] += correction * (1.0 - bias);
        }

        let center_pull = config.center_strength * alpha;
        let friction = 1.0 - config.velocity_decay.clamp(0.0, 0.95);
        let max_speed_sq = config.max_speed * config.max_speed;
        let mut peak_speed_sq = 0.0_f32;

        for (body, impulse) in self.bodies.iter_mut().zip(impulses.iter()) {
            if let Some(pin) = body.pinned {
                body.position = pin;
                body.velocity = Vec3::ZERO;
                continue;
            }

            let mut velocity = (body.velocity + *impulse - body.position * center_pull) * friction;
            let speed_sq = velocity.length_squared();
            if !speed_sq.is_finite() {
                velocity = Vec3::ZERO;
            } else if speed_sq > max_speed_sq {
                velocity *= config.max_speed / speed_sq.sqrt();
            }

            body.velocity = velocity;
            body.position += velocity;
            peak_speed_sq = peak_speed_sq.max(velocity.length_squared());
        }

        self.ticks_since_reheat = self.ticks_since_reheat.saturating_add(1);
        let cooled = self.alpha < config.alpha_min
            || self.ticks_since_reheat >= config.cooldown_ticks
            || (self.ticks_since_reheat >= MIN_TICKS_BEFORE_REST
                && peak_speed_sq < config.settle_speed * config.settle_speed);
        if cooled {
            for body in &mut self.bodies {
                body.velocity = Vec3::ZERO;
            }
            self.set_phase(LayoutPhase::Settled);
        }

        peak_speed_sq > 0.0
    }
}
