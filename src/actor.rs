//! Soft-Body Actor Model
//!
//! An actor is a mass-spring network: point-mass nodes joined by native
//! beams, plus the bookkeeping the scheduler needs around it (activity
//! state, bounding volumes, sleep counter, command channels, linkage set,
//! network link and per-frame diagnostics).
//!
//! Actors are shared between the control thread and the background frame
//! task as [`ActorPtr`] (`Arc<RwLock<Actor>>`). After deletion an actor is
//! tagged [`ActorState::Disposed`]; holders of a stale pointer must check the
//! tag before touching it.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::beam::{BeamLink, LinkBehavior};
use crate::collider::GroundModel;
use crate::error::{SimError, SimResult};
use crate::math::{Aabb, Real, Vec3};
use crate::netcode::RemoteState;

/// Number of command channels per actor.
pub const MAX_COMMANDS: usize = 84;

/// Shared handle to an actor.
pub type ActorPtr = Arc<RwLock<Actor>>;

// ============================================================================
// Identity and state
// ============================================================================

/// Stable per-actor identifier, unique for the scheduler's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorInstanceId(pub i32);

impl ActorInstanceId {
    /// Placeholder for "no actor"
    pub const INVALID: ActorInstanceId = ActorInstanceId(-1);

    /// True unless this is [`ActorInstanceId::INVALID`]
    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for ActorInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Activity state of an actor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorState {
    /// Integrated locally every substep
    Simulated,
    /// Kept in memory, skipped by integration
    Sleeping,
    /// Driven by remote state updates
    NetworkedOk,
    /// Remote actor that is currently hidden
    NetworkedHidden,
    /// Deleted; pending removal from every holder
    Disposed,
}

impl ActorState {
    /// Numeric code carried by state-change notifications
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Simulated => 0,
            Self::Sleeping => 1,
            Self::NetworkedOk => 2,
            Self::NetworkedHidden => 3,
            Self::Disposed => 4,
        }
    }

    /// True for states driven by a remote peer
    #[inline]
    #[must_use]
    pub fn is_networked(self) -> bool {
        matches!(self, Self::NetworkedOk | Self::NetworkedHidden)
    }
}

// ============================================================================
// Body model
// ============================================================================

/// Point mass
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// World position (m)
    pub position: Vec3,
    /// Velocity (m/s)
    pub velocity: Vec3,
    /// Force accumulator for the current substep (N)
    pub forces: Vec3,
    /// Mass (kg), always positive
    pub mass: Real,
}

impl Node {
    /// Node at rest
    #[must_use]
    pub fn new(position: Vec3, mass: Real) -> Self {
        Self {
            position,
            velocity: Vec3::zeros(),
            forces: Vec3::zeros(),
            mass,
        }
    }

    /// Set the initial velocity
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Native beam between two nodes of the same actor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// First node index
    pub node_a: usize,
    /// Second node index
    pub node_b: usize,
    /// Spring-damper law and plastic state
    pub link: BeamLink,
    /// Link behavior under compression
    pub behavior: LinkBehavior,
    /// A broken beam exerts no force
    pub broken: bool,
}

impl Beam {
    /// Generic beam with the given link
    #[must_use]
    pub fn new(node_a: usize, node_b: usize, link: BeamLink) -> Self {
        Self {
            node_a,
            node_b,
            link,
            behavior: LinkBehavior::Generic,
            broken: false,
        }
    }

    /// Beam whose rest length is the current distance of its nodes
    #[must_use]
    pub fn between(nodes: &[Node], node_a: usize, node_b: usize) -> Self {
        let rest = match (nodes.get(node_a), nodes.get(node_b)) {
            (Some(a), Some(b)) => (a.position - b.position).norm(),
            _ => 0.0,
        };
        Self::new(node_a, node_b, BeamLink::with_rest_length(rest))
    }

    /// Set the behavior
    #[must_use]
    pub fn with_behavior(mut self, behavior: LinkBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Kind of physical linkage to another actor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Tow hook
    Hook,
    /// Tie strap
    Tie,
    /// Rope
    Rope,
}

/// Weak reference to a linked actor, resolved by id at use time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorLink {
    /// Linkage kind
    pub kind: LinkKind,
    /// Linked actor
    pub target: ActorInstanceId,
}

/// One command channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandChannel {
    /// Raw input this frame
    pub player_input: Real,
    /// Value the command is currently driven at
    pub command_value: Real,
}

/// Binding of an actor to a remote stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetLink {
    /// Remote source (peer) id
    pub source_id: i32,
    /// Stream id within that source
    pub stream_id: i32,
}

/// Smoothed per-frame diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ActorDiagnostics {
    /// Node-0 acceleration summed over this frame's substeps
    pub gforces_accu: Vec3,
    /// Smoothed node-0 acceleration
    pub gforces: Vec3,
    /// Mean node position after the last frame
    pub avg_position: Vec3,
    /// Mean node position before the last frame
    pub prev_avg_position: Vec3,
    /// Mean velocity over the last frame
    pub avg_velocity: Vec3,
    /// Highest node-0 speed seen
    pub top_speed: Real,
}

// ============================================================================
// Actor
// ============================================================================

/// A simulated soft body.
#[derive(Clone, Debug)]
pub struct Actor {
    pub(crate) instance_id: ActorInstanceId,
    pub(crate) vector_index: usize,
    pub(crate) state: ActorState,
    pub(crate) sleep_counter: f64,
    /// Integrate this actor in the current frame
    pub(crate) update_physics: bool,

    /// Display name
    pub name: String,
    /// Point masses
    pub nodes: Vec<Node>,
    /// Native beams
    pub beams: Vec<Beam>,
    /// Contact surface as node triplets
    pub collision_triangles: Vec<[usize; 3]>,
    /// Node index groups, one fine collision box per group
    pub collision_groups: Vec<Vec<usize>>,
    /// Extra reach around the bounding box for contact candidates (m)
    pub collision_range: Real,
    /// Takes part in inter-actor collision
    pub collision_relevant: bool,
    /// Contact model of this actor's surface
    pub ground_model: GroundModel,

    /// Box around all nodes
    pub bounding_box: Aabb,
    /// Bounding box swept by the last frame's mean velocity
    pub predicted_bounding_box: Aabb,
    /// Fine boxes, one per collision group
    pub collision_boxes: Vec<Aabb>,
    /// Fine boxes swept by the last frame's mean velocity
    pub predicted_collision_boxes: Vec<Aabb>,

    /// Frozen by the user; skipped like a sleeping actor
    pub physics_paused: bool,
    /// Driven by AI; never goes to sleep
    pub ai_driven: bool,
    /// Forwards its commands to nearby/linked actors
    pub forward_commands: bool,
    /// Accepts forwarded commands
    pub import_commands: bool,
    /// Command channels
    pub commands: Vec<CommandChannel>,
    /// One-shot tie toggle request
    pub toggle_ties: bool,
    /// One-shot rope toggle request
    pub toggle_ropes: bool,
    /// Brake input
    pub brake: Real,
    /// Parking brake engaged
    pub parking_brake: bool,
    /// Parking brake state mirrored to towed trailers
    pub trailer_parking_brake: bool,
    /// Light state bitmask
    pub light_mask: u32,
    /// Physical linkages to other actors
    pub links: Vec<ActorLink>,
    /// Radius used for command-forwarding proximity (m)
    pub radius: Real,
    /// Can be summoned to rescue the player
    pub rescuer: bool,
    /// Spawned with the terrain; excluded from vehicle cycling
    pub preloaded_with_terrain: bool,

    /// Remote stream binding
    pub net_link: Option<NetLink>,
    /// Has a remote audience; produces outgoing state blobs
    pub remote_audience: bool,
    pub(crate) pending_remote: Option<RemoteState>,

    /// Node positions at construction, used by resets
    pub initial_positions: Vec<Vec3>,
    /// Beams at construction, before any plastic deformation
    pub initial_beams: Vec<Beam>,
    /// Smoothed diagnostics
    pub diagnostics: ActorDiagnostics,
}

impl Actor {
    /// Construct an actor from its node/beam network.
    ///
    /// Bounding volumes, radius and initial positions are derived from the
    /// nodes. Call [`Actor::validate`] (the scheduler does) before use.
    #[must_use]
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, beams: Vec<Beam>) -> Self {
        let initial_positions: Vec<Vec3> = nodes.iter().map(|n| n.position).collect();
        let bounding_box = Aabb::from_points(initial_positions.iter());
        let radius = if bounding_box.is_empty() {
            0.0
        } else {
            (bounding_box.max - bounding_box.min).norm() * 0.5
        };
        let avg = mean_position(&nodes);
        Self {
            instance_id: ActorInstanceId::INVALID,
            vector_index: 0,
            state: ActorState::Simulated,
            sleep_counter: 0.0,
            update_physics: true,
            name: name.into(),
            nodes,
            initial_beams: beams.clone(),
            beams,
            collision_triangles: Vec::new(),
            collision_groups: Vec::new(),
            collision_range: 0.02,
            collision_relevant: true,
            ground_model: GroundModel::default(),
            bounding_box,
            predicted_bounding_box: bounding_box,
            collision_boxes: Vec::new(),
            predicted_collision_boxes: Vec::new(),
            physics_paused: false,
            ai_driven: false,
            forward_commands: false,
            import_commands: false,
            commands: vec![CommandChannel::default(); MAX_COMMANDS],
            toggle_ties: false,
            toggle_ropes: false,
            brake: 0.0,
            parking_brake: false,
            trailer_parking_brake: false,
            light_mask: 0,
            links: Vec::new(),
            radius,
            rescuer: false,
            preloaded_with_terrain: false,
            net_link: None,
            remote_audience: false,
            pending_remote: None,
            initial_positions,
            diagnostics: ActorDiagnostics {
                avg_position: avg,
                prev_avg_position: avg,
                ..ActorDiagnostics::default()
            },
        }
    }

    /// Set the initial state (spawn accepts every state except `Disposed`)
    #[must_use]
    pub fn with_state(mut self, state: ActorState) -> Self {
        self.state = state;
        self
    }

    /// Set the contact surface
    #[must_use]
    pub fn with_collision_triangles(mut self, triangles: Vec<[usize; 3]>) -> Self {
        self.collision_triangles = triangles;
        self
    }

    /// Set fine collision groups (boxes are rebuilt)
    #[must_use]
    pub fn with_collision_groups(mut self, groups: Vec<Vec<usize>>) -> Self {
        self.collision_groups = groups;
        self.update_bounding_boxes(0.0);
        self
    }

    /// Opt in or out of inter-actor collision
    #[must_use]
    pub fn with_collision_relevant(mut self, relevant: bool) -> Self {
        self.collision_relevant = relevant;
        self
    }

    /// Set the contact model
    #[must_use]
    pub fn with_ground_model(mut self, ground_model: GroundModel) -> Self {
        self.ground_model = ground_model;
        self
    }

    /// Set the command-forwarding radius
    #[must_use]
    pub fn with_radius(mut self, radius: Real) -> Self {
        self.radius = radius;
        self
    }

    /// Set command forwarding/importing
    #[must_use]
    pub fn with_commands(mut self, forward: bool, import: bool) -> Self {
        self.forward_commands = forward;
        self.import_commands = import;
        self
    }

    /// Mark as AI-driven
    #[must_use]
    pub fn with_ai_driven(mut self, ai_driven: bool) -> Self {
        self.ai_driven = ai_driven;
        self
    }

    /// Bind to a remote stream
    #[must_use]
    pub fn with_net_link(mut self, source_id: i32, stream_id: i32) -> Self {
        self.net_link = Some(NetLink {
            source_id,
            stream_id,
        });
        self
    }

    /// Give the actor a remote audience
    #[must_use]
    pub fn with_remote_audience(mut self, audience: bool) -> Self {
        self.remote_audience = audience;
        self
    }

    /// Add a linkage
    #[must_use]
    pub fn with_link(mut self, kind: LinkKind, target: ActorInstanceId) -> Self {
        self.links.push(ActorLink { kind, target });
        self
    }

    /// Instance id (INVALID until spawned)
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> ActorInstanceId {
        self.instance_id
    }

    /// Position in the scheduler's actor list
    #[inline]
    #[must_use]
    pub fn vector_index(&self) -> usize {
        self.vector_index
    }

    /// Current activity state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Accumulated idle time (s)
    #[inline]
    #[must_use]
    pub fn sleep_counter(&self) -> f64 {
        self.sleep_counter
    }

    /// Whether this actor is integrated in the current frame
    #[inline]
    #[must_use]
    pub fn update_physics(&self) -> bool {
        self.update_physics
    }

    /// True once deleted
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state == ActorState::Disposed
    }

    /// Mean node position after the last frame
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.diagnostics.avg_position
    }

    /// Center used for proximity tests
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        if self.bounding_box.is_empty() {
            self.diagnostics.avg_position
        } else {
            self.bounding_box.center()
        }
    }

    /// Squared mean velocity over the last frame
    #[inline]
    #[must_use]
    pub fn velocity_sq(&self) -> Real {
        self.diagnostics.avg_velocity.norm_squared()
    }

    /// Whether `node` is a valid node index
    #[inline]
    #[must_use]
    pub fn has_node(&self, node: usize) -> bool {
        node < self.nodes.len()
    }

    /// Check that the actor is a usable body
    pub fn validate(&self) -> SimResult<()> {
        if self.nodes.is_empty() {
            return Err(SimError::InvalidActor {
                reason: "actor has no nodes",
            });
        }
        for n in &self.nodes {
            if !(n.mass > 0.0 && n.mass.is_finite()) {
                return Err(SimError::InvalidActor {
                    reason: "node mass must be positive and finite",
                });
            }
            if !n.position.iter().chain(n.velocity.iter()).all(|c| c.is_finite()) {
                return Err(SimError::InvalidActor {
                    reason: "node state must be finite",
                });
            }
        }
        let count = self.nodes.len();
        if self
            .beams
            .iter()
            .any(|b| b.node_a >= count || b.node_b >= count || b.node_a == b.node_b)
        {
            return Err(SimError::InvalidActor {
                reason: "beam references an invalid node",
            });
        }
        if self
            .collision_triangles
            .iter()
            .any(|t| t.iter().any(|&i| i >= count))
        {
            return Err(SimError::InvalidActor {
                reason: "collision triangle references an invalid node",
            });
        }
        if self
            .collision_groups
            .iter()
            .any(|g| g.iter().any(|&i| i >= count))
        {
            return Err(SimError::InvalidActor {
                reason: "collision group references an invalid node",
            });
        }
        if self.state == ActorState::Disposed {
            return Err(SimError::InvalidActor {
                reason: "actor is already disposed",
            });
        }
        Ok(())
    }

    // ========================================================================
    // Per-substep passes
    // ========================================================================

    /// Reset every force accumulator to the node's weight
    #[inline]
    pub fn prepare_forces(&mut self, gravity: &Vec3) {
        for n in &mut self.nodes {
            n.forces = gravity * n.mass;
        }
    }

    /// Accumulate native beam forces; returns the number of beams that broke
    pub fn compute_beam_forces(&mut self) -> u32 {
        let mut broken = 0;
        let nodes = &mut self.nodes;
        for beam in self.beams.iter_mut().filter(|b| !b.broken) {
            let (a, b) = (nodes[beam.node_a], nodes[beam.node_b]);
            let r = beam
                .link
                .evaluate(&a.position, &a.velocity, &b.position, &b.velocity, beam.behavior);
            nodes[beam.node_a].forces += r.force;
            nodes[beam.node_b].forces -= r.force;
            if r.broken.is_some() {
                beam.broken = true;
                broken += 1;
            }
        }
        broken
    }

    /// Semi-implicit Euler step of every node
    pub fn integrate(&mut self, dt: Real) {
        if let Some(n0) = self.nodes.first() {
            self.diagnostics.gforces_accu += n0.forces / n0.mass;
        }
        for n in &mut self.nodes {
            n.velocity += n.forces * (dt / n.mass);
            n.position += n.velocity * dt;
        }
    }

    // ========================================================================
    // Per-frame bookkeeping
    // ========================================================================

    /// Update diagnostics and bounding volumes after a frame of `substeps`
    pub fn finish_frame(&mut self, substeps: u32, dt: f64) {
        let frame_dt = substeps as f64 * dt;
        let d = &mut self.diagnostics;
        if substeps > 0 {
            d.gforces = d.gforces * 0.5 + (d.gforces_accu / substeps as Real) * 0.5;
        }
        d.gforces_accu = Vec3::zeros();

        d.avg_position = mean_position(&self.nodes);
        if frame_dt > 0.0 {
            d.avg_velocity = (d.avg_position - d.prev_avg_position) / frame_dt as Real;
        }
        d.prev_avg_position = d.avg_position;

        let speed = self.nodes.first().map_or(0.0, |n| n.velocity.norm());
        d.top_speed = d.top_speed.max(speed);

        self.update_bounding_boxes(frame_dt as Real);
    }

    /// Rebuild actual and predicted bounding volumes
    pub fn update_bounding_boxes(&mut self, frame_dt: Real) {
        let travel = self.diagnostics.avg_velocity * frame_dt;
        self.bounding_box = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
        self.predicted_bounding_box = self
            .bounding_box
            .union(&self.bounding_box.translated(&travel));

        let nodes = &self.nodes;
        self.collision_boxes = self
            .collision_groups
            .iter()
            .map(|g| Aabb::from_points(g.iter().filter_map(|&i| nodes.get(i).map(|n| &n.position))))
            .collect();
        self.predicted_collision_boxes = self
            .collision_boxes
            .iter()
            .map(|b| b.union(&b.translated(&travel)))
            .collect();
    }

    /// Forget motion history so the next frame starts from rest
    fn settle(&mut self) {
        for n in &mut self.nodes {
            n.velocity = Vec3::zeros();
            n.forces = Vec3::zeros();
        }
        let avg = mean_position(&self.nodes);
        let d = &mut self.diagnostics;
        d.avg_position = avg;
        d.prev_avg_position = avg;
        d.avg_velocity = Vec3::zeros();
        d.gforces_accu = Vec3::zeros();
        d.gforces = Vec3::zeros();
        self.update_bounding_boxes(0.0);
    }

    /// Restore the construction shape at the current mean position
    pub fn reset_on_spot(&mut self) {
        let here = mean_position(&self.nodes);
        let initial_mean = mean_of(&self.initial_positions);
        let offset = here - initial_mean;
        for (n, p) in self.nodes.iter_mut().zip(&self.initial_positions) {
            n.position = p + offset;
        }
        self.beams.clone_from(&self.initial_beams);
        self.settle();
    }

    /// Restore the construction shape and position
    pub fn reset_to_initial(&mut self) {
        for (n, p) in self.nodes.iter_mut().zip(&self.initial_positions) {
            n.position = *p;
        }
        self.beams.clone_from(&self.initial_beams);
        self.settle();
    }

    /// Translate the actor so node 0 lands on `target`
    pub fn teleport(&mut self, target: &Vec3) {
        let Some(n0) = self.nodes.first() else {
            return;
        };
        let offset = target - n0.position;
        for n in &mut self.nodes {
            n.position += offset;
        }
        self.settle();
    }

    /// Replace the node/beam network, keeping identity and linkage
    pub fn reload(&mut self, fresh: Actor) {
        self.name = fresh.name;
        self.nodes = fresh.nodes;
        self.beams = fresh.beams;
        self.collision_triangles = fresh.collision_triangles;
        self.collision_groups = fresh.collision_groups;
        self.initial_positions = fresh.initial_positions;
        self.initial_beams = fresh.initial_beams;
        self.radius = fresh.radius;
        self.diagnostics.top_speed = 0.0;
        self.settle();
    }

    /// Apply a decoded remote state
    pub fn apply_remote_state(&mut self, state: &RemoteState) {
        for (n, p) in self.nodes.iter_mut().zip(&state.positions) {
            n.position = *p;
        }
        self.brake = state.brake;
        self.light_mask = state.light_mask;
        self.diagnostics.avg_position = mean_position(&self.nodes);
        self.update_bounding_boxes(0.0);
    }

    /// Queue a remote state for the next frame
    pub(crate) fn queue_remote_state(&mut self, state: RemoteState) {
        self.pending_remote = Some(state);
    }

    /// Tag the actor as deleted and drop its transient data
    pub(crate) fn dispose(&mut self) {
        self.state = ActorState::Disposed;
        self.update_physics = false;
        self.pending_remote = None;
        self.links.clear();
    }
}

fn mean_of(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::zeros();
    }
    points.iter().sum::<Vec3>() / points.len() as Real
}

fn mean_position(nodes: &[Node]) -> Vec3 {
    if nodes.is_empty() {
        return Vec3::zeros();
    }
    nodes.iter().map(|n| n.position).sum::<Vec3>() / nodes.len() as Real
}

/// Find the actor with instance id `id`
#[must_use]
pub fn find_by_id(actors: &[ActorPtr], id: ActorInstanceId) -> Option<&ActorPtr> {
    actors.iter().find(|a| a.read().instance_id == id)
}

/// Wrap an actor into a shared handle
#[must_use]
pub fn share(actor: Actor) -> ActorPtr {
    Arc::new(RwLock::new(actor))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair(x: Real) -> Actor {
        let nodes = vec![
            Node::new(Vec3::new(x, 0.0, 0.0), 10.0),
            Node::new(Vec3::new(x + 1.0, 0.0, 0.0), 10.0),
        ];
        let beams = vec![Beam::between(&nodes, 0, 1)];
        Actor::new("pair", nodes, beams)
    }

    #[test]
    fn test_new_derives_volumes() {
        let a = pair(0.0);
        assert_eq!(a.bounding_box.min, Vec3::zeros());
        assert_eq!(a.bounding_box.max, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(a.radius, 0.5);
        assert_eq!(a.commands.len(), MAX_COMMANDS);
        assert_eq!(a.instance_id(), ActorInstanceId::INVALID);
    }

    #[test]
    fn test_validate_rejects_bad_bodies() {
        assert!(pair(0.0).validate().is_ok());
        assert!(Actor::new("empty", Vec::new(), Vec::new()).validate().is_err());
        let mut a = pair(0.0);
        a.nodes[1].mass = 0.0;
        assert!(a.validate().is_err());
        let mut a = pair(0.0);
        a.beams.push(Beam::new(0, 5, BeamLink::with_rest_length(1.0)));
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_free_fall_integration() {
        let mut a = pair(0.0);
        a.prepare_forces(&Vec3::new(0.0, -10.0, 0.0));
        a.compute_beam_forces();
        a.integrate(0.01);
        assert_relative_eq!(a.nodes[0].velocity.y, -0.1, epsilon = 1e-6);
        assert_relative_eq!(a.nodes[0].position.y, -0.001, epsilon = 1e-7);
    }

    #[test]
    fn test_beam_forces_are_opposite() {
        let mut a = pair(0.0);
        a.nodes[1].position.x = 1.1;
        a.prepare_forces(&Vec3::zeros());
        a.compute_beam_forces();
        assert!(a.nodes[0].forces.x > 0.0);
        assert_relative_eq!(a.nodes[0].forces.x, -a.nodes[1].forces.x);
    }

    #[test]
    fn test_finish_frame_averages() {
        let mut a = pair(0.0);
        for n in &mut a.nodes {
            n.position.x += 1.0;
            n.velocity.x = 2.0;
        }
        a.finish_frame(10, 0.05);
        assert_relative_eq!(a.diagnostics.avg_velocity.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(a.diagnostics.top_speed, 2.0);
        // predicted box extends one frame ahead
        assert_relative_eq!(a.predicted_bounding_box.max.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(a.bounding_box.max.x, 2.0);
    }

    #[test]
    fn test_teleport_moves_node0() {
        let mut a = pair(0.0);
        a.nodes[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        a.teleport(&Vec3::new(5.0, 5.0, 0.0));
        assert_eq!(a.nodes[0].position, Vec3::new(5.0, 5.0, 0.0));
        assert_eq!(a.nodes[1].position, Vec3::new(6.0, 5.0, 0.0));
        assert_eq!(a.nodes[0].velocity, Vec3::zeros());
        assert!(a.bounding_box.contains(&Vec3::new(5.5, 5.0, 0.0)));
    }

    #[test]
    fn test_reset_on_spot_keeps_location() {
        let mut a = pair(0.0);
        for n in &mut a.nodes {
            n.position.z += 3.0;
        }
        a.nodes[1].position.x = 4.0;
        a.beams[0].broken = true;
        a.reset_on_spot();
        assert!(!a.beams[0].broken);
        let span = (a.nodes[1].position - a.nodes[0].position).norm();
        assert_relative_eq!(span, 1.0, epsilon = 1e-6);
        assert_relative_eq!(a.nodes[0].position.z, 3.0);
    }

    #[test]
    fn test_resets_restore_undeformed_beams() {
        let mut a = pair(0.0);
        let original = a.beams[0];
        a.nodes[1].position.x = 1.3;
        a.compute_beam_forces();
        assert!(a.beams[0].link.rest_length > 1.0, "beam should have yielded");

        a.reset_to_initial();
        assert_eq!(a.beams[0], original);

        a.nodes[1].position.x = 1.3;
        a.compute_beam_forces();
        a.reset_on_spot();
        assert_eq!(a.beams[0], original);
    }

    #[test]
    fn test_reload_takes_fresh_construction_beams() {
        let mut a = pair(0.0);
        let mut fresh = pair(0.0);
        fresh.beams[0].link.strength = 5.0;
        fresh.initial_beams[0].link.strength = 5.0;
        a.reload(fresh);
        a.beams[0].link.strength = 1.0;
        a.reset_to_initial();
        assert_relative_eq!(a.beams[0].link.strength, 5.0);
    }

    #[test]
    fn test_collision_groups_boxes() {
        let a = pair(0.0).with_collision_groups(vec![vec![0], vec![1]]);
        assert_eq!(a.collision_boxes.len(), 2);
        assert!(a.collision_boxes[1].contains(&Vec3::new(1.0, 0.0, 0.0)));
        assert!(!a.collision_boxes[0].contains(&Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_dispose() {
        let mut a = pair(0.0).with_link(LinkKind::Hook, ActorInstanceId(3));
        a.dispose();
        assert!(a.is_disposed());
        assert!(a.links.is_empty());
        assert!(a.validate().is_err());
    }
}
