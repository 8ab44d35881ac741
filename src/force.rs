//! Free Forces
//!
//! Auxiliary forces that are not part of any single actor's beam network:
//! constant pushes, pulls toward a point or toward another node, and
//! halfbeams (spring-damper links between nodes of two actors with the same
//! yield/break law as native beams).
//!
//! The [`FreeForceTable`] keeps forces in insertion order and applies each
//! exactly once per substep, sequentially: a halfbeam that yields or breaks
//! changes what later entries see.
//!
//! # Requests
//!
//! Forces are created from a [`FreeForceRequest`] that names nodes by
//! `(actor id, node index)`. The request is resolved and checked completely
//! before the table changes; a failed add/modify leaves the table as it was.

use std::fmt;

use crate::actor::{find_by_id, ActorInstanceId, ActorPtr};
use crate::beam::{BeamLink, LinkBehavior};
use crate::error::{SimError, SimResult};
use crate::event::{EventCollector, FreeForceActivity, SimEvent};
use crate::math::{safe_normalize, Real, Vec3};

// ============================================================================
// Identifiers and requests
// ============================================================================

/// Caller-assigned free-force identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FreeForceId(pub i32);

impl fmt::Display for FreeForceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node named by actor id and node index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Owning actor
    pub actor: ActorInstanceId,
    /// Node index within the actor
    pub node: usize,
}

impl NodeRef {
    /// Create a node reference
    #[inline]
    #[must_use]
    pub const fn new(actor: ActorInstanceId, node: usize) -> Self {
        Self { actor, node }
    }
}

/// Halfbeam construction parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfbeamParams {
    /// Stiffness (N/m)
    pub spring: Real,
    /// Damping (N·s/m)
    pub damping: Real,
    /// Yield stress, both directions
    pub deform: Real,
    /// Breaking strength (N)
    pub strength: Real,
    /// Visual diameter (m)
    pub diameter: Real,
    /// Plastic coefficient
    pub plastic_coef: Real,
}

impl Default for HalfbeamParams {
    fn default() -> Self {
        Self {
            spring: BeamLink::DEFAULT_SPRING,
            damping: BeamLink::DEFAULT_DAMPING,
            deform: BeamLink::DEFAULT_DEFORM,
            strength: BeamLink::DEFAULT_STRENGTH,
            diameter: BeamLink::DEFAULT_DIAMETER,
            plastic_coef: 0.0,
        }
    }
}

/// Variant payload of a request
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FreeForceSpec {
    /// Fixed force along `direction` (normalized on insertion)
    Constant {
        /// Direction, any non-zero length
        direction: Vec3,
        /// Force magnitude (N)
        magnitude: Real,
    },
    /// Pull toward a fixed point
    TowardsCoords {
        /// Target point
        coords: Vec3,
        /// Force magnitude (N)
        magnitude: Real,
    },
    /// Pull toward another node (possibly on the same actor)
    TowardsNode {
        /// Target node
        target: NodeRef,
        /// Force magnitude (N)
        magnitude: Real,
    },
    /// Spring-damper link to another node
    Halfbeam {
        /// Target node
        target: NodeRef,
        /// Generic or rope
        behavior: LinkBehavior,
        /// Link parameters
        params: HalfbeamParams,
    },
}

/// Add/modify request
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreeForceRequest {
    /// Force id
    pub id: FreeForceId,
    /// Node the force acts on
    pub base: NodeRef,
    /// Variant and parameters
    pub spec: FreeForceSpec,
}

// ============================================================================
// Live forces
// ============================================================================

/// Resolved node: a shared actor handle plus a node index
#[derive(Clone, Debug)]
pub struct Anchor {
    actor: ActorPtr,
    actor_id: ActorInstanceId,
    node: usize,
}

impl Anchor {
    fn resolve(actors: &[ActorPtr], r: NodeRef) -> SimResult<Self> {
        let ptr = find_by_id(actors, r.actor).ok_or(SimError::ActorNotFound { id: r.actor })?;
        let actor = ptr.read();
        if actor.is_disposed() {
            return Err(SimError::ActorDisposed { id: r.actor });
        }
        if !actor.has_node(r.node) {
            return Err(SimError::NodeOutOfRange {
                actor: r.actor,
                node: r.node,
                count: actor.nodes.len(),
            });
        }
        drop(actor);
        Ok(Self {
            actor: ptr.clone(),
            actor_id: r.actor,
            node: r.node,
        })
    }

    /// Referenced actor
    #[inline]
    #[must_use]
    pub fn actor_id(&self) -> ActorInstanceId {
        self.actor_id
    }

    /// Referenced node index
    #[inline]
    #[must_use]
    pub fn node(&self) -> usize {
        self.node
    }

    /// Position and velocity of the node, if the reference is still valid
    fn read_state(&self) -> Option<(Vec3, Vec3)> {
        let actor = self.actor.read();
        if actor.is_disposed() {
            return None;
        }
        actor.nodes.get(self.node).map(|n| (n.position, n.velocity))
    }

    fn is_valid(&self) -> bool {
        self.read_state().is_some()
    }
}

/// Live variant of a free force
#[derive(Clone, Debug)]
pub enum FreeForceKind {
    /// Inert; a broken halfbeam
    Dummy,
    /// Fixed force along a unit direction
    Constant {
        /// Unit direction
        direction: Vec3,
        /// Magnitude (N)
        magnitude: Real,
    },
    /// Pull toward a fixed point
    TowardsCoords {
        /// Target point
        coords: Vec3,
        /// Magnitude (N)
        magnitude: Real,
    },
    /// Pull toward a live node
    TowardsNode {
        /// Target node
        target: Anchor,
        /// Magnitude (N)
        magnitude: Real,
    },
    /// Spring-damper link to a live node
    Halfbeam {
        /// Target node
        target: Anchor,
        /// Link state (rest length and thresholds change on yield)
        link: BeamLink,
        /// Generic or rope
        behavior: LinkBehavior,
        /// Stress of the last evaluation
        stress: Real,
    },
}

/// Free-force type code: inert.
pub const FREE_FORCE_DUMMY: u8 = 0;
/// Free-force type code: constant.
pub const FREE_FORCE_CONSTANT: u8 = 1;
/// Free-force type code: towards coordinates.
pub const FREE_FORCE_TOWARDS_COORDS: u8 = 2;
/// Free-force type code: towards node.
pub const FREE_FORCE_TOWARDS_NODE: u8 = 3;
/// Free-force type code: generic halfbeam.
pub const FREE_FORCE_HALFBEAM_GENERIC: u8 = 4;
/// Free-force type code: rope halfbeam.
pub const FREE_FORCE_HALFBEAM_ROPE: u8 = 5;

/// A live free force
#[derive(Clone, Debug)]
pub struct FreeForce {
    id: FreeForceId,
    base: Anchor,
    kind: FreeForceKind,
}

impl FreeForce {
    /// Resolve and check a request against the live actor list
    pub fn from_request(request: &FreeForceRequest, actors: &[ActorPtr]) -> SimResult<Self> {
        let base = Anchor::resolve(actors, request.base)?;
        let kind = match request.spec {
            FreeForceSpec::Constant { direction, magnitude } => {
                let direction = safe_normalize(&direction).ok_or(SimError::InvalidFreeForce {
                    id: request.id,
                    reason: "constant force needs a non-zero direction",
                })?;
                FreeForceKind::Constant { direction, magnitude }
            }
            FreeForceSpec::TowardsCoords { coords, magnitude } => {
                FreeForceKind::TowardsCoords { coords, magnitude }
            }
            FreeForceSpec::TowardsNode { target, magnitude } => FreeForceKind::TowardsNode {
                target: Anchor::resolve(actors, target)?,
                magnitude,
            },
            FreeForceSpec::Halfbeam {
                target,
                behavior,
                params,
            } => {
                let target = Anchor::resolve(actors, target)?;
                let (p1, _) = base.read_state().ok_or(SimError::ActorDisposed {
                    id: base.actor_id,
                })?;
                let (p2, _) = target.read_state().ok_or(SimError::ActorDisposed {
                    id: target.actor_id,
                })?;
                let link = BeamLink::new(
                    (p1 - p2).norm(),
                    params.spring,
                    params.damping,
                    params.deform,
                    params.strength,
                )
                .with_plastic_coef(params.plastic_coef)
                .with_diameter(params.diameter);
                FreeForceKind::Halfbeam {
                    target,
                    link,
                    behavior,
                    stress: 0.0,
                }
            }
        };
        Ok(Self {
            id: request.id,
            base,
            kind,
        })
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> FreeForceId {
        self.id
    }

    /// Node the force acts on
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Anchor {
        &self.base
    }

    /// Live variant
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &FreeForceKind {
        &self.kind
    }

    /// Numeric type code
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match &self.kind {
            FreeForceKind::Dummy => FREE_FORCE_DUMMY,
            FreeForceKind::Constant { .. } => FREE_FORCE_CONSTANT,
            FreeForceKind::TowardsCoords { .. } => FREE_FORCE_TOWARDS_COORDS,
            FreeForceKind::TowardsNode { .. } => FREE_FORCE_TOWARDS_NODE,
            FreeForceKind::Halfbeam {
                behavior: LinkBehavior::Generic,
                ..
            } => FREE_FORCE_HALFBEAM_GENERIC,
            FreeForceKind::Halfbeam {
                behavior: LinkBehavior::Rope,
                ..
            } => FREE_FORCE_HALFBEAM_ROPE,
        }
    }

    /// True once a halfbeam has broken
    #[inline]
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, FreeForceKind::Dummy)
    }

    /// Target actor, for variants that have one
    #[must_use]
    pub fn target_actor(&self) -> Option<ActorInstanceId> {
        match &self.kind {
            FreeForceKind::TowardsNode { target, .. } | FreeForceKind::Halfbeam { target, .. } => {
                Some(target.actor_id)
            }
            _ => None,
        }
    }

    /// Whether the force's base or target is `actor`
    #[must_use]
    pub fn references(&self, actor: ActorInstanceId) -> bool {
        self.base.actor_id == actor || self.target_actor() == Some(actor)
    }

    fn references_are_valid(&self) -> bool {
        let target_ok = match &self.kind {
            FreeForceKind::TowardsNode { target, .. } | FreeForceKind::Halfbeam { target, .. } => {
                target.is_valid()
            }
            _ => true,
        };
        self.base.is_valid() && target_ok
    }

    /// Apply once. Returns `true` if the force broke during this evaluation.
    fn apply(&mut self, events: &mut EventCollector) -> bool {
        // Target state is read and released before the base is locked for
        // writing; base and target may be the same actor.
        let id = self.id;
        let (force, broke) = match &mut self.kind {
            FreeForceKind::Dummy => return false,
            FreeForceKind::Constant { direction, magnitude } => (*direction * *magnitude, false),
            FreeForceKind::TowardsCoords { coords, magnitude } => {
                let Some((p, _)) = self.base.read_state() else {
                    debug_assert!(false, "free force {id} has a stale base");
                    return false;
                };
                let f = safe_normalize(&(*coords - p)).map_or(Vec3::zeros(), |d| d * *magnitude);
                (f, false)
            }
            FreeForceKind::TowardsNode { target, magnitude } => {
                let (Some((p, _)), Some((t, _))) = (self.base.read_state(), target.read_state())
                else {
                    debug_assert!(false, "free force {id} has a stale reference");
                    return false;
                };
                let f = safe_normalize(&(t - p)).map_or(Vec3::zeros(), |d| d * *magnitude);
                (f, false)
            }
            FreeForceKind::Halfbeam {
                target,
                link,
                behavior,
                stress,
            } => {
                let (Some((p1, v1)), Some((p2, v2))) =
                    (self.base.read_state(), target.read_state())
                else {
                    debug_assert!(false, "free force {id} has a stale reference");
                    return false;
                };
                let r = link.evaluate(&p1, &v1, &p2, &v2, *behavior);
                *stress = r.stress;
                if let Some(d) = r.deformed {
                    events.push(SimEvent::FreeForceActivity {
                        activity: FreeForceActivity::Deformed,
                        id,
                        stress: d.stress,
                        threshold: d.threshold,
                    });
                }
                if let Some(b) = r.broken {
                    events.push(SimEvent::FreeForceActivity {
                        activity: FreeForceActivity::Broken,
                        id,
                        stress: b.stress,
                        threshold: b.strength,
                    });
                }
                (r.force, r.broken.is_some())
            }
        };

        {
            let mut actor = self.base.actor.write();
            if actor.is_disposed() {
                debug_assert!(false, "free force {id} has a disposed base");
                return false;
            }
            if let Some(n) = actor.nodes.get_mut(self.base.node) {
                n.forces += force;
            }
        }

        if broke {
            self.kind = FreeForceKind::Dummy;
        }
        broke
    }
}

// ============================================================================
// Table
// ============================================================================

/// Counters from one application pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FreeForcePassStats {
    /// Forces that exerted a force
    pub applied: u32,
    /// Halfbeams that broke
    pub broken: u32,
}

/// Ordered table of free forces
#[derive(Clone, Debug, Default)]
pub struct FreeForceTable {
    forces: Vec<FreeForce>,
    next_id: i32,
}

impl FreeForceTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of forces, dummies included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.forces.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Forces in application order
    pub fn iter(&self) -> impl Iterator<Item = &FreeForce> {
        self.forces.iter()
    }

    /// Look up a force by id
    #[must_use]
    pub fn find(&self, id: FreeForceId) -> Option<&FreeForce> {
        self.forces.iter().find(|f| f.id == id)
    }

    fn position(&self, id: FreeForceId) -> Option<usize> {
        self.forces.iter().position(|f| f.id == id)
    }

    /// Allocate an id not currently in the table
    pub fn next_id(&mut self) -> FreeForceId {
        loop {
            let id = FreeForceId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(0);
            if self.position(id).is_none() {
                return id;
            }
        }
    }

    /// Insert a new force at the end of the table
    pub fn add(
        &mut self,
        request: &FreeForceRequest,
        actors: &[ActorPtr],
        events: &mut EventCollector,
    ) -> SimResult<()> {
        if self.position(request.id).is_some() {
            return Err(SimError::DuplicateFreeForceId { id: request.id });
        }
        let force = FreeForce::from_request(request, actors)?;
        self.forces.push(force);
        events.push(SimEvent::free_force(FreeForceActivity::Added, request.id));
        Ok(())
    }

    /// Replace an existing force in place, keeping its table position
    pub fn modify(
        &mut self,
        request: &FreeForceRequest,
        actors: &[ActorPtr],
        events: &mut EventCollector,
    ) -> SimResult<()> {
        let index = self
            .position(request.id)
            .ok_or(SimError::FreeForceNotFound { id: request.id })?;
        let force = FreeForce::from_request(request, actors)?;
        self.forces[index] = force;
        events.push(SimEvent::free_force(FreeForceActivity::Modified, request.id));
        Ok(())
    }

    /// Remove a force
    pub fn remove(&mut self, id: FreeForceId, events: &mut EventCollector) -> SimResult<()> {
        let index = self.position(id).ok_or(SimError::FreeForceNotFound { id })?;
        self.forces.remove(index);
        events.push(SimEvent::free_force(FreeForceActivity::Removed, id));
        Ok(())
    }

    /// Drop every force whose base or target is `actor`; returns how many
    pub fn remove_referencing(&mut self, actor: ActorInstanceId) -> usize {
        let before = self.forces.len();
        self.forces.retain(|f| !f.references(actor));
        before - self.forces.len()
    }

    /// Drop every force whose nodes no longer exist, emitting `Removed`
    /// for each; returns the dropped ids in table order
    pub fn prune_invalid(&mut self, events: &mut EventCollector) -> Vec<FreeForceId> {
        let mut pruned = Vec::new();
        self.forces.retain(|f| {
            let keep = f.references_are_valid();
            if !keep {
                pruned.push(f.id);
            }
            keep
        });
        for &id in &pruned {
            events.push(SimEvent::free_force(FreeForceActivity::Removed, id));
        }
        pruned
    }

    /// Apply every force once, in table order
    pub fn apply_all(&mut self, events: &mut EventCollector) -> FreeForcePassStats {
        let mut stats = FreeForcePassStats::default();
        for force in &mut self.forces {
            if force.is_dummy() {
                continue;
            }
            stats.applied += 1;
            if force.apply(events) {
                stats.broken += 1;
            }
        }
        stats
    }

    /// Remove every force
    pub fn clear(&mut self) {
        self.forces.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{share, Actor, Node};
    use approx::assert_relative_eq;

    fn actor(id: i32, x: Real) -> ActorPtr {
        let mut a = Actor::new(
            "anchor",
            vec![
                Node::new(Vec3::new(x, 0.0, 0.0), 2.0),
                Node::new(Vec3::new(x, 1.0, 0.0), 2.0),
            ],
            Vec::new(),
        );
        a.instance_id = ActorInstanceId(id);
        share(a)
    }

    fn constant(id: i32, actor: i32, node: usize) -> FreeForceRequest {
        FreeForceRequest {
            id: FreeForceId(id),
            base: NodeRef::new(ActorInstanceId(actor), node),
            spec: FreeForceSpec::Constant {
                direction: Vec3::new(0.0, 2.0, 0.0),
                magnitude: 100.0,
            },
        }
    }

    fn halfbeam(id: i32, strength: Real) -> FreeForceRequest {
        FreeForceRequest {
            id: FreeForceId(id),
            base: NodeRef::new(ActorInstanceId(0), 0),
            spec: FreeForceSpec::Halfbeam {
                target: NodeRef::new(ActorInstanceId(1), 0),
                behavior: LinkBehavior::Generic,
                params: HalfbeamParams {
                    spring: 1000.0,
                    damping: 0.0,
                    deform: 1.0e9,
                    strength,
                    ..HalfbeamParams::default()
                },
            },
        }
    }

    #[test]
    fn test_add_constant_and_apply() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&constant(1, 0, 0), &actors, &mut ev).unwrap();
        let stats = table.apply_all(&mut ev);
        assert_eq!(stats.applied, 1);
        assert_relative_eq!(actors[0].read().nodes[0].forces.y, 100.0);
        assert_eq!(table.find(FreeForceId(1)).unwrap().type_code(), FREE_FORCE_CONSTANT);
    }

    #[test]
    fn test_duplicate_id_rejected_table_unchanged() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&constant(1, 0, 0), &actors, &mut ev).unwrap();
        let err = table.add(&constant(1, 0, 1), &actors, &mut ev).unwrap_err();
        assert_eq!(err, SimError::DuplicateFreeForceId { id: FreeForceId(1) });
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(FreeForceId(1)).unwrap().base().node(), 0);
    }

    #[test]
    fn test_invalid_references_rejected() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        assert!(matches!(
            table.add(&constant(1, 0, 9), &actors, &mut ev),
            Err(SimError::NodeOutOfRange { node: 9, .. })
        ));
        assert!(matches!(
            table.add(&constant(1, 5, 0), &actors, &mut ev),
            Err(SimError::ActorNotFound { .. })
        ));
        actors[0].write().dispose();
        assert!(matches!(
            table.add(&constant(1, 0, 0), &actors, &mut ev),
            Err(SimError::ActorDisposed { .. })
        ));
        assert!(table.is_empty());
        assert!(!ev.has_events());
    }

    #[test]
    fn test_zero_direction_rejected() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut req = constant(1, 0, 0);
        req.spec = FreeForceSpec::Constant {
            direction: Vec3::zeros(),
            magnitude: 1.0,
        };
        let err = table.add(&req, &actors, &mut EventCollector::new()).unwrap_err();
        assert!(matches!(err, SimError::InvalidFreeForce { .. }));
    }

    #[test]
    fn test_modify_keeps_position_and_is_atomic() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&constant(1, 0, 0), &actors, &mut ev).unwrap();
        table.add(&constant(2, 0, 0), &actors, &mut ev).unwrap();
        table.modify(&constant(1, 0, 1), &actors, &mut ev).unwrap();
        let ids: Vec<_> = table.iter().map(FreeForce::id).collect();
        assert_eq!(ids, vec![FreeForceId(1), FreeForceId(2)]);
        assert_eq!(table.find(FreeForceId(1)).unwrap().base().node(), 1);

        assert!(table.modify(&constant(1, 0, 7), &actors, &mut ev).is_err());
        assert_eq!(table.find(FreeForceId(1)).unwrap().base().node(), 1);
        assert!(matches!(
            table.modify(&constant(3, 0, 0), &actors, &mut ev),
            Err(SimError::FreeForceNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_missing_fails() {
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        assert!(table.remove(FreeForceId(4), &mut ev).is_err());
        assert!(!ev.has_events());
    }

    #[test]
    fn test_towards_node_tracks_target() {
        let actors = vec![actor(0, 0.0), actor(1, 3.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        let req = FreeForceRequest {
            id: FreeForceId(1),
            base: NodeRef::new(ActorInstanceId(0), 0),
            spec: FreeForceSpec::TowardsNode {
                target: NodeRef::new(ActorInstanceId(1), 0),
                magnitude: 10.0,
            },
        };
        table.add(&req, &actors, &mut ev).unwrap();
        table.apply_all(&mut ev);
        assert_relative_eq!(actors[0].read().nodes[0].forces.x, 10.0);
        actors[1].write().nodes[0].position.x = -3.0;
        table.apply_all(&mut ev);
        assert_relative_eq!(actors[0].read().nodes[0].forces.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_halfbeam_breaks_into_dummy() {
        let actors = vec![actor(0, 0.0), actor(1, 1.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&halfbeam(1, 50.0), &actors, &mut ev).unwrap();
        ev.clear();
        actors[1].write().nodes[0].position.x = 2.0;
        let stats = table.apply_all(&mut ev);
        assert_eq!(stats.broken, 1);
        let f = table.find(FreeForceId(1)).unwrap();
        assert!(f.is_dummy());
        assert_eq!(f.type_code(), FREE_FORCE_DUMMY);
        assert!(ev.events().iter().any(|e| matches!(
            e,
            SimEvent::FreeForceActivity { activity: FreeForceActivity::Broken, .. }
        )));

        actors[0].write().nodes[0].forces = Vec3::zeros();
        actors[1].write().nodes[0].position.x = 9.0;
        let stats = table.apply_all(&mut ev);
        assert_eq!(stats.applied, 0);
        assert_eq!(actors[0].read().nodes[0].forces, Vec3::zeros());
    }

    #[test]
    fn test_same_actor_halfbeam_does_not_deadlock() {
        let actors = vec![actor(0, 0.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        let mut req = halfbeam(1, 1.0e9);
        req.spec = FreeForceSpec::Halfbeam {
            target: NodeRef::new(ActorInstanceId(0), 1),
            behavior: LinkBehavior::Rope,
            params: HalfbeamParams::default(),
        };
        table.add(&req, &actors, &mut ev).unwrap();
        assert_eq!(table.find(FreeForceId(1)).unwrap().type_code(), FREE_FORCE_HALFBEAM_ROPE);
        assert_eq!(table.apply_all(&mut ev).applied, 1);
    }

    #[test]
    fn test_remove_referencing_and_next_id() {
        let actors = vec![actor(0, 0.0), actor(1, 1.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&constant(0, 0, 0), &actors, &mut ev).unwrap();
        table.add(&halfbeam(1, 1.0e9), &actors, &mut ev).unwrap();
        table.add(&constant(2, 1, 0), &actors, &mut ev).unwrap();
        assert_eq!(table.next_id(), FreeForceId(3));
        assert_eq!(table.remove_referencing(ActorInstanceId(1)), 2);
        assert_eq!(table.len(), 1);
        assert!(table.find(FreeForceId(0)).is_some());
    }

    #[test]
    fn test_prune_invalid_reports_removed() {
        let actors = vec![actor(0, 0.0), actor(1, 1.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        table.add(&constant(0, 0, 1), &actors, &mut ev).unwrap();
        table.add(&constant(1, 0, 0), &actors, &mut ev).unwrap();
        table.add(&halfbeam(2, 1.0e9), &actors, &mut ev).unwrap();
        ev.clear();

        actors[0].write().nodes.truncate(1);
        assert_eq!(table.prune_invalid(&mut ev), vec![FreeForceId(0)]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            ev.events(),
            &[SimEvent::free_force(FreeForceActivity::Removed, FreeForceId(0))]
        );
        assert!(table.prune_invalid(&mut ev).is_empty());
    }

    #[test]
    fn test_halfbeam_yield_emits_deformed() {
        let actors = vec![actor(0, 0.0), actor(1, 1.0)];
        let mut table = FreeForceTable::new();
        let mut ev = EventCollector::new();
        let req = FreeForceRequest {
            id: FreeForceId(1),
            base: NodeRef::new(ActorInstanceId(0), 0),
            spec: FreeForceSpec::Halfbeam {
                target: NodeRef::new(ActorInstanceId(1), 0),
                behavior: LinkBehavior::Generic,
                params: HalfbeamParams {
                    spring: 1000.0,
                    damping: 0.0,
                    deform: 50.0,
                    strength: 1.0e9,
                    ..HalfbeamParams::default()
                },
            },
        };
        table.add(&req, &actors, &mut ev).unwrap();
        ev.clear();

        actors[1].write().nodes[0].position.x = 1.3;
        let stats = table.apply_all(&mut ev);
        assert_eq!(stats.broken, 0);
        let deformed: Vec<_> = ev
            .events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::FreeForceActivity {
                    activity: FreeForceActivity::Deformed,
                    id,
                    stress,
                    threshold,
                } => Some((*id, *stress, *threshold)),
                _ => None,
            })
            .collect();
        assert_eq!(deformed.len(), 1);
        let (id, stress, threshold) = deformed[0];
        assert_eq!(id, FreeForceId(1));
        assert_relative_eq!(threshold, -62.5, epsilon = 1e-3);
        assert_relative_eq!(stress, -175.0, epsilon = 1e-2);

        let f = table.find(FreeForceId(1)).unwrap();
        assert!(!f.is_dummy());
        assert_eq!(f.type_code(), FREE_FORCE_HALFBEAM_GENERIC);
    }
}
