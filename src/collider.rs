//! Inter-Actor Collision
//!
//! Each surface-owning actor runs its own [`InterActorDetector`], which tests
//! the nodes of every nearby actor against the owner's collision triangles
//! (two-sided shells of thickness `margin`). Contacts produce a penalty force
//! with normal damping and Coulomb friction taken from the owner's
//! [`GroundModel`]; the reaction is spread over the struck triangle's nodes by
//! barycentric weight.
//!
//! # Two phases
//!
//! 1. Detection runs in parallel across owners under read locks only and
//!    yields a list of [`ContactForce`]s.
//! 2. Application groups contacts by actor and adds them to the force
//!    accumulators, one write lock per actor.
//!
//! Accumulation is additive, so the order of detection tasks is irrelevant.

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::actor::{Actor, ActorPtr, ActorState};
use crate::config::CollisionConfig;
use crate::math::{safe_normalize, Aabb, Real, Vec3};

/// Below this tangential speed no friction is applied (m/s).
const FRICTION_SPEED_EPSILON: Real = 1.0e-4;

/// Contact model of a collision surface
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundModel {
    /// Coulomb friction coefficient
    pub friction: Real,
    /// Multiplier on the configured contact stiffness
    pub stiffness_scale: Real,
}

impl GroundModel {
    /// Ground model with the given friction
    #[must_use]
    pub const fn new(friction: Real) -> Self {
        Self {
            friction,
            stiffness_scale: 1.0,
        }
    }

    /// Set the stiffness multiplier
    #[must_use]
    pub fn with_stiffness_scale(mut self, scale: Real) -> Self {
        self.stiffness_scale = scale;
        self
    }
}

impl Default for GroundModel {
    fn default() -> Self {
        Self::new(0.6)
    }
}

/// Force to add to one node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactForce {
    /// Vector index of the receiving actor
    pub actor: usize,
    /// Node index within that actor
    pub node: usize,
    /// Force (N)
    pub force: Vec3,
}

/// Whether `actor` runs its detector this substep
#[inline]
#[must_use]
pub fn participates(actor: &Actor, pseudo_collisions: bool) -> bool {
    actor.collision_relevant
        && !actor.collision_triangles.is_empty()
        && (actor.update_physics()
            || (pseudo_collisions && actor.state() == ActorState::NetworkedOk))
}

/// Contact of a point with a triangle shell
#[derive(Clone, Copy, Debug, PartialEq)]
struct TriangleContact {
    normal: Vec3,
    depth: Real,
    weights: [Real; 3],
}

fn triangle_contact(
    p: &Vec3,
    a: &Vec3,
    b: &Vec3,
    c: &Vec3,
    margin: Real,
) -> Option<TriangleContact> {
    let ab = b - a;
    let ac = c - a;
    let n = safe_normalize(&ab.cross(&ac))?;
    let dist = (p - a).dot(&n);
    if dist.abs() >= margin {
        return None;
    }
    let q = p - n * dist;
    let aq = q - a;
    let d00 = ab.dot(&ab);
    let d01 = ab.dot(&ac);
    let d11 = ac.dot(&ac);
    let d20 = aq.dot(&ab);
    let d21 = aq.dot(&ac);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= Real::EPSILON {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    if u < 0.0 || v < 0.0 || w < 0.0 {
        return None;
    }
    Some(TriangleContact {
        normal: if dist >= 0.0 { n } else { -n },
        depth: margin - dist.abs(),
        weights: [u, v, w],
    })
}

/// Per-owner contact detector
#[derive(Clone, Debug)]
pub struct InterActorDetector {
    config: CollisionConfig,
    contacts: Vec<ContactForce>,
}

impl InterActorDetector {
    /// Detector with the given contact parameters
    #[must_use]
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            config,
            contacts: Vec::new(),
        }
    }

    /// Contacts found by the last [`detect`](Self::detect)
    #[inline]
    #[must_use]
    pub fn contacts(&self) -> &[ContactForce] {
        &self.contacts
    }

    /// Consume the detector, keeping its contacts
    #[must_use]
    pub fn into_contacts(self) -> Vec<ContactForce> {
        self.contacts
    }

    /// Find contacts of other actors' nodes with the triangles of `actors[owner]`.
    ///
    /// Takes a read lock on the owner for the whole pass and a short read lock
    /// on each other actor in turn. Returns the number of contacts found.
    pub fn detect(&mut self, owner: usize, actors: &[ActorPtr], pseudo_collisions: bool) -> usize {
        self.contacts.clear();
        let Some(owner_ptr) = actors.get(owner) else {
            return 0;
        };
        let surface = owner_ptr.read();
        if surface.is_disposed() || !participates(&surface, pseudo_collisions) {
            return 0;
        }
        let margin = self.config.margin;
        let reach = surface
            .predicted_bounding_box
            .inflated(surface.collision_range + margin);
        let stiffness = self.config.stiffness * surface.ground_model.stiffness_scale;
        let friction = surface.ground_model.friction;

        for (other_idx, other_ptr) in actors.iter().enumerate() {
            if other_idx == owner {
                continue;
            }
            let other = other_ptr.read();
            if other.is_disposed() || !other.collision_relevant {
                continue;
            }
            let other_reach = other.predicted_bounding_box.inflated(other.collision_range);
            if !other_reach.intersects(&reach) {
                continue;
            }

            for (node_idx, node) in other.nodes.iter().enumerate() {
                if !reach.contains(&node.position) {
                    continue;
                }
                let Some((tri, contact)) = deepest_contact(&surface, &node.position, margin) else {
                    continue;
                };
                let [ia, ib, ic] = tri;
                let [wa, wb, wc] = contact.weights;
                let sn = &surface.nodes;
                let surface_velocity =
                    sn[ia].velocity * wa + sn[ib].velocity * wb + sn[ic].velocity * wc;
                let rel = node.velocity - surface_velocity;
                let vn = rel.dot(&contact.normal);
                let fn_mag = (stiffness * contact.depth - self.config.damping * vn).max(0.0);
                if fn_mag <= 0.0 {
                    continue;
                }
                let mut force = contact.normal * fn_mag;
                let vt = rel - contact.normal * vn;
                let vt_len = vt.norm();
                if vt_len > FRICTION_SPEED_EPSILON {
                    force -= vt * (friction * fn_mag / vt_len);
                }

                self.contacts.push(ContactForce {
                    actor: other_idx,
                    node: node_idx,
                    force,
                });
                for (i, w) in [(ia, wa), (ib, wb), (ic, wc)] {
                    if w > 0.0 {
                        self.contacts.push(ContactForce {
                            actor: owner,
                            node: i,
                            force: -force * w,
                        });
                    }
                }
            }
        }
        self.contacts.len()
    }
}

fn deepest_contact(
    surface: &Actor,
    p: &Vec3,
    margin: Real,
) -> Option<([usize; 3], TriangleContact)> {
    let mut best: Option<([usize; 3], TriangleContact)> = None;
    for tri in &surface.collision_triangles {
        let [a, b, c] = *tri;
        let n = &surface.nodes;
        let (pa, pb, pc) = (&n[a].position, &n[b].position, &n[c].position);
        if !Aabb::from_points([pa, pb, pc]).inflated(margin).contains(p) {
            continue;
        }
        if let Some(contact) = triangle_contact(p, pa, pb, pc, margin) {
            if best.map_or(true, |(_, b)| contact.depth > b.depth) {
                best = Some((*tri, contact));
            }
        }
    }
    best
}

/// Detection phase over every actor. Call inside the worker pool.
#[must_use]
pub fn detect_all(
    actors: &[ActorPtr],
    config: CollisionConfig,
    pseudo_collisions: bool,
) -> Vec<ContactForce> {
    #[cfg(feature = "parallel")]
    {
        (0..actors.len())
            .into_par_iter()
            .map(|owner| {
                let mut detector = InterActorDetector::new(config);
                detector.detect(owner, actors, pseudo_collisions);
                detector.into_contacts()
            })
            .flatten()
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut all = Vec::new();
        let mut detector = InterActorDetector::new(config);
        for owner in 0..actors.len() {
            detector.detect(owner, actors, pseudo_collisions);
            all.extend_from_slice(detector.contacts());
        }
        all
    }
}

/// Application phase: add every contact force to its node's accumulator.
/// Contacts for disposed actors or missing nodes are dropped.
pub fn apply_contacts(actors: &[ActorPtr], contacts: &[ContactForce]) {
    let mut per_actor: Vec<Vec<(usize, Vec3)>> = vec![Vec::new(); actors.len()];
    for c in contacts {
        if let Some(list) = per_actor.get_mut(c.actor) {
            list.push((c.node, c.force));
        }
    }

    let apply = |(ptr, list): (&ActorPtr, &Vec<(usize, Vec3)>)| {
        if list.is_empty() {
            return;
        }
        let mut actor = ptr.write();
        if actor.is_disposed() {
            return;
        }
        for &(node, force) in list {
            debug_assert!(actor.has_node(node), "contact on missing node");
            if let Some(n) = actor.nodes.get_mut(node) {
                n.forces += force;
            }
        }
    };

    #[cfg(feature = "parallel")]
    actors.par_iter().zip(per_actor.par_iter()).for_each(apply);
    #[cfg(not(feature = "parallel"))]
    actors.iter().zip(per_actor.iter()).for_each(apply);
}

// ============================================================================
// Tests
// ============================================================================
