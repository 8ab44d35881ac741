//! Command Forwarding
//!
//! Propagates the player's command inputs to nearby actors that import
//! commands, and mirrors brake, parking brake and lights onto hooked
//! trailers. Tie and rope toggles are not executed here; they become
//! [`LinkingRequest`]s for the owner of the linkage subsystem.

use std::collections::{HashSet, VecDeque};
use std::ops::DerefMut;

use crate::actor::{Actor, ActorInstanceId, ActorState, CommandChannel, LinkKind};
use crate::math::Real;
use crate::sleeping::StateTransition;

/// Kind of linkage toggle requested from the linkage subsystem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkingRequestKind {
    /// Toggle tie straps
    TieToggle,
    /// Toggle ropes
    RopeToggle,
}

/// A linkage toggle to be executed outside the scheduler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkingRequest {
    /// What to toggle
    pub kind: LinkingRequestKind,
    /// Actor whose linkages toggle
    pub actor: ActorInstanceId,
    /// Group filter, -1 for all groups
    pub group: i32,
}

/// Everything one forwarding pass changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardOutcome {
    /// Actors woken because they were in range
    pub transitions: Vec<StateTransition>,
    /// Linkage toggles to execute
    pub requests: Vec<LinkingRequest>,
    /// Actors that received command inputs
    pub receivers: Vec<ActorInstanceId>,
}

/// Whether `a` and `b` share a linkage entry, in either direction
#[must_use]
pub fn are_actors_directly_linked(a: &Actor, b: &Actor) -> bool {
    a.links.iter().any(|l| l.target == b.instance_id())
        || b.links.iter().any(|l| l.target == a.instance_id())
}

/// Every actor transitively linked to `actors[source]`, excluding itself
#[must_use]
pub fn linked_set<G: DerefMut<Target = Actor>>(
    actors: &[G],
    source: usize,
) -> HashSet<ActorInstanceId> {
    let origin = actors[source].instance_id();
    let mut seen = HashSet::from([origin]);
    let mut queue = VecDeque::from([source]);

    while let Some(i) = queue.pop_front() {
        let current: &Actor = &actors[i];
        for (j, other) in actors.iter().enumerate() {
            let id = other.instance_id();
            if seen.contains(&id) || !are_actors_directly_linked(current, other) {
                continue;
            }
            seen.insert(id);
            queue.push_back(j);
        }
    }

    seen.remove(&origin);
    seen
}

/// Forward the commands of `actors[source]` for one frame.
///
/// Receivers are actors other than the source that import commands and whose
/// mean position is closer than the sum of both radii. A sleeping receiver
/// is woken even when `realistic` later excludes it because it is not
/// linked to the source.
pub fn forward_commands<G: DerefMut<Target = Actor>>(
    actors: &mut [G],
    source: usize,
    realistic: bool,
) -> ForwardOutcome {
    let mut outcome = ForwardOutcome::default();
    if source >= actors.len() || !actors[source].forward_commands {
        return outcome;
    }

    let linked = if realistic {
        linked_set(actors, source)
    } else {
        HashSet::new()
    };

    let src: &Actor = &actors[source];
    let src_id = src.instance_id();
    let src_position = src.position();
    let src_radius = src.radius;
    let inputs: Vec<Real> = src
        .commands
        .iter()
        .map(|c: &CommandChannel| c.player_input.max(c.command_value))
        .collect();
    let toggle_ties = src.toggle_ties;
    let toggle_ropes = src.toggle_ropes;
    let brake = src.brake;
    let trailer_parking_brake = src.trailer_parking_brake;
    let light_mask = src.light_mask;
    let hooked: HashSet<ActorInstanceId> = src
        .links
        .iter()
        .filter(|l| l.kind == LinkKind::Hook && l.target != src_id)
        .map(|l| l.target)
        .collect();

    for (index, actor) in actors.iter_mut().enumerate() {
        if index == source || actor.is_disposed() {
            continue;
        }

        let in_range = actor.import_commands
            && (actor.position() - src_position).norm() < actor.radius + src_radius;
        if in_range {
            if actor.state == ActorState::Sleeping {
                actor.sleep_counter = 0.0;
                actor.state = ActorState::Simulated;
                outcome.transitions.push(StateTransition {
                    index,
                    old: ActorState::Sleeping,
                    new: ActorState::Simulated,
                });
            }

            if !realistic || linked.contains(&actor.instance_id()) {
                for (channel, value) in actor.commands.iter_mut().zip(&inputs) {
                    channel.player_input = *value;
                }
                let id = actor.instance_id();
                outcome.receivers.push(id);
                if toggle_ties {
                    outcome.requests.push(LinkingRequest {
                        kind: LinkingRequestKind::TieToggle,
                        actor: id,
                        group: -1,
                    });
                }
                if toggle_ropes {
                    outcome.requests.push(LinkingRequest {
                        kind: LinkingRequestKind::RopeToggle,
                        actor: id,
                        group: -1,
                    });
                }
            }
        }

        if hooked.contains(&actor.instance_id()) {
            actor.brake = brake;
            if actor.parking_brake != trailer_parking_brake {
                actor.parking_brake = !actor.parking_brake;
            }
            actor.light_mask = light_mask;
        }
    }

    outcome
}

// ============================================================================
// Tests
// ============================================================================
