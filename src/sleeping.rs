//! Sleeping and Activation
//!
//! Puts idle actors to sleep and wakes them again through spatial
//! reachability from moving actors.
//!
//! # Sleeping
//!
//! A simulated actor whose mean squared velocity stays at or below the
//! threshold accumulates idle time; once the idle time reaches the timeout it
//! falls asleep. AI-driven actors never accumulate idle time.
//!
//! # Activation
//!
//! Activation is a flood fill over a per-frame visited set: starting from the
//! player actor, every simulated actor whose actual box overlaps the source's
//! actual box has its idle time reset, and every sleeping actor whose
//! predicted box overlaps the source's predicted box is woken. Both recurse.
//! A snowball pass then repeats the fill from every simulated actor with zero
//! idle time, so an unpiloted actor in motion wakes what lies in its path.
//!
//! The functions work on any slice of `DerefMut<Target = Actor>`, so the
//! scheduler passes write guards and tests pass plain actors.

use std::ops::DerefMut;

use crate::actor::{Actor, ActorState};
use crate::config::SleepConfig;
use crate::math::Aabb;

/// A state change made by the activation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateTransition {
    /// Vector index of the actor
    pub index: usize,
    /// Previous state
    pub old: ActorState,
    /// New state
    pub new: ActorState,
}

fn boxes_intersect(a_whole: &Aabb, a_fine: &[Aabb], b_whole: &Aabb, b_fine: &[Aabb]) -> bool {
    match (a_fine.is_empty(), b_fine.is_empty()) {
        (true, true) => a_whole.intersects(b_whole),
        (true, false) => b_fine.iter().any(|b| b.intersects(a_whole)),
        (false, true) => a_fine.iter().any(|a| a.intersects(b_whole)),
        (false, false) => a_fine
            .iter()
            .any(|a| b_fine.iter().any(|b| a.intersects(b))),
    }
}

/// Whether the actual collision volumes of two actors overlap
#[must_use]
pub fn actors_intersect(a: &Actor, b: &Actor) -> bool {
    boxes_intersect(&a.bounding_box, &a.collision_boxes, &b.bounding_box, &b.collision_boxes)
}

/// Whether the predicted collision volumes of two actors overlap
#[must_use]
pub fn actors_predicted_intersect(a: &Actor, b: &Actor) -> bool {
    boxes_intersect(
        &a.predicted_bounding_box,
        &a.predicted_collision_boxes,
        &b.predicted_bounding_box,
        &b.predicted_collision_boxes,
    )
}

/// Flood-fill activation from `source`.
///
/// Does nothing if `source` was already visited or is not simulated.
pub fn recursive_activation<G: DerefMut<Target = Actor>>(
    actors: &mut [G],
    source: usize,
    visited: &mut [bool],
    transitions: &mut Vec<StateTransition>,
) {
    if visited[source] || actors[source].state != ActorState::Simulated {
        return;
    }
    visited[source] = true;

    for t in 0..actors.len() {
        if t == source || visited[t] {
            continue;
        }
        let (src, other) = pair(actors, source, t);
        if other.state == ActorState::Simulated && actors_intersect(other, src) {
            other.sleep_counter = 0.0;
            recursive_activation(actors, t, visited, transitions);
            continue;
        }
        if other.state == ActorState::Sleeping && actors_predicted_intersect(other, src) {
            other.sleep_counter = 0.0;
            other.state = ActorState::Simulated;
            transitions.push(StateTransition {
                index: t,
                old: ActorState::Sleeping,
                new: ActorState::Simulated,
            });
            recursive_activation(actors, t, visited, transitions);
        }
    }
}

/// Borrow `actors[a]` shared and `actors[b]` exclusively (`a != b`)
fn pair<G: DerefMut<Target = Actor>>(actors: &mut [G], a: usize, b: usize) -> (&Actor, &mut Actor) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = actors.split_at_mut(b);
        (&*lo[a], &mut *hi[0])
    } else {
        let (lo, hi) = actors.split_at_mut(a);
        (&*hi[0], &mut *lo[b])
    }
}

/// Per-frame sleep/wake update.
///
/// `frame_dt` is the simulated time of the frame. Returns every state change
/// in the order it happened.
pub fn update_sleeping_state<G: DerefMut<Target = Actor>>(
    actors: &mut [G],
    player: Option<usize>,
    frame_dt: f64,
    config: &SleepConfig,
    forced_awake: bool,
) -> Vec<StateTransition> {
    let mut transitions = Vec::new();

    if !forced_awake {
        for (index, actor) in actors.iter_mut().enumerate() {
            if actor.state != ActorState::Simulated || actor.ai_driven {
                continue;
            }
            if actor.velocity_sq() > config.velocity_sq_threshold {
                actor.sleep_counter = 0.0;
                continue;
            }
            actor.sleep_counter += frame_dt;
            if actor.sleep_counter >= config.timeout {
                actor.state = ActorState::Sleeping;
                transitions.push(StateTransition {
                    index,
                    old: ActorState::Simulated,
                    new: ActorState::Sleeping,
                });
            }
        }
    }

    let player = player.filter(|&p| p < actors.len());
    if let Some(p) = player {
        if actors[p].state == ActorState::Sleeping {
            actors[p].state = ActorState::Simulated;
            transitions.push(StateTransition {
                index: p,
                old: ActorState::Sleeping,
                new: ActorState::Simulated,
            });
        }
    }

    let mut visited = vec![false; actors.len()];
    if let Some(p) = player {
        if actors[p].state == ActorState::Simulated {
            actors[p].sleep_counter = 0.0;
            recursive_activation(actors, p, &mut visited, &mut transitions);
        }
    }

    // snowball
    for t in 0..actors.len() {
        if actors[t].state == ActorState::Simulated && actors[t].sleep_counter == 0.0 {
            recursive_activation(actors, t, &mut visited, &mut transitions);
        }
    }

    transitions
}

/// Wake every sleeping actor
pub fn wake_up_all<G: DerefMut<Target = Actor>>(actors: &mut [G]) -> Vec<StateTransition> {
    let mut transitions = Vec::new();
    for (index, actor) in actors.iter_mut().enumerate() {
        if actor.state == ActorState::Sleeping {
            actor.state = ActorState::Simulated;
            actor.sleep_counter = 0.0;
            transitions.push(StateTransition {
                index,
                old: ActorState::Sleeping,
                new: ActorState::Simulated,
            });
        }
    }
    transitions
}

/// Put every simulated actor to sleep
pub fn send_all_sleeping<G: DerefMut<Target = Actor>>(actors: &mut [G]) -> Vec<StateTransition> {
    let mut transitions = Vec::new();
    for (index, actor) in actors.iter_mut().enumerate() {
        if actor.state == ActorState::Simulated {
            actor.state = ActorState::Sleeping;
            transitions.push(StateTransition {
                index,
                old: ActorState::Simulated,
                new: ActorState::Sleeping,
            });
        }
    }
    transitions
}

// ============================================================================
// Tests
// ============================================================================
