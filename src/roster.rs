//! Actor Roster Queries
//!
//! Read-only lookups over the actor list: by id, vector index or network
//! link, proximity, and vehicle cycling for the player seat.

use crate::actor::{ActorInstanceId, ActorPtr, ActorState};
use crate::math::{Real, Vec3};

/// Actor with the given instance id
#[must_use]
pub fn actor_by_id(actors: &[ActorPtr], id: ActorInstanceId) -> Option<ActorPtr> {
    crate::actor::find_by_id(actors, id).cloned()
}

/// Actor at the given vector index
#[must_use]
pub fn actor_by_vector_index(actors: &[ActorPtr], index: usize) -> Option<ActorPtr> {
    actors.get(index).cloned()
}

/// Actor bound to `(source, stream)`
#[must_use]
pub fn actor_by_net_link(actors: &[ActorPtr], source: i32, stream: i32) -> Option<ActorPtr> {
    actors
        .iter()
        .find(|ptr| {
            ptr.read()
                .net_link
                .is_some_and(|l| l.source_id == source && l.stream_id == stream)
        })
        .cloned()
}

/// Whether any `NetworkedOk` actor belongs to `source`
#[must_use]
pub fn has_networked_actor(actors: &[ActorPtr], source: i32) -> bool {
    actors.iter().any(|ptr| {
        let a = ptr.read();
        a.state == ActorState::NetworkedOk && a.net_link.is_some_and(|l| l.source_id == source)
    })
}

/// Ids of the `NetworkedOk` actors of `source`
#[must_use]
pub fn networked_actors_of(actors: &[ActorPtr], source: i32) -> Vec<ActorInstanceId> {
    actors
        .iter()
        .filter_map(|ptr| {
            let a = ptr.read();
            let owned = a.net_link.is_some_and(|l| l.source_id == source);
            (owned && a.state == ActorState::NetworkedOk).then(|| a.instance_id())
        })
        .collect()
}

/// Actors not driven by a remote peer
#[must_use]
pub fn local_actors(actors: &[ActorPtr]) -> Vec<ActorPtr> {
    actors
        .iter()
        .filter(|ptr| ptr.read().state != ActorState::NetworkedOk)
        .cloned()
        .collect()
}

/// Actor whose node 0 is closest to `point`, with the distance
#[must_use]
pub fn nearest_actor(actors: &[ActorPtr], point: &Vec3) -> Option<(ActorPtr, Real)> {
    let mut best: Option<(ActorPtr, Real)> = None;
    for ptr in actors {
        let Some(d2) = ptr.read().nodes.first().map(|n| (n.position - point).norm_squared()) else {
            continue;
        };
        if best.as_ref().map_or(true, |(_, b)| d2 < *b) {
            best = Some((ptr.clone(), d2));
        }
    }
    best.map(|(ptr, d2)| (ptr, d2.sqrt()))
}

/// First actor flagged as rescuer
#[must_use]
pub fn rescue_vehicle(actors: &[ActorPtr]) -> Option<ActorPtr> {
    actors.iter().find(|ptr| ptr.read().rescuer).cloned()
}

fn include_in_cycle(ptr: &ActorPtr, include_networked: bool) -> bool {
    let a = ptr.read();
    !a.preloaded_with_terrain && (include_networked || !a.state.is_networked())
}

/// Next actor after `pivot` in list order, wrapping around.
///
/// `pivot` is the current player's index, or one past the previous player's
/// index when nobody is seated. Falls back to the pivot itself.
#[must_use]
pub fn next_vehicle(
    actors: &[ActorPtr],
    pivot: Option<usize>,
    include_networked: bool,
) -> Option<ActorPtr> {
    let start = pivot.map_or(0, |p| p + 1);
    let wrap_end = pivot.unwrap_or(0).min(actors.len());
    actors
        .get(start..)
        .into_iter()
        .flatten()
        .chain(&actors[..wrap_end])
        .chain(pivot.and_then(|p| actors.get(p)))
        .find(|ptr| include_in_cycle(ptr, include_networked))
        .cloned()
}

/// Previous actor before `pivot` in list order, wrapping around
#[must_use]
pub fn previous_vehicle(
    actors: &[ActorPtr],
    pivot: Option<usize>,
    include_networked: bool,
) -> Option<ActorPtr> {
    let below = pivot.map_or(0, |p| p.min(actors.len()));
    let above = pivot.map_or(0, |p| (p + 1).min(actors.len()));
    actors[..below]
        .iter()
        .rev()
        .chain(actors[above..].iter().rev())
        .chain(pivot.and_then(|p| actors.get(p)))
        .find(|ptr| include_in_cycle(ptr, include_networked))
        .cloned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{share, Actor, Node};
    use std::sync::Arc;

    fn roster() -> Vec<ActorPtr> {
        (0..4)
            .map(|i| {
                let mut a = Actor::new(
                    format!("a{i}"),
                    vec![Node::new(Vec3::new(i as Real * 10.0, 0.0, 0.0), 1.0)],
                    Vec::new(),
                );
                a.instance_id = ActorInstanceId(i);
                a.vector_index = i as usize;
                share(a)
            })
            .collect()
    }

    fn id(ptr: Option<ActorPtr>) -> Option<i32> {
        ptr.map(|p| p.read().instance_id().0)
    }

    #[test]
    fn test_lookup_by_id_and_index() {
        let actors = roster();
        assert_eq!(id(actor_by_id(&actors, ActorInstanceId(2))), Some(2));
        assert!(actor_by_id(&actors, ActorInstanceId(9)).is_none());
        assert_eq!(id(actor_by_vector_index(&actors, 3)), Some(3));
    }

    #[test]
    fn test_net_link_lookup() {
        let actors = roster();
        {
            let mut a = actors[1].write();
            a.net_link = Some(crate::actor::NetLink {
                source_id: 5,
                stream_id: 7,
            });
            a.state = ActorState::NetworkedOk;
        }
        assert_eq!(id(actor_by_net_link(&actors, 5, 7)), Some(1));
        assert!(actor_by_net_link(&actors, 5, 8).is_none());
        assert!(has_networked_actor(&actors, 5));
        assert_eq!(networked_actors_of(&actors, 5), vec![ActorInstanceId(1)]);
        assert_eq!(local_actors(&actors).len(), 3);
    }

    #[test]
    fn test_nearest_actor() {
        let actors = roster();
        let (ptr, d) = nearest_actor(&actors, &Vec3::new(21.0, 0.0, 0.0)).unwrap();
        assert!(Arc::ptr_eq(&ptr, &actors[2]));
        assert!((d - 1.0).abs() < 1e-6);
        assert!(nearest_actor(&[], &Vec3::zeros()).is_none());
    }

    #[test]
    fn test_cycle_next_and_previous() {
        let actors = roster();
        actors[2].write().preloaded_with_terrain = true;
        assert_eq!(id(next_vehicle(&actors, Some(1), false)), Some(3));
        assert_eq!(id(next_vehicle(&actors, Some(3), false)), Some(0));
        assert_eq!(id(previous_vehicle(&actors, Some(3), false)), Some(1));
        assert_eq!(id(previous_vehicle(&actors, Some(0), false)), Some(3));
        assert_eq!(id(next_vehicle(&actors, None, false)), Some(0));
    }

    #[test]
    fn test_cycle_skips_networked_unless_enabled() {
        let actors = roster();
        actors[1].write().state = ActorState::NetworkedOk;
        assert_eq!(id(next_vehicle(&actors, Some(0), false)), Some(2));
        assert_eq!(id(next_vehicle(&actors, Some(0), true)), Some(1));
    }

    #[test]
    fn test_cycle_falls_back_to_pivot() {
        let actors = roster();
        for a in &actors[1..] {
            a.write().preloaded_with_terrain = true;
        }
        assert_eq!(id(next_vehicle(&actors, Some(0), false)), Some(0));
        assert_eq!(id(previous_vehicle(&actors, Some(0), false)), Some(0));
    }

    #[test]
    fn test_rescue_vehicle() {
        let actors = roster();
        assert!(rescue_vehicle(&actors).is_none());
        actors[3].write().rescuer = true;
        assert_eq!(id(rescue_vehicle(&actors)), Some(3));
    }
}
