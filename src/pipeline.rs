//! Background Frame Pipeline
//!
//! The work one background frame performs, as a sequence of substeps:
//!
//! ```text
//! remote states ─► for each substep:
//!                    forces       (parallel, per actor)
//!                    collision    (parallel detect, per-actor apply)
//!                    free forces  (sequential, table order)
//!                    integration  (parallel, update_physics actors)
//!                  ─► finish_frame (diagnostics, bounding volumes)
//! ```
//!
//! A [`FrameJob`] owns everything the frame touches besides the actors
//! themselves, so the control thread regains the free-force table and the
//! events only after the frame has been joined.

use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::actor::{Actor, ActorPtr, ActorState};
use crate::collider::{apply_contacts, detect_all};
use crate::config::CollisionConfig;
use crate::event::EventCollector;
use crate::force::FreeForceTable;
use crate::math::{Real, Vec3};
use crate::profiling::{
    FrameProfiler, FrameStats, STAGE_COLLISION, STAGE_FORCES, STAGE_FRAME, STAGE_FREE_FORCES,
    STAGE_INTEGRATION,
};
use crate::timestep::StepPlan;

/// Everything a background frame needs
#[derive(Debug)]
pub struct FrameJob {
    /// Snapshot of the actor list, in vector-index order
    pub actors: Vec<ActorPtr>,
    /// Free forces, handed back after the frame
    pub free_forces: FreeForceTable,
    /// Events raised during the frame
    pub events: EventCollector,
    /// Stage timers
    pub profiler: FrameProfiler,
    /// Substeps to run
    pub plan: StepPlan,
    /// Gravitational acceleration
    pub gravity: Vec3,
    /// Contact model
    pub collision: CollisionConfig,
    /// Let networked actors take part in collision
    pub pseudo_collisions: bool,
}

/// Run `f` on every live actor under its write lock and sum the results
fn for_each_actor<F>(actors: &[ActorPtr], f: F) -> u32
where
    F: Fn(&mut Actor) -> u32 + Sync + Send,
{
    let visit = |ptr: &ActorPtr| {
        let mut actor = ptr.write();
        if actor.is_disposed() {
            0
        } else {
            f(&mut actor)
        }
    };

    #[cfg(feature = "parallel")]
    {
        actors.par_iter().map(visit).sum()
    }
    #[cfg(not(feature = "parallel"))]
    {
        actors.iter().map(visit).sum()
    }
}

/// Apply states received from the network since the last frame
fn apply_remote_states(actors: &[ActorPtr]) {
    for ptr in actors {
        let mut actor = ptr.write();
        if let Some(state) = actor.pending_remote.take() {
            if actor.state == ActorState::NetworkedOk {
                actor.apply_remote_state(&state);
            }
        }
    }
}

/// Execute one background frame. Call inside the worker pool.
pub fn run_frame(job: &mut FrameJob) -> FrameStats {
    let frame_start = Instant::now();
    job.profiler.begin_frame();
    let mut stats = FrameStats {
        substeps: job.plan.substeps,
        ..FrameStats::default()
    };

    apply_remote_states(&job.actors);

    let dt = job.plan.dt as Real;
    let gravity = job.gravity;

    for _ in 0..job.plan.substeps {
        let t = Instant::now();
        stats.beams_broken += for_each_actor(&job.actors, |actor| {
            actor.prepare_forces(&gravity);
            if actor.update_physics {
                actor.compute_beam_forces()
            } else {
                0
            }
        });
        job.profiler.record(STAGE_FORCES, t.elapsed());

        let t = Instant::now();
        let contacts = detect_all(&job.actors, job.collision, job.pseudo_collisions);
        apply_contacts(&job.actors, &contacts);
        stats.contacts += contacts.len() as u32;
        job.profiler.record(STAGE_COLLISION, t.elapsed());

        let t = Instant::now();
        let pass = job.free_forces.apply_all(&mut job.events);
        stats.free_forces_applied += pass.applied;
        stats.beams_broken += pass.broken;
        job.profiler.record(STAGE_FREE_FORCES, t.elapsed());

        let t = Instant::now();
        stats.active_actors = for_each_actor(&job.actors, |actor| {
            if actor.update_physics {
                actor.integrate(dt);
                1
            } else {
                0
            }
        });
        job.profiler.record(STAGE_INTEGRATION, t.elapsed());
    }

    let substeps = job.plan.substeps;
    let fixed_dt = job.plan.dt;
    for_each_actor(&job.actors, |actor| {
        actor.finish_frame(substeps, fixed_dt);
        0
    });

    job.profiler.record(STAGE_FRAME, frame_start.elapsed());
    job.profiler.stats = stats;
    tracing::debug!(
        substeps = stats.substeps,
        active = stats.active_actors,
        contacts = stats.contacts,
        broken = stats.beams_broken,
        "frame complete"
    );
    stats
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{share, Beam, Node};
    use crate::event::SimEvent;
    use crate::force::{FreeForceId, FreeForceRequest, FreeForceSpec, NodeRef};
    use crate::actor::ActorInstanceId;
    use approx::assert_relative_eq;

    fn job(actors: Vec<ActorPtr>, substeps: u32, dt: f64, gravity: Vec3) -> FrameJob {
        FrameJob {
            actors,
            free_forces: FreeForceTable::new(),
            events: EventCollector::new(),
            profiler: FrameProfiler::new(),
            plan: StepPlan {
                substeps,
                dt,
                simulated: substeps as f64 * dt,
                admitted: substeps as f64 * dt,
            },
            gravity,
            collision: CollisionConfig::default(),
            pseudo_collisions: false,
        }
    }

    fn point(id: i32, mass: Real) -> ActorPtr {
        let mut a = Actor::new("point", vec![Node::new(Vec3::zeros(), mass)], Vec::new());
        a.instance_id = ActorInstanceId(id);
        share(a)
    }

    #[test]
    fn test_free_fall() {
        let actor = point(0, 2.0);
        let mut j = job(vec![actor.clone()], 10, 0.01, Vec3::new(0.0, -10.0, 0.0));
        let stats = run_frame(&mut j);
        assert_eq!(stats.substeps, 10);
        assert_eq!(stats.active_actors, 1);
        let a = actor.read();
        assert_relative_eq!(a.nodes[0].velocity.y, -1.0, epsilon = 1e-5);
        // semi-implicit Euler: sum of k*dt^2*g for k = 1..10
        assert_relative_eq!(a.nodes[0].position.y, -0.055, epsilon = 1e-5);
    }

    #[test]
    fn test_sleeping_actor_not_integrated() {
        let actor = point(0, 1.0);
        {
            let mut a = actor.write();
            a.state = ActorState::Sleeping;
            a.update_physics = false;
        }
        let mut j = job(vec![actor.clone()], 5, 0.01, Vec3::new(0.0, -10.0, 0.0));
        let stats = run_frame(&mut j);
        assert_eq!(stats.active_actors, 0);
        assert_eq!(actor.read().nodes[0].position, Vec3::zeros());
    }

    #[test]
    fn test_constant_free_force() {
        let actor = point(0, 4.0);
        let mut j = job(vec![actor.clone()], 1, 0.001, Vec3::zeros());
        let req = FreeForceRequest {
            id: FreeForceId(1),
            base: NodeRef::new(ActorInstanceId(0), 0),
            spec: FreeForceSpec::Constant {
                direction: Vec3::new(0.0, 1.0, 0.0),
                magnitude: 100.0,
            },
        };
        let mut events = EventCollector::new();
        j.free_forces.add(&req, &j.actors, &mut events).unwrap();
        let stats = run_frame(&mut j);
        assert_eq!(stats.free_forces_applied, 1);
        assert_relative_eq!(actor.read().nodes[0].velocity.y, 100.0 / 4.0 * 0.001, epsilon = 1e-6);
    }

    #[test]
    fn test_remote_state_applied_before_substeps() {
        let actor = point(0, 1.0);
        {
            let mut a = actor.write();
            a.state = ActorState::NetworkedOk;
            a.update_physics = false;
            a.queue_remote_state(crate::netcode::RemoteState {
                time_ms: 0,
                positions: vec![Vec3::new(3.0, 0.0, 0.0)],
                brake: 1.0,
                light_mask: 2,
            });
        }
        let mut j = job(vec![actor.clone()], 1, 0.001, Vec3::zeros());
        run_frame(&mut j);
        let a = actor.read();
        assert_eq!(a.nodes[0].position.x, 3.0);
        assert_eq!(a.light_mask, 2);
        assert!(a.pending_remote.is_none());
    }

    #[test]
    fn test_native_beam_breaks_once() {
        let nodes = vec![
            Node::new(Vec3::zeros(), 1.0),
            Node::new(Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        let mut beam = Beam::between(&nodes, 0, 1);
        beam.link.strength = 10.0;
        beam.link.max_pos_stress = 1.0e9;
        beam.link.max_neg_stress = -1.0e9;
        beam.link.min_max_posneg_stress = 10.0;
        let mut a = Actor::new("bar", nodes, vec![beam]);
        a.nodes[1].position.x = 2.0;
        a.instance_id = ActorInstanceId(0);
        let actor = share(a);
        let mut j = job(vec![actor.clone()], 3, 0.0001, Vec3::zeros());
        let stats = run_frame(&mut j);
        assert_eq!(stats.beams_broken, 1);
        assert!(actor.read().beams[0].broken);
        assert!(!j.events.events().iter().any(|e| matches!(e, SimEvent::ActorDeleted { .. })));
    }
}
