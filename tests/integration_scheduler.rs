//! Integration tests for softbody-scheduler
//!
//! These tests drive the scheduler end to end through the public API only:
//! frame admission, sleep/wake, free forces and halfbeam breakage. Frames run
//! inline (`async_physics = false`) unless a test is about the background task.

use approx::assert_relative_eq;

use softbody_scheduler::sleeping::update_sleeping_state;
use softbody_scheduler::{
    Actor, ActorState, FreeForceActivity, FreeForceId, FreeForceRequest, FreeForceSpec,
    HalfbeamParams, LinkBehavior, ModifyKind, Node, NodeRef, Real, SimConfig, SimError, SimEvent,
    SimScheduler, SleepConfig, SpawnRequest, Vec3,
};

// ============================================================================
// Helper
// ============================================================================

fn inline_config() -> SimConfig {
    SimConfig::default()
        .with_async_physics(false)
        .with_worker_threads(2)
        .with_gravity(Vec3::zeros())
}

/// Two-node body spanning one metre along x (and y, z)
fn block(name: &str, x: Real) -> Actor {
    Actor::new(
        name,
        vec![
            Node::new(Vec3::new(x, 0.0, 0.0), 1.0),
            Node::new(Vec3::new(x + 1.0, 1.0, 1.0), 1.0),
        ],
        Vec::new(),
    )
}

fn state_of(sim: &SimScheduler, id: softbody_scheduler::ActorInstanceId) -> ActorState {
    sim.actor(id).expect("actor should exist").read().state()
}

// ============================================================================
// Test 1 — Fixed-step count
// ============================================================================

/// 33 ms at the default 0.5 ms substep is exactly 66 substeps with nothing
/// carried over.
#[test]
fn test_fixed_step_count() {
    let mut sim = SimScheduler::new(inline_config()).unwrap();
    assert_eq!(sim.update(0.033).unwrap(), 66);
    assert!(sim.remainder().abs() < 1e-9, "remainder = {}", sim.remainder());
    assert_relative_eq!(sim.total_sim_time(), 0.033, epsilon = 1e-9);

    // identical deltas give identical counts
    for _ in 0..10 {
        assert_eq!(sim.update(0.033).unwrap(), 66);
    }
}

// ============================================================================
// Test 2 — Remainder conservation
// ============================================================================

#[test]
fn test_remainder_conservation() {
    let config = inline_config();
    let fixed_dt = config.fixed_dt;
    let max_frame_dt = config.max_frame_dt;
    let mut sim = SimScheduler::new(config).unwrap();

    let deltas = [0.0123, 0.0071, 0.03, 0.0004, 0.1, 0.0166, 0.0002, 0.0419];
    let mut stepped = 0.0;
    for &dt in &deltas {
        stepped += f64::from(sim.update(dt).unwrap()) * fixed_dt;
    }
    let admitted: f64 = deltas.iter().map(|d| d.min(max_frame_dt)).sum();
    assert_relative_eq!(stepped + sim.remainder(), admitted, epsilon = 1e-9);
    assert_relative_eq!(sim.total_sim_time(), stepped, epsilon = 1e-9);
}

// ============================================================================
// Test 3 — Sleep threshold
// ============================================================================

/// With a dyadic substep the idle counter is exact, so the actor must fall
/// asleep on the frame that reaches 10 s and not one frame earlier.
#[test]
fn test_sleep_exactly_at_timeout() {
    let config = inline_config()
        .with_fixed_dt(1.0 / 2048.0)
        .with_max_frame_dt(0.0625);
    let mut sim = SimScheduler::new(config).unwrap();
    let id = sim.spawn_actor(SpawnRequest::new(block("idle", 0.0))).unwrap();
    sim.drain_events();

    for _ in 0..319 {
        assert_eq!(sim.update(0.03125).unwrap(), 64);
    }
    assert_eq!(state_of(&sim, id), ActorState::Simulated);
    assert!(sim.drain_events().is_empty());

    sim.update(0.03125).unwrap();
    assert_eq!(state_of(&sim, id), ActorState::Sleeping);
    assert_eq!(
        sim.drain_events(),
        vec![SimEvent::ActorStateChanged {
            actor: id,
            old: ActorState::Simulated,
            new: ActorState::Sleeping,
        }]
    );
}

// ============================================================================
// Test 4 — Activation idempotence
// ============================================================================

#[test]
fn test_activation_is_idempotent() {
    let mut actors = vec![
        block("awake", 0.0),
        block("touching", 0.5).with_state(ActorState::Sleeping),
        block("far", 40.0).with_state(ActorState::Sleeping),
    ];
    let config = SleepConfig::default();

    let first = {
        let mut refs: Vec<&mut Actor> = actors.iter_mut().collect();
        update_sleeping_state(&mut refs, None, 0.0, &config, false)
    };
    assert_eq!(first.len(), 1);
    let after_first: Vec<ActorState> = actors.iter().map(Actor::state).collect();

    let second = {
        let mut refs: Vec<&mut Actor> = actors.iter_mut().collect();
        update_sleeping_state(&mut refs, None, 0.0, &config, false)
    };
    let after_second: Vec<ActorState> = actors.iter().map(Actor::state).collect();

    assert!(second.is_empty(), "second pass changed {second:?}");
    assert_eq!(after_first, after_second);
    assert_eq!(
        after_second,
        vec![ActorState::Simulated, ActorState::Simulated, ActorState::Sleeping]
    );
}

// ============================================================================
// Test 5 — Free-force id uniqueness
// ============================================================================

#[test]
fn test_free_force_id_uniqueness() {
    let mut sim = SimScheduler::new(inline_config()).unwrap();
    let a = sim.spawn_actor(SpawnRequest::new(block("a", 0.0))).unwrap();

    let request = |magnitude: Real| FreeForceRequest {
        id: FreeForceId(7),
        base: NodeRef::new(a, 0),
        spec: FreeForceSpec::Constant {
            direction: Vec3::new(1.0, 0.0, 0.0),
            magnitude,
        },
    };
    sim.add_free_force(&request(10.0)).unwrap();

    assert_eq!(
        sim.add_free_force(&request(99.0)),
        Err(SimError::DuplicateFreeForceId { id: FreeForceId(7) })
    );
    assert_eq!(sim.free_forces().len(), 1);

    assert_eq!(
        sim.remove_free_force(FreeForceId(8)),
        Err(SimError::FreeForceNotFound { id: FreeForceId(8) })
    );
    assert_eq!(sim.free_forces().len(), 1);

    let bad_node = FreeForceRequest {
        id: FreeForceId(9),
        base: NodeRef::new(a, 5),
        ..request(1.0)
    };
    assert!(matches!(
        sim.add_free_force(&bad_node),
        Err(SimError::NodeOutOfRange { node: 5, .. })
    ));

    let next = sim.free_force_next_id();
    assert_ne!(next, FreeForceId(7));
    sim.remove_free_force(FreeForceId(7)).unwrap();
    assert!(sim.free_forces().is_empty());
}

// ============================================================================
// Test 6 — Halfbeam breakage is terminal
// ============================================================================

#[test]
fn test_halfbeam_break_is_monotonic() {
    let mut sim = SimScheduler::new(inline_config()).unwrap();
    let a = sim.spawn_actor(SpawnRequest::new(block("a", 0.0))).unwrap();
    let b = sim.spawn_actor(SpawnRequest::new(block("b", 1.0))).unwrap();

    let id = sim.free_force_next_id();
    sim.add_free_force(&FreeForceRequest {
        id,
        base: NodeRef::new(a, 0),
        spec: FreeForceSpec::Halfbeam {
            target: NodeRef::new(b, 0),
            behavior: LinkBehavior::Generic,
            params: HalfbeamParams {
                spring: 1000.0,
                damping: 0.0,
                deform: 1.0e9,
                strength: 50.0,
                ..HalfbeamParams::default()
            },
        },
    })
    .unwrap();

    sim.modify_actor(b, ModifyKind::Teleport(Vec3::new(3.0, 0.0, 0.0)))
        .unwrap();
    sim.drain_events();
    sim.update(0.0005).unwrap();
    assert!(sim.free_forces().find(id).unwrap().is_dummy());
    let broken = |events: &[SimEvent]| {
        events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    SimEvent::FreeForceActivity {
                        activity: FreeForceActivity::Broken,
                        ..
                    }
                )
            })
            .count()
    };
    assert_eq!(broken(&sim.drain_events()), 1);
    let velocity = sim.actor(a).unwrap().read().nodes[0].velocity;

    for x in [1.0, 8.0, -4.0] {
        sim.modify_actor(b, ModifyKind::Teleport(Vec3::new(x, 0.0, 0.0)))
            .unwrap();
        sim.update(0.01).unwrap();
        assert!(sim.free_forces().find(id).unwrap().is_dummy());
        assert_eq!(sim.actor(a).unwrap().read().nodes[0].velocity, velocity);
    }
    assert_eq!(broken(&sim.drain_events()), 0);
    // a broken halfbeam is still addressable
    assert!(sim.remove_free_force(id).is_ok());
}

// ============================================================================
// Test 7 — Moving player wakes a sleeping neighbour
// ============================================================================

#[test]
fn test_moving_player_wakes_sleeper() {
    let mut sim = SimScheduler::new(inline_config()).unwrap();
    let mover = Actor::new(
        "mover",
        vec![
            Node::new(Vec3::new(0.0, 0.0, 0.0), 1.0).with_velocity(Vec3::new(100.0, 0.0, 0.0)),
            Node::new(Vec3::new(1.0, 1.0, 1.0), 1.0).with_velocity(Vec3::new(100.0, 0.0, 0.0)),
        ],
        Vec::new(),
    );
    let a = sim.spawn_actor(SpawnRequest::new(mover)).unwrap();
    let b = sim
        .spawn_actor(SpawnRequest::new(
            block("sleeper", 10.5).with_state(ActorState::Sleeping),
        ))
        .unwrap();
    sim.seat_player(a).unwrap();

    // first frame: predicted boxes are still apart
    assert_eq!(sim.update(0.05).unwrap(), 100);
    assert_eq!(state_of(&sim, a), ActorState::Simulated);
    assert_eq!(state_of(&sim, b), ActorState::Sleeping);

    // the mover's predicted box now sweeps over the sleeper
    sim.update(0.05).unwrap();
    assert_eq!(state_of(&sim, b), ActorState::Simulated);
    assert_eq!(sim.actor(b).unwrap().read().sleep_counter(), 0.0);
    assert!(sim.drain_events().iter().any(|e| matches!(
        e,
        SimEvent::ActorStateChanged { actor, new: ActorState::Simulated, .. } if *actor == b
    )));
}

// ============================================================================
// Test 8 — Constant free force integrates as F/m·dt
// ============================================================================

#[test]
fn test_constant_force_single_substep() {
    let mut sim = SimScheduler::new(inline_config()).unwrap();
    let body = Actor::new("weight", vec![Node::new(Vec3::zeros(), 2.0)], Vec::new());
    let a = sim.spawn_actor(SpawnRequest::new(body)).unwrap();
    sim.add_free_force(&FreeForceRequest {
        id: FreeForceId(1),
        base: NodeRef::new(a, 0),
        spec: FreeForceSpec::Constant {
            direction: Vec3::new(0.0, 1.0, 0.0),
            magnitude: 100.0,
        },
    })
    .unwrap();

    assert_eq!(sim.update(0.0005).unwrap(), 1);
    let v = sim.actor(a).unwrap().read().nodes[0].velocity;
    assert_relative_eq!(v.y, 100.0 / 2.0 * 0.0005, epsilon = 1e-6);
    assert_relative_eq!(v.x, 0.0);
}

// ============================================================================
// Test 9 — Background frames and requests
// ============================================================================

/// Requests issued while a frame is in flight wait for it; nothing is lost.
#[test]
fn test_background_frames_interleave_with_requests() {
    let config = SimConfig::default().with_worker_threads(2);
    let mut sim = SimScheduler::new(config).unwrap();
    let a = sim.spawn_actor(SpawnRequest::new(block("a", 0.0))).unwrap();

    for i in 0..20 {
        sim.update(0.016).unwrap();
        let b = sim
            .spawn_actor(SpawnRequest::new(block("b", 5.0 + i as Real * 3.0)))
            .unwrap();
        if i % 2 == 0 {
            sim.delete_actor(b).unwrap();
        }
    }
    sim.sync_with_sim_thread();
    assert_eq!(sim.actor_count(), 11);
    for (i, ptr) in sim.actors().iter().enumerate() {
        assert_eq!(ptr.read().vector_index(), i);
    }
    assert!(sim.actor(a).unwrap().read().nodes[0].velocity.y < 0.0);
}
