#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use softbody_scheduler::{
    Actor, ActorInstanceId, Beam, FreeForceId, FreeForceRequest, FreeForceSpec, HalfbeamParams,
    LinkBehavior, ModifyKind, Node, NodeRef, Request, SimConfig, SimScheduler, SpawnRequest, Vec3,
};

#[derive(Debug, Arbitrary)]
enum Op {
    /// Spawn a small body at a grid position
    Spawn { x: i8, y: i8, nodes: u8 },
    /// Delete by raw instance id
    Delete { id: u8 },
    /// Teleport by raw instance id
    Teleport { id: u8, x: i8 },
    /// Constant force on (actor, node)
    Constant { force: u8, actor: u8, node: u8, magnitude: i16 },
    /// Halfbeam between two actors
    Halfbeam { force: u8, a: u8, b: u8, strength: u16, rope: bool },
    /// Remove a force
    Remove { force: u8 },
    /// Seat the player
    Seat { id: u8 },
    /// Advance by milliseconds
    Step { millis: u8 },
    /// Pause, single-step and speed controls
    Pace { pause: bool, speed: u8 },
}

// Fuzz the request surface with random request/frame sequences.
// Rejected requests are fine; panics are not.
fuzz_target!(|ops: Vec<Op>| {
    let config = SimConfig::default().with_async_physics(false).with_worker_threads(2);
    let Ok(mut sim) = SimScheduler::new(config) else {
        return;
    };

    for op in ops.into_iter().take(64) {
        let request = match op {
            Op::Spawn { x, y, nodes } => {
                let n = (nodes as usize % 6) + 1;
                let nodes: Vec<Node> = (0..n)
                    .map(|i| Node::new(Vec3::new(x as f32 + i as f32 * 0.5, y as f32, 0.0), 5.0))
                    .collect();
                let beams = (1..n).map(|i| Beam::between(&nodes, i - 1, i)).collect();
                Request::Spawn(SpawnRequest::new(Actor::new("fuzz", nodes, beams)))
            }
            Op::Delete { id } => Request::Delete(ActorInstanceId(id as i32 % 8)),
            Op::Teleport { id, x } => Request::Modify {
                actor: ActorInstanceId(id as i32 % 8),
                kind: ModifyKind::Teleport(Vec3::new(x as f32, 0.0, 0.0)),
            },
            Op::Constant { force, actor, node, magnitude } => {
                Request::AddFreeForce(FreeForceRequest {
                    id: FreeForceId(force as i32 % 16),
                    base: NodeRef::new(ActorInstanceId(actor as i32 % 8), node as usize % 8),
                    spec: FreeForceSpec::Constant {
                        direction: Vec3::new(0.0, 1.0, 0.0),
                        magnitude: magnitude as f32,
                    },
                })
            }
            Op::Halfbeam { force, a, b, strength, rope } => Request::AddFreeForce(FreeForceRequest {
                id: FreeForceId(force as i32 % 16),
                base: NodeRef::new(ActorInstanceId(a as i32 % 8), 0),
                spec: FreeForceSpec::Halfbeam {
                    target: NodeRef::new(ActorInstanceId(b as i32 % 8), 0),
                    behavior: if rope { LinkBehavior::Rope } else { LinkBehavior::Generic },
                    params: HalfbeamParams {
                        strength: strength as f32 + 1.0,
                        ..HalfbeamParams::default()
                    },
                },
            }),
            Op::Remove { force } => Request::RemoveFreeForce(FreeForceId(force as i32 % 16)),
            Op::Seat { id } => Request::SeatPlayer(ActorInstanceId(id as i32 % 8)),
            Op::Step { millis } => {
                let _ = sim.update(millis as f64 / 1000.0);
                continue;
            }
            Op::Pace { pause, speed } => {
                if pause {
                    sim.toggle_pause();
                    sim.request_single_step();
                }
                sim.set_sim_speed(speed as f64 / 16.0);
                continue;
            }
        };
        let _ = sim.process_request(request);
    }

    let _ = sim.update(0.016);
    for (i, ptr) in sim.actors().iter().enumerate() {
        assert_eq!(ptr.read().vector_index(), i);
    }
});
