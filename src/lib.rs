//! # Softbody-Scheduler
//!
//! **Fixed-Timestep Scheduling for Multi-Actor Soft-Body Simulation**
//!
//! A Rust library that advances a set of node/beam soft bodies ("actors") in
//! real time: wall-clock time is converted into fixed substeps, each substep
//! runs a parallel per-actor force pass, inter-actor collision and a
//! sequential pass over user-placed free forces, and actors that stop moving
//! are put to sleep until something touches them.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **Fixed timestep** | Elapsed time → whole substeps, remainder carried |
//! | **Parallel force pass** | One task per active actor on a bounded pool |
//! | **Inter-actor collision** | Broad phase on predicted boxes, node-vs-triangle contacts |
//! | **Free forces** | Constant, towards-point, towards-node and halfbeam links |
//! | **Sleep/wake** | Timeout sleep, recursive activation, snowball wake |
//! | **Command forwarding** | Player inputs relayed to nearby or linked actors |
//! | **Network state** | Versioned state blobs, per-source clock offsets |
//!
//! ## Frame Overview
//!
//! ```text
//! control thread                     background frame
//! ──────────────                     ────────────────
//! update(elapsed)
//!   join previous frame ◄─────────── FrameJob returned
//!   sleep/wake, commands, net blobs
//!   spawn frame ───────────────────► substeps × (forces ∥, collision, free forces, integrate)
//! requests (spawn/delete/...)
//!   join frame first
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use softbody_scheduler::prelude::*;
//!
//! let mut sim = SimScheduler::new(SimConfig::default().with_async_physics(false))?;
//! let nodes = vec![
//!     Node::new(Vec3::new(0.0, 1.0, 0.0), 10.0),
//!     Node::new(Vec3::new(1.0, 1.0, 0.0), 10.0),
//! ];
//! let beams = vec![Beam::between(&nodes, 0, 1)];
//! let id = sim.spawn_actor(SpawnRequest::new(Actor::new("crate", nodes, beams)))?;
//!
//! let substeps = sim.update(0.033)?;
//! assert_eq!(substeps, 66);
//!
//! let actor = sim.actor(id).unwrap();
//! assert!(actor.read().nodes[0].velocity.y < 0.0);
//! # Ok::<(), SimError>(())
//! ```
//!
//! Author: Moroya Sakamoto

pub mod actor;
pub mod beam;
pub mod collider;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod force;
pub mod math;
pub mod netcode;
pub mod pipeline;
pub mod profiling;
pub mod roster;
pub mod scheduler;
pub mod sleeping;
pub mod task;
pub mod timestep;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::actor::{
        Actor, ActorInstanceId, ActorLink, ActorPtr, ActorState, Beam, CommandChannel, LinkKind,
        NetLink, Node,
    };
    pub use crate::beam::{BeamLink, LinkBehavior};
    pub use crate::collider::GroundModel;
    pub use crate::commands::{LinkingRequest, LinkingRequestKind};
    pub use crate::config::{CollisionConfig, SimConfig, SleepConfig};
    pub use crate::error::{SimError, SimResult};
    pub use crate::event::{FreeForceActivity, SimEvent};
    pub use crate::force::{FreeForceId, FreeForceRequest, FreeForceSpec, HalfbeamParams, NodeRef};
    pub use crate::math::{Aabb, Real, Vec3};
    pub use crate::netcode::{OutgoingState, RemoteState, StreamHealth};
    pub use crate::profiling::FrameStats;
    pub use crate::scheduler::{ModifyKind, Request, RequestOutcome, SimScheduler, SpawnRequest};
}

// Re-export main types at crate root
pub use prelude::*;

// ============================================================================
// Integration Tests
// ============================================================================
