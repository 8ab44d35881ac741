//! Scheduler Error Types
//!
//! Unified error type for the soft-body scheduler. Every request that can be
//! rejected (spawn, delete, modify, free-force add/modify/remove, network
//! state ingestion) returns `Result<T, SimError>`; a rejected request leaves
//! every table untouched.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

use crate::actor::ActorInstanceId;
use crate::force::FreeForceId;

/// Unified error type for scheduler operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    /// No live actor carries this instance id.
    #[error("actor {id} not found")]
    ActorNotFound {
        /// The id that was looked up
        id: ActorInstanceId,
    },
    /// The actor exists but has already been disposed.
    #[error("actor {id} is disposed")]
    ActorDisposed {
        /// The disposed actor
        id: ActorInstanceId,
    },
    /// Spawn requested an instance id that is already in use.
    #[error("actor instance id {id} already in use")]
    DuplicateActorId {
        /// The conflicting id
        id: ActorInstanceId,
    },
    /// Node index is out of range for the referenced actor.
    #[error("node {node} out of range for actor {actor} (count={count})")]
    NodeOutOfRange {
        /// Owning actor
        actor: ActorInstanceId,
        /// The invalid node index
        node: usize,
        /// Number of nodes in the actor
        count: usize,
    },
    /// Free-force add with an id that is already in the table.
    #[error("free force id {id} already in use")]
    DuplicateFreeForceId {
        /// The conflicting id
        id: FreeForceId,
    },
    /// Free-force modify/remove with an id that is not in the table.
    #[error("free force id {id} not found")]
    FreeForceNotFound {
        /// The missing id
        id: FreeForceId,
    },
    /// A free-force request is malformed (e.g. zero-length direction).
    #[error("invalid free force {id}: {reason}")]
    InvalidFreeForce {
        /// The request's id
        id: FreeForceId,
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Actor construction did not produce a usable body.
    #[error("invalid actor: {reason}")]
    InvalidActor {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Invalid configuration parameter.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
    /// Configuration could not be read or parsed.
    #[error("failed to load configuration: {message}")]
    ConfigLoad {
        /// Underlying I/O or parse message
        message: String,
    },
    /// Remote state was addressed to an actor that is not `NetworkedOk`.
    #[error("actor {id} is not driven by the network")]
    NotNetworked {
        /// The addressed actor
        id: ActorInstanceId,
    },
    /// A network state blob was truncated, corrupted or incompatible.
    #[error("state blob rejected: {reason}")]
    StateDecode {
        /// What failed to validate
        reason: &'static str,
    },
    /// The worker pool could not be created.
    #[error("worker pool unavailable: {message}")]
    WorkerPool {
        /// Message from the pool builder
        message: String,
    },
}

/// Convenience alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

// ============================================================================
// Tests
// ============================================================================
