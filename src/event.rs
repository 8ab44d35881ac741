//! Scheduler Event System
//!
//! Fire-and-forget notifications for the scripting/event layer: actor
//! created, actor state changed, actor deleted, and free-force activity
//! (added, modified, removed, deformed, broken). Events are collected during
//! request processing and frame execution and consumed with
//! [`EventCollector::drain`].

use crate::actor::{ActorInstanceId, ActorState};
use crate::force::FreeForceId;
use crate::math::Real;

/// Kind of free-force activity, with its numeric code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FreeForceActivity {
    /// No activity
    None = 0,
    /// Force inserted
    Added = 1,
    /// Force replaced by a modify request
    Modified = 2,
    /// Force removed
    Removed = 3,
    /// Halfbeam yielded plastically
    Deformed = 4,
    /// Halfbeam broke and became inert
    Broken = 5,
}

impl FreeForceActivity {
    /// Numeric code
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Event type codes carried by [`SimEvent::type_code`].
pub const EVENT_ACTOR_CREATED: u32 = 1;
/// Actor changed activity state.
pub const EVENT_ACTOR_STATE_CHANGED: u32 = 2;
/// Actor was deleted.
pub const EVENT_ACTOR_DELETED: u32 = 3;
/// Free-force activity.
pub const EVENT_FREE_FORCE_ACTIVITY: u32 = 4;

/// One notification
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// An actor was admitted
    ActorCreated {
        /// New actor
        actor: ActorInstanceId,
        /// Its display name
        name: String,
    },
    /// An actor changed activity state
    ActorStateChanged {
        /// Affected actor
        actor: ActorInstanceId,
        /// Previous state
        old: ActorState,
        /// New state
        new: ActorState,
    },
    /// An actor was deleted
    ActorDeleted {
        /// Deleted actor
        actor: ActorInstanceId,
    },
    /// Free-force table activity
    FreeForceActivity {
        /// What happened
        activity: FreeForceActivity,
        /// Affected force
        id: FreeForceId,
        /// Stress (deformed) or applied force (broken); 0 otherwise
        stress: Real,
        /// Yield threshold (deformed) or strength (broken); 0 otherwise
        threshold: Real,
    },
}

impl SimEvent {
    /// Numeric event type
    #[must_use]
    pub fn type_code(&self) -> u32 {
        match self {
            Self::ActorCreated { .. } => EVENT_ACTOR_CREATED,
            Self::ActorStateChanged { .. } => EVENT_ACTOR_STATE_CHANGED,
            Self::ActorDeleted { .. } => EVENT_ACTOR_DELETED,
            Self::FreeForceActivity { .. } => EVENT_FREE_FORCE_ACTIVITY,
        }
    }

    /// Shorthand for a table mutation event
    #[must_use]
    pub fn free_force(activity: FreeForceActivity, id: FreeForceId) -> Self {
        Self::FreeForceActivity {
            activity,
            id,
            stress: 0.0,
            threshold: 0.0,
        }
    }
}

/// Buffers events until the caller drains them
#[derive(Clone, Debug, Default)]
pub struct EventCollector {
    events: Vec<SimEvent>,
}

impl EventCollector {
    /// Create a new event collector
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Record an event
    #[inline]
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Move every event of `other` to the end of this collector
    pub fn append(&mut self, other: &mut EventCollector) {
        self.events.append(&mut other.events);
    }

    /// Pending events, oldest first
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Whether any event is pending
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Take every pending event
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop every pending event
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
