//! Simulation Scheduler
//!
//! The root object. Owns the actor list, the free-force table, the
//! fixed-step clock and the background frame task, and processes every
//! request between frames.
//!
//! # Frame
//!
//! ```text
//! update(elapsed)
//!   ├─ clock: elapsed → substeps (return if 0)
//!   ├─ join previous background frame
//!   ├─ sleep/wake pass
//!   ├─ command forwarding from the player
//!   ├─ outgoing network states
//!   └─ spawn background frame (or run it inline)
//! ```
//!
//! Every request joins the background frame before it touches shared state,
//! so the actor list and the free-force table are never mutated while a
//! frame is in flight.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::sync::Arc;

use crate::actor::{Actor, ActorInstanceId, ActorPtr, ActorState};
use crate::commands::{forward_commands, LinkingRequest, LinkingRequestKind};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::event::{EventCollector, SimEvent};
use crate::force::{FreeForceId, FreeForceRequest, FreeForceTable};
use crate::math::{Real, Vec3};
use crate::netcode::{NetStreamRegistry, OutgoingState, RemoteState, StreamHealth};
use crate::pipeline::FrameJob;
use crate::profiling::{FrameProfiler, FrameStats};
use crate::roster;
use crate::sleeping::{send_all_sleeping, update_sleeping_state, wake_up_all, StateTransition};
use crate::task::{SimTask, WorkerPool};
use crate::timestep::{SimPace, StepClock};

// ============================================================================
// Requests
// ============================================================================

/// Hook run once on a freshly admitted actor
pub type SpawnHook = Box<dyn FnOnce(&mut Actor) + Send>;

/// A fully constructed actor to admit
pub struct SpawnRequest {
    /// The body
    pub actor: Actor,
    /// Requested id; allocated when `None`
    pub instance_id: Option<ActorInstanceId>,
    /// Post-construction hook
    pub on_spawned: Option<SpawnHook>,
}

impl SpawnRequest {
    /// Spawn `actor` with an allocated id
    #[must_use]
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            instance_id: None,
            on_spawned: None,
        }
    }

    /// Request a specific instance id
    #[must_use]
    pub fn with_instance_id(mut self, id: ActorInstanceId) -> Self {
        self.instance_id = Some(id);
        self
    }

    /// Run `hook` on the actor once it has its identity
    #[must_use]
    pub fn with_hook(mut self, hook: impl FnOnce(&mut Actor) + Send + 'static) -> Self {
        self.on_spawned = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for SpawnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("actor", &self.actor.name)
            .field("instance_id", &self.instance_id)
            .field("on_spawned", &self.on_spawned.is_some())
            .finish()
    }
}

/// Modification applied to a live actor
#[derive(Clone, Debug)]
pub enum ModifyKind {
    /// Restore the construction shape at the current position
    ResetOnSpot,
    /// Restore the construction positions
    ResetToInitial,
    /// Move so that node 0 lands on the point
    Teleport(Vec3),
    /// Replace the node/beam network, keeping identity
    Reload(Box<Actor>),
}

/// Every request the scheduler accepts
#[derive(Debug)]
pub enum Request {
    /// Admit an actor
    Spawn(SpawnRequest),
    /// Delete an actor
    Delete(ActorInstanceId),
    /// Modify an actor
    Modify {
        /// Target actor
        actor: ActorInstanceId,
        /// What to do
        kind: ModifyKind,
    },
    /// Seat the player in an actor
    SeatPlayer(ActorInstanceId),
    /// Leave the current actor
    UnseatPlayer,
    /// Insert a free force
    AddFreeForce(FreeForceRequest),
    /// Replace a free force
    ModifyFreeForce(FreeForceRequest),
    /// Remove a free force
    RemoveFreeForce(FreeForceId),
}

/// Result of an accepted request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// An actor was admitted with this id
    Spawned(ActorInstanceId),
    /// The request was applied
    Accepted,
}

fn rejected(op: &'static str, err: SimError) -> SimError {
    tracing::warn!(op, error = %err, "request rejected");
    err
}

// ============================================================================
// Scheduler
// ============================================================================

/// Fixed-step scheduler for a set of soft-body actors
#[derive(Debug)]
pub struct SimScheduler {
    config: SimConfig,
    pool: Arc<WorkerPool>,
    actors: Vec<ActorPtr>,
    free_forces: FreeForceTable,
    events: EventCollector,
    profiler: FrameProfiler,
    task: Option<SimTask>,
    clock: StepClock,
    pace: SimPace,
    total_sim_time: f64,
    next_instance_id: i32,
    player: Option<ActorInstanceId>,
    prev_player: Option<ActorInstanceId>,
    forced_awake: bool,
    net: NetStreamRegistry,
    linking_requests: Vec<LinkingRequest>,
    outgoing: Vec<OutgoingState>,
}

impl SimScheduler {
    /// Create a scheduler; fails on invalid configuration or pool creation
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_threads)?;
        tracing::info!(
            threads = pool.num_threads(),
            fixed_dt = config.fixed_dt,
            async_physics = config.async_physics,
            "scheduler ready"
        );
        Ok(Self {
            clock: StepClock::new(config.fixed_dt, config.max_frame_dt),
            config,
            pool: Arc::new(pool),
            actors: Vec::new(),
            free_forces: FreeForceTable::new(),
            events: EventCollector::new(),
            profiler: FrameProfiler::new(),
            task: None,
            pace: SimPace::new(),
            total_sim_time: 0.0,
            next_instance_id: 0,
            player: None,
            prev_player: None,
            forced_awake: false,
            net: NetStreamRegistry::new(),
            linking_requests: Vec::new(),
            outgoing: Vec::new(),
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Wait for the background frame and take back what it owns
    pub fn sync_with_sim_thread(&mut self) {
        if let Some(task) = self.task.take() {
            if let Some(job) = task.join() {
                self.absorb(job);
            }
        }
    }

    /// Whether a background frame is still running
    #[must_use]
    pub fn is_sim_thread_busy(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn absorb(&mut self, job: FrameJob) {
        let FrameJob {
            free_forces,
            mut events,
            profiler,
            ..
        } = job;
        self.free_forces = free_forces;
        self.events.append(&mut events);
        self.profiler = profiler;
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Advance the simulation by `elapsed` seconds of wall time.
    ///
    /// Returns the number of substeps admitted; 0 means the time was carried
    /// to the next call and nothing else happened.
    pub fn update(&mut self, elapsed: f64) -> SimResult<u32> {
        let elapsed = self.pace.frame_elapsed(elapsed);
        let Some(plan) = self.clock.advance(elapsed, self.pace.speed()) else {
            return Ok(0);
        };

        self.sync_with_sim_thread();
        self.total_sim_time += plan.simulated;
        let player = self.player_index();

        {
            let mut guards: Vec<_> = self.actors.iter().map(|a| a.write()).collect();

            let transitions = update_sleeping_state(
                &mut guards,
                player,
                plan.simulated,
                &self.config.sleep,
                self.forced_awake,
            );
            for t in &transitions {
                self.events.push(state_event(guards[t.index].instance_id(), t));
            }

            if let Some(p) = player {
                let outcome = forward_commands(&mut guards, p, self.config.realistic_commands);
                for t in &outcome.transitions {
                    self.events.push(state_event(guards[t.index].instance_id(), t));
                }
                self.linking_requests.extend(outcome.requests);

                let seated = &mut guards[p];
                let id = seated.instance_id();
                if seated.toggle_ties {
                    seated.toggle_ties = false;
                    self.linking_requests.push(LinkingRequest {
                        kind: LinkingRequestKind::TieToggle,
                        actor: id,
                        group: -1,
                    });
                }
                if seated.toggle_ropes {
                    seated.toggle_ropes = false;
                    self.linking_requests.push(LinkingRequest {
                        kind: LinkingRequestKind::RopeToggle,
                        actor: id,
                        group: -1,
                    });
                }
            }

            let time_ms = (self.total_sim_time * 1000.0) as i32;
            for actor in guards.iter_mut() {
                actor.update_physics =
                    actor.state == ActorState::Simulated && !actor.physics_paused;
                if actor.state == ActorState::Simulated && actor.remote_audience {
                    self.outgoing.push(OutgoingState {
                        actor: actor.instance_id(),
                        blob: RemoteState::capture(actor, time_ms).to_bytes(),
                    });
                }
            }
        }

        let job = FrameJob {
            actors: self.actors.clone(),
            free_forces: std::mem::take(&mut self.free_forces),
            events: EventCollector::new(),
            profiler: std::mem::take(&mut self.profiler),
            plan,
            gravity: self.config.gravity,
            collision: self.config.collision,
            pseudo_collisions: self.config.pseudo_collisions,
        };
        if self.config.async_physics {
            self.task = Some(SimTask::spawn(Arc::clone(&self.pool), job)?);
        } else {
            let job = SimTask::run_inline(&self.pool, job);
            self.absorb(job);
        }

        tracing::debug!(
            substeps = plan.substeps,
            remainder = self.clock.remainder(),
            total = self.total_sim_time,
            "frame admitted"
        );
        Ok(plan.substeps)
    }

    /// Simulated time of every admitted frame, in seconds
    #[inline]
    #[must_use]
    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }

    /// Time carried to the next frame
    #[inline]
    #[must_use]
    pub fn remainder(&self) -> f64 {
        self.clock.remainder()
    }

    /// Counters of the last joined frame
    #[must_use]
    pub fn last_frame_stats(&self) -> FrameStats {
        self.profiler.stats
    }

    /// Stage timings of joined frames
    #[must_use]
    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    // ========================================================================
    // Pace
    // ========================================================================

    /// Current speed multiplier
    #[must_use]
    pub fn sim_speed(&self) -> f64 {
        self.pace.speed()
    }

    /// Set the speed multiplier
    pub fn set_sim_speed(&mut self, speed: f64) {
        self.pace.set_speed(speed);
    }

    /// Speed up while the control is held for `dt`
    pub fn accelerate_sim(&mut self, dt: f64) {
        self.pace.accelerate(dt);
    }

    /// Slow down while the control is held for `dt`
    pub fn decelerate_sim(&mut self, dt: f64) {
        self.pace.decelerate(dt);
    }

    /// Toggle between real time and the last custom speed
    pub fn reset_sim_pace(&mut self) {
        self.pace.reset();
    }

    /// Toggle pause
    pub fn toggle_pause(&mut self) {
        self.pace.toggle_pause();
    }

    /// Whether the simulation is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pace.is_paused()
    }

    /// While paused, run exactly one substep on the next update
    pub fn request_single_step(&mut self) {
        self.pace.request_single_step(self.clock.fixed_dt());
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Dispatch any request
    pub fn process_request(&mut self, request: Request) -> SimResult<RequestOutcome> {
        match request {
            Request::Spawn(rq) => self.spawn_actor(rq).map(RequestOutcome::Spawned),
            Request::Delete(id) => self.delete_actor(id).map(|()| RequestOutcome::Accepted),
            Request::Modify { actor, kind } => {
                self.modify_actor(actor, kind).map(|()| RequestOutcome::Accepted)
            }
            Request::SeatPlayer(id) => self.seat_player(id).map(|()| RequestOutcome::Accepted),
            Request::UnseatPlayer => {
                self.unseat_player();
                Ok(RequestOutcome::Accepted)
            }
            Request::AddFreeForce(rq) => {
                self.add_free_force(&rq).map(|()| RequestOutcome::Accepted)
            }
            Request::ModifyFreeForce(rq) => {
                self.modify_free_force(&rq).map(|()| RequestOutcome::Accepted)
            }
            Request::RemoveFreeForce(id) => {
                self.remove_free_force(id).map(|()| RequestOutcome::Accepted)
            }
        }
    }

    /// Admit a fully constructed actor
    pub fn spawn_actor(&mut self, request: SpawnRequest) -> SimResult<ActorInstanceId> {
        self.sync_with_sim_thread();
        let SpawnRequest {
            mut actor,
            instance_id,
            on_spawned,
        } = request;

        actor.validate().map_err(|e| rejected("spawn", e))?;
        let id = match instance_id {
            Some(id) if !id.is_valid() => {
                return Err(rejected(
                    "spawn",
                    SimError::InvalidActor {
                        reason: "instance id must be non-negative",
                    },
                ));
            }
            Some(id) if self.index_of(id).is_some() => {
                return Err(rejected("spawn", SimError::DuplicateActorId { id }));
            }
            Some(id) => id,
            None => self.allocate_instance_id(),
        };
        self.next_instance_id = self.next_instance_id.max(id.0.saturating_add(1));

        actor.instance_id = id;
        actor.vector_index = self.actors.len();
        actor.sleep_counter = 0.0;
        actor.update_physics = actor.state == ActorState::Simulated && !actor.physics_paused;
        if let Some(hook) = on_spawned {
            hook(&mut actor);
        }

        tracing::info!(actor = %id, name = %actor.name, nodes = actor.nodes.len(), "actor spawned");
        self.events.push(SimEvent::ActorCreated {
            actor: id,
            name: actor.name.clone(),
        });
        self.actors.push(crate::actor::share(actor));
        Ok(id)
    }

    fn allocate_instance_id(&mut self) -> ActorInstanceId {
        loop {
            let id = ActorInstanceId(self.next_instance_id);
            self.next_instance_id = self.next_instance_id.wrapping_add(1).max(0);
            if self.index_of(id).is_none() {
                return id;
            }
        }
    }

    /// Delete an actor after joining the background frame
    pub fn delete_actor(&mut self, id: ActorInstanceId) -> SimResult<()> {
        self.sync_with_sim_thread();
        let index = self
            .index_of(id)
            .ok_or_else(|| rejected("delete", SimError::ActorNotFound { id }))?;
        let ptr = self.actors.remove(index);
        let mut actor = ptr.write();
        if actor.is_disposed() {
            drop(actor);
            self.actors.insert(index, ptr);
            return Err(rejected("delete", SimError::ActorDisposed { id }));
        }

        let dropped = self.free_forces.remove_referencing(id);
        if let Some(link) = actor.net_link {
            let source_still_used = self
                .actors
                .iter()
                .any(|a| a.read().net_link.is_some_and(|l| l.source_id == link.source_id));
            if !source_still_used {
                self.net.clear_time_offset(link.source_id);
            }
        }
        if self.player == Some(id) {
            self.player = None;
        }
        if self.prev_player == Some(id) {
            self.prev_player = None;
        }
        actor.dispose();
        drop(actor);

        for (i, a) in self.actors.iter().enumerate() {
            a.write().vector_index = i;
        }
        tracing::info!(actor = %id, free_forces_dropped = dropped, "actor deleted");
        self.events.push(SimEvent::ActorDeleted { actor: id });
        Ok(())
    }

    /// Reset, teleport or reload an actor; wakes it
    pub fn modify_actor(&mut self, id: ActorInstanceId, kind: ModifyKind) -> SimResult<()> {
        self.sync_with_sim_thread();
        let ptr = self
            .actor(id)
            .ok_or_else(|| rejected("modify", SimError::ActorNotFound { id }))?;
        let mut actor = ptr.write();
        if actor.is_disposed() {
            return Err(rejected("modify", SimError::ActorDisposed { id }));
        }

        match kind {
            ModifyKind::ResetOnSpot => actor.reset_on_spot(),
            ModifyKind::ResetToInitial => actor.reset_to_initial(),
            ModifyKind::Teleport(target) => actor.teleport(&target),
            ModifyKind::Reload(fresh) => {
                fresh.validate().map_err(|e| rejected("modify", e))?;
                actor.reload(*fresh);
            }
        }

        actor.sleep_counter = 0.0;
        if actor.state == ActorState::Sleeping {
            actor.state = ActorState::Simulated;
            self.events.push(SimEvent::ActorStateChanged {
                actor: id,
                old: ActorState::Sleeping,
                new: ActorState::Simulated,
            });
        }
        actor.update_physics = actor.state == ActorState::Simulated && !actor.physics_paused;
        drop(actor);

        let pruned = self.free_forces.prune_invalid(&mut self.events);
        if !pruned.is_empty() {
            tracing::info!(actor = %id, ?pruned, "free forces removed after modify");
        }
        Ok(())
    }

    /// Seat the player in `id`
    pub fn seat_player(&mut self, id: ActorInstanceId) -> SimResult<()> {
        let ptr = self
            .actor(id)
            .ok_or_else(|| rejected("seat", SimError::ActorNotFound { id }))?;
        if ptr.read().is_disposed() {
            return Err(rejected("seat", SimError::ActorDisposed { id }));
        }
        if self.player != Some(id) {
            self.prev_player = self.player;
        }
        self.player = Some(id);
        Ok(())
    }

    /// Leave the current actor
    pub fn unseat_player(&mut self) {
        if let Some(id) = self.player.take() {
            self.prev_player = Some(id);
        }
    }

    /// Actor the player is seated in
    #[must_use]
    pub fn player(&self) -> Option<ActorInstanceId> {
        self.player
    }

    fn player_index(&self) -> Option<usize> {
        self.player.and_then(|id| self.index_of(id))
    }

    // ========================================================================
    // Free forces
    // ========================================================================

    /// Insert a free force at the end of the table
    pub fn add_free_force(&mut self, request: &FreeForceRequest) -> SimResult<()> {
        self.sync_with_sim_thread();
        self.free_forces
            .add(request, &self.actors, &mut self.events)
            .map_err(|e| rejected("add free force", e))
    }

    /// Replace a free force in place
    pub fn modify_free_force(&mut self, request: &FreeForceRequest) -> SimResult<()> {
        self.sync_with_sim_thread();
        self.free_forces
            .modify(request, &self.actors, &mut self.events)
            .map_err(|e| rejected("modify free force", e))
    }

    /// Remove a free force
    pub fn remove_free_force(&mut self, id: FreeForceId) -> SimResult<()> {
        self.sync_with_sim_thread();
        self.free_forces
            .remove(id, &mut self.events)
            .map_err(|e| rejected("remove free force", e))
    }

    /// Allocate an unused free-force id
    pub fn free_force_next_id(&mut self) -> FreeForceId {
        self.sync_with_sim_thread();
        self.free_forces.next_id()
    }

    /// The free-force table, after joining the background frame
    pub fn free_forces(&mut self) -> &FreeForceTable {
        self.sync_with_sim_thread();
        &self.free_forces
    }

    // ========================================================================
    // Activity
    // ========================================================================

    fn record_transitions(&mut self, transitions: &[StateTransition]) {
        for t in transitions {
            let id = self.actors[t.index].read().instance_id();
            self.events.push(state_event(id, t));
        }
    }

    /// Wake every sleeping actor
    pub fn wake_up_all_actors(&mut self) {
        self.sync_with_sim_thread();
        let transitions = {
            let mut guards: Vec<_> = self.actors.iter().map(|a| a.write()).collect();
            wake_up_all(&mut guards)
        };
        self.record_transitions(&transitions);
    }

    /// Put every simulated actor to sleep and clear forced-awake
    pub fn send_all_actors_sleeping(&mut self) {
        self.sync_with_sim_thread();
        self.forced_awake = false;
        let transitions = {
            let mut guards: Vec<_> = self.actors.iter().map(|a| a.write()).collect();
            send_all_sleeping(&mut guards)
        };
        self.record_transitions(&transitions);
    }

    /// Keep every actor awake regardless of motion
    pub fn set_forced_awake(&mut self, forced: bool) {
        self.forced_awake = forced;
    }

    /// Whether actors are kept awake
    #[must_use]
    pub fn is_forced_awake(&self) -> bool {
        self.forced_awake
    }

    /// Delete every actor and reset clock, pace and time
    pub fn clean_up_simulation(&mut self) {
        self.sync_with_sim_thread();
        let ids: Vec<ActorInstanceId> =
            self.actors.iter().map(|a| a.read().instance_id()).collect();
        for id in ids {
            if let Err(e) = self.delete_actor(id) {
                tracing::error!(actor = %id, error = %e, "cleanup failed to delete actor");
            }
        }
        self.free_forces.clear();
        self.clock.reset();
        self.pace = SimPace::new();
        self.total_sim_time = 0.0;
        self.player = None;
        self.prev_player = None;
        self.forced_awake = false;
        self.net.clear();
        self.linking_requests.clear();
        self.outgoing.clear();
        tracing::info!("simulation cleaned up");
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Queue a received state blob on a `NetworkedOk` actor.
    ///
    /// The state is applied at the start of the next background frame.
    pub fn receive_remote_state(&mut self, id: ActorInstanceId, blob: &[u8]) -> SimResult<()> {
        let state = RemoteState::from_bytes(blob).map_err(|e| rejected("remote state", e))?;
        let ptr = self
            .actor(id)
            .ok_or_else(|| rejected("remote state", SimError::ActorNotFound { id }))?;
        let mut actor = ptr.write();
        if actor.state != ActorState::NetworkedOk {
            return Err(rejected("remote state", SimError::NotNetworked { id }));
        }
        if state.positions.len() != actor.nodes.len() {
            return Err(rejected(
                "remote state",
                SimError::StateDecode {
                    reason: "node count does not match actor",
                },
            ));
        }
        actor.queue_remote_state(state);
        Ok(())
    }

    /// Take the blobs produced for actors with a remote audience
    pub fn drain_outgoing_states(&mut self) -> Vec<OutgoingState> {
        std::mem::take(&mut self.outgoing)
    }

    /// Record the clock offset of `source` if not yet known
    pub fn register_net_time_offset(
        &mut self,
        source: i32,
        remote_time_ms: i32,
        local_time_ms: i32,
    ) {
        self.net.register_time_offset(source, remote_time_ms, local_time_ms);
    }

    /// Adjust a known clock offset
    pub fn update_net_time_offset(&mut self, source: i32, delta_ms: i32) {
        self.net.update_time_offset(source, delta_ms);
    }

    /// Clock offset of `source`, 0 if unknown
    #[must_use]
    pub fn net_time_offset(&self, source: i32) -> i32 {
        self.net.time_offset(source)
    }

    /// Record a stream that matched no local actor
    pub fn add_stream_mismatch(&mut self, source: i32, stream: i32) {
        self.net.add_mismatch(source, stream);
    }

    /// Health of the streams of `source`
    #[must_use]
    pub fn check_network_streams_ok(&self, source: i32) -> StreamHealth {
        self.net
            .health(source, roster::has_networked_actor(&self.actors, source))
    }

    /// Forget the mismatches of `source`; returns its `NetworkedOk` actors
    /// so the caller can delete them
    pub fn remove_stream_source(&mut self, source: i32) -> Vec<ActorInstanceId> {
        self.net.forget_mismatches(source);
        roster::networked_actors_of(&self.actors, source)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Join the background frame and take every pending event
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.sync_with_sim_thread();
        self.events.drain()
    }

    /// Take every pending linkage toggle
    pub fn drain_linking_requests(&mut self) -> Vec<LinkingRequest> {
        std::mem::take(&mut self.linking_requests)
    }

    // ========================================================================
    // Roster
    // ========================================================================
    //
    // Identity, state and flags change only on the control thread, so lookups
    // by those never need the background frame. Node positions move while a
    // frame runs; queries reading them join it first.

    fn index_of(&self, id: ActorInstanceId) -> Option<usize> {
        self.actors.iter().position(|a| a.read().instance_id() == id)
    }

    /// Every live actor in vector-index order
    #[must_use]
    pub fn actors(&self) -> &[ActorPtr] {
        &self.actors
    }

    /// Number of live actors
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Actor by instance id
    #[must_use]
    pub fn actor(&self, id: ActorInstanceId) -> Option<ActorPtr> {
        roster::actor_by_id(&self.actors, id)
    }

    /// Actor by vector index
    #[must_use]
    pub fn actor_at(&self, index: usize) -> Option<ActorPtr> {
        roster::actor_by_vector_index(&self.actors, index)
    }

    /// Actor bound to a remote stream
    #[must_use]
    pub fn actor_by_net_link(&self, source: i32, stream: i32) -> Option<ActorPtr> {
        roster::actor_by_net_link(&self.actors, source, stream)
    }

    /// Actors not driven by the network
    #[must_use]
    pub fn local_actors(&self) -> Vec<ActorPtr> {
        roster::local_actors(&self.actors)
    }

    /// Closest actor to `point`, with the distance, after joining the
    /// background frame
    pub fn nearest_actor(&mut self, point: &Vec3) -> Option<(ActorPtr, Real)> {
        self.sync_with_sim_thread();
        roster::nearest_actor(&self.actors, point)
    }

    fn cycle_pivot(&self) -> Option<usize> {
        match self.player_index() {
            Some(p) => Some(p),
            None => self
                .prev_player
                .and_then(|id| self.index_of(id))
                .map(|i| i + 1),
        }
    }

    /// Next vehicle for the player seat
    #[must_use]
    pub fn fetch_next_vehicle(&self) -> Option<ActorPtr> {
        let networked = self.config.cycle_through_net_actors;
        roster::next_vehicle(&self.actors, self.cycle_pivot(), networked)
    }

    /// Previous vehicle for the player seat
    #[must_use]
    pub fn fetch_previous_vehicle(&self) -> Option<ActorPtr> {
        let networked = self.config.cycle_through_net_actors;
        roster::previous_vehicle(&self.actors, self.cycle_pivot(), networked)
    }

    /// First rescuer actor
    #[must_use]
    pub fn fetch_rescue_vehicle(&self) -> Option<ActorPtr> {
        roster::rescue_vehicle(&self.actors)
    }
}

fn state_event(actor: ActorInstanceId, t: &StateTransition) -> SimEvent {
    SimEvent::ActorStateChanged {
        actor,
        old: t.old,
        new: t.new,
    }
}

// ============================================================================
// Tests
// ============================================================================
