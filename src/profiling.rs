//! Frame Profiling
//!
//! Per-stage wall-clock timers and per-frame counters for the background
//! frame task. Timings are recorded in microseconds.
//!
//! # Profiled Stages
//!
//! - Forces (accumulator reset and native beams, parallel)
//! - Collision (inter-actor detection and response)
//! - Free forces (sequential auxiliary pass)
//! - Integration (node updates, parallel)
//! - Frame (whole background frame)

use std::time::{Duration, Instant};

/// A single stage timer
#[derive(Clone, Debug)]
pub struct ProfileEntry {
    /// Stage name
    pub name: &'static str,
    /// Total accumulated microseconds
    pub total_micros: u64,
    /// Number of recordings
    pub call_count: u64,
    /// Most recent recording
    pub last_micros: u64,
    /// Largest single recording
    pub peak_micros: u64,
}

impl ProfileEntry {
    /// Create a new profile entry
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total_micros: 0,
            call_count: 0,
            last_micros: 0,
            peak_micros: 0,
        }
    }

    /// Average microseconds per recording
    #[inline]
    #[must_use]
    pub fn average_micros(&self) -> u64 {
        if self.call_count == 0 {
            0
        } else {
            self.total_micros / self.call_count
        }
    }

    /// Record a measurement
    pub fn record(&mut self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros = self.total_micros.saturating_add(micros);
        self.call_count += 1;
        self.last_micros = micros;
        self.peak_micros = self.peak_micros.max(micros);
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        self.total_micros = 0;
        self.call_count = 0;
        self.last_micros = 0;
        self.peak_micros = 0;
    }
}

/// Counters for one background frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Substeps executed
    pub substeps: u32,
    /// Actors integrated this frame
    pub active_actors: u32,
    /// Inter-actor contacts applied, summed over substeps
    pub contacts: u32,
    /// Free forces that produced a force, summed over substeps
    pub free_forces_applied: u32,
    /// Native beams and halfbeams broken this frame
    pub beams_broken: u32,
}

/// Forces stage index
pub const STAGE_FORCES: usize = 0;
/// Collision stage index
pub const STAGE_COLLISION: usize = 1;
/// Free-force stage index
pub const STAGE_FREE_FORCES: usize = 2;
/// Integration stage index
pub const STAGE_INTEGRATION: usize = 3;
/// Whole-frame stage index
pub const STAGE_FRAME: usize = 4;

/// Collects stage timings and the last frame's counters
#[derive(Clone, Debug)]
pub struct FrameProfiler {
    entries: Vec<ProfileEntry>,
    /// Counters of the last completed frame
    pub stats: FrameStats,
    /// Frames recorded
    pub frame_count: u64,
    /// Whether timings are recorded
    pub enabled: bool,
}

impl FrameProfiler {
    /// Create a profiler with the default stages
    #[must_use]
    pub fn new() -> Self {
        let entries = vec![
            ProfileEntry::new("forces"),
            ProfileEntry::new("collision"),
            ProfileEntry::new("free_forces"),
            ProfileEntry::new("integration"),
            ProfileEntry::new("frame"),
        ];

        Self {
            entries,
            stats: FrameStats::default(),
            frame_count: 0,
            enabled: true,
        }
    }

    /// Record a duration for a stage
    #[inline]
    pub fn record(&mut self, stage: usize, elapsed: Duration) {
        if self.enabled && stage < self.entries.len() {
            self.entries[stage].record(elapsed);
        }
    }

    /// Run `f` and record its duration under `stage`
    pub fn time<R>(&mut self, stage: usize, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        out
    }

    /// Begin a new frame (reset per-frame counters)
    pub fn begin_frame(&mut self) {
        self.stats = FrameStats::default();
        self.frame_count += 1;
    }

    /// Entry for a stage
    #[must_use]
    pub fn get(&self, stage: usize) -> Option<&ProfileEntry> {
        self.entries.get(stage)
    }

    /// Last recording of a stage
    #[must_use]
    pub fn last_micros(&self, stage: usize) -> u64 {
        self.entries.get(stage).map_or(0, |e| e.last_micros)
    }

    /// Average recording of a stage
    #[must_use]
    pub fn average_micros(&self, stage: usize) -> u64 {
        self.entries
            .get(stage)
            .map_or(0, ProfileEntry::average_micros)
    }

    /// Reset all profiling data
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.reset();
        }
        self.stats = FrameStats::default();
        self.frame_count = 0;
    }

    /// `(name, last, average, peak)` for every stage
    #[must_use]
    pub fn summary(&self) -> Vec<(&'static str, u64, u64, u64)> {
        self.entries
            .iter()
            .map(|e| (e.name, e.last_micros, e.average_micros(), e.peak_micros))
            .collect()
    }
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
