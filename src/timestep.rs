//! Fixed-Timestep Accumulator and Simulation Pace
//!
//! `StepClock` turns a variable wall-clock delta into a whole number of
//! fixed substeps and carries the remainder to the next frame. `SimPace`
//! holds the user-facing speed multiplier, pause state and single-step
//! advance.
//!
//! All clock arithmetic is `f64`: with `f32` the canonical
//! `0.033 / 0.0005` case rounds down to 65 substeps.

/// Fraction of a substep treated as rounding noise.
const STEP_TOLERANCE: f64 = 1.0e-9;

/// Substeps to run for one admitted frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepPlan {
    /// Number of fixed substeps
    pub substeps: u32,
    /// Substep length (s)
    pub dt: f64,
    /// Scaled time actually covered by this frame (`substeps * dt`)
    pub simulated: f64,
    /// Scaled time the clock consumed from the caller before remainder
    pub admitted: f64,
}

/// Fixed-timestep accumulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepClock {
    fixed_dt: f64,
    max_frame_dt: f64,
    remainder: f64,
}

impl StepClock {
    /// Create a clock with the given substep and elapsed-time clamp
    #[must_use]
    pub fn new(fixed_dt: f64, max_frame_dt: f64) -> Self {
        Self {
            fixed_dt,
            max_frame_dt,
            remainder: 0.0,
        }
    }

    /// Fixed substep length
    #[inline]
    #[must_use]
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Time carried to the next frame
    #[inline]
    #[must_use]
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    /// Admit `elapsed` seconds of wall time at `speed`.
    ///
    /// Elapsed time is clamped to `max_frame_dt`, scaled by `speed` and added
    /// to the carried remainder. Returns `None` when the total does not reach
    /// one substep; the total is then carried in full.
    pub fn advance(&mut self, elapsed: f64, speed: f64) -> Option<StepPlan> {
        let clamped = if elapsed.is_finite() {
            elapsed.clamp(0.0, self.max_frame_dt)
        } else {
            0.0
        };
        let scaled = clamped * speed.max(0.0);
        let total = scaled + self.remainder;
        // Tolerate representation error so an exact multiple is not lost.
        let substeps = (total / self.fixed_dt + STEP_TOLERANCE).floor();
        if substeps < 1.0 {
            self.remainder = total;
            return None;
        }
        let simulated = substeps * self.fixed_dt;
        self.remainder = (total - simulated).max(0.0);
        Some(StepPlan {
            substeps: substeps as u32,
            dt: self.fixed_dt,
            simulated,
            admitted: scaled,
        })
    }

    /// Forget the carried remainder
    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }
}

// ============================================================================
// Simulation Pace
// ============================================================================

/// Speed multiplier, pause and single-step state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimPace {
    speed: f64,
    last_speed: f64,
    paused: bool,
    /// Scaled time granted by a single-step request while paused
    pending_advance: f64,
}

/// Lower bound of the speed multiplier.
pub const MIN_SIM_SPEED: f64 = 0.01;
/// Upper bound of the speed multiplier.
pub const MAX_SIM_SPEED: f64 = 10.0;

impl SimPace {
    /// Real-time pace
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: 1.0,
            last_speed: 1.0,
            paused: false,
            pending_advance: 0.0,
        }
    }

    /// Current speed multiplier
    #[inline]
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Whether the simulation is paused
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set the speed multiplier (clamped); remembers non-unit speeds for `reset`
    pub fn set_speed(&mut self, speed: f64) {
        let speed = speed.clamp(MIN_SIM_SPEED, MAX_SIM_SPEED);
        if speed != 1.0 {
            self.last_speed = speed;
        }
        self.speed = speed;
    }

    /// Speed up smoothly while the control is held for `dt` seconds
    pub fn accelerate(&mut self, dt: f64) {
        self.set_speed(self.speed * 2.0_f64.powf(dt / 2.0));
    }

    /// Slow down smoothly while the control is held for `dt` seconds
    pub fn decelerate(&mut self, dt: f64) {
        self.set_speed(self.speed * 0.5_f64.powf(dt / 2.0));
    }

    /// Toggle between real time and the last non-unit speed
    pub fn reset(&mut self) {
        if self.speed == 1.0 {
            self.speed = self.last_speed;
        } else {
            self.last_speed = self.speed;
            self.speed = 1.0;
        }
    }

    /// Toggle pause
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.pending_advance = 0.0;
    }

    /// While paused, grant exactly one substep of simulated time
    pub fn request_single_step(&mut self, fixed_dt: f64) {
        if self.paused {
            self.pending_advance = fixed_dt / self.speed;
        }
    }

    /// Wall time to feed the clock this frame
    pub(crate) fn frame_elapsed(&mut self, elapsed: f64) -> f64 {
        if self.paused {
            std::mem::take(&mut self.pending_advance)
        } else {
            elapsed
        }
    }
}

impl Default for SimPace {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
