//! Scheduler Configuration
//!
//! `serde`-deserializable settings for the scheduler, loadable from YAML.
//! Every field has a default, so a YAML document only needs the keys it
//! changes:
//!
//! ```yaml
//! fixed_dt: 0.0005          # physics substep (s)
//! max_frame_dt: 0.05        # elapsed-time clamp per frame (s)
//! gravity: [0.0, -9.81, 0.0]
//! worker_threads: 4         # 0 -> rayon default
//! async_physics: true       # run the frame on a background task
//! pseudo_collisions: false  # let networked actors take part in collision
//! realistic_commands: false # forward commands only along physical links
//! sleep:
//!   velocity_sq_threshold: 0.01
//!   timeout: 10.0
//! collision:
//!   stiffness: 1000000.0
//!   damping: 2000.0
//!   margin: 0.05
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::math::{Real, Vec3};

/// Default physics substep, in seconds.
pub const DEFAULT_FIXED_DT: f64 = 0.0005;

/// Sleep/wake thresholds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Squared mean speed above which an actor counts as moving
    pub velocity_sq_threshold: Real,
    /// Idle seconds before a simulated actor falls asleep
    pub timeout: f64,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            velocity_sq_threshold: 0.01,
            timeout: 10.0,
        }
    }
}

/// Inter-actor contact model parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Penalty stiffness per metre of penetration (N/m)
    pub stiffness: Real,
    /// Contact damping along the normal (N·s/m)
    pub damping: Real,
    /// Contact thickness around collision triangles (m)
    pub margin: Real,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            stiffness: 1_000_000.0,
            damping: 2_000.0,
            margin: 0.05,
        }
    }
}

/// Scheduler configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed physics substep (s)
    pub fixed_dt: f64,
    /// Upper bound on the elapsed time admitted per frame (s)
    pub max_frame_dt: f64,
    /// Gravity acceleration
    pub gravity: Vec3,
    /// Worker pool size (0 lets rayon decide)
    pub worker_threads: usize,
    /// Run each frame on a background task joined at the next update
    pub async_physics: bool,
    /// Networked actors take part in collision detection
    pub pseudo_collisions: bool,
    /// Commands only reach physically linked actors
    pub realistic_commands: bool,
    /// Vehicle cycling also visits networked actors
    pub cycle_through_net_actors: bool,
    /// Sleep/wake thresholds
    pub sleep: SleepConfig,
    /// Contact model
    pub collision: CollisionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            fixed_dt: DEFAULT_FIXED_DT,
            max_frame_dt: 0.05,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            worker_threads: 0,
            async_physics: true,
            pseudo_collisions: false,
            realistic_commands: false,
            cycle_through_net_actors: false,
            sleep: SleepConfig::default(),
            collision: CollisionConfig::default(),
        }
    }

    /// Set the fixed substep
    #[must_use]
    pub fn with_fixed_dt(mut self, dt: f64) -> Self {
        self.fixed_dt = dt;
        self
    }

    /// Set the per-frame elapsed-time clamp
    #[must_use]
    pub fn with_max_frame_dt(mut self, dt: f64) -> Self {
        self.max_frame_dt = dt;
        self
    }

    /// Set gravity
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the worker pool size
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Run frames on a background task (`true`) or inline (`false`)
    #[must_use]
    pub fn with_async_physics(mut self, enabled: bool) -> Self {
        self.async_physics = enabled;
        self
    }

    /// Enable collisions for networked actors
    #[must_use]
    pub fn with_pseudo_collisions(mut self, enabled: bool) -> Self {
        self.pseudo_collisions = enabled;
        self
    }

    /// Restrict command forwarding to physical links
    #[must_use]
    pub fn with_realistic_commands(mut self, enabled: bool) -> Self {
        self.realistic_commands = enabled;
        self
    }

    /// Include networked actors when cycling vehicles
    #[must_use]
    pub fn with_cycle_through_net_actors(mut self, enabled: bool) -> Self {
        self.cycle_through_net_actors = enabled;
        self
    }

    /// Set sleep thresholds
    #[must_use]
    pub fn with_sleep(mut self, sleep: SleepConfig) -> Self {
        self.sleep = sleep;
        self
    }

    /// Set the contact model
    #[must_use]
    pub fn with_collision(mut self, collision: CollisionConfig) -> Self {
        self.collision = collision;
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> SimResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml).map_err(|e| SimError::ConfigLoad {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| SimError::ConfigLoad {
            message: format!("{}: {e}", path.as_ref().display()),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check every parameter for a usable value
    pub fn validate(&self) -> SimResult<()> {
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(SimError::InvalidConfiguration {
                reason: "fixed_dt must be positive and finite",
            });
        }
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt >= self.fixed_dt) {
            return Err(SimError::InvalidConfiguration {
                reason: "max_frame_dt must be finite and at least fixed_dt",
            });
        }
        if !self.gravity.iter().all(|c| c.is_finite()) {
            return Err(SimError::InvalidConfiguration {
                reason: "gravity must be finite",
            });
        }
        if !(self.sleep.timeout.is_finite() && self.sleep.timeout > 0.0) {
            return Err(SimError::InvalidConfiguration {
                reason: "sleep timeout must be positive",
            });
        }
        if !(self.sleep.velocity_sq_threshold >= 0.0) {
            return Err(SimError::InvalidConfiguration {
                reason: "sleep velocity threshold must be non-negative",
            });
        }
        let c = &self.collision;
        if !(c.stiffness >= 0.0 && c.damping >= 0.0 && c.margin >= 0.0) {
            return Err(SimError::InvalidConfiguration {
                reason: "collision parameters must be non-negative",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
