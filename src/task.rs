//! Background Frame Task
//!
//! One task per frame runs the whole substep loop on a dedicated thread
//! while the caller continues. The task owns its [`FrameJob`] and hands it
//! back on [`SimTask::join`], which is the only synchronization point.
//!
//! Per-actor passes inside the frame are dispatched to a [`WorkerPool`]
//! (a rayon pool with the `parallel` feature, the calling thread without).

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{SimError, SimResult};
use crate::pipeline::{run_frame, FrameJob};

/// Name of the background frame thread
pub const SIM_THREAD_NAME: &str = "softbody-sim";

// ============================================================================
// Worker Pool
// ============================================================================

/// Bounded pool executing per-actor batches
#[derive(Debug)]
pub struct WorkerPool {
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers (0 = one per logical core)
    pub fn new(threads: usize) -> SimResult<Self> {
        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("softbody-worker-{i}"))
                .build()
                .map_err(|e| SimError::WorkerPool {
                    message: e.to_string(),
                })?;
            Ok(Self { pool })
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = threads;
            Ok(Self {})
        }
    }

    /// Number of workers
    #[must_use]
    pub fn num_threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Run `f` with this pool as the target of parallel iterators
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        #[cfg(feature = "parallel")]
        {
            self.pool.install(f)
        }
        #[cfg(not(feature = "parallel"))]
        {
            f()
        }
    }
}

// ============================================================================
// Frame Task
// ============================================================================

/// Handle to an in-flight background frame
#[derive(Debug)]
pub struct SimTask {
    handle: Option<JoinHandle<FrameJob>>,
}

impl SimTask {
    /// Start `job` on the background thread
    pub fn spawn(pool: Arc<WorkerPool>, mut job: FrameJob) -> SimResult<Self> {
        let handle = thread::Builder::new()
            .name(SIM_THREAD_NAME.to_string())
            .spawn(move || {
                pool.install(|| run_frame(&mut job));
                job
            })
            .map_err(|e| SimError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Run `job` on the calling thread
    pub fn run_inline(pool: &WorkerPool, mut job: FrameJob) -> FrameJob {
        pool.install(|| run_frame(&mut job));
        job
    }

    /// Whether the frame has completed (join will not block)
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the frame and take its job back.
    ///
    /// Returns `None` if the frame panicked; the panic is logged and the
    /// job's contents are lost.
    pub fn join(mut self) -> Option<FrameJob> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(job) => Some(job),
            Err(_) => {
                tracing::error!("background frame panicked; its free-force table was lost");
                None
            }
        }
    }
}

impl Drop for SimTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("background frame panicked during shutdown");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
