//! Explicit concurrency and resource handle passed into `denoise()`.
//!
//! Replaces the source pipeline's global "nested levels" setting and global
//! FFT-plan mutex with a value the caller owns and passes in, per the
//! re-architecture notes: no process-wide singletons, no mutable globals.

use std::sync::Mutex;

use rayon::{ThreadPool, ThreadPoolBuilder};
use rustdct::DctPlanner;

/// Owns the thread pools and the DCT-plan creation lock used by a
/// `denoise()` call.
pub struct DenoiseRuntime {
    tiles: ThreadPool,
    nested: usize,
    planner: Mutex<DctPlanner<f32>>,
}

impl DenoiseRuntime {
    /// Builds a runtime with `num_workers` outer (tile) threads and
    /// `nested` inner threads per worker for level/direction/block-row
    /// fan-out. `nested` defaults to `max(1, available_parallelism /
    /// num_workers)` when `None`.
    pub fn new(num_workers: usize, nested: Option<usize>) -> Self {
        let num_workers = num_workers.max(1);
        let nested = nested.unwrap_or_else(|| {
            let procs = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            (procs / num_workers).max(1)
        });
        let tiles = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build()
            .expect("failed to build tile thread pool");
        Self {
            tiles,
            nested,
            planner: Mutex::new(DctPlanner::new()),
        }
    }

    /// A runtime that performs all work on the calling thread.
    pub fn single_threaded() -> Self {
        Self::new(1, Some(1))
    }

    pub fn num_workers(&self) -> usize {
        self.tiles.current_num_threads()
    }

    pub fn nested(&self) -> usize {
        self.nested
    }

    /// Runs `f` on the tile thread pool.
    pub(crate) fn install_tiles<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.tiles.install(f)
    }

    /// Builds DCT plans under the runtime's process-wide-equivalent lock.
    /// FFT-library plan construction is typically not reentrant, so callers
    /// must go through this method rather than building plans directly.
    pub(crate) fn with_planner<R>(&self, f: impl FnOnce(&mut DctPlanner<f32>) -> R) -> R {
        let mut planner = self.planner.lock().expect("DCT planner lock poisoned");
        f(&mut planner)
    }
}

impl Default for DenoiseRuntime {
    fn default() -> Self {
        Self::new(1, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_threaded_runtime_has_one_worker() {
        let rt = DenoiseRuntime::single_threaded();
        assert_eq!(rt.num_workers(), 1);
        assert_eq!(rt.nested(), 1);
    }
}
