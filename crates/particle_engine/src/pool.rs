//! A fixed pool of worker threads that each tick phase fans out over.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};
use snafu::ResultExt as _;

use crate::errors::{EngineError, WorkerPoolSnafu};

/// A cooperative request to stop the current and all following phases.
///
/// Cancelling is sticky: once raised it stays raised for the lifetime of the engine. Workers check
/// it before each chunk and periodically inside long loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Ask the engine to stop what it's doing.
    pub fn cancel(&self) {
        tracing::debug!("Particle engine cancellation requested");
        self.0.store(true, Ordering::Release);
    }

    /// Has cancellation been requested?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A phase was cancelled before all of its chunks completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// The default number of workers: all the available parallelism minus one for the calling thread,
/// and never less than 1.
#[must_use]
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .saturating_sub(1)
        .max(1)
}

/// A reusable set of worker threads. Built once and kept for the whole simulation.
#[derive(Debug)]
pub struct WorkerPool {
    /// The underlying threads.
    pool: rayon::ThreadPool,
    /// Number of threads, and therefore the maximum number of chunks per phase.
    threads: usize,
    /// Checked by every task.
    cancel: CancelToken,
}

impl WorkerPool {
    /// Spawn the worker threads.
    ///
    /// # Errors
    /// If the OS refuses to spawn the threads.
    pub fn new(threads: usize, cancel: CancelToken) -> Result<Self, EngineError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("particle-worker-{index}"))
            .build()
            .context(WorkerPoolSnafu)?;
        tracing::debug!("Started {threads} particle worker thread(s)");

        Ok(Self {
            pool,
            threads,
            cancel,
        })
    }

    /// Run one task per chunk of `[0, total)` on the pool and wait for all of them.
    ///
    /// Results come back in chunk order. A task returns `None` when it noticed cancellation
    /// part-way through. If the token was raised at any point during the phase then all results
    /// are thrown away, so that nothing partial is ever applied.
    ///
    /// # Errors
    /// `Cancelled` if cancellation was requested before or during the phase.
    pub fn fan_out<T, F>(&self, total: usize, task: F) -> Result<Vec<T>, Cancelled>
    where
        T: Send,
        F: Fn(Range<usize>) -> Option<T> + Sync,
    {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let chunks = crate::partition::partition(total, self.threads);
        let results: Vec<Option<T>> = self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    task(chunk)
                })
                .collect()
        });

        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        results.into_iter().collect::<Option<Vec<T>>>().ok_or(Cancelled)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn results_are_in_chunk_order() {
        let pool = WorkerPool::new(4, CancelToken::default()).unwrap();
        let chunks = pool.fan_out(10, |chunk| Some(chunk)).unwrap();
        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn runs_on_the_workers() {
        let pool = WorkerPool::new(2, CancelToken::default()).unwrap();
        let names = pool
            .fan_out(2, |_| std::thread::current().name().map(ToOwned::to_owned))
            .unwrap();
        assert!(names.iter().all(|name| name.starts_with("particle-worker-")));
    }

    #[test]
    fn nothing_to_do() {
        let pool = WorkerPool::new(3, CancelToken::default()).unwrap();
        let results: Vec<()> = pool.fan_out(0, |_| Some(())).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelToken::default();
        let pool = WorkerPool::new(2, cancel.clone()).unwrap();
        cancel.cancel();
        assert_eq!(pool.fan_out(10, |_| Some(())), Err(Cancelled));
    }

    #[test]
    fn cancelled_part_way_discards_everything() {
        let cancel = CancelToken::default();
        let pool = WorkerPool::new(2, cancel.clone()).unwrap();
        let result = pool.fan_out(100, |chunk| {
            if chunk.start == 0 {
                cancel.cancel();
                return None;
            }
            Some(chunk.len())
        });
        assert_eq!(result, Err(Cancelled));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn default_threads_leaves_room_for_the_caller() {
        assert!(default_threads() >= 1);
    }
}
