//! Strategy pool: a fixed rayon thread pool that runs packing attempts.
//!
//! Tasks are spawned FIFO onto a dedicated [`rayon::ThreadPool`] with named
//! worker threads. Every task gets its own cancellation flag and result
//! channel, returned to the caller as a [`TaskHandle`]. A task that panics is
//! reported to its caller as [`Error::WorkerFailure`]; the worker thread
//! itself keeps serving the queue.
//!
//! [`StrategyPool::race`] fans a set of [`RaceTask`]s out and returns as soon
//! as one result is good enough, cancelling the tasks still queued or running.

use crate::heuristic::{Attempt, PackContext, Packer};
use platecut_core::{Config, Error, Piece, PlacementResult, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to a submitted task.
pub struct TaskHandle<T> {
    id: u64,
    cancelled: Arc<AtomicBool>,
    receiver: Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Task id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cooperative cancellation.
    ///
    /// A queued task is skipped and reports [`Error::Cancelled`]; a running
    /// task sees the flag at its next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Blocks until the task finishes.
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().unwrap_or(Err(Error::PoolShutdown))
    }
}

/// A unit of work that can take part in a race.
pub trait RaceTask: Send + 'static {
    /// Heuristic and order this task stands for.
    fn attempt(&self) -> Attempt;

    /// Packs one layer under the given cancellation flag.
    fn execute(self, cancelled: Arc<AtomicBool>) -> PlacementResult;
}

/// One attempt with its own copy of the batch, already sorted.
#[derive(Debug, Clone)]
pub struct PackTask {
    /// Heuristic and order.
    pub attempt: Attempt,
    /// Pieces in attempt order.
    pub pieces: Vec<Piece>,
    /// Packing context.
    pub context: PackContext,
}

impl PackTask {
    /// Sorts a copy of `pieces` for `attempt`.
    pub fn new(attempt: Attempt, pieces: &[Piece], context: PackContext) -> Self {
        Self {
            attempt,
            pieces: attempt.order.sorted(pieces, &context.container),
            context,
        }
    }

    /// Runs the heuristic under the given cancellation flag.
    pub fn run(&self, cancelled: Arc<AtomicBool>) -> PlacementResult {
        let ctx = self.context.with_cancel_flag(cancelled);
        self.attempt.heuristic.pack(&self.pieces, &ctx)
    }
}

impl RaceTask for PackTask {
    fn attempt(&self) -> Attempt {
        self.attempt
    }

    fn execute(self, cancelled: Arc<AtomicBool>) -> PlacementResult {
        self.run(cancelled)
    }
}

/// Outcome of a race.
#[derive(Debug, Default)]
pub struct RaceOutcome {
    /// Completed results in arrival order.
    pub results: Vec<(Attempt, PlacementResult)>,
    /// Failed or cancelled attempts.
    pub failures: Vec<(Attempt, Error)>,
    /// True when a good-enough result ended the race.
    pub early_exit: bool,
}

/// Fixed-size pool of worker threads.
pub struct StrategyPool {
    pool: ThreadPool,
    workers: usize,
    shutdown: Arc<AtomicBool>,
    failures: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl StrategyPool {
    /// Starts `workers` threads (at least 2).
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(2);
        let failures = Arc::new(AtomicUsize::new(0));
        let handler_failures = Arc::clone(&failures);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("platecut-worker-{}", i))
            .panic_handler(move |payload| {
                handler_failures.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "worker panicked outside a task: {}",
                    panic_message(payload.as_ref())
                );
            })
            .build()
            .map_err(|e| Error::Internal(format!("failed to start strategy pool: {}", e)))?;
        log::debug!("strategy pool started with {} workers", workers);
        Ok(Self {
            pool,
            workers,
            shutdown: Arc::new(AtomicBool::new(false)),
            failures,
            next_id: AtomicU64::new(1),
        })
    }

    /// Starts a pool sized by [`Config::worker_count`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.worker_count())
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of tasks that panicked.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn enqueue<T, F, D>(&self, cancelled: Arc<AtomicBool>, task: F, deliver: D) -> Result<u64>
    where
        T: Send + 'static,
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
        D: FnOnce(Result<T>) + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(Error::PoolShutdown);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shutdown = Arc::clone(&self.shutdown);
        let failures = Arc::clone(&self.failures);

        self.pool.spawn_fifo(move || {
            if shutdown.load(Ordering::Acquire) {
                deliver(Err(Error::PoolShutdown));
                return;
            }
            if cancelled.load(Ordering::Relaxed) {
                deliver(Err(Error::Cancelled(id)));
                return;
            }
            match catch_unwind(AssertUnwindSafe(|| task(cancelled))) {
                Ok(value) => deliver(Ok(value)),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    log::warn!("task {} panicked: {}", id, reason);
                    failures.fetch_add(1, Ordering::Relaxed);
                    deliver(Err(Error::WorkerFailure { task: id, reason }));
                }
            }
        });
        Ok(id)
    }

    /// Queues an arbitrary job; it receives its own cancellation flag.
    pub fn submit_with<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();
        let id = self.enqueue(cancelled.clone(), task, move |result| {
            let _ = sender.send(result);
        })?;
        Ok(TaskHandle {
            id,
            cancelled,
            receiver,
        })
    }

    /// Queues one packing attempt.
    pub fn submit(&self, task: PackTask) -> Result<TaskHandle<PlacementResult>> {
        self.submit_with(move |cancelled| task.run(cancelled))
    }

    /// Runs `tasks` concurrently until one result satisfies `good_enough`
    /// or every task has reported.
    pub fn race<T, F>(&self, tasks: Vec<T>, good_enough: F) -> RaceOutcome
    where
        T: RaceTask,
        F: Fn(&PlacementResult) -> bool,
    {
        let mut outcome = RaceOutcome::default();
        let (sender, receiver) = mpsc::channel();
        let mut attempts = Vec::with_capacity(tasks.len());
        let mut flags = Vec::with_capacity(tasks.len());

        for (slot, task) in tasks.into_iter().enumerate() {
            let attempt = task.attempt();
            attempts.push(attempt);
            let flag = Arc::new(AtomicBool::new(false));
            let sender = sender.clone();
            let queued = self.enqueue(
                flag.clone(),
                move |cancelled| task.execute(cancelled),
                move |result| {
                    let _ = sender.send((slot, result));
                },
            );
            match queued {
                Ok(_) => flags.push(flag),
                Err(e) => outcome.failures.push((attempt, e)),
            }
        }
        drop(sender);

        let mut outstanding = flags.len();
        while outstanding > 0 {
            let Ok((slot, result)) = receiver.recv() else {
                break;
            };
            outstanding -= 1;
            match result {
                Ok(result) => {
                    let good = good_enough(&result);
                    outcome.results.push((attempts[slot], result));
                    if good {
                        outcome.early_exit = true;
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("attempt {} failed: {}", attempts[slot], e);
                    outcome.failures.push((attempts[slot], e));
                }
            }
        }

        if outcome.early_exit {
            for flag in &flags {
                flag.store(true, Ordering::Relaxed);
            }
            log::debug!(
                "race resolved early by {} after {} of {} attempts",
                outcome
                    .results
                    .last()
                    .map(|(a, _)| a.to_string())
                    .unwrap_or_default(),
                outcome.results.len(),
                attempts.len()
            );
        }

        outcome
    }

    /// Stops accepting tasks; tasks still queued report [`Error::PoolShutdown`].
    ///
    /// The worker threads exit once the pool is dropped.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{Heuristic, SortOrder};
    use crate::maxrects::FitRule;
    use platecut_core::Container;
    use std::sync::Barrier;

    fn task(container: Container, pieces: &[Piece]) -> PackTask {
        let ctx = PackContext::from_config(
            &Config::default(),
            container,
            Arc::new(AtomicBool::new(false)),
        );
        PackTask::new(
            Attempt::new(Heuristic::MaxRects(FitRule::BestShortSide), SortOrder::AreaDesc),
            pieces,
            ctx,
        )
    }

    #[test]
    fn test_pool_has_at_least_two_workers() {
        let pool = StrategyPool::new(0).unwrap();
        assert_eq!(pool.workers(), 2);
    }

    #[test]
    fn test_submit_pack_task() {
        let pool = StrategyPool::new(2).unwrap();
        let container = Container::new(1000.0, 1000.0);
        let pieces: Vec<Piece> = (0..4).map(|i| Piece::new(i, 1, 500.0, 500.0)).collect();

        let result = pool.submit(task(container, &pieces)).unwrap().wait().unwrap();
        assert!(result.all_placed());
    }

    #[test]
    fn test_panicking_task_reports_failure_and_pool_keeps_serving() {
        let pool = StrategyPool::new(2).unwrap();

        let failed = pool
            .submit_with(|_| -> u32 { panic!("heuristic exploded") })
            .unwrap()
            .wait();
        match failed {
            Err(Error::WorkerFailure { reason, .. }) => assert_eq!(reason, "heuristic exploded"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pool.failures(), 1);

        let handles: Vec<_> = (0..4)
            .map(|i| pool.submit_with(move |_| i * 2).unwrap())
            .collect();
        let values: Vec<u32> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(values, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_cancel_queued_task() {
        let pool = StrategyPool::new(2).unwrap();
        let barrier = Arc::new(Barrier::new(3));

        let blockers: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                pool.submit_with(move |_| {
                    barrier.wait();
                })
                .unwrap()
            })
            .collect();

        let queued = pool.submit_with(|_| 42u32).unwrap();
        let id = queued.id();
        queued.cancel();
        assert!(queued.is_cancelled());
        barrier.wait();

        assert_eq!(queued.wait(), Err(Error::Cancelled(id)));
        for blocker in blockers {
            assert!(blocker.wait().is_ok());
        }
    }

    #[test]
    fn test_race_early_exit() {
        let pool = StrategyPool::new(2).unwrap();
        let container = Container::new(1000.0, 1000.0);
        let pieces: Vec<Piece> = (0..4).map(|i| Piece::new(i, 1, 500.0, 500.0)).collect();
        let tasks: Vec<PackTask> = (0..6).map(|_| task(container, &pieces)).collect();

        let outcome = pool.race(tasks, |r| r.all_placed());
        assert!(outcome.early_exit);
        assert_eq!(outcome.results.len(), 1);
    }

    #[test]
    fn test_race_collects_all_results() {
        let pool = StrategyPool::new(3).unwrap();
        let container = Container::new(1000.0, 1000.0);
        let pieces: Vec<Piece> = (0..3).map(|i| Piece::new(i, 1, 700.0, 700.0)).collect();
        let tasks: Vec<PackTask> = (0..5).map(|_| task(container, &pieces)).collect();

        let outcome = pool.race(tasks, |r| r.all_placed());
        assert!(!outcome.early_exit);
        assert_eq!(outcome.results.len(), 5);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = StrategyPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(matches!(
            pool.submit_with(|_| 1u8),
            Err(Error::PoolShutdown)
        ));
    }
}
