//! # Worker-Pool Scheduler
//!
//! A fixed pool of threads fed through one `crossbeam-channel` queue:
//!
//! ```text
//! schedule(dep, job) ──> [ (dep, job, signal) | ... ] ──> worker 0..N
//!                                                          │
//!                                                          ├─ dep.wait()
//!                                                          ├─ job()
//!                                                          └─ drop(signal)
//! ```
//!
//! Workers pop tasks in submission order. A task's dependency was either
//! built outside the pool or scheduled earlier, so it has already been
//! taken by a worker by the time its dependent is, and waiting on it cannot
//! starve the pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tandem_core::{Job, JobHandle, JobScheduler, JobSignal};

use crate::config::SchedulerConfig;
use crate::error::{HostError, HostResult};

/// One queued unit of work.
struct Task {
    dependency: JobHandle,
    job: Job,
    signal: JobSignal,
}

/// Counters shared with the workers.
#[derive(Debug, Default)]
struct PoolStats {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Runs scheduled jobs on a fixed set of worker threads.
///
/// Dropping the scheduler lets the workers drain the queue, then joins them.
pub struct ThreadScheduler {
    /// Task queue. `None` once shutdown has begun.
    sender: Option<Sender<Task>>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
    /// Shared counters.
    stats: Arc<PoolStats>,
}

impl ThreadScheduler {
    /// Starts `config.worker_threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] for a zero-sized pool, or
    /// [`HostError::WorkerSpawn`] if a thread cannot be started.
    pub fn new(config: &SchedulerConfig) -> HostResult<Self> {
        config.validate()?;

        let (sender, receiver) = unbounded::<Task>();
        let stats = Arc::new(PoolStats::default());

        let mut workers = Vec::with_capacity(config.worker_threads);
        for index in 0..config.worker_threads {
            let worker_receiver = receiver.clone();
            let worker_stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(format!("tandem-worker-{index}"))
                .spawn(move || Self::worker_loop(&worker_receiver, &worker_stats))
                .map_err(|e| HostError::WorkerSpawn(e.to_string()))?;
            workers.push(handle);
        }

        tracing::info!(workers = workers.len(), "scheduler started");

        Ok(Self {
            sender: Some(sender),
            workers,
            stats,
        })
    }

    /// Worker thread main loop. Exits once the queue is disconnected and empty.
    fn worker_loop(receiver: &Receiver<Task>, stats: &PoolStats) {
        while let Ok(task) = receiver.recv() {
            task.dependency.wait();

            if panic::catch_unwind(AssertUnwindSafe(task.job)).is_err() {
                stats.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!("scheduled job panicked");
            }

            stats.completed.fetch_add(1, Ordering::Relaxed);
            task.signal.complete();
        }
    }

    /// Number of worker threads.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs that have finished running, including ones that panicked.
    #[must_use]
    pub fn completed_jobs(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Jobs that panicked.
    #[must_use]
    pub fn panicked_jobs(&self) -> u64 {
        self.stats.panicked.load(Ordering::Relaxed)
    }

    /// Jobs queued but not yet taken by a worker.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }
}

impl JobScheduler for ThreadScheduler {
    fn schedule(&self, dependency: JobHandle, job: Job) -> JobHandle {
        let (signal, handle) = JobHandle::pair();
        let task = Task {
            dependency,
            job,
            signal,
        };

        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(task) {
                    // Every worker is gone; run on the caller so the handle
                    // still completes.
                    tracing::warn!("scheduler has no live workers, running job inline");
                    let task = rejected.into_inner();
                    task.dependency.wait();
                    (task.job)();
                }
            }
            None => {
                task.dependency.wait();
                (task.job)();
            }
        }

        handle
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        // Disconnect the queue; workers finish what is queued, then exit.
        self.sender.take();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        tracing::info!(
            completed = self.stats.completed.load(Ordering::Relaxed),
            "scheduler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn pool(workers: usize) -> ThreadScheduler {
        ThreadScheduler::new(&SchedulerConfig {
            worker_threads: workers,
        })
        .unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ThreadScheduler::new(&SchedulerConfig { worker_threads: 0 })
            .err()
            .unwrap();
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn test_jobs_run_and_complete() {
        let scheduler = pool(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<JobHandle> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                scheduler.schedule(
                    JobHandle::completed(),
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }),
                )
            })
            .collect();

        JobHandle::combine(handles).wait();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
        assert_eq!(scheduler.completed_jobs(), 100);
        assert_eq!(scheduler.worker_count(), 4);
    }

    #[test]
    fn test_dependencies_are_honoured() {
        let scheduler = pool(4);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut previous = JobHandle::completed();
        for step in 0..20 {
            let order = Arc::clone(&order);
            previous = scheduler.schedule(previous, Box::new(move || order.lock().push(step)));
        }

        previous.wait();
        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_external_dependency_blocks_job() {
        let scheduler = pool(2);
        let (gate, dependency) = JobHandle::pair();
        let ran = Arc::new(AtomicUsize::new(0));

        let job_ran = Arc::clone(&ran);
        let handle = scheduler.schedule(
            dependency,
            Box::new(move || {
                job_ran.fetch_add(1, Ordering::Relaxed);
            }),
        );

        assert!(!handle.is_complete());
        assert_eq!(ran.load(Ordering::Relaxed), 0);

        gate.complete();
        handle.wait();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_panicking_job_still_completes() {
        let scheduler = pool(1);

        let handle = scheduler.schedule(JobHandle::completed(), Box::new(|| panic!("boom")));
        handle.wait();
        assert_eq!(scheduler.panicked_jobs(), 1);

        // The worker survived.
        let after = scheduler.schedule(JobHandle::completed(), Box::new(|| {}));
        after.wait();
        assert_eq!(scheduler.completed_jobs(), 2);
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = pool(2);
            for _ in 0..50 {
                let counter = Arc::clone(&counter);
                let _ = scheduler.schedule(
                    JobHandle::completed(),
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }),
                );
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 50);
    }
}
