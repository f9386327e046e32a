//! # Scheduling Seam
//!
//! The core never spawns threads. A scheduled commit is handed to whatever
//! job system the host provides, through [`JobScheduler`], together with the
//! [`JobHandle`] it must wait for. The scheduler returns a new handle that
//! completes when the commit has been merged.
//!
//! Completion is signalled by disconnecting a `crossbeam-channel`: the job
//! owns the only [`JobSignal`], and every clone of the handle observes the
//! disconnect once the signal is dropped (after the job ran, or while it
//! unwinds).

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// A unit of work handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completion handle for zero or more scheduled jobs.
///
/// The default handle is already complete.
#[derive(Clone, Debug, Default)]
pub struct JobHandle {
    /// One receiver per job this handle waits for.
    pending: Vec<Receiver<()>>,
}

/// Completion side of a [`JobHandle`]. Dropping it completes the handle.
#[derive(Debug)]
pub struct JobSignal {
    _sender: Sender<()>,
}

impl JobSignal {
    /// Marks the job as complete.
    #[inline]
    pub fn complete(self) {
        drop(self);
    }
}

impl JobHandle {
    /// Returns a handle with nothing to wait for.
    #[inline]
    #[must_use]
    pub fn completed() -> Self {
        Self::default()
    }

    /// Creates a handle and the signal that completes it.
    #[must_use]
    pub fn pair() -> (JobSignal, Self) {
        let (sender, receiver) = bounded(0);
        (
            JobSignal { _sender: sender },
            Self {
                pending: vec![receiver],
            },
        )
    }

    /// Combines several handles into one that completes when all do.
    #[must_use]
    pub fn combine<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let pending = handles.into_iter().flat_map(|h| h.pending).collect();
        Self { pending }
    }

    /// Returns a handle that completes when both `self` and `other` do.
    #[must_use]
    pub fn join(mut self, other: Self) -> Self {
        self.pending.extend(other.pending);
        self
    }

    /// Returns `true` if every job this handle covers has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending
            .iter()
            .all(|rx| matches!(rx.try_recv(), Err(TryRecvError::Disconnected)))
    }

    /// Blocks until every job this handle covers has finished.
    pub fn wait(&self) {
        for rx in &self.pending {
            // Nothing is ever sent; recv returns once the signal is dropped.
            let _ = rx.recv();
        }
    }
}

/// A host job system able to run work after its dependencies.
pub trait JobScheduler {
    /// Runs `job` once `dependency` has completed.
    ///
    /// Returns a handle that completes after `job` has run.
    fn schedule(&self, dependency: JobHandle, job: Job) -> JobHandle;
}

/// Runs every job immediately on the calling thread.
///
/// Useful for single-threaded hosts and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineScheduler;

impl JobScheduler for InlineScheduler {
    fn schedule(&self, dependency: JobHandle, job: Job) -> JobHandle {
        dependency.wait();
        job();
        JobHandle::completed()
    }
}
