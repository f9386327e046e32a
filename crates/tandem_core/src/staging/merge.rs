//! # Commit Merge
//!
//! The only point where staged events become visible to readers.
//!
//! The merge runs as one serial pass while holding exclusive access to the
//! buffer, so a reader sees either none or all of a commit:
//!
//! 1. Seal the staging structure and count pending events.
//! 2. Grow both Current sequences once, to the next power of two.
//! 3. Drain the staging structure in its merge order into both loops.

use std::sync::Arc;

use crate::channel::{DualChannelBuffer, SharedChannel};
use crate::event::Event;
use crate::schedule::{JobHandle, JobScheduler};

/// A staging structure that can be drained by [`CommitMerger`].
pub trait StagedBatch<T: Event>: Send + 'static {
    /// Stops accepting events. Called once, before [`pending`](Self::pending).
    fn seal(&mut self) {}

    /// Number of events waiting to be merged.
    fn pending(&mut self) -> usize;

    /// Hands every staged event to `sink`, in merge order, as contiguous
    /// chunks. Consumes the structure and releases its memory.
    fn drain_into<F>(self, sink: F)
    where
        F: FnMut(&[T]);
}

/// Outcome of one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Events appended to each loop.
    pub merged: usize,
    /// Whether a Current sequence had to grow.
    pub grew: bool,
}

/// Serial merge of a staging area into a channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitMerger;

impl CommitMerger {
    /// Merges `staged` into both loops' Current sequences.
    ///
    /// An empty staging area is a no-op.
    pub fn merge<T, S>(buffer: &mut DualChannelBuffer<T>, mut staged: S) -> MergeReport
    where
        T: Event,
        S: StagedBatch<T>,
    {
        staged.seal();
        let pending = staged.pending();
        let grew = buffer.reserve_for(pending);

        let mut merged = 0;
        staged.drain_into(|chunk| {
            buffer.append(chunk);
            merged += chunk.len();
        });

        tracing::debug!(event = T::NAME, merged, grew, "staged events committed");
        MergeReport { merged, grew }
    }

    /// Schedules [`merge`](Self::merge) on `scheduler` after `dependency`.
    ///
    /// The job takes the channel's write lock for the whole merge.
    pub fn schedule<T, S, J>(
        channel: &SharedChannel<T>,
        staged: S,
        scheduler: &J,
        dependency: JobHandle,
    ) -> JobHandle
    where
        T: Event,
        S: StagedBatch<T>,
        J: JobScheduler + ?Sized,
    {
        let channel = Arc::clone(channel);
        scheduler.schedule(
            dependency,
            Box::new(move || {
                let mut buffer = channel.write();
                Self::merge(&mut buffer, staged);
            }),
        )
    }
}
