//! # Queue Staging
//!
//! Unordered multi-producer staging backed by an unbounded
//! `crossbeam-channel`. Any number of workers may write at the same time
//! with no coordination. The merged order across workers is whatever order
//! the queue yields; each worker's own writes stay in order.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::merge::{CommitMerger, MergeReport, StagedBatch};
use super::StagingSlot;
use crate::channel::{DualChannelBuffer, SharedChannel};
use crate::error::{EventResult, StagingState};
use crate::event::Event;
use crate::schedule::{JobHandle, JobScheduler};

/// The queue itself. Moved into the commit job.
struct EventQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T: Event> StagedBatch<T> for EventQueue<T> {
    fn pending(&mut self) -> usize {
        self.receiver.len()
    }

    fn drain_into<F>(self, mut sink: F)
    where
        F: FnMut(&[T]),
    {
        let Self { sender, receiver } = self;
        drop(sender);
        for event in receiver.try_iter() {
            sink(std::slice::from_ref(&event));
        }
        // Disconnect now so outstanding writers report `false` from here on.
        drop(receiver);
    }
}

/// Multi-producer staging area for one commit cycle.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut staging = QueueStaging::new();
///
/// std::thread::scope(|s| {
///     for chunk in work.chunks(1024) {
///         let writer = staging.writer().unwrap();
///         s.spawn(move || {
///             for item in chunk {
///                 writer.write(item.to_event());
///             }
///         });
///     }
/// });
///
/// let done = staging.commit(&channel, &scheduler, JobHandle::completed())?;
/// ```
pub struct QueueStaging<T: Event> {
    slot: StagingSlot<EventQueue<T>>,
}

/// Cloneable producer handle of a [`QueueStaging`].
pub struct QueueWriter<T> {
    sender: Sender<T>,
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Event> QueueWriter<T> {
    /// Stages one event (non-blocking).
    ///
    /// Returns `false` once the commit has drained the queue, or after a
    /// dispose; the event is dropped. Writes must finish before the commit
    /// runs (sequence them through its `dependency`): a write racing with
    /// the drain itself may return `true` and still be lost.
    #[inline]
    pub fn write(&self, event: T) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl<T: Event> QueueStaging<T> {
    /// Creates an empty staging area.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            slot: StagingSlot::Open(EventQueue { sender, receiver }),
        }
    }

    /// Returns a producer handle that can be moved to another worker.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`](crate::EventError::StagingConsumed)
    /// if the staging area was already committed or disposed.
    pub fn writer(&self) -> EventResult<QueueWriter<T>> {
        let queue = self.slot.get()?;
        Ok(QueueWriter {
            sender: queue.sender.clone(),
        })
    }

    /// Stages one event from any thread.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`](crate::EventError::StagingConsumed)
    /// if the staging area was already committed or disposed.
    pub fn write(&self, event: T) -> EventResult<()> {
        let queue = self.slot.get()?;
        // The receiver lives in the same slot, so this cannot disconnect.
        let _ = queue.sender.send(event);
        Ok(())
    }

    /// Returns the number of staged events (0 once consumed).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slot.get().map_or(0, |queue| queue.receiver.len())
    }

    /// Returns `true` until the staging area is committed or disposed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    /// Merges the staged events into `buffer` right now, on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`](crate::EventError::StagingConsumed)
    /// on a second commit or after a dispose.
    pub fn commit_now(&mut self, buffer: &mut DualChannelBuffer<T>) -> EventResult<MergeReport> {
        let queue = self.slot.take(StagingState::Committed)?;
        Ok(CommitMerger::merge(buffer, queue))
    }

    /// Schedules the merge into `channel` after `dependency`.
    ///
    /// Returns the handle of the merge job. The staging area is invalid
    /// from this point on.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`](crate::EventError::StagingConsumed)
    /// on a second commit or after a dispose.
    pub fn commit<J>(
        &mut self,
        channel: &SharedChannel<T>,
        scheduler: &J,
        dependency: JobHandle,
    ) -> EventResult<JobHandle>
    where
        J: JobScheduler + ?Sized,
    {
        let queue = self.slot.take(StagingState::Committed)?;
        Ok(CommitMerger::schedule(channel, queue, scheduler, dependency))
    }

    /// Discards every staged event without merging.
    ///
    /// Use only if you know what you are doing: producers still holding a
    /// [`QueueWriter`] will see their writes rejected.
    ///
    /// # Returns
    ///
    /// The number of events discarded.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`](crate::EventError::StagingConsumed)
    /// if the staging area was already committed or disposed.
    pub fn dispose(&mut self) -> EventResult<usize> {
        let queue = self.slot.take(StagingState::Disposed)?;
        let discarded = queue.receiver.len();
        tracing::debug!(event = T::NAME, discarded, "queue staging disposed");
        Ok(discarded)
    }
}

impl<T: Event> Default for QueueStaging<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Event> Drop for QueueStaging<T> {
    fn drop(&mut self) {
        if let StagingSlot::Open(queue) = &self.slot {
            let discarded = queue.receiver.len();
            if discarded > 0 {
                tracing::warn!(
                    event = T::NAME,
                    discarded,
                    "queue staging dropped without commit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::event::LoopKind;
    use crate::schedule::InlineScheduler;
    use crate::ChannelConfig;
    use bytemuck::{Pod, Zeroable};
    use std::thread;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Hit {
        worker: u32,
        seq: u32,
    }

    impl Event for Hit {
        const NAME: &'static str = "hit";
    }

    #[test]
    fn test_concurrent_writers() {
        let mut buffer: DualChannelBuffer<Hit> = DualChannelBuffer::default();
        let mut staging = QueueStaging::new();

        thread::scope(|s| {
            for worker in 0..8 {
                let writer = staging.writer().unwrap();
                s.spawn(move || {
                    for seq in 0..500 {
                        assert!(writer.write(Hit { worker, seq }));
                    }
                });
            }
        });
        assert_eq!(staging.pending(), 4000);

        let report = staging.commit_now(&mut buffer).unwrap();
        assert_eq!(report.merged, 4000);
        assert!(!staging.is_open());

        // Per-worker order survives the merge.
        let current = buffer.loop_channel(LoopKind::Fixed).current();
        for worker in 0..8 {
            let seqs: Vec<u32> = current
                .as_slice()
                .iter()
                .filter(|hit| hit.worker == worker)
                .map(|hit| hit.seq)
                .collect();
            assert_eq!(seqs, (0..500).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_double_commit_fails() {
        let mut buffer: DualChannelBuffer<Hit> = DualChannelBuffer::default();
        let mut staging = QueueStaging::new();
        staging.write(Hit { worker: 0, seq: 0 }).unwrap();

        staging.commit_now(&mut buffer).unwrap();
        let err = staging.commit_now(&mut buffer).unwrap_err();
        assert_eq!(err, EventError::StagingConsumed { state: StagingState::Committed });
        assert_eq!(buffer.total_written(), 1);
    }

    #[test]
    fn test_scheduled_commit() {
        let channel = DualChannelBuffer::<Hit>::shared(&ChannelConfig::default());
        let mut staging = QueueStaging::new();
        staging.write(Hit { worker: 1, seq: 1 }).unwrap();
        staging.write(Hit { worker: 1, seq: 2 }).unwrap();

        let done = staging
            .commit(&channel, &InlineScheduler, JobHandle::completed())
            .unwrap();
        done.wait();
        assert_eq!(channel.read().loop_channel(LoopKind::Variable).current().len(), 2);

        let err = staging
            .commit(&channel, &InlineScheduler, JobHandle::completed())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
    }

    #[test]
    fn test_dispose_discards() {
        let mut buffer: DualChannelBuffer<Hit> = DualChannelBuffer::default();
        let mut staging = QueueStaging::new();
        let writer = staging.writer().unwrap();
        writer.write(Hit { worker: 2, seq: 0 });
        writer.write(Hit { worker: 2, seq: 1 });

        assert_eq!(staging.dispose(), Ok(2));
        assert!(!writer.write(Hit { worker: 2, seq: 2 }));
        assert_eq!(
            staging.dispose(),
            Err(EventError::StagingConsumed { state: StagingState::Disposed })
        );
        assert_eq!(
            staging.commit_now(&mut buffer).unwrap_err(),
            EventError::StagingConsumed { state: StagingState::Disposed }
        );
        assert!(staging.writer().is_err());
        assert_eq!(buffer.total_written(), 0);
    }

    #[test]
    fn test_writer_rejected_after_commit() {
        let channel = DualChannelBuffer::<Hit>::shared(&ChannelConfig::default());
        let mut staging = QueueStaging::new();
        let writer = staging.writer().unwrap();
        assert!(writer.write(Hit { worker: 3, seq: 0 }));

        staging
            .commit(&channel, &InlineScheduler, JobHandle::completed())
            .unwrap()
            .wait();

        assert!(!writer.write(Hit { worker: 3, seq: 1 }));
        assert!(!writer.clone().write(Hit { worker: 3, seq: 2 }));
        assert_eq!(channel.read().total_written(), 1);
    }

    #[test]
    fn test_empty_commit() {
        let mut buffer: DualChannelBuffer<Hit> = DualChannelBuffer::default();
        let mut staging = QueueStaging::new();
        assert_eq!(staging.commit_now(&mut buffer).unwrap().merged, 0);
    }
}
