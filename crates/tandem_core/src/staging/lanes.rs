//! # Lane Staging
//!
//! A fixed number of independently addressed lanes, declared up front. Each
//! lane has a single owner per commit cycle, so writes never contend:
//!
//! ```text
//!   lane 0: [a0 a1 a2]      ─┐
//!   lane 1: [b0]             ├──> merge: a0 a1 a2 b0 c0 c1
//!   lane 2: [c0 c1]         ─┘    (ascending lane index, lane order kept)
//! ```
//!
//! The merged order depends only on what was written to which lane, never
//! on thread timing.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::merge::{CommitMerger, MergeReport, StagedBatch};
use super::StagingSlot;
use crate::channel::{DualChannelBuffer, SharedChannel};
use crate::error::{EventError, EventResult, StagingState};
use crate::event::Event;
use crate::schedule::{JobHandle, JobScheduler};

/// Lane has not been opened this cycle.
const LANE_IDLE: u8 = 0;
/// A [`LaneWriter`] currently owns the lane.
const LANE_OPEN: u8 = 1;
/// The lane was opened and closed; it takes no more writes.
const LANE_CLOSED: u8 = 2;

struct Lane<T> {
    state: AtomicU8,
    /// Events handed back by the lane's writer. Locked once when the writer
    /// opens, once when it closes, and once by the merge.
    events: Mutex<Vec<T>>,
}

/// All lanes of one staging area, shared with the writers and the commit job.
struct LaneSet<T> {
    lanes: Box<[Lane<T>]>,
    /// Set when the set is merged or discarded. Writers closing afterwards
    /// drop their events.
    sealed: AtomicBool,
}

impl<T: Event> LaneSet<T> {
    /// Events in closed lanes. Open writers are not counted.
    fn staged(&self) -> usize {
        self.lanes.iter().map(|lane| lane.events.lock().len()).sum()
    }

    fn open_lanes(&self) -> usize {
        self.lanes
            .iter()
            .filter(|lane| lane.state.load(Ordering::Acquire) == LANE_OPEN)
            .count()
    }

    /// Stops accepting lanes back.
    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        let open = self.open_lanes();
        if open > 0 {
            tracing::warn!(
                event = T::NAME,
                open,
                "lane staging sealed while lanes were still open; their events are discarded"
            );
        }
    }
}

impl<T: Event> StagedBatch<T> for Arc<LaneSet<T>> {
    fn seal(&mut self) {
        LaneSet::seal(self);
    }

    fn pending(&mut self) -> usize {
        self.staged()
    }

    fn drain_into<F>(self, mut sink: F)
    where
        F: FnMut(&[T]),
    {
        for lane in &*self.lanes {
            let events = mem::take(&mut *lane.events.lock());
            sink(&events);
        }
    }
}

/// Partitioned staging area for one commit cycle.
///
/// Lane writers own their lane and can be moved into scheduled jobs. The
/// commit is sequenced after them through its `dependency`.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut staging = LaneStaging::new(batches.len())?;
///
/// let producers: Vec<JobHandle> = batches
///     .into_iter()
///     .enumerate()
///     .map(|(index, batch)| {
///         let mut lane = staging.begin_lane(index).unwrap();
///         scheduler.schedule(
///             JobHandle::completed(),
///             Box::new(move || {
///                 for item in batch {
///                     lane.write(item.to_event());
///                 }
///             }),
///         )
///     })
///     .collect();
///
/// let done = staging.commit(&channel, &scheduler, JobHandle::combine(producers))?;
/// ```
pub struct LaneStaging<T: Event> {
    slot: StagingSlot<Arc<LaneSet<T>>>,
    lane_count: usize,
}

impl<T: Event> LaneStaging<T> {
    /// Creates a staging area with `lane_count` empty lanes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidLaneCount`] if `lane_count` is zero.
    pub fn new(lane_count: usize) -> EventResult<Self> {
        Self::with_lane_capacity(lane_count, 0)
    }

    /// Creates a staging area whose lanes pre-allocate `capacity` slots each.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidLaneCount`] if `lane_count` is zero.
    pub fn with_lane_capacity(lane_count: usize, capacity: usize) -> EventResult<Self> {
        if lane_count == 0 {
            return Err(EventError::InvalidLaneCount(lane_count));
        }

        let lanes = (0..lane_count)
            .map(|_| Lane {
                state: AtomicU8::new(LANE_IDLE),
                events: Mutex::new(Vec::with_capacity(capacity)),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slot: StagingSlot::Open(Arc::new(LaneSet {
                lanes,
                sealed: AtomicBool::new(false),
            })),
            lane_count,
        })
    }

    /// Returns the number of lanes declared at creation.
    #[inline]
    #[must_use]
    pub const fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Returns `true` until the staging area is committed or disposed.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    /// Opens lane `index` for writing.
    ///
    /// The returned writer is the lane's only owner and does not borrow the
    /// staging area, so it can be moved into a job. Ending (or dropping) it
    /// hands the events back and closes the lane for the rest of the cycle.
    ///
    /// # Errors
    ///
    /// - [`EventError::LaneOutOfRange`] if `index >= lane_count`
    /// - [`EventError::LaneAlreadyOpened`] if the lane was opened before
    /// - [`EventError::StagingConsumed`] after a commit or dispose
    pub fn begin_lane(&self, index: usize) -> EventResult<LaneWriter<T>> {
        let set = self.slot.get()?;
        let lane = set.lanes.get(index).ok_or(EventError::LaneOutOfRange {
            index,
            lane_count: self.lane_count,
        })?;

        lane.state
            .compare_exchange(LANE_IDLE, LANE_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EventError::LaneAlreadyOpened(index))?;

        // Reuse the pre-allocated storage.
        let events = mem::take(&mut *lane.events.lock());

        Ok(LaneWriter {
            set: Arc::clone(set),
            index,
            events,
        })
    }

    /// Returns the number of events in closed lanes (0 once consumed).
    ///
    /// Events held by writers that are still open are not counted.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slot.get().map_or(0, |set| set.staged())
    }

    /// Merges every closed lane into `buffer` right now, on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`] on a second commit or after a
    /// dispose.
    pub fn commit_now(&mut self, buffer: &mut DualChannelBuffer<T>) -> EventResult<MergeReport> {
        let set = self.slot.take(StagingState::Committed)?;
        Ok(CommitMerger::merge(buffer, set))
    }

    /// Schedules the merge into `channel` after `dependency`.
    ///
    /// `dependency` should cover every job still writing to a lane. A lane
    /// that is still open when the merge runs is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`] on a second commit or after a
    /// dispose.
    pub fn commit<J>(
        &mut self,
        channel: &SharedChannel<T>,
        scheduler: &J,
        dependency: JobHandle,
    ) -> EventResult<JobHandle>
    where
        J: JobScheduler + ?Sized,
    {
        let set = self.slot.take(StagingState::Committed)?;
        Ok(CommitMerger::schedule(channel, set, scheduler, dependency))
    }

    /// Discards every lane without merging.
    ///
    /// Use only if you know what you are doing.
    ///
    /// # Returns
    ///
    /// The number of events discarded from closed lanes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::StagingConsumed`] if the staging area was
    /// already committed or disposed.
    pub fn dispose(&mut self) -> EventResult<usize> {
        let mut set = self.slot.take(StagingState::Disposed)?;
        set.seal();
        let discarded = set.staged();
        tracing::debug!(event = T::NAME, discarded, "lane staging disposed");
        Ok(discarded)
    }
}

impl<T: Event> Drop for LaneStaging<T> {
    fn drop(&mut self) {
        if let StagingSlot::Open(set) = &self.slot {
            set.sealed.store(true, Ordering::Release);
            let discarded = set.staged();
            if discarded > 0 || set.open_lanes() > 0 {
                tracing::warn!(
                    event = T::NAME,
                    discarded,
                    lanes = self.lane_count,
                    "lane staging dropped without commit"
                );
            }
        }
    }
}

/// Exclusive writer for one lane.
///
/// Writes go to a buffer owned by the writer and keep the order in which
/// they were issued. They reach the lane when the writer ends.
pub struct LaneWriter<T: Event> {
    set: Arc<LaneSet<T>>,
    index: usize,
    events: Vec<T>,
}

impl<T: Event> LaneWriter<T> {
    /// Returns the lane index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Appends one event to the lane.
    #[inline]
    pub fn write(&mut self, event: T) {
        self.events.push(event);
    }

    /// Appends a batch of events to the lane.
    pub fn extend(&mut self, events: &[T]) {
        self.events.extend_from_slice(events);
    }

    /// Returns the number of events written so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was written yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Closes the lane. Equivalent to dropping the writer.
    #[inline]
    pub fn end(self) {
        drop(self);
    }
}

impl<T: Event> Drop for LaneWriter<T> {
    fn drop(&mut self) {
        let lane = &self.set.lanes[self.index];
        {
            // Checked under the lane lock: the merge seals before it locks
            // any lane, so a lane handed back here is either drained or
            // reported.
            let mut slot = lane.events.lock();
            if self.set.sealed.load(Ordering::Acquire) {
                if !self.events.is_empty() {
                    tracing::warn!(
                        event = T::NAME,
                        lane = self.index,
                        discarded = self.events.len(),
                        "lane closed after its staging area was consumed"
                    );
                }
            } else {
                *slot = mem::take(&mut self.events);
            }
        }
        lane.state.store(LANE_CLOSED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::event::LoopKind;
    use crate::schedule::InlineScheduler;
    use bytemuck::{Pod, Zeroable};
    use std::thread;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Spawn {
        lane: u32,
        seq: u32,
    }

    impl Event for Spawn {
        const NAME: &'static str = "spawn";
    }

    #[test]
    fn test_zero_lanes_rejected() {
        let err = LaneStaging::<Spawn>::new(0).err().unwrap();
        assert_eq!(err, EventError::InvalidLaneCount(0));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_lane_out_of_range() {
        let staging = LaneStaging::<Spawn>::new(4).unwrap();
        let err = staging.begin_lane(4).err().unwrap();
        assert_eq!(err, EventError::LaneOutOfRange { index: 4, lane_count: 4 });
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_lane_opened_once_per_cycle() {
        let staging = LaneStaging::<Spawn>::new(2).unwrap();
        let mut lane = staging.begin_lane(1).unwrap();
        lane.write(Spawn { lane: 1, seq: 0 });
        assert!(matches!(staging.begin_lane(1), Err(EventError::LaneAlreadyOpened(1))));
        lane.end();

        assert!(matches!(staging.begin_lane(1), Err(EventError::LaneAlreadyOpened(1))));
        assert!(staging.begin_lane(0).is_ok());
    }

    #[test]
    fn test_merge_in_lane_order() {
        let mut buffer: DualChannelBuffer<Spawn> = DualChannelBuffer::with_capacity(4);
        let mut staging = LaneStaging::new(3).unwrap();

        // Open lanes out of order; merge order must not care.
        for lane in [2u32, 0, 1] {
            let mut writer = staging.begin_lane(lane as usize).unwrap();
            for seq in 0..=lane {
                writer.write(Spawn { lane, seq });
            }
        }
        assert_eq!(staging.pending(), 6);

        staging.commit_now(&mut buffer).unwrap();
        let merged: Vec<(u32, u32)> = buffer
            .loop_channel(LoopKind::Variable)
            .current()
            .as_slice()
            .iter()
            .map(|s| (s.lane, s.seq))
            .collect();
        assert_eq!(merged, vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_parallel_lanes() {
        const LANES: usize = 16;
        const PER_LANE: u32 = 100;

        let mut buffer: DualChannelBuffer<Spawn> = DualChannelBuffer::default();
        let mut staging = LaneStaging::new(LANES).unwrap();

        thread::scope(|s| {
            for index in 0..LANES {
                let staging = &staging;
                s.spawn(move || {
                    let mut lane = staging.begin_lane(index).unwrap();
                    for seq in 0..PER_LANE {
                        lane.write(Spawn { lane: index as u32, seq });
                    }
                    lane.end();
                });
            }
        });

        let report = staging.commit_now(&mut buffer).unwrap();
        assert_eq!(report.merged, LANES * PER_LANE as usize);

        let current = buffer.loop_channel(LoopKind::Fixed).current().as_slice();
        for (i, spawn) in current.iter().enumerate() {
            assert_eq!(spawn.lane as usize, i / PER_LANE as usize);
            assert_eq!(spawn.seq as usize, i % PER_LANE as usize);
        }
    }

    #[test]
    fn test_double_commit_and_dispose() {
        let mut buffer: DualChannelBuffer<Spawn> = DualChannelBuffer::default();
        let mut staging = LaneStaging::new(1).unwrap();
        staging.begin_lane(0).unwrap().write(Spawn { lane: 0, seq: 0 });

        staging.commit_now(&mut buffer).unwrap();
        assert_eq!(
            staging.commit_now(&mut buffer).unwrap_err(),
            EventError::StagingConsumed { state: StagingState::Committed }
        );
        assert_eq!(
            staging.dispose().unwrap_err(),
            EventError::StagingConsumed { state: StagingState::Committed }
        );
        assert!(staging.begin_lane(0).is_err());
        assert_eq!(staging.pending(), 0);
    }

    #[test]
    fn test_writer_outlives_borrow() {
        let channel = DualChannelBuffer::<Spawn>::shared(&crate::ChannelConfig::default());
        let mut staging = LaneStaging::new(2).unwrap();

        let (signal, producers) = JobHandle::pair();
        let mut lanes: Vec<_> = (0..2).map(|i| staging.begin_lane(i).unwrap()).collect();
        let worker = thread::spawn(move || {
            for (lane, writer) in lanes.iter_mut().enumerate().rev() {
                writer.write(Spawn { lane: lane as u32, seq: 0 });
            }
            drop(lanes);
            signal.complete();
        });

        // Committed while the lanes are still being written.
        staging
            .commit(&channel, &InlineScheduler, producers)
            .unwrap()
            .wait();
        worker.join().unwrap();

        let buffer = channel.read();
        let merged: Vec<u32> = buffer
            .loop_channel(LoopKind::Fixed)
            .current()
            .as_slice()
            .iter()
            .map(|s| s.lane)
            .collect();
        assert_eq!(merged, vec![0, 1]);
    }

    #[test]
    fn test_lane_open_at_merge_is_discarded() {
        let mut buffer: DualChannelBuffer<Spawn> = DualChannelBuffer::default();
        let mut staging = LaneStaging::new(2).unwrap();

        staging.begin_lane(0).unwrap().write(Spawn { lane: 0, seq: 0 });
        let mut late = staging.begin_lane(1).unwrap();
        late.write(Spawn { lane: 1, seq: 0 });
        assert_eq!(staging.pending(), 1);

        let report = staging.commit_now(&mut buffer).unwrap();
        assert_eq!(report.merged, 1);

        late.write(Spawn { lane: 1, seq: 1 });
        late.end();
        assert_eq!(buffer.loop_channel(LoopKind::Variable).current().len(), 1);
        assert_eq!(buffer.total_written(), 1);
    }

    #[test]
    fn test_dispose_discards_lanes() {
        let mut staging = LaneStaging::with_lane_capacity(2, 8).unwrap();
        staging.begin_lane(0).unwrap().extend(&[Spawn::default(); 3]);
        assert_eq!(staging.dispose(), Ok(3));
        assert!(!staging.is_open());
    }
}
