//! # Dual Channel Buffer
//!
//! Per event type storage for both loops.
//!
//! ```text
//!                 ┌──────────────── DualChannelBuffer<T> ───────────────┐
//!                 │                                                     │
//!   Variable loop │  base ── [ previous ] ── [ current ] <── writes    │
//!                 │                                                     │
//!   Fixed loop    │  base ── [ previous ] ── [ current ] <── writes    │
//!                 └─────────────────────────────────────────────────────┘
//! ```
//!
//! Every write lands in BOTH loops' Current sequence. Each loop then swaps
//! on its own cadence, so a fixed-rate consumer and a frame-rate consumer
//! each see every event exactly once.
//!
//! ## Implicit Sequence Ids
//!
//! Ids are never stored. For a loop with offset `base`:
//!
//! ```text
//! previous[i]  has id  base + i + 1
//! current[i]   has id  base + previous.len() + i + 1
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use super::sequence::EventSequence;
use super::writer::DirectWriter;
use crate::config::ChannelConfig;
use crate::event::{Event, LoopKind, SequenceId};
use crate::reader::ChannelReader;

/// A channel shared between the host's workers.
///
/// Commits and swaps take the write lock; readers take the read lock.
pub type SharedChannel<T> = Arc<RwLock<DualChannelBuffer<T>>>;

/// Current/Previous sequences and base offset of a single loop.
///
/// The two sequences live in a fixed two-slot array. Swapping only flips
/// `current`, so storage is reused ping-pong style and never reallocated.
#[derive(Clone, Debug)]
pub struct LoopChannel<T> {
    /// Ping-pong storage. `slots[current]` receives writes.
    pub(super) slots: [EventSequence<T>; 2],
    /// Index (0 or 1) of the Current sequence.
    pub(super) current: usize,
    /// Id of the event just before `previous[0]`.
    pub(super) base: SequenceId,
    /// Number of swaps performed.
    pub(super) swaps: u64,
}

impl<T: Event> LoopChannel<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: [
                EventSequence::with_capacity(capacity),
                EventSequence::with_capacity(capacity),
            ],
            current: 0,
            base: 0,
            swaps: 0,
        }
    }

    /// Events written during the in-progress cycle.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &EventSequence<T> {
        &self.slots[self.current]
    }

    /// Events retained from the previous cycle.
    #[inline]
    #[must_use]
    pub fn previous(&self) -> &EventSequence<T> {
        &self.slots[self.current ^ 1]
    }

    #[inline]
    pub(crate) fn current_mut(&mut self) -> &mut EventSequence<T> {
        &mut self.slots[self.current]
    }

    /// Id of the event just before the first event of Previous.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> SequenceId {
        self.base
    }

    /// Id of the event just before the first event of Current.
    #[inline]
    #[must_use]
    pub fn current_base(&self) -> SequenceId {
        self.base + self.previous().len() as SequenceId
    }

    /// Id of the oldest event still readable.
    #[inline]
    #[must_use]
    pub const fn oldest_retained(&self) -> SequenceId {
        self.base + 1
    }

    /// Id of the newest event, or `base` if nothing is retained.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> SequenceId {
        self.current_base() + self.current().len() as SequenceId
    }

    /// Number of events still readable (Previous + Current).
    #[inline]
    #[must_use]
    pub fn retained_len(&self) -> usize {
        self.previous().len() + self.current().len()
    }

    /// Number of swaps this loop has performed.
    #[inline]
    #[must_use]
    pub const fn swaps(&self) -> u64 {
        self.swaps
    }
}

/// Event storage for one event type, serving both loops.
///
/// Created once per event type by the host (see the `tandem` registry) and
/// dropped when the owning scope ends.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut buffer: DualChannelBuffer<BlockBroken> = DualChannelBuffer::new(&ChannelConfig::default());
/// let mut reader = buffer.reader(LoopKind::Fixed);
///
/// buffer.write(BlockBroken { x: 1, y: 2, z: 3, block_type: 7 });
///
/// for event in reader.read(&buffer) {
///     // ...
/// }
///
/// // End of the fixed step
/// buffer.swap(LoopKind::Fixed);
/// ```
#[derive(Clone, Debug)]
pub struct DualChannelBuffer<T> {
    /// One Current/Previous/base triple per loop, indexed by `LoopKind::index`.
    loops: [LoopChannel<T>; 2],
    /// Events ever appended (each counted once, not per loop).
    total_written: u64,
}

impl<T: Event> DualChannelBuffer<T> {
    /// Creates an empty buffer sized by `config`.
    #[must_use]
    pub fn new(config: &ChannelConfig) -> Self {
        Self::with_capacity(config.initial_capacity)
    }

    /// Creates an empty buffer with `capacity` slots per sequence.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            loops: [
                LoopChannel::with_capacity(capacity),
                LoopChannel::with_capacity(capacity),
            ],
            total_written: 0,
        }
    }

    /// Creates an empty buffer wrapped for sharing between workers.
    #[must_use]
    pub fn shared(config: &ChannelConfig) -> SharedChannel<T> {
        Arc::new(RwLock::new(Self::new(config)))
    }

    /// Returns the sequences of one loop.
    #[inline]
    #[must_use]
    pub fn loop_channel(&self, kind: LoopKind) -> &LoopChannel<T> {
        &self.loops[kind.index()]
    }

    #[inline]
    pub(crate) fn loop_channel_mut(&mut self, kind: LoopKind) -> &mut LoopChannel<T> {
        &mut self.loops[kind.index()]
    }

    /// Returns the number of events ever appended.
    #[inline]
    #[must_use]
    pub const fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Returns a writer that appends synchronously to both loops.
    #[inline]
    pub fn writer(&mut self) -> DirectWriter<'_, T> {
        DirectWriter::new(self)
    }

    /// Appends one event to both loops' Current sequences.
    ///
    /// Shorthand for `self.writer().write(event)`.
    #[inline]
    pub fn write(&mut self, event: T) {
        self.push(event);
    }

    /// Creates a reader for `kind` that starts before the oldest event.
    #[must_use]
    pub fn reader(&self, kind: LoopKind) -> ChannelReader {
        ChannelReader::new(kind)
    }

    /// Appends one event to both loops.
    #[inline]
    pub(crate) fn push(&mut self, event: T) {
        for channel in &mut self.loops {
            channel.current_mut().push(event);
        }
        self.total_written += 1;
    }

    /// Appends a batch to both loops, preserving its order.
    pub(crate) fn append(&mut self, events: &[T]) {
        if events.is_empty() {
            return;
        }
        for channel in &mut self.loops {
            channel.current_mut().extend_from_slice(events);
        }
        self.total_written += events.len() as u64;
    }

    /// Grows both Current sequences so `additional` events fit.
    ///
    /// Returns `true` if either sequence reallocated.
    pub(crate) fn reserve_for(&mut self, additional: usize) -> bool {
        let mut grew = false;
        for channel in &mut self.loops {
            grew |= channel.current_mut().reserve_for(additional);
        }
        grew
    }
}

impl<T: Event> Default for DualChannelBuffer<T> {
    fn default() -> Self {
        Self::new(&ChannelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Tick {
        value: u32,
    }

    impl Event for Tick {
        const NAME: &'static str = "tick";
    }

    #[test]
    fn test_buffer_creation() {
        let buffer: DualChannelBuffer<Tick> = DualChannelBuffer::default();
        for kind in LoopKind::ALL {
            let channel = buffer.loop_channel(kind);
            assert_eq!(channel.base(), 0);
            assert!(channel.current().is_empty());
            assert!(channel.previous().is_empty());
            assert!(channel.current().capacity() >= 128);
            assert_eq!(channel.latest(), 0);
        }
        assert_eq!(buffer.total_written(), 0);
    }

    #[test]
    fn test_write_targets_both_loops() {
        let mut buffer: DualChannelBuffer<Tick> = DualChannelBuffer::with_capacity(4);
        for value in 0..10 {
            let event = Tick { value };
            buffer.write(event);

            let variable = buffer.loop_channel(LoopKind::Variable).current();
            let fixed = buffer.loop_channel(LoopKind::Fixed).current();
            assert_eq!(variable.len(), fixed.len());
            assert_eq!(variable.as_slice().last(), Some(&event));
            assert_eq!(fixed.as_slice().last(), Some(&event));
        }
        assert_eq!(buffer.total_written(), 10);
    }

    #[test]
    fn test_implicit_ids() {
        let mut buffer: DualChannelBuffer<Tick> = DualChannelBuffer::with_capacity(4);
        buffer.append(&[Tick { value: 1 }, Tick { value: 2 }]);

        let channel = buffer.loop_channel(LoopKind::Variable);
        assert_eq!(channel.oldest_retained(), 1);
        assert_eq!(channel.current_base(), 0);
        assert_eq!(channel.latest(), 2);
        assert_eq!(channel.retained_len(), 2);
    }
}
