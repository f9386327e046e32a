//! # Direct Writer
//!
//! Synchronous appends for code that already has exclusive access to the
//! buffer (a single-threaded system, or a job holding the write lock).
//! Parallel producers use a staging area instead.

use super::buffer::DualChannelBuffer;
use crate::event::Event;

/// Appends events to both loops' Current sequences immediately.
///
/// Borrows the buffer mutably, so it cannot race a commit or a swap.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut writer = buffer.writer();
/// writer.write(BlockBroken { x: 0, y: 64, z: 0, block_type: 3 });
/// writer.write_all(pending_breaks.iter().copied());
/// ```
pub struct DirectWriter<'a, T: Event> {
    buffer: &'a mut DualChannelBuffer<T>,
    written: usize,
}

impl<'a, T: Event> DirectWriter<'a, T> {
    pub(crate) fn new(buffer: &'a mut DualChannelBuffer<T>) -> Self {
        Self { buffer, written: 0 }
    }

    /// Appends one event.
    #[inline]
    pub fn write(&mut self, event: T) {
        self.buffer.push(event);
        self.written += 1;
    }

    /// Appends every event of `events`, in order.
    pub fn write_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = T>,
    {
        for event in events {
            self.write(event);
        }
    }

    /// Returns how many events this writer appended.
    #[inline]
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }
}
