//! # Channel Reader
//!
//! A per-consumer cursor over one loop of a [`DualChannelBuffer`].
//!
//! The reader stores a single number, the highest sequence id it has
//! consumed. On every call it works out which tail of Previous + Current it
//! has not seen yet:
//!
//! ```text
//!  ids:      base+1 ..................... current_base ................. latest
//!            [        previous          ][            current             ]
//!                      ▲
//!                 bookmark + 1  → first event yielded
//! ```
//!
//! ## Retention Window
//!
//! Previous survives exactly one swap. A reader that does not run at least
//! once per cycle of its loop loses the events that fell out of the window.
//! This is not an error: the loss is counted in [`ChannelReader::missed`]
//! and logged, and reading resumes at the oldest retained event.

use std::iter::FusedIterator;

use crate::channel::{DualChannelBuffer, LoopChannel};
use crate::event::{Event, LoopKind, SequenceId};

/// Cursor of one consumer over one loop of a channel.
///
/// A reader is owned by exactly one consumer and is never shared between
/// threads while iterating. Dropping it releases it.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut reader = ChannelReader::new(LoopKind::Fixed);
///
/// // Every fixed step:
/// let channel = shared.read();
/// for hit in reader.read(&channel) {
///     apply_damage(hit);
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelReader {
    /// Loop whose sequences this reader consumes.
    kind: LoopKind,
    /// Highest id consumed so far (0 = nothing).
    bookmark: SequenceId,
    /// Events that fell out of the retention window before being read.
    missed: u64,
}

impl ChannelReader {
    /// Creates a reader that has consumed nothing.
    #[inline]
    #[must_use]
    pub const fn new(kind: LoopKind) -> Self {
        Self::starting_at(kind, 0)
    }

    /// Creates a reader that treats every id up to `bookmark` as consumed.
    #[inline]
    #[must_use]
    pub const fn starting_at(kind: LoopKind, bookmark: SequenceId) -> Self {
        Self {
            kind,
            bookmark,
            missed: 0,
        }
    }

    /// Returns the loop this reader consumes.
    #[inline]
    #[must_use]
    pub const fn loop_kind(&self) -> LoopKind {
        self.kind
    }

    /// Returns the highest id consumed so far.
    #[inline]
    #[must_use]
    pub const fn bookmark(&self) -> SequenceId {
        self.bookmark
    }

    /// Returns how many events this reader never saw because it fell
    /// behind the retention window.
    #[inline]
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }

    /// Returns how many events a [`read`](Self::read) would yield right now.
    #[must_use]
    pub fn pending<T: Event>(&self, buffer: &DualChannelBuffer<T>) -> usize {
        let channel = buffer.loop_channel(self.kind);
        let start = self.bookmark.max(channel.base());
        usize::try_from(channel.latest().saturating_sub(start)).unwrap_or(usize::MAX)
    }

    /// Re-binds the reader to the latest state of `buffer`.
    ///
    /// Accounts for any history lost since the last call and returns the
    /// number of events now available.
    pub fn refresh<T: Event>(&mut self, buffer: &DualChannelBuffer<T>) -> usize {
        self.skip_lost(buffer.loop_channel(self.kind));
        self.pending(buffer)
    }

    /// Returns an iterator over every unread event, oldest first.
    ///
    /// The bookmark advances as the iterator is consumed. Dropping the
    /// iterator early leaves the bookmark on the last event yielded, and the
    /// next call resumes right after it.
    pub fn read<'r, 'b, T: Event>(
        &'r mut self,
        buffer: &'b DualChannelBuffer<T>,
    ) -> ReadIter<'r, 'b, T> {
        let channel = buffer.loop_channel(self.kind);
        self.skip_lost(channel);

        let previous = channel.previous().as_slice();
        let current = channel.current().as_slice();
        let base = channel.base();
        let end = previous.len() + current.len();

        // `skip_lost` guarantees bookmark >= base.
        let start = usize::try_from(self.bookmark - base)
            .unwrap_or(usize::MAX)
            .min(end);

        ReadIter {
            previous,
            current,
            base,
            position: start,
            end,
            bookmark: &mut self.bookmark,
        }
    }

    /// Marks everything currently in `buffer` as consumed.
    ///
    /// # Returns
    ///
    /// The number of events skipped.
    pub fn skip_to_latest<T: Event>(&mut self, buffer: &DualChannelBuffer<T>) -> usize {
        let channel = buffer.loop_channel(self.kind);
        self.skip_lost(channel);

        let latest = channel.latest();
        let skipped = latest.saturating_sub(self.bookmark);
        self.bookmark = self.bookmark.max(latest);
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }

    /// Moves the bookmark past ids that are no longer retained.
    fn skip_lost<T: Event>(&mut self, channel: &LoopChannel<T>) {
        let base = channel.base();
        if self.bookmark >= base {
            return;
        }

        let lost = base - self.bookmark;
        if self.bookmark > 0 {
            tracing::warn!(
                event = T::NAME,
                loop_kind = self.kind.as_str(),
                lost,
                bookmark = self.bookmark,
                oldest_retained = channel.oldest_retained(),
                "reader fell behind the retention window"
            );
        } else {
            tracing::debug!(
                event = T::NAME,
                loop_kind = self.kind.as_str(),
                lost,
                "new reader started after history was retired"
            );
        }
        self.missed += lost;
        self.bookmark = base;
    }
}

/// Lazy iterator over the unread events of one loop.
///
/// Created by [`ChannelReader::read`].
pub struct ReadIter<'r, 'b, T> {
    previous: &'b [T],
    current: &'b [T],
    base: SequenceId,
    /// Position in the concatenation Previous ++ Current.
    position: usize,
    end: usize,
    bookmark: &'r mut SequenceId,
}

impl<T: Event> Iterator for ReadIter<'_, '_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.position >= self.end {
            return None;
        }

        let event = match self.previous.get(self.position) {
            Some(event) => *event,
            None => self.current[self.position - self.previous.len()],
        };
        self.position += 1;
        *self.bookmark = self.base + self.position as SequenceId;
        Some(event)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.position;
        (remaining, Some(remaining))
    }
}

impl<T: Event> ExactSizeIterator for ReadIter<'_, '_, T> {}

impl<T: Event> FusedIterator for ReadIter<'_, '_, T> {}
