//! # Lifecycle Swap
//!
//! Once per cycle, per loop:
//!
//! ```text
//! 1. base += previous.len()     (those ids are about to be dropped)
//! 2. previous.clear()
//! 3. flip current <-> previous  (no copy, storage is reused)
//! ```
//!
//! This cycle's writes become Previous and stay readable for exactly one
//! more cycle. The emptied sequence becomes the new Current.
//!
//! The host must sequence every write and commit of a cycle before that
//! loop's swap. The two loops swap independently.

use super::buffer::{DualChannelBuffer, LoopChannel};
use crate::event::{Event, LoopKind, SequenceId};

/// Outcome of one swap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// Events that fell out of the retention window.
    pub retired: usize,
    /// Events that moved from Current to Previous.
    pub retained: usize,
    /// Base offset after the swap.
    pub base: SequenceId,
}

impl<T: Event> LoopChannel<T> {
    /// Rotates Current into Previous and advances the base offset.
    pub(crate) fn rotate(&mut self) -> SwapReport {
        let previous = self.current ^ 1;
        let retired = self.slots[previous].len();

        self.base += retired as SequenceId;
        self.slots[previous].clear();
        self.current = previous;
        self.swaps += 1;

        SwapReport {
            retired,
            retained: self.previous().len(),
            base: self.base,
        }
    }
}

impl<T: Event> DualChannelBuffer<T> {
    /// Performs the once-per-cycle swap for one loop.
    ///
    /// The other loop is untouched.
    pub fn swap(&mut self, kind: LoopKind) -> SwapReport {
        let report = self.loop_channel_mut(kind).rotate();
        tracing::trace!(
            event = T::NAME,
            loop_kind = kind.as_str(),
            retired = report.retired,
            retained = report.retained,
            base = report.base,
            "channel swapped"
        );
        report
    }
}
