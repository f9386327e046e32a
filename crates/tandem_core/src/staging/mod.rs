//! # Staged Writes
//!
//! Parallel producers never touch the channel directly. They append into a
//! staging area, and a single serial commit merges the whole batch into both
//! loops at once.
//!
//! ```text
//!   Worker 1 ──┐
//!   Worker 2 ──┼──> [Staging Area] ──commit──> [CommitMerger] ──> Current (both loops)
//!   Worker N ──┘     (no locks held              (one serial pass,
//!                     across workers)             all-or-nothing)
//! ```
//!
//! Two front-ends are available:
//!
//! - [`QueueStaging`]: an unordered multi-producer queue. No bookkeeping,
//!   the recommended default.
//! - [`LaneStaging`]: a fixed number of lanes declared up front, one owner
//!   per lane. Merge order is deterministic (ascending lane index).
//!
//! A staging area is single-use. Committing or disposing it a second time
//! fails with [`EventError::StagingConsumed`].

mod lanes;
mod merge;
mod queue;

pub use lanes::{LaneStaging, LaneWriter};
pub use merge::{CommitMerger, MergeReport, StagedBatch};
pub use queue::{QueueStaging, QueueWriter};

use std::mem;

use crate::error::{EventError, EventResult, StagingState};

/// Single-use holder for a staging structure.
#[derive(Debug)]
enum StagingSlot<I> {
    /// Accepting writes.
    Open(I),
    /// Already committed or disposed.
    Consumed(StagingState),
}

impl<I> StagingSlot<I> {
    fn get(&self) -> EventResult<&I> {
        match self {
            Self::Open(inner) => Ok(inner),
            Self::Consumed(state) => Err(EventError::StagingConsumed { state: *state }),
        }
    }

    fn get_mut(&mut self) -> EventResult<&mut I> {
        match self {
            Self::Open(inner) => Ok(inner),
            Self::Consumed(state) => Err(EventError::StagingConsumed { state: *state }),
        }
    }

    /// Takes the structure out, leaving `next` behind.
    ///
    /// A slot that was already consumed keeps its original state.
    fn take(&mut self, next: StagingState) -> EventResult<I> {
        match mem::replace(self, Self::Consumed(next)) {
            Self::Open(inner) => Ok(inner),
            Self::Consumed(state) => {
                *self = Self::Consumed(state);
                Err(EventError::StagingConsumed { state })
            }
        }
    }

    const fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_is_single_use() {
        let mut slot = StagingSlot::Open(7u32);
        assert!(slot.is_open());
        assert_eq!(slot.get().copied(), Ok(7));

        assert_eq!(slot.take(StagingState::Committed), Ok(7));
        assert!(!slot.is_open());
        assert_eq!(
            slot.take(StagingState::Disposed),
            Err(EventError::StagingConsumed { state: StagingState::Committed })
        );
        assert_eq!(
            slot.get_mut().err(),
            Some(EventError::StagingConsumed { state: StagingState::Committed })
        );
    }
}
