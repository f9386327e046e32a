//! # Event Channel Error Types
//!
//! All errors that can occur while staging, committing or configuring
//! event channels. Every error is fail-fast: it is returned to the caller
//! at the point of misuse and never retried internally.
//!
//! Lost history on a slow reader is NOT an error. See
//! [`ChannelReader::missed`](crate::ChannelReader::missed).

use std::fmt;

use thiserror::Error;

/// Lifecycle state of a staging area that can no longer accept a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StagingState {
    /// The staged events were merged into the channel.
    Committed,
    /// The staged events were discarded without merging.
    Disposed,
}

impl fmt::Display for StagingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed => f.write_str("committed"),
            Self::Disposed => f.write_str("disposed"),
        }
    }
}

/// Broad category of an [`EventError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A caller-supplied argument is unusable (e.g. zero lanes).
    InvalidArgument,
    /// An index fell outside its declared range.
    OutOfRange,
    /// The operation is not allowed in the current lifecycle state.
    InvalidState,
    /// A configuration value could not be parsed or validated.
    Config,
}

/// Errors that can occur in the event channel system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A lane staging area was requested with no lanes.
    #[error("invalid lane count: {0} (must be greater than zero)")]
    InvalidLaneCount(usize),

    /// A lane index outside `[0, lane_count)` was used.
    #[error("lane index {index} out of range for {lane_count} lanes")]
    LaneOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of lanes declared at creation.
        lane_count: usize,
    },

    /// The staging area was already committed or disposed.
    #[error("staging area already {state}")]
    StagingConsumed {
        /// What happened to the staging area.
        state: StagingState,
    },

    /// A lane was opened a second time in the same commit cycle.
    #[error("lane {0} was already opened in this commit cycle")]
    LaneAlreadyOpened(usize),

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EventError {
    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLaneCount(_) => ErrorKind::InvalidArgument,
            Self::LaneOutOfRange { .. } => ErrorKind::OutOfRange,
            Self::StagingConsumed { .. } | Self::LaneAlreadyOpened(_) => ErrorKind::InvalidState,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

/// Result type for event channel operations.
pub type EventResult<T> = Result<T, EventError>;
