//! # TANDEM Core
//!
//! Typed, in-process event channels for producers and consumers that run on
//! two independently ticked loops (a variable-rate frame loop and a
//! fixed-rate simulation loop).
//!
//! - Many producers append concurrently without synchronizing with each
//!   other or with consumers
//! - Each consumer reads exactly the events it has not seen, catching up
//!   across missed cycles
//! - Memory is reused cycle to cycle and grows geometrically, never blocking
//!   a producer
//!
//! ## Architecture Rules
//!
//! 1. **Position is identity** - sequence ids are derived from buffer
//!    position and a base offset, never stored per event
//! 2. **One serial merge point** - staged events become visible in a single
//!    commit pass, all or nothing
//! 3. **No threads** - scheduling belongs to the host, through [`JobScheduler`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_core::{ChannelConfig, DualChannelBuffer, LaneStaging, LoopKind};
//!
//! let mut buffer: DualChannelBuffer<BlockBroken> = DualChannelBuffer::new(&ChannelConfig::default());
//! let mut reader = buffer.reader(LoopKind::Fixed);
//!
//! let mut staging = LaneStaging::new(4)?;
//! // ... each worker job owns a writer from staging.begin_lane(i) ...
//! staging.commit_now(&mut buffer)?;
//!
//! for event in reader.read(&buffer) {
//!     // every event exactly once
//! }
//! buffer.swap(LoopKind::Fixed);
//! ```

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
// Sequence ids are u64 and lengths are usize; both fit on every target we ship.
#![allow(clippy::cast_possible_truncation)]

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod reader;
pub mod schedule;
pub mod staging;

pub use channel::{
    DirectWriter, DualChannelBuffer, EventSequence, LoopChannel, SharedChannel, SwapReport,
};
pub use config::{ChannelConfig, DEFAULT_INITIAL_CAPACITY};
pub use error::{ErrorKind, EventError, EventResult, StagingState};
pub use event::{Event, LoopKind, SequenceId};
pub use reader::{ChannelReader, ReadIter};
pub use schedule::{InlineScheduler, Job, JobHandle, JobScheduler, JobSignal};
pub use staging::{
    CommitMerger, LaneStaging, LaneWriter, MergeReport, QueueStaging, QueueWriter, StagedBatch,
};
