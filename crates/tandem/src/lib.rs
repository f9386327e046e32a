//! # TANDEM
//!
//! Host-side integration for [`tandem_core`] channels.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          TANDEM HOST                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  TandemConfig (TOML) ──┬──> EventRegistry ──> SharedChannel<T>   │
//! │                        │         ▲                               │
//! │                        │         │ swap_all(kind)                │
//! │                        ├──> LoopDriver ──> LoopSystems           │
//! │                        │                                         │
//! │                        └──> ThreadScheduler <── staging.commit() │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`EventRegistry`]: one channel per event type, declared at startup
//! - [`ThreadScheduler`]: worker pool running scheduled commits
//! - [`LoopDriver`]: fixed-rate steps inside variable-rate frames, with the
//!   channel swaps at the end of each

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
// Durations are reported in u64 microseconds; frame times never get near the limit.
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod game_loop;
pub mod registry;
pub mod scheduler;

pub use config::{DriverConfig, SchedulerConfig, TandemConfig};
pub use error::{HostError, HostResult};
pub use game_loop::{DriverStats, FixedStep, FrameReport, FrameTick, LoopDriver, LoopSystems};
pub use registry::{EventRegistry, EventRegistryBuilder};
pub use scheduler::ThreadScheduler;

pub use tandem_core;
