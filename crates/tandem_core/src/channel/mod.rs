//! # Event Channels
//!
//! Storage and lifecycle of a single event type.
//!
//! ## The Problem
//!
//! ```text
//! Fixed loop:     step ──── step ──── step ──── step     (60 Hz)
//! Variable loop:  frame ─ frame ─ frame ─ frame ─ frame  (unbounded)
//! ```
//!
//! An event written during a frame must reach systems on BOTH loops exactly
//! once, even though the loops never agree on when a cycle ends.
//!
//! ## The Solution: One Double Buffer Per Loop
//!
//! Every write goes into both loops' Current sequence. Each loop swaps
//! Current into Previous on its own cadence. Readers keep an absolute
//! bookmark and read the unread tail of Previous + Current.

mod buffer;
mod sequence;
mod swap;
mod writer;

pub use buffer::{DualChannelBuffer, LoopChannel, SharedChannel};
pub use sequence::EventSequence;
pub use swap::SwapReport;
pub use writer::DirectWriter;
