//! # Event Payloads
//!
//! Events are pure data. They must be `Pod` so that a channel can move them
//! around with plain copies and compare merged batches byte for byte.

use bytemuck::Pod;

/// Absolute, 1-based position of an event within one loop's history.
///
/// `0` means "nothing read yet".
pub type SequenceId = u64;

/// Marker trait for event payloads.
///
/// Events must be:
/// - `Pod`: plain old data, bitwise copyable, no embedded references
/// - `Send + Sync`: producers and consumers live on different workers
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct BlockBroken {
///     x: i32,
///     y: i32,
///     z: i32,
///     block_type: u32,
/// }
///
/// impl Event for BlockBroken {
///     const NAME: &'static str = "block_broken";
/// }
/// ```
pub trait Event: Pod + Send + Sync + 'static {
    /// Stable name of this event type, used in logs and registry errors.
    const NAME: &'static str;
}

/// One of the two independently ticked loops a channel serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoopKind {
    /// The variable-rate loop (one cycle per rendered frame).
    Variable,
    /// The fixed-rate loop (one cycle per simulation step).
    Fixed,
}

impl LoopKind {
    /// Both loops, in storage order.
    pub const ALL: [Self; 2] = [Self::Variable, Self::Fixed];

    /// Storage slot of this loop inside a channel.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Variable => 0,
            Self::Fixed => 1,
        }
    }

    /// Short lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Fixed => "fixed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_indices_are_distinct() {
        assert_eq!(LoopKind::Variable.index(), 0);
        assert_eq!(LoopKind::Fixed.index(), 1);
        assert_eq!(LoopKind::ALL.map(LoopKind::index), [0, 1]);
    }
}
