//! # Event Sequence
//!
//! Growable, append-only storage for one loop's Current or Previous events.
//!
//! Growth is always to the next power of two, so a sequence that sees a
//! sustained burst of writes reallocates O(log n) times in total. A cleared
//! sequence keeps its allocation and is reused on the next cycle.

/// Append-only storage for events of one cycle.
///
/// # Example
///
/// ```rust,ignore
/// let mut seq: EventSequence<Tick> = EventSequence::with_capacity(128);
/// seq.reserve_for(300); // capacity becomes 512
/// ```
#[derive(Clone, Debug)]
pub struct EventSequence<T> {
    /// The events, oldest first.
    items: Vec<T>,
}

impl<T: Copy> EventSequence<T> {
    /// Creates an empty sequence with `capacity` pre-allocated slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of stored events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no events are stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of slots allocated.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Returns all stored events, oldest first.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Gets an event by its position in this sequence.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Ensures room for `additional` more events.
    ///
    /// If the current capacity is too small, grows it to the smallest power
    /// of two that holds `len + additional`.
    ///
    /// # Returns
    ///
    /// `true` if the sequence had to reallocate.
    pub fn reserve_for(&mut self, additional: usize) -> bool {
        let required = self.items.len().saturating_add(additional);
        if required <= self.items.capacity() {
            return false;
        }

        let target = required.checked_next_power_of_two().unwrap_or(required);
        self.items.reserve_exact(target - self.items.len());
        tracing::trace!(required, capacity = self.items.capacity(), "event sequence grew");
        true
    }

    /// Appends one event.
    #[inline]
    pub fn push(&mut self, event: T) {
        if self.items.len() == self.items.capacity() {
            self.reserve_for(1);
        }
        self.items.push(event);
    }

    /// Appends a batch of events, growing at most once.
    pub fn extend_from_slice(&mut self, events: &[T]) {
        self.reserve_for(events.len());
        self.items.extend_from_slice(events);
    }

    /// Removes every event, keeping the allocation for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
