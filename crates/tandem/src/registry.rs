//! # Event Registry
//!
//! One channel per event type, declared explicitly at startup and frozen:
//!
//! ```rust,ignore
//! let registry = EventRegistry::builder(&config.channel)
//!     .register::<BlockBroken>()?
//!     .register::<Impact>()?
//!     .build();
//!
//! let impacts = registry.channel::<Impact>()?;
//! ```
//!
//! The registry is also the lifecycle hook: [`EventRegistry::swap_all`]
//! swaps one loop of every registered channel, in registration order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tandem_core::{ChannelConfig, DualChannelBuffer, Event, LoopKind, SharedChannel, SwapReport};

use crate::error::{HostError, HostResult};

/// Type-erased view of one registered channel.
trait ChannelEntry: Send + Sync {
    /// Event type name.
    fn name(&self) -> &'static str;

    /// Swaps one loop of the channel.
    fn swap(&self, kind: LoopKind) -> SwapReport;

    /// Events written since creation.
    fn total_written(&self) -> u64;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

struct TypedEntry<T: Event> {
    channel: SharedChannel<T>,
}

impl<T: Event> ChannelEntry for TypedEntry<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn swap(&self, kind: LoopKind) -> SwapReport {
        self.channel.write().swap(kind)
    }

    fn total_written(&self) -> u64 {
        self.channel.read().total_written()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collects event types before the registry is frozen.
pub struct EventRegistryBuilder {
    config: ChannelConfig,
    entries: Vec<Box<dyn ChannelEntry>>,
    index: HashMap<TypeId, usize>,
}

impl EventRegistryBuilder {
    /// Registers `T`, creating its channel.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::DuplicateEvent`] if `T` is already registered.
    pub fn register<T: Event>(mut self) -> HostResult<Self> {
        let type_id = TypeId::of::<T>();
        if self.index.contains_key(&type_id) {
            return Err(HostError::DuplicateEvent(T::NAME));
        }

        let channel = DualChannelBuffer::<T>::shared(&self.config);
        self.index.insert(type_id, self.entries.len());
        self.entries.push(Box::new(TypedEntry { channel }));

        tracing::debug!(event = T::NAME, "event type registered");
        Ok(self)
    }

    /// Freezes the set of event types.
    #[must_use]
    pub fn build(self) -> EventRegistry {
        tracing::info!(channels = self.entries.len(), "event registry built");
        EventRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Frozen map from event type to its shared channel.
pub struct EventRegistry {
    entries: Vec<Box<dyn ChannelEntry>>,
    index: HashMap<TypeId, usize>,
}

impl EventRegistry {
    /// Starts a registry whose channels use `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Event`] if `config` is invalid.
    pub fn builder(config: &ChannelConfig) -> HostResult<EventRegistryBuilder> {
        config.validate()?;
        Ok(EventRegistryBuilder {
            config: config.clone(),
            entries: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Returns the shared channel for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::UnregisteredEvent`] if `T` was never registered.
    pub fn channel<T: Event>(&self) -> HostResult<SharedChannel<T>> {
        self.index
            .get(&TypeId::of::<T>())
            .and_then(|&i| self.entries[i].as_any().downcast_ref::<TypedEntry<T>>())
            .map(|entry| Arc::clone(&entry.channel))
            .ok_or(HostError::UnregisteredEvent(T::NAME))
    }

    /// Returns `true` if `T` is registered.
    #[inline]
    #[must_use]
    pub fn contains<T: Event>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered event types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Event type names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name())
    }

    /// Swaps loop `kind` of every channel. Returns the number of events
    /// retired across all channels.
    ///
    /// Call once per cycle of that loop, after every write and commit of the
    /// cycle has completed.
    pub fn swap_all(&self, kind: LoopKind) -> usize {
        let retired: usize = self
            .entries
            .iter()
            .map(|entry| entry.swap(kind).retired)
            .sum();

        tracing::trace!(loop_kind = kind.as_str(), retired, "swapped all channels");
        retired
    }

    /// Tears the registry down, releasing every channel it owns.
    ///
    /// Channels still referenced elsewhere stay alive until those references
    /// drop. Returns the number of channels released.
    pub fn dispose(self) -> usize {
        let count = self.entries.len();
        let written: u64 = self.entries.iter().map(|entry| entry.total_written()).sum();
        tracing::info!(channels = count, written, "event registry disposed");
        count
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("channels", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Opened {
        door: u32,
    }

    impl Event for Opened {
        const NAME: &'static str = "opened";
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    struct Closed {
        door: u32,
    }

    impl Event for Closed {
        const NAME: &'static str = "closed";
    }

    fn registry() -> EventRegistry {
        EventRegistry::builder(&ChannelConfig::default())
            .unwrap()
            .register::<Opened>()
            .unwrap()
            .register::<Closed>()
            .unwrap()
            .build()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains::<Opened>());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["opened", "closed"]);

        let first = registry.channel::<Opened>().unwrap();
        let second = registry.channel::<Opened>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = EventRegistry::builder(&ChannelConfig::default())
            .unwrap()
            .register::<Opened>()
            .unwrap()
            .register::<Opened>();
        assert!(matches!(result, Err(HostError::DuplicateEvent("opened"))));
    }

    #[test]
    fn test_unregistered_lookup() {
        let registry = EventRegistry::builder(&ChannelConfig::default())
            .unwrap()
            .register::<Opened>()
            .unwrap()
            .build();

        assert!(!registry.contains::<Closed>());
        assert_eq!(
            registry.channel::<Closed>().unwrap_err(),
            HostError::UnregisteredEvent("closed")
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChannelConfig {
            initial_capacity: 0,
        };
        assert!(matches!(
            EventRegistry::builder(&config),
            Err(HostError::Event(_))
        ));
    }

    #[test]
    fn test_swap_all_touches_every_channel() {
        let registry = registry();
        let opened = registry.channel::<Opened>().unwrap();
        let closed = registry.channel::<Closed>().unwrap();

        opened.write().write(Opened { door: 1 });
        closed.write().write(Closed { door: 2 });
        closed.write().write(Closed { door: 3 });

        assert_eq!(registry.swap_all(LoopKind::Variable), 0);
        assert_eq!(registry.swap_all(LoopKind::Variable), 3);

        assert_eq!(opened.read().loop_channel(LoopKind::Variable).base(), 1);
        assert_eq!(closed.read().loop_channel(LoopKind::Variable).base(), 2);
        // The other loop is untouched.
        assert_eq!(closed.read().loop_channel(LoopKind::Fixed).current().len(), 2);
    }

    #[test]
    fn test_dispose_releases_channels() {
        let registry = registry();
        let weak = Arc::downgrade(&registry.channel::<Opened>().unwrap());

        assert_eq!(registry.dispose(), 2);
        assert!(weak.upgrade().is_none());
    }
}
