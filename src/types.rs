//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `Slot`: index into the fixed-capacity connection registry
//! - `ConnectionId`: a slot plus the generation it was handed out in

/// Index of a connection in the registry, in `[0, capacity)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable handle of one active connection
///
/// Slots are reused after a connection is removed; the generation tells the
/// new occupant apart from the one that used the slot before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub slot: Slot,
    pub generation: u64,
}

impl ConnectionId {
    pub fn new(slot: Slot, generation: u64) -> Self {
        Self { slot, generation }
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}
