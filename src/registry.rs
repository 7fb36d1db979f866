//! Connection registry
//!
//! Fixed-capacity arena of active connections addressed by slot, with an
//! ordered free list so the lowest free slot is always handed out first.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use futures_util::future::AbortHandle;

use crate::connection::Connection;
use crate::types::{ConnectionId, Slot};

/// Returned by `add` when every slot is taken
///
/// Carries the rejected handle back so the caller can close it.
#[derive(Debug)]
pub struct RegistryFull<H>(pub H);

/// Registry of active connections
#[derive(Debug)]
pub struct ConnectionRegistry<H> {
    slots: Vec<Option<Connection<H>>>,
    /// Generation of the next occupant, per slot
    generations: Vec<u64>,
    free: BTreeSet<usize>,
}

impl<H> ConnectionRegistry<H> {
    /// Create an empty registry with a fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            generations: vec![0; capacity],
            free: (0..capacity).collect(),
        }
    }

    /// Place a new connection in the lowest free slot
    pub fn add(
        &mut self,
        peer: SocketAddr,
        handle: H,
        reader: AbortHandle,
    ) -> Result<ConnectionId, RegistryFull<H>> {
        let Some(index) = self.free.pop_first() else {
            return Err(RegistryFull(handle));
        };

        let id = ConnectionId::new(Slot(index), self.generations[index]);
        self.slots[index] = Some(Connection::new(id, peer, handle, reader));
        Ok(id)
    }

    /// Free the slot held by `id`
    ///
    /// Returns `None` if the slot is empty or already owned by a newer
    /// connection. The caller is responsible for closing the returned handle.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<H>> {
        let index = id.slot.0;
        let entry = self.slots.get_mut(index)?;
        if entry.as_ref().map(|c| c.id) != Some(id) {
            return None;
        }

        let conn = entry.take();
        self.generations[index] += 1;
        self.free.insert(index);
        conn
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<H>> {
        self.slots
            .get(id.slot.0)
            .and_then(Option::as_ref)
            .filter(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<H>> {
        self.slots
            .get_mut(id.slot.0)
            .and_then(Option::as_mut)
            .filter(|c| c.id == id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of current members, in slot order
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        self.iter().map(|c| c.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection<H>> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection<H>> {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    fn add(
        registry: &mut ConnectionRegistry<u32>,
        handle: u32,
    ) -> Result<ConnectionId, RegistryFull<u32>> {
        let (abort, _registration) = AbortHandle::new_pair();
        registry.add(peer(), handle, abort)
    }

    #[test]
    fn test_add_assigns_lowest_free_slot() {
        let mut registry = ConnectionRegistry::with_capacity(3);
        assert_eq!(add(&mut registry, 1).unwrap().slot, Slot(0));
        assert_eq!(add(&mut registry, 2).unwrap().slot, Slot(1));
        assert_eq!(add(&mut registry, 3).unwrap().slot, Slot(2));
        assert_eq!(registry.len(), 3);
        assert!(registry.is_full());
    }

    #[test]
    fn test_full_registry_returns_handle() {
        let mut registry = ConnectionRegistry::with_capacity(2);
        add(&mut registry, 1).unwrap();
        add(&mut registry, 2).unwrap();

        match add(&mut registry, 3) {
            Err(RegistryFull(handle)) => assert_eq!(handle, 3),
            Ok(_) => panic!("registry accepted past capacity"),
        }

        // Existing members are untouched
        assert_eq!(registry.len(), 2);
        let handles: Vec<u32> = registry.iter().map(|c| c.handle).collect();
        assert_eq!(handles, vec![1, 2]);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut registry = ConnectionRegistry::with_capacity(4);
        let mut live = Vec::new();

        for round in 0..50u32 {
            if round % 3 == 2 && !live.is_empty() {
                let id = live.remove(0);
                assert!(registry.remove(id).is_some());
            } else if let Ok(id) = add(&mut registry, round) {
                live.push(id);
            }
            assert!(registry.len() <= registry.capacity());
            assert_eq!(registry.len(), live.len());
        }
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut registry = ConnectionRegistry::with_capacity(3);
        let a = add(&mut registry, 1).unwrap();
        let b = add(&mut registry, 2).unwrap();
        let _c = add(&mut registry, 3).unwrap();

        let removed = registry.remove(b).unwrap();
        assert_eq!(removed.handle, 2);

        let d = add(&mut registry, 4).unwrap();
        assert_eq!(d.slot, b.slot);
        assert_ne!(d, b);

        // No two active connections share a slot
        let mut slots: Vec<Slot> = registry.active_ids().iter().map(|id| id.slot).collect();
        slots.dedup();
        assert_eq!(slots.len(), 3);
        assert!(registry.contains(a));
    }

    #[test]
    fn test_stale_id_cannot_remove_new_occupant() {
        let mut registry = ConnectionRegistry::with_capacity(1);
        let old = add(&mut registry, 1).unwrap();
        registry.remove(old).unwrap();
        let new = add(&mut registry, 2).unwrap();

        assert!(registry.remove(old).is_none());
        assert!(registry.get(old).is_none());
        assert_eq!(registry.get(new).map(|c| c.handle), Some(2));
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut registry = ConnectionRegistry::with_capacity(2);
        let a = add(&mut registry, 1).unwrap();
        assert!(registry.remove(a).is_some());
        assert!(registry.remove(a).is_none());
        assert!(registry.is_empty());
    }
}
