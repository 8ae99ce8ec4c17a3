//! Fixed-capacity slot pool with generation-checked handles
//!
//! Slots are never reallocated. A released slot goes to the front of the free
//! list, so the next allocation reuses it.

use super::{BatchError, BatchResult};
use crate::ecs::Entity;
use std::collections::VecDeque;

/// Handle to a reserved slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Slot index inside the owning batch
    pub index: u32,
    /// Generation counter, bumped on every allocation of the slot
    pub generation: u32,
}

impl SlotHandle {
    /// Slot index as an array offset
    pub const fn slot(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone, Default)]
struct SlotEntry {
    generation: u32,
    owner: Option<Entity>,
}

/// Pool of slots owned by entities
#[derive(Debug, Clone)]
pub struct SlotPool {
    entries: Vec<SlotEntry>,
    free_list: VecDeque<u32>,
}

impl SlotPool {
    /// Create a pool with every slot free, lowest index first
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![SlotEntry::default(); capacity],
            free_list: (0..capacity as u32).collect(),
        }
    }

    /// Reserve a slot for `owner`
    pub fn allocate(&mut self, owner: Entity) -> Option<SlotHandle> {
        let index = self.free_list.pop_front()?;
        let entry = &mut self.entries[index as usize];
        entry.generation = entry.generation.wrapping_add(1);
        entry.owner = Some(owner);
        Some(SlotHandle {
            index,
            generation: entry.generation,
        })
    }

    /// Return a slot to the pool, yielding its former owner
    pub fn release(&mut self, handle: SlotHandle) -> BatchResult<Entity> {
        let entry = self
            .entries
            .get_mut(handle.slot())
            .filter(|e| e.generation == handle.generation)
            .ok_or(BatchError::StaleHandle(handle))?;
        let owner = entry.owner.take().ok_or(BatchError::StaleHandle(handle))?;
        self.free_list.push_front(handle.index);
        Ok(owner)
    }

    /// Current owner of a live handle
    pub fn owner(&self, handle: SlotHandle) -> Option<Entity> {
        self.entries
            .get(handle.slot())
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.owner)
    }

    /// Handle still refers to a reserved slot
    pub fn is_live(&self, handle: SlotHandle) -> bool {
        self.owner(handle).is_some()
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Reserved slots
    pub fn occupied(&self) -> usize {
        self.entries.len() - self.free_list.len()
    }

    /// No free slot left
    pub fn is_full(&self) -> bool {
        self.free_list.is_empty()
    }

    /// No slot reserved
    pub fn is_empty(&self) -> bool {
        self.free_list.len() == self.entries.len()
    }

    /// Index of the highest reserved slot
    pub fn highest_occupied(&self) -> Option<usize> {
        self.entries.iter().rposition(|e| e.owner.is_some())
    }

    /// Reserved slots and their owners, by slot index
    pub fn occupants(&self) -> impl Iterator<Item = (usize, Entity)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.owner.map(|owner| (i, owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;

    fn entities(n: usize) -> Vec<Entity> {
        let mut world = World::new();
        (0..n).map(|_| world.create_entity()).collect()
    }

    #[test]
    fn test_allocates_in_order_until_full() {
        let owners = entities(3);
        let mut pool = SlotPool::new(2);
        assert_eq!(pool.allocate(owners[0]).unwrap().index, 0);
        assert_eq!(pool.allocate(owners[1]).unwrap().index, 1);
        assert!(pool.is_full());
        assert!(pool.allocate(owners[2]).is_none());
    }

    #[test]
    fn test_released_slot_is_reused_first() {
        let owners = entities(4);
        let mut pool = SlotPool::new(4);
        let handles: Vec<_> = owners[..3].iter().map(|&e| pool.allocate(e).unwrap()).collect();

        assert_eq!(pool.release(handles[1]).unwrap(), owners[1]);
        let reused = pool.allocate(owners[3]).unwrap();
        assert_eq!(reused.index, 1);
        assert_ne!(reused.generation, handles[1].generation);
        assert_eq!(pool.occupied(), 3);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let owners = entities(2);
        let mut pool = SlotPool::new(1);
        let first = pool.allocate(owners[0]).unwrap();
        pool.release(first).unwrap();
        assert!(matches!(pool.release(first), Err(BatchError::StaleHandle(_))));

        pool.allocate(owners[1]).unwrap();
        assert!(!pool.is_live(first));
        assert!(pool.owner(first).is_none());
    }

    #[test]
    fn test_highest_occupied() {
        let owners = entities(3);
        let mut pool = SlotPool::new(8);
        assert_eq!(pool.highest_occupied(), None);
        let handles: Vec<_> = owners.iter().map(|&e| pool.allocate(e).unwrap()).collect();
        assert_eq!(pool.highest_occupied(), Some(2));
        pool.release(handles[2]).unwrap();
        assert_eq!(pool.highest_occupied(), Some(1));
        assert_eq!(pool.occupants().count(), 2);
    }
}
