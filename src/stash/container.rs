//! # Live Container
//!
//! The mutable, in-memory side of the stash. A [`LiveContainer`] is created
//! every time the stash is attached to a world object and dropped when that
//! object goes away; the durable side is the [`Snapshot`] held by the
//! persistence layer.
//!
//! Slots are sparse: only occupied slots are stored, keyed by position. Slot
//! positions matter (the host UI shows items where the player left them), so
//! every conversion to and from [`Snapshot`] preserves them.

use crate::error::ContainerError;
use crate::model::{ItemRecord, SlotEntry, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// Anything the stash can pull items out of, slot by slot.
///
/// Implemented by [`LiveContainer`] itself and by host inventory adapters
/// (e.g. the player's backpack).
pub trait ItemSource {
    /// Highest occupied slot, or `None` when empty.
    fn last_item_position(&self) -> Option<usize>;

    /// Slots the host has pinned in place; transfers must skip them.
    fn is_locked(&self, slot: usize) -> bool;

    fn item_at(&self, slot: usize) -> Option<&ItemRecord>;

    /// Remove and return the item at `slot`.
    fn take(&mut self, slot: usize) -> Option<ItemRecord>;
}

#[derive(Debug, Clone, Default)]
pub struct LiveContainer {
    capacity: usize,
    slots: BTreeMap<usize, ItemRecord>,
    locked: BTreeSet<usize>,
}

impl LiveContainer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: BTreeMap::new(),
            locked: BTreeSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn get(&self, slot: usize) -> Option<&ItemRecord> {
        self.slots.get(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ItemRecord)> {
        self.slots.iter().map(|(slot, item)| (*slot, item))
    }

    /// Place `item` into an empty slot without merging.
    pub fn insert_at(&mut self, slot: usize, item: ItemRecord) -> Result<(), ContainerError> {
        if slot >= self.capacity {
            return Err(ContainerError::OutOfRange {
                slot,
                capacity: self.capacity,
            });
        }
        if item.count == 0 || item.max_stack == 0 || item.count > item.max_stack {
            return Err(ContainerError::InvalidStack {
                type_id: item.type_id,
                count: item.count,
                max_stack: item.max_stack,
            });
        }
        if self.slots.contains_key(&slot) {
            return Err(ContainerError::Occupied(slot));
        }
        self.slots.insert(slot, item);
        Ok(())
    }

    /// Merge `item` into existing stacks, spilling the remainder into the
    /// lowest free slots.
    ///
    /// All-or-nothing: when the item does not fit completely the container
    /// is left unchanged and the item is handed back.
    pub fn add_and_merge(&mut self, item: ItemRecord) -> Result<(), ItemRecord> {
        if item.count == 0 || item.max_stack == 0 {
            return Err(item);
        }

        let stack_room: u64 = if item.is_stackable() {
            self.slots
                .values()
                .filter(|existing| existing.stacks_with(&item))
                .map(|existing| u64::from(existing.max_stack.saturating_sub(existing.count)))
                .sum()
        } else {
            0
        };
        let remainder = u64::from(item.count).saturating_sub(stack_room);
        let slots_needed = remainder.div_ceil(u64::from(item.max_stack));
        let free_slots = (self.capacity - self.slots.len().min(self.capacity)) as u64;
        if slots_needed > free_slots {
            return Err(item);
        }

        let mut left = item.count;
        if item.is_stackable() {
            for existing in self.slots.values_mut() {
                if left == 0 {
                    break;
                }
                if existing.stacks_with(&item) {
                    let moved = existing.max_stack.saturating_sub(existing.count).min(left);
                    existing.count += moved;
                    left -= moved;
                }
            }
        }

        while left > 0 {
            let Some(slot) = self.first_free_slot() else {
                // Unreachable after the room check above.
                break;
            };
            let mut stack = item.clone();
            stack.count = left.min(item.max_stack);
            left -= stack.count;
            self.slots.insert(slot, stack);
        }
        Ok(())
    }

    pub fn remove(&mut self, slot: usize) -> Option<ItemRecord> {
        self.slots.remove(&slot)
    }

    pub fn lock(&mut self, slot: usize) {
        self.locked.insert(slot);
    }

    pub fn unlock(&mut self, slot: usize) {
        self.locked.remove(&slot);
    }

    /// Drops every item; capacity and locks are kept.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            capacity: self.capacity,
            entries: self
                .slots
                .iter()
                .map(|(slot, item)| SlotEntry {
                    slot: *slot,
                    item: item.clone(),
                })
                .collect(),
        }
    }

    fn first_free_slot(&self) -> Option<usize> {
        let mut expected = 0;
        for slot in self.slots.keys() {
            if *slot != expected {
                break;
            }
            expected += 1;
        }
        (expected < self.capacity).then_some(expected)
    }
}

impl ItemSource for LiveContainer {
    fn last_item_position(&self) -> Option<usize> {
        self.slots.keys().next_back().copied()
    }

    fn is_locked(&self, slot: usize) -> bool {
        self.locked.contains(&slot)
    }

    fn item_at(&self, slot: usize) -> Option<&ItemRecord> {
        self.slots.get(&slot)
    }

    fn take(&mut self, slot: usize) -> Option<ItemRecord> {
        self.remove(slot)
    }
}
