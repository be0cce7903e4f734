//! One of the dictionary's two chained tables.

use crate::memory::{self, UsedMemory};
use slotmap::DefaultKey;

/// Array of chain heads. A chain is a singly linked list of arena nodes
/// threaded through `Node::next`.
#[derive(Debug, Default)]
pub(crate) struct HashTable {
    pub(crate) slots: Vec<Option<DefaultKey>>,
    /// Entries chained in this table; may exceed `size()`.
    pub(crate) used: usize,
}

impl HashTable {
    /// A zeroed table with `size` slots, charged to `memory`.
    pub(crate) fn with_size(size: usize, memory: &UsedMemory) -> Self {
        debug_assert!(size.is_power_of_two());
        memory.charge(Self::slot_bytes(size));
        Self {
            slots: memory::alloc_filled(size, None),
            used: 0,
        }
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn size_mask(&self) -> usize {
        self.size().wrapping_sub(1)
    }

    #[inline]
    pub(crate) fn index_for(&self, hash: u64) -> usize {
        (hash & self.size_mask() as u64) as usize
    }

    /// Give the slot array back and credit its bytes.
    pub(crate) fn release(self, memory: &UsedMemory) {
        if self.size() > 0 {
            memory.credit(Self::slot_bytes(self.size()));
        }
    }

    fn slot_bytes(size: usize) -> usize {
        size * core::mem::size_of::<Option<DefaultKey>>()
    }
}
