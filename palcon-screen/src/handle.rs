//! First-fit handle tables for screen resources.
//!
//! Handles cross the sandbox boundary as plain integers; the typed wrappers
//! exist so a texture handle cannot be passed where a buffer handle is
//! expected once inside the host.

/// Handle to a live vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    /// Reconstructs a handle from its wire representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw slot index as it crosses the sandbox boundary.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Handle to a live texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

impl TextureId {
    /// Reconstructs a handle from its wire representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw slot index as it crosses the sandbox boundary.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Reusable slot array mapping small integer handles to resources.
///
/// Allocation returns the lowest-numbered empty slot, appending only when no
/// slot is free; freeing empties the slot without shrinking the table. This
/// bounds handle values by the caller's peak concurrent resource count.
#[derive(Debug)]
pub(crate) struct SlotTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> SlotTable<T> {
    pub(crate) fn allocate(&mut self, resource: T) -> u32 {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(resource);
                index as u32
            },
            None => {
                self.slots.push(Some(resource));
                (self.slots.len() - 1) as u32
            },
        }
    }

    /// Empties the slot and hands back the resource for release, or `None`
    /// if the slot is empty or out of range.
    pub(crate) fn free(&mut self, index: u32) -> Option<T> {
        self.slots.get_mut(index as usize).and_then(Option::take)
    }

    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Drains every live resource, emptying the table's slots.
    pub(crate) fn drain_live(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_empty_slot() {
        let mut table = SlotTable::default();
        assert_eq!(table.allocate("a"), 0);
        assert_eq!(table.allocate("b"), 1);
        assert_eq!(table.allocate("c"), 2);

        table.free(0);
        assert_eq!(table.allocate("d"), 0, "freed slot must be reused first");
        assert_eq!(table.allocate("e"), 3, "full table appends");
    }

    #[test]
    fn free_keeps_table_size() {
        let mut table = SlotTable::default();
        table.allocate(1);
        table.allocate(2);
        table.allocate(3);

        assert_eq!(table.free(1), Some(2));

        // freeing an already-empty slot is a no-op on the table shape
        assert_eq!(table.free(1), None);
        assert_eq!(table.allocate(4), 1, "the slot stays reusable");
        assert_eq!(table.allocate(5), 3, "no slots were lost");
    }

    #[test]
    fn out_of_range_lookups_are_none() {
        let mut table: SlotTable<u8> = SlotTable::default();
        table.allocate(7);

        assert!(table.get(1).is_none());
        assert!(table.free(99).is_none());
        assert_eq!(table.allocate(8), 1, "out-of-range frees add no slots");
    }

    #[test]
    fn reuse_prefers_lowest_of_several_holes() {
        let mut table = SlotTable::default();
        for i in 0..5 {
            table.allocate(i);
        }
        table.free(3);
        table.free(1);

        assert_eq!(table.allocate(10), 1);
        assert_eq!(table.allocate(11), 3);
        assert_eq!(table.allocate(12), 5, "holes exhausted, table appends");
    }

    #[test]
    fn drain_live_empties_all_slots() {
        let mut table = SlotTable::default();
        table.allocate("x");
        table.allocate("y");
        table.free(0);

        let live: Vec<_> = table.drain_live().collect();
        assert_eq!(live, vec!["y"]);
        assert!(table.get(1).is_none());
    }
}
