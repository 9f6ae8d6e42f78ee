//! Growable slot storage
//!
//! Tables hand out dense indices that stay valid for the life of the process.
//! When a table is full it asks for another `step` slots at once; the request
//! fails if the allocator refuses or a configured cap would be exceeded.

use std::ops::{Index, IndexMut};

use crate::observer::errors::{ResourceError, Result, TableKind};

#[derive(Debug)]
pub struct SlotTable<T> {
    kind: TableKind,
    slots: Vec<T>,
    step: usize,
    limit: Option<usize>,
}

impl<T> SlotTable<T> {
    pub fn new(kind: TableKind, step: usize, limit: Option<usize>) -> SlotTable<T> {
        SlotTable {
            kind,
            slots: Vec::new(),
            step: step.max(1),
            limit,
        }
    }

    /// Guarantees room for one more slot, growing by `step` if needed
    pub fn ensure_room(&mut self) -> Result<()> {
        let len = self.slots.len();

        if let Some(limit) = self.limit {
            if len >= limit {
                return Err(ResourceError {
                    table: self.kind,
                    current: len,
                    limit: Some(limit),
                }
                .into());
            }
        }

        if len < self.slots.capacity() {
            return Ok(());
        }

        let mut additional = self.step;
        if let Some(limit) = self.limit {
            additional = additional.min(limit - len);
        }

        self.slots.try_reserve_exact(additional).map_err(|_| ResourceError {
            table: self.kind,
            current: len,
            limit: None,
        })?;

        log::debug!(
            "Grew {:?} table to {} slots",
            self.kind,
            self.slots.capacity()
        );
        Ok(())
    }

    /// Appends a value and returns its slot index
    pub fn push(&mut self, value: T) -> Result<usize> {
        self.ensure_room()?;
        let slot = self.slots.len();
        self.slots.push(value);
        Ok(slot)
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }
}

impl<T> Index<usize> for SlotTable<T> {
    type Output = T;

    fn index(&self, slot: usize) -> &T {
        &self.slots[slot]
    }
}

impl<T> IndexMut<usize> for SlotTable<T> {
    fn index_mut(&mut self, slot: usize) -> &mut T {
        &mut self.slots[slot]
    }
}
