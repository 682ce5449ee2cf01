//! Per-object heap: a growable pool of optional variables with bump/reuse
//! allocation.

use crate::error::{CoreError, CoreResult};
use crate::variable::Variable;

const INITIAL_CAPACITY: usize = 8;

/// A per-object slot pool. Addresses are stable for the lifetime of the slot
/// (an address is only reused after the slot at that address is freed).
#[derive(Debug, Clone)]
pub struct Heap {
    slots: Vec<Option<Variable>>,
    /// Lowest address known to be a candidate for the next allocation. Freeing
    /// a slot below this moves it back so the freed address is reused first.
    cursor: usize,
    ceiling: usize,
}

impl Heap {
    /// Creates an empty heap that will refuse to grow past `ceiling` slots.
    pub fn new(ceiling: usize) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            ceiling,
        }
    }

    /// Number of slots currently backing this heap (allocated or not).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocates the first empty slot, growing the backing storage
    /// geometrically (doubling from [`INITIAL_CAPACITY`]) if none is free.
    pub fn alloc(&mut self) -> CoreResult<usize> {
        if let Some(address) = self.find_empty_from_cursor() {
            self.slots[address] = Some(Variable::null());
            self.cursor = address + 1;
            return Ok(address);
        }

        let address = self.slots.len();
        if address >= self.ceiling {
            return Err(CoreError::HeapCeilingExceeded {
                ceiling: self.ceiling,
            });
        }
        let new_capacity = (self.slots.len().max(INITIAL_CAPACITY / 2) * 2).min(self.ceiling);
        self.slots.resize_with(new_capacity.max(address + 1), || None);
        self.slots[address] = Some(Variable::null());
        self.cursor = address + 1;
        Ok(address)
    }

    /// Frees `address`, making it available for reuse by the next [`alloc`](Self::alloc).
    pub fn free(&mut self, address: usize) -> CoreResult<()> {
        self.check_bounds(address)?;
        self.slots[address] = None;
        if address < self.cursor {
            self.cursor = address;
        }
        Ok(())
    }

    /// Reads the value stored at `address`. Fatal if the slot was never
    /// allocated or has since been freed.
    pub fn get(&self, address: usize) -> CoreResult<&Variable> {
        self.check_bounds(address)?;
        self.slots[address].as_ref().ok_or(CoreError::EmptyHeapSlot {
            address,
            size: self.slots.len(),
        })
    }

    /// Overwrites the value stored at `address`. Fatal if the slot was never
    /// allocated.
    pub fn set(&mut self, address: usize, value: Variable) -> CoreResult<()> {
        self.check_bounds(address)?;
        if self.slots[address].is_none() {
            return Err(CoreError::EmptyHeapSlot {
                address,
                size: self.slots.len(),
            });
        }
        self.slots[address] = Some(value);
        Ok(())
    }

    /// Iterates over every live (allocated) `(address, value)` pair. Used by
    /// the garbage collector to scan an object's heap for embedded handles.
    pub fn iter_live(&self) -> impl Iterator<Item = (usize, &Variable)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    fn find_empty_from_cursor(&self) -> Option<usize> {
        self.slots[self.cursor..]
            .iter()
            .position(|s| s.is_none())
            .map(|offset| self.cursor + offset)
    }

    fn check_bounds(&self, address: usize) -> CoreResult<()> {
        if address >= self.slots.len() {
            return Err(CoreError::EmptyHeapSlot {
                address,
                size: self.slots.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_increasing_addresses() {
        let mut heap = Heap::new(1024);
        let a = heap.alloc().unwrap();
        let b = heap.alloc().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn reading_empty_slot_is_fatal() {
        let heap = Heap::new(1024);
        assert!(matches!(
            heap.get(0),
            Err(CoreError::EmptyHeapSlot { address: 0, .. })
        ));
    }

    #[test]
    fn freed_address_is_reused_by_next_alloc() {
        let mut heap = Heap::new(1024);
        let a = heap.alloc().unwrap();
        let _b = heap.alloc().unwrap();
        heap.free(a).unwrap();
        let c = heap.alloc().unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn heap_grows_past_initial_capacity() {
        let mut heap = Heap::new(1024);
        for i in 0..100 {
            let addr = heap.alloc().unwrap();
            assert_eq!(addr, i);
        }
    }

    #[test]
    fn heap_respects_ceiling() {
        let mut heap = Heap::new(2);
        heap.alloc().unwrap();
        heap.alloc().unwrap();
        assert!(matches!(
            heap.alloc(),
            Err(CoreError::HeapCeilingExceeded { ceiling: 2 })
        ));
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut heap = Heap::new(1024);
        let a = heap.alloc().unwrap();
        heap.set(a, Variable::Number(42.0)).unwrap();
        assert_eq!(heap.get(a).unwrap().as_number(), Some(42.0));
    }
}
