// SPDX-License-Identifier: AGPL-3.0-only

//! Frontier queue: binary min-heap of (cost, node) slots in the arena
//!
//! Slots are 1-indexed; slot 0 is never used, so the accelerator finds the
//! root at `base + 8`. There is no decrease-key: a node may sit in the heap
//! several times and stale entries are skipped by the visited flag when
//! they surface.

use crate::error::{GraphError, Result};
use crate::records::{HeapSlot, NodeRef};
use crate::store::reserve;
use sssp_chip::layout::heap_slot;
use sssp_driver::{Arena, PhysicalMemory};

/// Binary min-heap over arena-resident slots
#[derive(Debug, Clone)]
pub struct FrontierQueue {
    base: u32,
    capacity: u32,
    size: u32,
}

impl FrontierQueue {
    /// Reserve `capacity` slots (plus the unused slot 0) in the arena
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] if the arena is too small.
    pub fn new(arena: &mut Arena, capacity: u32) -> Result<Self> {
        let bytes = (capacity as usize + 1) * heap_slot::SIZE;
        let base = reserve(arena, bytes)?;
        tracing::debug!("Frontier queue: {capacity} slots at {base:#010x}");
        Ok(Self::at(base, capacity))
    }

    /// Empty queue over slots that already exist at `base`
    pub const fn at(base: u32, capacity: u32) -> Self {
        Self {
            base,
            capacity,
            size: 0,
        }
    }

    /// Physical address of slot 0, as sent to the accelerator
    pub const fn base_address(&self) -> u32 {
        self.base
    }

    /// Usable slots
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Occupied slots
    pub const fn len(&self) -> u32 {
        self.size
    }

    /// No entries left
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.size = 0;
    }

    fn slot_address(&self, index: u32) -> u32 {
        self.base + index * heap_slot::SIZE as u32
    }

    fn read<M: PhysicalMemory>(&self, mem: &M, index: u32) -> Result<HeapSlot> {
        Ok(mem.load(self.slot_address(index))?)
    }

    fn write<M: PhysicalMemory>(&self, mem: &mut M, index: u32, slot: HeapSlot) -> Result<()> {
        Ok(mem.store(self.slot_address(index), &slot)?)
    }

    /// Insert `(cost, node)`, sifting up while strictly cheaper than the parent
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::QueueFull`] when every slot is taken.
    pub fn push<M: PhysicalMemory>(&mut self, mem: &mut M, cost: u32, node: NodeRef) -> Result<()> {
        if self.size == self.capacity {
            return Err(GraphError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.size += 1;
        let entry = HeapSlot {
            cost,
            node: node.address(),
        };

        let mut index = self.size;
        while index > 1 {
            let parent = self.read(mem, index / 2)?;
            if cost >= parent.cost {
                break;
            }
            self.write(mem, index, parent)?;
            index /= 2;
        }
        self.write(mem, index, entry)
    }

    /// Remove the cheapest entry
    ///
    /// The last slot moves to the root and sinks, swapping with the smaller
    /// child while that child is strictly cheaper. The right child wins only
    /// when strictly cheaper than the left.
    ///
    /// # Errors
    ///
    /// Returns error if a slot cannot be accessed or holds a null node.
    pub fn pop<M: PhysicalMemory>(&mut self, mem: &mut M) -> Result<Option<(u32, NodeRef)>> {
        if self.size == 0 {
            return Ok(None);
        }
        let top = self.read(mem, 1)?;
        let last = self.read(mem, self.size)?;
        self.size -= 1;

        if self.size > 0 {
            let mut index = 1;
            loop {
                let left = index * 2;
                if left > self.size {
                    break;
                }
                let mut child = left;
                let mut child_slot = self.read(mem, left)?;
                if left < self.size {
                    let right_slot = self.read(mem, left + 1)?;
                    if right_slot.cost < child_slot.cost {
                        child = left + 1;
                        child_slot = right_slot;
                    }
                }
                if child_slot.cost >= last.cost {
                    break;
                }
                self.write(mem, index, child_slot)?;
                index = child;
            }
            self.write(mem, index, last)?;
        }

        let node = NodeRef::from_raw(top.node)
            .ok_or_else(|| GraphError::corrupt(self.slot_address(1), "heap slot holds no node"))?;
        Ok(Some((top.cost, node)))
    }

    /// Check `heap[i].cost >= heap[i / 2].cost` for every occupied slot
    ///
    /// # Errors
    ///
    /// Returns error if a slot cannot be read.
    pub fn holds_heap_order<M: PhysicalMemory>(&self, mem: &M) -> Result<bool> {
        for index in 2..=self.size {
            if self.read(mem, index)?.cost < self.read(mem, index / 2)?.cost {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
