// SPDX-License-Identifier: AGPL-3.0-only

//! Physical-memory arena
//!
//! A bump allocator over one contiguous backing. Allocations are rounded up
//! to the granule, zero-filled, and never freed individually; the whole
//! arena goes away with [`Arena::close`] (or drop).
//!
//! The first granule is reserved, so no record starts at offset 0 and no
//! physical address handed out is ever 0. That keeps 0 free to mean
//! "absent" in every stored reference.

use crate::backends::{select_backing, ArenaBacking, BackingType, CoherencyMode, MemoryBackend};
use crate::error::{DriverError, Result};
use crate::memory::{DeviceMemory, PhysicalMemory, Window};
use bytemuck::Pod;
use std::sync::Arc;

/// Arena configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Backing to open
    pub backing: ArenaBacking,
    /// Allocation granularity in bytes (power of two, at least 4)
    pub granule: usize,
}

impl ArenaConfig {
    /// Default allocation granule
    pub const DEFAULT_GRANULE: usize = 64;

    /// Config for a given backing with the default granule
    pub const fn new(backing: ArenaBacking) -> Self {
        Self {
            backing,
            granule: Self::DEFAULT_GRANULE,
        }
    }

    /// Set the allocation granule
    #[must_use]
    pub const fn with_granule(mut self, granule: usize) -> Self {
        self.granule = granule;
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(ArenaBacking::default())
    }
}

/// A granule-rounded block handed out by [`Arena::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    offset: usize,
    len: usize,
}

impl Region {
    /// Offset from the start of the arena
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes (a multiple of the granule)
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty (never true for allocated regions)
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Which side is about to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Host wrote, device will read: flush
    ToDevice,
    /// Device wrote, host will read: invalidate
    FromDevice,
}

/// Usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes consumed, including the reserved granule
    pub used: usize,
    /// Total bytes
    pub capacity: usize,
    /// Successful allocations
    pub allocations: usize,
}

impl std::fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} bytes in {} allocations",
            self.used, self.capacity, self.allocations
        )
    }
}

/// Single-owner bump allocator over a physically contiguous backing
#[derive(Debug)]
pub struct Arena {
    backend: Arc<dyn MemoryBackend>,
    window: Window,
    granule: usize,
    allocations: usize,
}

impl Arena {
    /// Open the configured backing
    ///
    /// # Errors
    ///
    /// Returns error if the backing cannot be opened or does not fit the
    /// 32-bit device address space.
    pub fn open(config: &ArenaConfig) -> Result<Self> {
        let backend = select_backing(&config.backing)?;
        Self::from_backing(backend, config.granule)
    }

    /// Build an arena over an already opened backing
    ///
    /// # Errors
    ///
    /// Returns error if the granule is not a power of two of at least 4
    /// bytes, the backing is smaller than two granules, or its physical
    /// range does not fit in 32 bits.
    pub fn from_backing(backend: Arc<dyn MemoryBackend>, granule: usize) -> Result<Self> {
        if granule < 4 || !granule.is_power_of_two() {
            return Err(DriverError::map_failed(format!(
                "granule {granule} must be a power of two of at least 4"
            )));
        }
        let capacity = backend.capacity();
        if capacity < 2 * granule {
            return Err(DriverError::map_failed(format!(
                "backing of {capacity} bytes is too small for granule {granule}"
            )));
        }
        let physical_end = backend.physical_base().checked_add(capacity as u64);
        if physical_end.is_none_or(|end| end > 1 << 32) {
            return Err(DriverError::address_out_of_range(backend.physical_base()));
        }
        let physical_base = u32::try_from(backend.physical_base())
            .map_err(|_| DriverError::address_out_of_range(backend.physical_base()))?;

        tracing::info!(
            "Arena: {} backing, {} KB at physical {physical_base:#010x}, {}",
            backend.backing_type(),
            capacity / 1024,
            backend.coherency()
        );

        let window = Window {
            base: backend.base(),
            physical_base,
            low: granule,
            high: granule,
        };
        Ok(Self {
            backend,
            window,
            granule,
            allocations: 0,
        })
    }

    /// Reserve `bytes` (rounded up to the granule), zero-filled
    ///
    /// Returns `None` when the remaining capacity is insufficient; the arena
    /// never grows.
    pub fn allocate(&mut self, bytes: usize) -> Option<Region> {
        let len = bytes.max(1).div_ceil(self.granule).checked_mul(self.granule)?;
        let offset = self.window.high;
        let end = offset.checked_add(len)?;
        if end > self.capacity() {
            tracing::warn!(
                "Arena exhausted: {len} bytes requested, {} remaining",
                self.remaining()
            );
            return None;
        }

        // SAFETY: [offset, end) is inside the backing (end <= capacity) and
        // not yet handed out, so nothing else refers to it.
        unsafe { self.window.base.as_ptr().add(offset).write_bytes(0, len) };

        self.window.high = end;
        self.allocations += 1;
        tracing::debug!("Allocated {len} bytes at offset {offset:#x}");
        Some(Region { offset, len })
    }

    /// Physical address of the start of `region`
    pub fn translate(&self, region: Region) -> u32 {
        self.physical_address(region.offset)
    }

    /// Physical address of an arena offset
    pub fn physical_address(&self, offset: usize) -> u32 {
        debug_assert!(offset <= self.capacity());
        // Cannot wrap: physical_base + capacity <= 2^32 was checked at open.
        self.window.physical_base.wrapping_add(offset as u32)
    }

    /// Arena offset of an allocated physical address
    ///
    /// # Errors
    ///
    /// Returns error if the address is outside the allocated part.
    pub fn offset_of(&self, address: u32) -> Result<usize> {
        self.window.offset(address, 0)
    }

    /// Make one region coherent for the side about to read it
    ///
    /// # Errors
    ///
    /// Returns error if cache maintenance fails.
    pub fn synchronize(&self, region: Region, direction: SyncDirection) -> Result<()> {
        self.sync_range(region.offset, region.len, direction)
    }

    /// Make every allocated byte coherent for the side about to read it
    ///
    /// # Errors
    ///
    /// Returns error if cache maintenance fails.
    pub fn synchronize_all(&self, direction: SyncDirection) -> Result<()> {
        self.sync_range(0, self.window.high, direction)
    }

    fn sync_range(&self, offset: usize, len: usize, direction: SyncDirection) -> Result<()> {
        tracing::trace!("Sync {direction:?}: {len:#x} bytes at offset {offset:#x}");
        match direction {
            SyncDirection::ToDevice => self.backend.flush(offset, len),
            SyncDirection::FromDevice => self.backend.invalidate(offset, len),
        }
    }

    /// Device-side view of this arena's backing
    pub fn device_view(&self) -> DeviceMemory {
        DeviceMemory::new(
            Arc::clone(&self.backend),
            self.window.physical_base,
            self.granule,
        )
    }

    /// Usage counters
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            used: self.window.high,
            capacity: self.capacity(),
            allocations: self.allocations,
        }
    }

    /// Total bytes
    pub fn capacity(&self) -> usize {
        self.backend.capacity()
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.capacity() - self.window.high
    }

    /// Allocation granule
    pub const fn granule(&self) -> usize {
        self.granule
    }

    /// Physical address of byte 0
    pub const fn physical_base(&self) -> u32 {
        self.window.physical_base
    }

    /// Backing type
    pub fn backing_type(&self) -> BackingType {
        self.backend.backing_type()
    }

    /// Coherency mode of the backing
    pub fn coherency(&self) -> CoherencyMode {
        self.backend.coherency()
    }

    /// Release the arena. The backing is unmapped once no device view
    /// remains.
    pub fn close(self) {
        tracing::debug!("Closing arena ({})", self.stats());
    }
}

impl PhysicalMemory for Arena {
    fn load<T: Pod>(&self, address: u32) -> Result<T> {
        self.window.load(address)
    }

    fn store<T: Pod>(&mut self, address: u32, value: &T) -> Result<()> {
        self.window.store(address, value)
    }
}

// SAFETY: the window aliases memory owned by `backend` (Send + Sync); all
// mutation goes through &mut self.
unsafe impl Send for Arena {}

// SAFETY: &self methods only load records or issue cache maintenance.
unsafe impl Sync for Arena {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::heap::HeapBacking;

    fn heap_arena(capacity: usize, granule: usize) -> Arena {
        let backend = Arc::new(HeapBacking::new(capacity, 0x1000_0000).expect("heap"));
        Arena::from_backing(backend, granule).expect("arena")
    }

    #[test]
    fn allocations_round_to_granule() {
        let mut arena = heap_arena(4096, 64);
        let a = arena.allocate(1).expect("a");
        let b = arena.allocate(65).expect("b");
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 128);
        assert_eq!(b.offset(), a.offset() + 64);
    }

    #[test]
    fn first_granule_is_reserved() {
        let mut arena = heap_arena(4096, 64);
        let region = arena.allocate(16).expect("region");
        assert_eq!(region.offset(), 64);
        assert_eq!(arena.translate(region), 0x1000_0040);
        assert!(arena.load::<u32>(0x1000_0000).is_err());
    }

    #[test]
    fn exhaustion_returns_none_without_consuming() {
        let mut arena = heap_arena(4096, 64);
        assert!(arena.allocate(4096).is_none());
        let before = arena.stats();
        assert!(arena.allocate(8192).is_none());
        assert_eq!(arena.stats(), before);
        assert!(arena.allocate(4096 - 64).is_some());
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn load_store_round_trip_inside_allocation() {
        let mut arena = heap_arena(4096, 64);
        let region = arena.allocate(64).expect("region");
        let addr = arena.translate(region);
        arena.store(addr + 4, &0xdead_beef_u32).expect("store");
        assert_eq!(arena.load::<u32>(addr + 4).expect("load"), 0xdead_beef);
        // Past the allocated part
        assert!(arena.load::<u32>(addr + 64).is_err());
    }

    #[test]
    fn allocation_is_zero_filled() {
        let mut arena = heap_arena(4096, 64);
        let region = arena.allocate(64).expect("region");
        let addr = arena.translate(region);
        assert_eq!(arena.load::<[u32; 16]>(addr).expect("load"), [0; 16]);
    }

    #[test]
    fn device_view_sees_host_stores() {
        let mut arena = heap_arena(4096, 64);
        let region = arena.allocate(8).expect("region");
        let addr = arena.translate(region);
        arena.store(addr, &7u32).expect("store");
        let mut device = arena.device_view();
        assert_eq!(device.load::<u32>(addr).expect("device load"), 7);
        device.store(addr, &9u32).expect("device store");
        assert_eq!(arena.load::<u32>(addr).expect("host load"), 9);
    }

    #[test]
    fn offset_of_inverts_translate() {
        let mut arena = heap_arena(4096, 64);
        let region = arena.allocate(8).expect("region");
        assert_eq!(arena.offset_of(arena.translate(region)).expect("offset"), region.offset());
    }

    #[test]
    fn rejects_bad_granule_and_wide_ranges() {
        let backend = Arc::new(HeapBacking::new(4096, 0x1000).expect("heap"));
        assert!(Arena::from_backing(backend, 48).is_err());
        let high = Arc::new(HeapBacking::new(8192, 0xffff_f000).expect("heap"));
        assert!(Arena::from_backing(high, 64).is_err());
    }

    #[test]
    fn stats_count_allocations() {
        let mut arena = heap_arena(4096, 64);
        arena.allocate(10);
        arena.allocate(100);
        let stats = arena.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.used, 64 + 64 + 128);
        assert_eq!(stats.capacity, 4096);
    }
}
