// SPDX-License-Identifier: AGPL-3.0-only

//! Heap backing
//!
//! Page-aligned, zeroed host memory. No device can reach it, so the physical
//! base is synthetic and only needs to keep every address non-zero and
//! inside 32 bits. Used for software runs and for the replay accelerator.

use super::{BackingType, CoherencyMode, MemoryBackend};
use crate::error::{DriverError, Result};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

const ALIGN: usize = 4096;

/// Host-memory arena backing
#[derive(Debug)]
pub struct HeapBacking {
    ptr: NonNull<u8>,
    layout: Layout,
    physical_base: u64,
}

impl HeapBacking {
    /// Reserve `capacity` bytes (rounded up to a page) reported at `physical_base`
    ///
    /// # Errors
    ///
    /// Returns error if the capacity is zero or the allocation fails.
    pub fn new(capacity: usize, physical_base: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(DriverError::map_failed("heap backing needs a non-zero capacity"));
        }
        let size = capacity
            .checked_next_multiple_of(ALIGN)
            .ok_or_else(|| DriverError::map_failed(format!("capacity {capacity} overflows")))?;
        let layout = Layout::from_size_align(size, ALIGN)
            .map_err(|e| DriverError::map_failed(format!("Invalid heap layout: {e}")))?;

        // SAFETY: layout has non-zero size and a power-of-two alignment;
        // alloc_zeroed returns null on failure, handled below, and the block is
        // released in Drop with the same layout.
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| DriverError::map_failed(format!("Failed to reserve {size} bytes")))?;

        tracing::debug!("Heap backing: {size:#x} bytes at {ptr:p}, physical {physical_base:#x}");

        Ok(Self {
            ptr,
            layout,
            physical_base,
        })
    }
}

impl MemoryBackend for HeapBacking {
    fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    fn capacity(&self) -> usize {
        self.layout.size()
    }

    fn physical_base(&self) -> u64 {
        self.physical_base
    }

    fn coherency(&self) -> CoherencyMode {
        CoherencyMode::CacheEnabled
    }

    fn flush(&self, _offset: usize, _len: usize) -> Result<()> {
        fence(Ordering::SeqCst);
        Ok(())
    }

    fn invalidate(&self, _offset: usize, _len: usize) -> Result<()> {
        fence(Ordering::SeqCst);
        Ok(())
    }

    fn backing_type(&self) -> BackingType {
        BackingType::Heap
    }
}

impl Drop for HeapBacking {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with exactly this layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// SAFETY: HeapBacking owns its allocation exclusively.
unsafe impl Send for HeapBacking {}

// SAFETY: the backing itself never touches the bytes; callers serialise writes
// through the single-owner arena.
unsafe impl Sync for HeapBacking {}
