// SPDX-License-Identifier: AGPL-3.0-only

//! Record access by physical address
//!
//! Everything stored in the arena refers to other records by the 32-bit
//! address the accelerator sees. [`PhysicalMemory`] resolves such an address
//! to host memory and copies a plain-old-data record in or out. Accesses
//! are unaligned copies; no reference into the mapping is ever handed out.

use crate::backends::MemoryBackend;
use crate::error::{DriverError, Result};
use bytemuck::Pod;
use std::ptr::NonNull;
use std::sync::Arc;

/// Load and store `#[repr(C)]` records by physical address
pub trait PhysicalMemory {
    /// Copy the record at `address` out of memory
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AddressOutOfRange`] if the record does not lie
    /// entirely inside the accessible window.
    fn load<T: Pod>(&self, address: u32) -> Result<T>;

    /// Copy `value` into memory at `address`
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AddressOutOfRange`] if the record does not lie
    /// entirely inside the accessible window.
    fn store<T: Pod>(&mut self, address: u32, value: &T) -> Result<()>;
}

/// Accessible window `[low, high)` of a mapping, in physical addresses
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub(crate) base: NonNull<u8>,
    pub(crate) physical_base: u32,
    pub(crate) low: usize,
    pub(crate) high: usize,
}

impl Window {
    /// Host-relative offset of a `len`-byte record at `address`
    pub(crate) fn offset(&self, address: u32, len: usize) -> Result<usize> {
        address
            .checked_sub(self.physical_base)
            .map(|offset| offset as usize)
            .filter(|&offset| offset >= self.low)
            .filter(|&offset| offset.checked_add(len).is_some_and(|end| end <= self.high))
            .ok_or_else(|| DriverError::address_out_of_range(address))
    }

    pub(crate) fn load<T: Pod>(&self, address: u32) -> Result<T> {
        let offset = self.offset(address, size_of::<T>())?;
        // SAFETY: offset..offset+size_of::<T>() lies inside the live mapping
        // (checked against high <= capacity); T is Pod so any bytes are valid,
        // and read_unaligned has no alignment requirement.
        Ok(unsafe { self.base.as_ptr().add(offset).cast::<T>().read_unaligned() })
    }

    pub(crate) fn store<T: Pod>(&self, address: u32, value: &T) -> Result<()> {
        let offset = self.offset(address, size_of::<T>())?;
        // SAFETY: bounds checked as in load; the mapping is writable and the
        // caller holds the single writer handle.
        unsafe {
            self.base
                .as_ptr()
                .add(offset)
                .cast::<T>()
                .write_unaligned(*value);
        }
        Ok(())
    }
}

/// The arena as the accelerator sees it
///
/// Shares the backing with the [`Arena`](crate::arena::Arena) that created
/// it and reaches every byte past the reserved first granule. A device
/// model uses it to walk the records the host built.
#[derive(Debug, Clone)]
pub struct DeviceMemory {
    backend: Arc<dyn MemoryBackend>,
    window: Window,
}

impl DeviceMemory {
    pub(crate) fn new(backend: Arc<dyn MemoryBackend>, physical_base: u32, low: usize) -> Self {
        let window = Window {
            base: backend.base(),
            physical_base,
            low,
            high: backend.capacity(),
        };
        Self { backend, window }
    }

    /// Physical address of byte 0 of the backing
    pub const fn physical_base(&self) -> u32 {
        self.window.physical_base
    }

    /// Bytes visible to the device
    pub fn capacity(&self) -> usize {
        self.backend.capacity()
    }
}

impl PhysicalMemory for DeviceMemory {
    fn load<T: Pod>(&self, address: u32) -> Result<T> {
        self.window.load(address)
    }

    fn store<T: Pod>(&mut self, address: u32, value: &T) -> Result<()> {
        self.window.store(address, value)
    }
}

// SAFETY: the window pointer aliases the backing kept alive by `backend`,
// which is itself Send + Sync.
unsafe impl Send for DeviceMemory {}

// SAFETY: shared access only loads; stores need &mut self.
unsafe impl Sync for DeviceMemory {}
