// SPDX-License-Identifier: AGPL-3.0-only

//! Register window access
//!
//! The accelerator's latches live in one small UIO map. [`RegisterAccess`]
//! is the seam the channel talks through, so the polling logic can run
//! against a fake register bank in tests.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]

use crate::backends::mmap::MappedFile;
use crate::error::{DriverError, Result};
use sssp_chip::regs::WINDOW_SIZE;
use std::path::Path;

/// 32-bit register reads and writes at byte offsets
pub trait RegisterAccess {
    /// Read a 32-bit register
    fn read32(&self, offset: usize) -> u32;

    /// Write a 32-bit register
    fn write32(&self, offset: usize, value: u32);
}

/// Mapped register window of the accelerator
#[derive(Debug)]
pub struct RegisterWindow {
    map: MappedFile,
}

impl RegisterWindow {
    /// Map the first [`WINDOW_SIZE`] bytes of `device`
    ///
    /// # Errors
    ///
    /// Returns error if the device node is missing or cannot be mapped.
    pub fn open(device: &Path) -> Result<Self> {
        let map = MappedFile::open(device, WINDOW_SIZE, 0, false)?;
        if map.size() < WINDOW_SIZE {
            return Err(DriverError::map_failed("register window truncated"));
        }
        Ok(Self { map })
    }

    /// Device node backing the window
    pub fn device(&self) -> &Path {
        self.map.path()
    }
}

impl RegisterAccess for RegisterWindow {
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the window.
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.map.size(), "Register offset out of bounds");
        // SAFETY: read_volatile necessary for MMIO, hardware can change value.
        // Invariants: (1) ptr from mmap, valid for map.size(); (2) offset+4 <= size;
        // (3) offset is a register offset, so u32 aligned.
        unsafe {
            std::ptr::read_volatile(self.map.as_ptr().as_ptr().add(offset).cast::<u32>())
        }
    }

    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the window.
    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.map.size(), "Register offset out of bounds");
        // SAFETY: write_volatile necessary for MMIO, triggers the latch.
        // Invariants as in read32.
        unsafe {
            std::ptr::write_volatile(self.map.as_ptr().as_ptr().add(offset).cast::<u32>(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_window_device() {
        let err = RegisterWindow::open(Path::new("/dev/uio-sssp-absent")).expect_err("absent");
        assert!(matches!(err, DriverError::DeviceNotFound { .. }));
    }

    #[test]
    fn window_over_regular_file() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        file.as_file().set_len(WINDOW_SIZE as u64).expect("size");
        let window = RegisterWindow::open(file.path()).expect("map");
        window.write32(sssp_chip::regs::DATA, 0x1234_5678);
        assert_eq!(window.read32(sssp_chip::regs::DATA), 0x1234_5678);
        assert_eq!(window.read32(sssp_chip::regs::STATUS), 0);
    }
}
