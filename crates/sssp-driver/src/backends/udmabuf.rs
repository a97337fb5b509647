// SPDX-License-Identifier: AGPL-3.0-only

//! udmabuf (CMA) backing
//!
//! The udmabuf driver exports a physically contiguous buffer as
//! `/dev/<name>` and describes it under `/sys/class/udmabuf/<name>/`:
//!
//! ```text
//! phys_addr   hex physical base
//! size        decimal byte count
//! sync_mode   writable, 0..=3 (see CoherencyMode)
//! ```
//!
//! Any mode other than 0 needs the device opened with `O_SYNC` so the
//! driver hands back an uncached mapping.

use super::mmap::MappedFile;
use super::{
    attribute_size, read_decimal_attribute, read_hex_attribute, BackingType, CoherencyMode,
    MemoryBackend,
};
use crate::error::{DriverError, Result};
use sssp_chip::regs::UDMABUF_CLASS;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

/// udmabuf arena backing
#[derive(Debug)]
pub struct UdmabufBacking {
    map: MappedFile,
    physical_base: u64,
    mode: CoherencyMode,
}

impl UdmabufBacking {
    /// Open `/dev/<name>` using the attributes under `/sys/class/udmabuf`
    ///
    /// # Errors
    ///
    /// Returns error if the attributes are missing or malformed, `sync_mode`
    /// cannot be written, or the device cannot be mapped.
    pub fn open(name: &str, mode: CoherencyMode) -> Result<Self> {
        Self::open_at(Path::new(UDMABUF_CLASS), Path::new("/dev"), name, mode)
    }

    /// Open with explicit sysfs class and device directories
    ///
    /// # Errors
    ///
    /// See [`UdmabufBacking::open`].
    pub fn open_at(class_dir: &Path, dev_dir: &Path, name: &str, mode: CoherencyMode) -> Result<Self> {
        let attrs = class_dir.join(name);
        if !attrs.exists() {
            return Err(DriverError::device_not_found(attrs));
        }

        let phys_path = attrs.join("phys_addr");
        let size_path = attrs.join("size");
        let physical_base = read_hex_attribute(&phys_path)?;
        let size = attribute_size(&size_path, read_decimal_attribute(&size_path)?)?;

        let mode_path = attrs.join("sync_mode");
        std::fs::write(&mode_path, mode.as_raw().to_string()).map_err(|e| {
            DriverError::attribute_invalid(&mode_path, format!("cannot set sync_mode: {e}"))
        })?;

        let map = MappedFile::open(&dev_dir.join(name), size, 0, !mode.is_cached())?;

        tracing::info!(
            "udmabuf {name}: physical {physical_base:#x}, {} KB, {mode}",
            size / 1024
        );

        Ok(Self {
            map,
            physical_base,
            mode,
        })
    }
}

impl MemoryBackend for UdmabufBacking {
    fn base(&self) -> NonNull<u8> {
        self.map.as_ptr()
    }

    fn capacity(&self) -> usize {
        self.map.size()
    }

    fn physical_base(&self) -> u64 {
        self.physical_base
    }

    fn coherency(&self) -> CoherencyMode {
        self.mode
    }

    fn flush(&self, offset: usize, len: usize) -> Result<()> {
        if self.mode.is_cached() {
            self.map.sync(offset, len)
        } else {
            fence(Ordering::SeqCst);
            Ok(())
        }
    }

    fn invalidate(&self, offset: usize, len: usize) -> Result<()> {
        self.flush(offset, len)
    }

    fn backing_type(&self) -> BackingType {
        BackingType::Udmabuf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_instance_is_device_not_found() {
        let sysfs = tempfile::tempdir().expect("tempdir");
        let err = UdmabufBacking::open_at(sysfs.path(), sysfs.path(), "udmabuf9", CoherencyMode::Sync)
            .expect_err("no instance");
        assert!(matches!(err, DriverError::DeviceNotFound { .. }));
    }

    #[test]
    #[ignore] // Requires a loaded udmabuf driver with udmabuf0
    fn opens_real_udmabuf0() {
        let backing = UdmabufBacking::open("udmabuf0", CoherencyMode::Sync).expect("udmabuf0");
        assert!(backing.capacity() > 0);
    }
}
