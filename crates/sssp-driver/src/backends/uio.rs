// SPDX-License-Identifier: AGPL-3.0-only

//! UIO memory-map backing
//!
//! A UIO device publishes each of its regions as
//! `/sys/class/uio/uioN/maps/mapM/{addr,size}` (both hex). Map `M` is
//! selected by mapping `/dev/uioN` at offset `M * page_size`.
//! UIO maps are uncached device memory, so cache maintenance is a fence.

use super::mmap::MappedFile;
use super::{attribute_size, read_hex_attribute, BackingType, CoherencyMode, MemoryBackend};
use crate::error::{DriverError, Result};
use sssp_chip::regs::UIO_CLASS;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

/// UIO arena backing
#[derive(Debug)]
pub struct UioBacking {
    map: MappedFile,
    physical_base: u64,
}

impl UioBacking {
    /// Open map `map` of `/dev/uio<index>`
    ///
    /// # Errors
    ///
    /// Returns error if the map attributes are missing or malformed or the
    /// device cannot be mapped.
    pub fn open(index: u32, map: u32) -> Result<Self> {
        Self::open_at(Path::new(UIO_CLASS), Path::new("/dev"), index, map)
    }

    /// Open with explicit sysfs class and device directories
    ///
    /// # Errors
    ///
    /// See [`UioBacking::open`].
    pub fn open_at(class_dir: &Path, dev_dir: &Path, index: u32, map: u32) -> Result<Self> {
        let device = format!("uio{index}");
        let attrs = class_dir.join(&device).join("maps").join(format!("map{map}"));
        if !attrs.exists() {
            return Err(DriverError::device_not_found(attrs));
        }

        let physical_base = read_hex_attribute(&attrs.join("addr"))?;
        let size_path = attrs.join("size");
        let size = attribute_size(&size_path, read_hex_attribute(&size_path)?)?;

        let page = rustix::param::page_size() as u64;
        let mapping = MappedFile::open(&dev_dir.join(&device), size, u64::from(map) * page, false)?;

        tracing::info!(
            "{device} map{map}: physical {physical_base:#x}, {} KB",
            size / 1024
        );

        Ok(Self {
            map: mapping,
            physical_base,
        })
    }
}

impl MemoryBackend for UioBacking {
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
        CoherencyMode::Sync
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
        BackingType::Uio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_map_is_device_not_found() {
        let sysfs = tempfile::tempdir().expect("tempdir");
        let err = UioBacking::open_at(sysfs.path(), sysfs.path(), 0, 1).expect_err("no map");
        assert!(matches!(err, DriverError::DeviceNotFound { .. }));
    }
}
