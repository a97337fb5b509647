// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped device file
//!
//! Shared by the udmabuf and UIO arena backings and by the register window.
//! Minimal unsafe: only mmap/munmap/msync, all bounds checked by callers
//! through [`MappedFile::size`].

use crate::error::{DriverError, Result};
use rustix::mm::{mmap, msync, munmap, MapFlags, MsyncFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Shared read/write mapping of a device node
#[derive(Debug)]
pub struct MappedFile {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
}

impl MappedFile {
    /// Open `path` and map `size` bytes starting at `offset`.
    ///
    /// `synchronous` opens the node with `O_SYNC`, which udmabuf honours by
    /// mapping the buffer uncached.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The device node doesn't exist
    /// - The node cannot be opened read/write
    /// - mmap fails
    pub fn open(path: &Path, size: usize, offset: u64, synchronous: bool) -> Result<Self> {
        if size == 0 {
            return Err(DriverError::map_failed(format!(
                "{}: refusing zero-sized mapping",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(DriverError::device_not_found(path));
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true);
        if synchronous {
            options.custom_flags(libc::O_SYNC);
        }
        let file = options.open(path).map_err(|e| {
            DriverError::map_failed(format!("Cannot open {}: {e}", path.display()))
        })?;

        tracing::debug!(
            "Mapping {} ({size:#x} bytes at offset {offset:#x}, sync={synchronous})",
            path.display()
        );

        // SAFETY: mmap with a freshly opened fd, non-zero size and a null hint.
        // - PROT_READ|PROT_WRITE with MAP_SHARED so the device sees our stores
        // - rustix returns Err on MAP_FAILED, so the Ok pointer is a live mapping
        // - the File is stored alongside the mapping and outlives it
        // - Drop unmaps exactly this ptr/size pair
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                offset,
            )
        }
        .map_err(|e| DriverError::map_failed(format!("mmap {} failed: {e}", path.display())))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| DriverError::map_failed("mmap returned a null mapping"))?;

        tracing::info!("Mapped {} ({} KB at {ptr:p})", path.display(), size / 1024);

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Start of the mapping
    pub const fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Mapping size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Device node backing the mapping
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write back and invalidate `[offset, offset + len)`.
    ///
    /// The range is widened to page boundaries because msync only accepts
    /// page-aligned addresses.
    ///
    /// # Errors
    ///
    /// Returns error if the range exceeds the mapping or msync fails.
    pub fn sync(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(DriverError::map_failed(format!(
                "sync range {offset:#x}+{len:#x} exceeds mapping of {:#x}",
                self.size
            )));
        }
        let page = rustix::param::page_size();
        let start = offset - offset % page;
        let end = (offset + len).div_ceil(page).saturating_mul(page).min(self.size);

        // SAFETY: [start, end) lies inside the live mapping (checked above and
        // clamped to self.size); start is page-aligned because the mapping base is.
        unsafe {
            msync(
                self.ptr.as_ptr().add(start).cast(),
                end - start,
                MsyncFlags::SYNC | MsyncFlags::INVALIDATE,
            )
        }
        .map_err(|e| DriverError::map_failed(format!("msync {} failed: {e}", self.path.display())))
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} ({} KB)", self.path.display(), self.size / 1024);

        // SAFETY: ptr/size are exactly the pair returned by mmap in open();
        // Drop runs once, and no borrow of the mapping can outlive self.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MappedFile owns its mapping exclusively; moving it between threads
// does not invalidate mmap'd memory, which is process-wide.
unsafe impl Send for MappedFile {}

// SAFETY: MappedFile exposes no interior mutation itself; all data access goes
// through raw pointers whose users serialise access (single-writer arena).
unsafe impl Sync for MappedFile {}
