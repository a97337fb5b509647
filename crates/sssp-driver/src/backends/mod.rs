// SPDX-License-Identifier: AGPL-3.0-only

//! Arena backing implementations
//!
//! An arena sits on top of one backing. The backing owns the mapping and
//! knows the physical base the accelerator sees; the arena only bumps an
//! offset through it.
//!
//! - [`heap::HeapBacking`]: page-aligned host memory with a synthetic base
//! - [`udmabuf::UdmabufBacking`]: CMA buffer exported by the udmabuf driver
//! - [`uio::UioBacking`]: memory region exposed as a UIO map

pub mod heap;
pub mod mmap;
pub mod udmabuf;
pub mod uio;

use crate::error::{DriverError, Result};
use std::fmt::Debug;
use std::path::Path;
use std::ptr::NonNull;
use std::str::FromStr;
use std::sync::Arc;

/// A physically contiguous region the arena bump-allocates from
pub trait MemoryBackend: Debug + Send + Sync {
    /// Host-virtual start of the region
    fn base(&self) -> NonNull<u8>;

    /// Region size in bytes
    fn capacity(&self) -> usize;

    /// Device-visible address of byte 0
    fn physical_base(&self) -> u64;

    /// Cache behaviour of the host mapping
    fn coherency(&self) -> CoherencyMode;

    /// Make host writes in `[offset, offset + len)` visible to the device
    ///
    /// # Errors
    ///
    /// Returns error if the cache maintenance call fails.
    fn flush(&self, offset: usize, len: usize) -> Result<()>;

    /// Drop stale host cache lines in `[offset, offset + len)`
    ///
    /// # Errors
    ///
    /// Returns error if the cache maintenance call fails.
    fn invalidate(&self, offset: usize, len: usize) -> Result<()>;

    /// Backing type for diagnostics
    fn backing_type(&self) -> BackingType;
}

/// Backing type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingType {
    /// Host heap, no device attached
    Heap,

    /// udmabuf CMA buffer
    Udmabuf,

    /// UIO memory map
    Uio,
}

impl std::fmt::Display for BackingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heap => write!(f, "Heap"),
            Self::Udmabuf => write!(f, "udmabuf"),
            Self::Uio => write!(f, "UIO"),
        }
    }
}

/// Cache mode of the host mapping, as understood by udmabuf's `sync_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CoherencyMode {
    /// CPU cache on; explicit flush/invalidate required
    CacheEnabled = 0,
    /// CPU cache off, `O_SYNC`
    #[default]
    Sync = 1,
    /// CPU cache off, `O_SYNC`, write combining
    SyncWriteCombine = 2,
    /// CPU cache off, `O_SYNC`, DMA coherent
    SyncDmaCoherent = 3,
}

impl CoherencyMode {
    /// Decode a raw `sync_mode` value. Values above 3 clamp to
    /// [`CoherencyMode::SyncDmaCoherent`].
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::CacheEnabled,
            1 => Self::Sync,
            2 => Self::SyncWriteCombine,
            _ => Self::SyncDmaCoherent,
        }
    }

    /// Raw `sync_mode` value
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Whether host stores need explicit cache maintenance
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::CacheEnabled)
    }
}

impl std::fmt::Display for CoherencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheEnabled => write!(f, "cache-enabled"),
            Self::Sync => write!(f, "sync"),
            Self::SyncWriteCombine => write!(f, "sync-write-combine"),
            Self::SyncDmaCoherent => write!(f, "sync-dma-coherent"),
        }
    }
}

impl FromStr for CoherencyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<u32>() {
            return Ok(Self::from_raw(raw));
        }
        match s.to_lowercase().as_str() {
            "cache-enabled" | "cached" => Ok(Self::CacheEnabled),
            "sync" | "uncached" => Ok(Self::Sync),
            "sync-write-combine" | "wc" => Ok(Self::SyncWriteCombine),
            "sync-dma-coherent" | "coherent" => Ok(Self::SyncDmaCoherent),
            other => Err(format!("unknown coherency mode: {other}")),
        }
    }
}

/// Which backing an arena should open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaBacking {
    /// Host heap with a synthetic physical base
    Heap {
        /// Bytes to reserve
        capacity: usize,
        /// Address reported for byte 0
        physical_base: u64,
    },

    /// udmabuf instance by name (e.g. `udmabuf0`)
    Udmabuf {
        /// Instance name under `/sys/class/udmabuf`
        name: String,
        /// Mode written to `sync_mode`
        mode: CoherencyMode,
    },

    /// UIO device map
    Uio {
        /// `N` in `uioN`
        index: u32,
        /// `M` in `maps/mapM`
        map: u32,
    },
}

impl ArenaBacking {
    /// Default heap capacity (64 MiB)
    pub const DEFAULT_HEAP_CAPACITY: usize = 64 * 1024 * 1024;

    /// Default synthetic physical base of the heap backing
    pub const DEFAULT_HEAP_BASE: u64 = 0x1000_0000;

    /// Heap backing with default base
    pub const fn heap(capacity: usize) -> Self {
        Self::Heap {
            capacity,
            physical_base: Self::DEFAULT_HEAP_BASE,
        }
    }

    /// udmabuf backing; `SSSP_UDMABUF` overrides the instance name
    pub fn udmabuf(mode: CoherencyMode) -> Self {
        let name = std::env::var("SSSP_UDMABUF")
            .unwrap_or_else(|_| sssp_chip::regs::DEFAULT_UDMABUF.to_string());
        Self::Udmabuf { name, mode }
    }
}

impl Default for ArenaBacking {
    fn default() -> Self {
        Self::heap(Self::DEFAULT_HEAP_CAPACITY)
    }
}

/// Open the requested backing
///
/// # Errors
///
/// Returns error if the backing cannot be reserved or mapped.
pub fn select_backing(backing: &ArenaBacking) -> Result<Arc<dyn MemoryBackend>> {
    use heap::HeapBacking;
    use udmabuf::UdmabufBacking;
    use uio::UioBacking;

    match backing {
        ArenaBacking::Heap {
            capacity,
            physical_base,
        } => Ok(Arc::new(HeapBacking::new(*capacity, *physical_base)?)),
        ArenaBacking::Udmabuf { name, mode } => Ok(Arc::new(UdmabufBacking::open(name, *mode)?)),
        ArenaBacking::Uio { index, map } => Ok(Arc::new(UioBacking::open(*index, *map)?)),
    }
}

// ── sysfs attribute helpers ──────────────────────────────────────────────────

/// Read a sysfs attribute, trimmed
pub(crate) fn read_attribute(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(DriverError::device_not_found(path));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(text.trim().to_string())
}

/// Read a hexadecimal sysfs attribute (`0x` prefix optional)
pub(crate) fn read_hex_attribute(path: &Path) -> Result<u64> {
    let text = read_attribute(path)?;
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(&text);
    u64::from_str_radix(digits, 16)
        .map_err(|e| DriverError::attribute_invalid(path, format!("{text:?}: {e}")))
}

/// Read a decimal sysfs attribute
pub(crate) fn read_decimal_attribute(path: &Path) -> Result<u64> {
    let text = read_attribute(path)?;
    text.parse()
        .map_err(|e| DriverError::attribute_invalid(path, format!("{text:?}: {e}")))
}

/// Convert a 64-bit attribute to a mapping size
pub(crate) fn attribute_size(path: &Path, value: u64) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&size| size > 0)
        .ok_or_else(|| DriverError::attribute_invalid(path, format!("unusable size {value}")))
}
