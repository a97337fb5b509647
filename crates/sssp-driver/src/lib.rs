// SPDX-License-Identifier: AGPL-3.0-only

//! Host-side access to the shortest-path accelerator.
//!
//! Two resources are shared with the accelerator: an arena of physically
//! contiguous memory holding the graph, and a tiny register window used to
//! pass a request in and a response out.
//!
//! # Arena backings
//!
//! ```text
//! HeapBacking     host memory, synthetic physical base (software runs)
//! UdmabufBacking  CMA buffer from the udmabuf driver (sysfs phys_addr/size/sync_mode)
//! UioBacking      UIO memory map (sysfs maps/mapN/addr, size)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use sssp_driver::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let mut arena = Arena::open(&ArenaConfig::default())?;
//! let region = arena.allocate(64).ok_or("arena full")?;
//! let address = arena.translate(region);
//! arena.store(address, &42u32)?;
//! arena.synchronize(region, SyncDirection::ToDevice)?;
//!
//! let mut channel = MmioChannel::open(&ChannelConfig::from_env())?;
//! channel.write_word(address)?;
//! let answer = channel.read_word()?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod arena;
pub mod backends;
pub mod channel;
mod error;
pub mod memory;
pub mod mmio;

pub use arena::{Arena, ArenaConfig, ArenaStats, Region, SyncDirection};
pub use backends::{select_backing, ArenaBacking, BackingType, CoherencyMode, MemoryBackend};
pub use channel::{
    AcceleratorChannel, ChannelConfig, ChannelType, ChannelVariant, MmioChannel, PollPolicy,
};
pub use error::{DriverError, Result};
pub use memory::{DeviceMemory, PhysicalMemory};
pub use mmio::{RegisterAccess, RegisterWindow};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AcceleratorChannel, Arena, ArenaBacking, ArenaConfig, ChannelConfig, CoherencyMode,
        DriverError, MmioChannel, PhysicalMemory, Result, SyncDirection,
    };
}
