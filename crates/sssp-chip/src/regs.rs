// SPDX-License-Identifier: AGPL-3.0-only

//! Register window of the accelerator channel.
//!
//! The window is a single UIO map. Only two words are live:
//!
//! ```text
//! 0x0000: DATA    write: input latch, read: output latch
//! 0x0004: STATUS  bit 0 output empty, bit 1 input full
//! ```
//!
//! A guarded host polls STATUS before touching DATA. An unguarded host
//! assumes the accelerator is always ready and never reads STATUS.

// ── Latches ──────────────────────────────────────────────────────────────────

/// Data latch. Writes fill the input latch, reads drain the output latch.
pub const DATA: usize = 0x0000;

/// Status word guarding both latches.
pub const STATUS: usize = 0x0004;

/// Bytes mapped for the register window.
pub const WINDOW_SIZE: usize = 0x1000;

// ── Status register bit definitions ──────────────────────────────────────────

/// STATUS bit definitions.
pub mod status {
    /// Output latch holds no word yet; a reader must wait.
    pub const OUTPUT_EMPTY: u32 = 1 << 0;
    /// Input latch still holds the previous word; a writer must wait.
    pub const INPUT_FULL: u32 = 1 << 1;
}

// ── Default device nodes ─────────────────────────────────────────────────────

/// UIO node exposing the register window.
pub const DEFAULT_CHANNEL_DEVICE: &str = "/dev/uio1";

/// udmabuf instance backing the arena.
pub const DEFAULT_UDMABUF: &str = "udmabuf0";

/// sysfs class directory for udmabuf instances.
pub const UDMABUF_CLASS: &str = "/sys/class/udmabuf";

/// sysfs class directory for UIO devices.
pub const UIO_CLASS: &str = "/sys/class/uio";
