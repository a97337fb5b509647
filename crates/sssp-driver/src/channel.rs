// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator channel
//!
//! One word of buffering per direction. A guarded channel polls STATUS
//! before touching DATA: it waits for `INPUT_FULL` to clear before a write
//! and for `OUTPUT_EMPTY` to clear before a read. An unguarded channel
//! trusts the accelerator to always be ready.
//!
//! Polling is bounded by [`PollPolicy`]. An exhausted budget is reported as
//! [`DriverError::Timeout`]; `max_polls: None` spins forever.

use crate::error::{DriverError, Result};
use crate::mmio::{RegisterAccess, RegisterWindow};
use sssp_chip::regs::{self, status, DEFAULT_CHANNEL_DEVICE};
use std::path::PathBuf;

/// Word-level transport to the accelerator
pub trait AcceleratorChannel {
    /// Commit one request word
    ///
    /// # Errors
    ///
    /// Returns error if the input latch does not free up in time.
    fn write_word(&mut self, word: u32) -> Result<()>;

    /// Take one response word
    ///
    /// # Errors
    ///
    /// Returns error if no output arrives in time or the exchange is out of
    /// sequence.
    fn read_word(&mut self) -> Result<u32>;

    /// Channel type for diagnostics
    fn channel_type(&self) -> ChannelType;
}

/// Channel type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Memory-mapped register window
    Mmio,

    /// Software model answering from host memory
    Replay,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Replay => write!(f, "Replay"),
        }
    }
}

/// Whether the host checks STATUS before each access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelVariant {
    /// Poll STATUS before every access
    #[default]
    Guarded,

    /// Access DATA directly
    Unguarded,
}

/// Poll budget for a guarded channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Polls before giving up; `None` waits forever
    pub max_polls: Option<u64>,
    /// Yield the thread every this many polls
    pub yield_interval: u64,
}

impl PollPolicy {
    /// Default poll budget
    pub const DEFAULT_MAX_POLLS: u64 = 100_000_000;

    /// Spin until the bit clears, however long that takes
    pub const fn unbounded() -> Self {
        Self {
            max_polls: None,
            yield_interval: 10_000,
        }
    }

    /// Give up after `max_polls` polls
    pub const fn bounded(max_polls: u64) -> Self {
        Self {
            max_polls: Some(max_polls),
            yield_interval: 10_000,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::bounded(Self::DEFAULT_MAX_POLLS)
    }
}

/// Channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// UIO node of the register window
    pub device: PathBuf,
    /// Guarded or unguarded access
    pub variant: ChannelVariant,
    /// Poll budget
    pub poll: PollPolicy,
}

impl ChannelConfig {
    /// Defaults with environment overrides applied
    ///
    /// `SSSP_CHANNEL_DEVICE` replaces the device node and `SSSP_POLL_LIMIT`
    /// the poll budget (`0` or `unbounded` spins forever).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(device) = std::env::var("SSSP_CHANNEL_DEVICE") {
            config.device = PathBuf::from(device);
        }
        if let Ok(limit) = std::env::var("SSSP_POLL_LIMIT") {
            match parse_poll_limit(&limit) {
                Some(max_polls) => config.poll.max_polls = max_polls,
                None => tracing::warn!("Ignoring malformed SSSP_POLL_LIMIT={limit:?}"),
            }
        }
        config
    }

    /// Set the variant
    #[must_use]
    pub const fn with_variant(mut self, variant: ChannelVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the poll policy
    #[must_use]
    pub const fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Set the device node
    #[must_use]
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_CHANNEL_DEVICE),
            variant: ChannelVariant::default(),
            poll: PollPolicy::default(),
        }
    }
}

/// Parse a poll budget: a count, with `0` or `unbounded` meaning no limit
pub fn parse_poll_limit(text: &str) -> Option<Option<u64>> {
    match text.trim() {
        "unbounded" | "0" => Some(None),
        other => other.parse().ok().map(Some),
    }
}

/// Register-window channel
#[derive(Debug)]
pub struct MmioChannel<R: RegisterAccess = RegisterWindow> {
    regs: R,
    variant: ChannelVariant,
    poll: PollPolicy,
}

impl MmioChannel<RegisterWindow> {
    /// Map the configured register window
    ///
    /// # Errors
    ///
    /// Returns error if the window cannot be mapped.
    pub fn open(config: &ChannelConfig) -> Result<Self> {
        let window = RegisterWindow::open(&config.device)?;
        tracing::info!(
            "Channel on {} ({:?}, max polls {:?})",
            config.device.display(),
            config.variant,
            config.poll.max_polls
        );
        Ok(Self::new(window, config.variant, config.poll))
    }

    /// Unmap the register window
    pub fn close(self) {
        tracing::debug!("Closing channel on {}", self.regs.device().display());
    }
}

impl<R: RegisterAccess> MmioChannel<R> {
    /// Channel over any register bank
    pub const fn new(regs: R, variant: ChannelVariant, poll: PollPolicy) -> Self {
        Self {
            regs,
            variant,
            poll,
        }
    }

    /// Register bank
    pub const fn registers(&self) -> &R {
        &self.regs
    }

    /// Wait until `mask` reads clear in STATUS; returns the poll count
    fn wait_clear(&self, mask: u32, operation: &'static str) -> Result<u64> {
        let yield_interval = self.poll.yield_interval.max(1);
        let mut polls: u64 = 0;
        loop {
            if self.regs.read32(regs::STATUS) & mask == 0 {
                return Ok(polls);
            }
            polls += 1;
            if self.poll.max_polls.is_some_and(|max| polls >= max) {
                tracing::warn!("{operation}: STATUS bit {mask:#x} stuck after {polls} polls");
                return Err(DriverError::timeout(operation, polls));
            }
            if polls % yield_interval == 0 {
                std::thread::yield_now();
            }
        }
    }
}

impl<R: RegisterAccess> AcceleratorChannel for MmioChannel<R> {
    fn write_word(&mut self, word: u32) -> Result<()> {
        if self.variant == ChannelVariant::Guarded {
            let polls = self.wait_clear(status::INPUT_FULL, "write_word")?;
            tracing::trace!("Input latch free after {polls} polls");
        }
        self.regs.write32(regs::DATA, word);
        tracing::trace!("DATA <- {word:#010x}");
        Ok(())
    }

    fn read_word(&mut self) -> Result<u32> {
        if self.variant == ChannelVariant::Guarded {
            let polls = self.wait_clear(status::OUTPUT_EMPTY, "read_word")?;
            tracing::trace!("Output latch ready after {polls} polls");
        }
        let word = self.regs.read32(regs::DATA);
        tracing::trace!("DATA -> {word:#010x}");
        Ok(word)
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Mmio
    }
}
