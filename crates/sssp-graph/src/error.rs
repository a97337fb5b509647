// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for graph construction and search

use sssp_driver::DriverError;
use thiserror::Error;

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or searching a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Arena or channel failure
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Arena has no room for a required record
    #[error("Arena exhausted: {requested} bytes requested, {remaining} remaining")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
        /// Bytes left in the arena
        remaining: usize,
    },

    /// Declared graph bounds were exceeded
    #[error("Too many {what}: limit is {limit}")]
    BoundsExceeded {
        /// What overflowed ("nodes", "edges", ...)
        what: &'static str,
        /// Configured limit
        limit: u32,
    },

    /// Malformed graph input
    #[error("Line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// I/O error while reading input
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frontier queue has no free slot
    #[error("Frontier queue full at {capacity} entries")]
    QueueFull {
        /// Slots available
        capacity: u32,
    },

    /// Identifier outside the dense table
    #[error("Node id {id} exceeds dense table limit {limit}")]
    IdOutOfRange {
        /// Offending identifier
        id: u32,
        /// Largest accepted identifier
        limit: u32,
    },

    /// A stored record contradicts the layout
    #[error("Corrupt record at {address:#010x}: {reason}")]
    Corrupt {
        /// Physical address of the record
        address: u32,
        /// What was wrong
        reason: String,
    },

    /// Configuration that can never work
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },
}

impl GraphError {
    /// Create a parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Create a corrupt record error
    pub fn corrupt(address: u32, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            address,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a bounds exceeded error
    pub const fn bounds_exceeded(what: &'static str, limit: u32) -> Self {
        Self::BoundsExceeded { what, limit }
    }
}
