// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for arena and channel operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while mapping memory or talking to the accelerator
#[derive(Debug, Error)]
pub enum DriverError {
    /// Device node or sysfs attribute does not exist
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error during device access
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Mapping or reserving a region failed
    #[error("Mapping failed: {reason}")]
    MapFailed {
        /// Reason for failure
        reason: String,
    },

    /// A platform attribute could not be read or parsed
    #[error("Invalid attribute {path}: {reason}")]
    AttributeInvalid {
        /// Attribute path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Physical address does not fall inside the arena
    #[error("Address {address:#010x} outside arena")]
    AddressOutOfRange {
        /// Offending physical address
        address: u64,
    },

    /// A status bit never cleared within the poll budget
    #[error("{operation} timed out after {polls} polls")]
    Timeout {
        /// Operation that was waiting
        operation: &'static str,
        /// Polls performed before giving up
        polls: u64,
    },

    /// Request/response sequencing was broken
    #[error("Protocol violation: {reason}")]
    ProtocolViolation {
        /// Reason for failure
        reason: String,
    },
}

impl DriverError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a mapping failed error
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid attribute error
    pub fn attribute_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::AttributeInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an address out of range error
    pub fn address_out_of_range(address: impl Into<u64>) -> Self {
        Self::AddressOutOfRange {
            address: address.into(),
        }
    }

    /// Create a timeout error
    pub const fn timeout(operation: &'static str, polls: u64) -> Self {
        Self::Timeout { operation, polls }
    }

    /// Create a protocol violation error
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }
}
