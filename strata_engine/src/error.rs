//! Error types for the Strata frame core
//!
//! This module defines the error taxonomy used by every component:
//! fatal configuration/memory failures, recoverable presentation errors,
//! and backend failures reported by the graphics device.

use std::fmt;

/// Result type for Strata operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Strata errors
#[derive(Debug, Clone)]
pub enum StrataError {
    /// Backend-specific error (Vulkan call failure, invalid command state)
    BackendError(String),

    /// Out of GPU memory on a mandatory allocation
    OutOfMemory,

    /// Invalid resource (unknown image id, stale handle, bad upload region)
    InvalidResource(String),

    /// Initialization failed (device objects, swapchain, attachments)
    InitializationFailed(String),

    /// Rejected configuration value
    InvalidConfig(String),

    /// A single image request is larger than the arena chunk size
    ChunkOverflow {
        requested: u64,
        chunk_size: u64,
    },

    /// No memory type satisfies both the type mask and the property flags
    NoCompatibleMemoryType {
        type_bits: u32,
        properties: u32,
    },

    /// A fixed-capacity table (pipelines, samplers) is full
    CapacityExceeded {
        what: &'static str,
        limit: usize,
    },

    /// Presentation surface is stale and must be rebuilt
    SurfaceOutOfDate,

    /// The device was lost
    DeviceLost,

    /// A bounded wait expired
    Timeout,
}

impl StrataError {
    /// Whether the error must abort the application.
    ///
    /// `SurfaceOutOfDate` is recovered by a swapchain rebuild and never
    /// reaches callers of the frame API; everything else except a present-time
    /// device loss is unrecoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StrataError::SurfaceOutOfDate)
    }
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataError::BackendError(msg) => write!(f, "Backend error: {}", msg),
            StrataError::OutOfMemory => write!(f, "Out of GPU memory"),
            StrataError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            StrataError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            StrataError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            StrataError::ChunkOverflow { requested, chunk_size } => write!(
                f,
                "Image request of {} bytes exceeds chunk size of {} bytes",
                requested, chunk_size
            ),
            StrataError::NoCompatibleMemoryType { type_bits, properties } => write!(
                f,
                "No memory type for mask {:#x} with properties {:#x}",
                type_bits, properties
            ),
            StrataError::CapacityExceeded { what, limit } => {
                write!(f, "Too many {} (limit {})", what, limit)
            }
            StrataError::SurfaceOutOfDate => write!(f, "Presentation surface out of date"),
            StrataError::DeviceLost => write!(f, "Device lost"),
            StrataError::Timeout => write!(f, "Wait timed out"),
        }
    }
}

impl std::error::Error for StrataError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
