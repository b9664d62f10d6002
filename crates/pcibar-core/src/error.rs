use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for BAR0 access operations.
///
/// A clamped dump request is deliberately not represented here: clamping is a
/// non-fatal notice (the bounds validator hands back the adjusted range and
/// the operation continues), while every variant below aborts after rolling
/// back whatever was acquired up to that point. No variant leaves a device
/// enabled or a window mapped.
#[derive(Debug, Error)]
pub enum Error {
    /// The device address did not match `DDDD:BB:DD.F`.
    #[error("invalid device address {input:?} (expected DDDD:BB:DD.F)")]
    InvalidFormat { input: String },

    #[error("PCI device {bdf} not found")]
    DeviceNotFound { bdf: String },

    #[error("failed to enable PCI device {bdf}: {reason}")]
    EnableFailed { bdf: String, reason: String },

    /// BAR0 has a zero base address or zero length.
    #[error("BAR0 of {bdf} is unavailable")]
    ResourceUnavailable { bdf: String },

    /// The requested offset lies at or beyond the end of the resource.
    /// Raised strictly before any mapping is attempted.
    #[error("offset {offset:#x} is outside BAR0 (resource length {length:#x})")]
    OutOfRange { offset: u64, length: u64 },

    #[error("failed to map BAR0 window: {reason}")]
    MapFailed { reason: String },

    /// The textual resource descriptor could not be read or parsed.
    #[error("resource descriptor {}: {reason}", path.display())]
    DescriptorRead { path: PathBuf, reason: String },
}
