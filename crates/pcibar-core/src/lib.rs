//! PCI BAR0 register-window access and dump formatting.
//!
//! A PCI device's first base address register (BAR0) describes a memory-mapped
//! window onto the device's registers. This crate resolves a device by its bus
//! address, discovers and bounds that window, maps it read-only, and renders
//! word reads or hex+ASCII dumps over it:
//!
//! - [`Bdf`]: `DDDD:BB:DD.F` device address
//! - [`Platform`] / [`Window`]: the platform seam; [`SysfsPlatform`] maps the
//!   device's sysfs `resource0` from user space, [`MemPlatform`] serves
//!   registered byte arrays for tests
//! - [`Session`]: resolve → enable → locate → clamp → map, with rollback on
//!   every failure path
//! - [`DumpRows`] / [`write_dump`]: fixed 16-byte-row hex+ASCII rendering
//! - [`oneshot`]: stand-alone page-granular single-register read
//!
//! Register values are opaque here: nothing in this crate interprets device
//! semantics, and nothing writes to a device.

mod bdf;
mod bounds;
mod dump;
mod error;
mod platform;
mod resource;
mod session;

#[cfg(unix)]
pub mod oneshot;

pub use bdf::Bdf;
pub use bounds::{clamp_range, DumpRequest, EffectiveRange};
pub use dump::{write_dump, DumpRow, DumpRows, ROW_BYTES};
pub use error::{Error, Result};
pub use platform::{MemCounters, MemPlatform, Platform, Window};
#[cfg(unix)]
pub use platform::{SysfsPlatform, SysfsWindow};
pub use resource::{parse_descriptor_line, PhysicalResource};
pub use session::{Session, SessionConfig, DEFAULT_DUMP_SIZE};

#[cfg(test)]
mod proptests;
