use std::fmt;

use crate::bdf::Bdf;
use crate::bounds::{clamp_range, DumpRequest, EffectiveRange};
use crate::dump::write_dump;
use crate::error::{Error, Result};
use crate::platform::{Platform, Window};
use crate::resource::PhysicalResource;

/// Default dump length in bytes.
pub const DEFAULT_DUMP_SIZE: u64 = 64;

/// Configuration for a persistent dump session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub bdf: Bdf,
    /// Offset within BAR0 where the dump starts.
    pub offset: u64,
    /// Requested dump length in bytes; clamped to what the BAR can satisfy.
    pub dump_size: u64,
}

impl SessionConfig {
    pub fn new(bdf: Bdf) -> Self {
        SessionConfig {
            bdf,
            offset: 0,
            dump_size: DEFAULT_DUMP_SIZE,
        }
    }
}

/// A live BAR0 dump session: resolved device, located resource, clamped
/// range, mapped window.
///
/// All mutable state of a session lives in this one context object, so
/// independent sessions (over different devices, or different providers)
/// coexist freely. The window covers the FULL resource even when the
/// effective range is narrower; re-rendering at a different offset never
/// needs a remap.
///
/// Teardown runs on drop, in reverse acquisition order: unmap the window,
/// then disable the device.
pub struct Session<P: Platform> {
    platform: P,
    device: P::Device,
    resource: PhysicalResource,
    range: EffectiveRange,
    clamped: bool,
    window: Option<P::Window>,
}

impl<P: Platform> Session<P> {
    /// Opens a session: resolve, enable, locate BAR0, validate bounds, map.
    ///
    /// Bounds validation runs strictly before the mapping attempt, and every
    /// failure past enable disables the device before returning, so no error
    /// path leaves it active.
    pub fn open(platform: P, config: &SessionConfig) -> Result<Self> {
        let mut device = platform.resolve(&config.bdf)?;
        tracing::debug!(bdf = %config.bdf, "device resolved");
        platform.enable(&mut device)?;

        let acquired: Result<_> = (|| {
            let resource = platform.bar0_resource(&device)?;
            tracing::debug!(
                bdf = %config.bdf,
                base = format_args!("{:#x}", resource.base),
                len = resource.len,
                "BAR0 located"
            );
            let (range, clamped) = clamp_range(
                resource,
                DumpRequest {
                    offset: config.offset,
                    len: config.dump_size,
                },
            )?;
            let window = platform.map(&device, resource)?;
            tracing::debug!(bdf = %config.bdf, "window mapped");
            Ok((resource, range, clamped, window))
        })();

        match acquired {
            Ok((resource, range, clamped, window)) => Ok(Session {
                platform,
                device,
                resource,
                range,
                clamped,
                window: Some(window),
            }),
            Err(err) => {
                platform.disable(&mut device);
                Err(err)
            }
        }
    }

    pub fn resource(&self) -> PhysicalResource {
        self.resource
    }

    /// The validated range the dump covers.
    pub fn range(&self) -> EffectiveRange {
        self.range
    }

    /// Whether the configured dump size was clamped at open time.
    pub fn was_clamped(&self) -> bool {
        self.clamped
    }

    fn window(&self) -> &P::Window {
        // Present from a successful open until drop.
        self.window.as_ref().expect("session window alive")
    }

    /// Regenerates the dump from the live window.
    ///
    /// Reentrant: the window is read-only for the session's lifetime, so
    /// concurrent renders need no locking.
    pub fn render_dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        write_dump(self.window(), self.range, out)
    }

    /// Renders the dump into a fresh string.
    pub fn dump_to_string(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.render_dump(&mut out);
        out
    }

    /// Reads one 4-byte register at `offset` within BAR0.
    pub fn read_u32(&self, offset: u64) -> Result<u32> {
        if offset.checked_add(4).map_or(true, |end| end > self.resource.len) {
            return Err(Error::OutOfRange {
                offset,
                length: self.resource.len,
            });
        }
        Ok(self.window().read_u32(offset))
    }
}

// Manual impl: device handles and windows are provider-specific and not
// required to be Debug; the session's own state is what matters in test
// failures and logs.
impl<P: Platform> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.resource)
            .field("range", &self.range)
            .field("clamped", &self.clamped)
            .finish_non_exhaustive()
    }
}

impl<P: Platform> Drop for Session<P> {
    fn drop(&mut self) {
        // Reverse acquisition order: unmap before disabling.
        self.window = None;
        self.platform.disable(&mut self.device);
        tracing::debug!("session closed");
    }
}
