//! The platform-access seam.
//!
//! Everything above this module (bounds validation, dump formatting, the
//! session lifecycle) operates on the [`Platform`] and [`Window`] traits and
//! never touches the host directly, so the same logic runs unchanged over
//! the user-space sysfs provider and the in-memory test provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::bdf::Bdf;
use crate::error::{Error, Result};
use crate::resource::PhysicalResource;

/// Platform access needed by a BAR0 session.
pub trait Platform {
    type Device;
    type Window: Window;

    /// Resolves a device address to a live device handle.
    fn resolve(&self, bdf: &Bdf) -> Result<Self::Device>;

    /// Enables the device. Must be paired with exactly one
    /// [`disable`](Platform::disable).
    fn enable(&self, device: &mut Self::Device) -> Result<()>;

    /// Disables the device. Infallible by contract: teardown and rollback
    /// paths cannot recover from a failed disable, so providers log and
    /// swallow instead.
    fn disable(&self, device: &mut Self::Device);

    /// Base address and length of the device's first memory resource.
    fn bar0_resource(&self, device: &Self::Device) -> Result<PhysicalResource>;

    /// Maps the full resource read-only. The returned window unmaps when
    /// dropped, exactly once.
    fn map(&self, device: &Self::Device, resource: PhysicalResource) -> Result<Self::Window>;
}

impl<P: Platform> Platform for &P {
    type Device = P::Device;
    type Window = P::Window;

    fn resolve(&self, bdf: &Bdf) -> Result<Self::Device> {
        (**self).resolve(bdf)
    }

    fn enable(&self, device: &mut Self::Device) -> Result<()> {
        (**self).enable(device)
    }

    fn disable(&self, device: &mut Self::Device) {
        (**self).disable(device)
    }

    fn bar0_resource(&self, device: &Self::Device) -> Result<PhysicalResource> {
        (**self).bar0_resource(device)
    }

    fn map(&self, device: &Self::Device, resource: PhysicalResource) -> Result<Self::Window> {
        (**self).map(device, resource)
    }
}

/// A mapped, read-only view of a device's BAR0.
pub trait Window {
    /// Mapped length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Callers hand in ranges already clamped by the bounds validator; a
    /// range that escapes the window is a bug, and implementations panic
    /// rather than read out of bounds.
    fn read_into(&self, offset: u64, buf: &mut [u8]);

    /// Reads one little-endian 32-bit word at `offset`.
    fn read_u32(&self, offset: u64) -> u32 {
        let mut buf = [0u8; 4];
        self.read_into(offset, &mut buf);
        u32::from_le_bytes(buf)
    }
}

/// In-memory platform provider backing tests and examples.
///
/// Devices are registered up front with their BAR0 contents. Enable,
/// disable, map and unmap calls are counted per device so lifecycle pairing
/// (one disable per enable, exactly one unmap per map) can be asserted.
#[derive(Default)]
pub struct MemPlatform {
    devices: HashMap<Bdf, Arc<MemDevice>>,
}

#[derive(Debug)]
struct MemDevice {
    base: u64,
    bytes: Vec<u8>,
    refuse_enable: bool,
    enables: AtomicUsize,
    disables: AtomicUsize,
    maps: AtomicUsize,
    unmaps: AtomicUsize,
}

/// Snapshot of a registered device's lifecycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemCounters {
    pub enables: usize,
    pub disables: usize,
    pub maps: usize,
    pub unmaps: usize,
}

impl MemPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device whose BAR0 starts at `base` and contains `bytes`.
    pub fn add_device(&mut self, bdf: Bdf, base: u64, bytes: Vec<u8>) {
        self.insert(bdf, base, bytes, false);
    }

    /// Registers a device whose enable call fails, for rollback tests.
    pub fn add_unenablable_device(&mut self, bdf: Bdf, base: u64, bytes: Vec<u8>) {
        self.insert(bdf, base, bytes, true);
    }

    fn insert(&mut self, bdf: Bdf, base: u64, bytes: Vec<u8>, refuse_enable: bool) {
        self.devices.insert(
            bdf,
            Arc::new(MemDevice {
                base,
                bytes,
                refuse_enable,
                enables: AtomicUsize::new(0),
                disables: AtomicUsize::new(0),
                maps: AtomicUsize::new(0),
                unmaps: AtomicUsize::new(0),
            }),
        );
    }

    pub fn counters(&self, bdf: &Bdf) -> Option<MemCounters> {
        self.devices.get(bdf).map(|device| MemCounters {
            enables: device.enables.load(Ordering::SeqCst),
            disables: device.disables.load(Ordering::SeqCst),
            maps: device.maps.load(Ordering::SeqCst),
            unmaps: device.unmaps.load(Ordering::SeqCst),
        })
    }
}

#[derive(Debug)]
pub struct MemDeviceHandle {
    inner: Arc<MemDevice>,
    bdf: Bdf,
}

pub struct MemWindow {
    inner: Arc<MemDevice>,
}

impl Platform for MemPlatform {
    type Device = MemDeviceHandle;
    type Window = MemWindow;

    fn resolve(&self, bdf: &Bdf) -> Result<MemDeviceHandle> {
        self.devices
            .get(bdf)
            .map(|inner| MemDeviceHandle {
                inner: inner.clone(),
                bdf: *bdf,
            })
            .ok_or_else(|| Error::DeviceNotFound {
                bdf: bdf.to_string(),
            })
    }

    fn enable(&self, device: &mut MemDeviceHandle) -> Result<()> {
        if device.inner.refuse_enable {
            return Err(Error::EnableFailed {
                bdf: device.bdf.to_string(),
                reason: "refused by provider".to_string(),
            });
        }
        device.inner.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self, device: &mut MemDeviceHandle) {
        device.inner.disables.fetch_add(1, Ordering::SeqCst);
    }

    fn bar0_resource(&self, device: &MemDeviceHandle) -> Result<PhysicalResource> {
        let resource = PhysicalResource {
            base: device.inner.base,
            len: device.inner.bytes.len() as u64,
        };
        if !resource.is_valid() {
            return Err(Error::ResourceUnavailable {
                bdf: device.bdf.to_string(),
            });
        }
        Ok(resource)
    }

    fn map(&self, device: &MemDeviceHandle, _resource: PhysicalResource) -> Result<MemWindow> {
        device.inner.maps.fetch_add(1, Ordering::SeqCst);
        Ok(MemWindow {
            inner: device.inner.clone(),
        })
    }
}

impl Window for MemWindow {
    fn len(&self) -> u64 {
        self.inner.bytes.len() as u64
    }

    fn read_into(&self, offset: u64, buf: &mut [u8]) {
        let end = offset.checked_add(buf.len() as u64);
        assert!(
            end.is_some_and(|end| end <= self.inner.bytes.len() as u64),
            "read escapes window: offset={offset:#x} len={}",
            buf.len()
        );
        let offset = offset as usize;
        buf.copy_from_slice(&self.inner.bytes[offset..offset + buf.len()]);
    }
}

impl Drop for MemWindow {
    fn drop(&mut self) {
        self.inner.unmaps.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(unix)]
pub use sysfs::{SysfsPlatform, SysfsWindow};

#[cfg(unix)]
mod sysfs {
    use std::fs::{self, File, OpenOptions};
    use std::io::Write as _;
    use std::os::unix::io::AsRawFd;
    use std::path::PathBuf;
    use std::ptr::NonNull;

    use super::{Platform, Window};
    use crate::bdf::Bdf;
    use crate::error::{Error, Result};
    use crate::resource::{parse_descriptor_line, PhysicalResource};

    const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";

    /// User-space provider over the kernel's sysfs PCI tree.
    ///
    /// `<root>/<bdf>/resource` supplies the BAR0 descriptor,
    /// `<root>/<bdf>/enable` toggles the device, and `<root>/<bdf>/resource0`
    /// is mapped read-only for the window. The root defaults to
    /// `/sys/bus/pci/devices` and is configurable so tests can point the
    /// provider at a synthetic tree.
    pub struct SysfsPlatform {
        root: PathBuf,
    }

    impl SysfsPlatform {
        pub fn new() -> Self {
            Self::with_root(DEFAULT_SYSFS_ROOT)
        }

        pub fn with_root(root: impl Into<PathBuf>) -> Self {
            SysfsPlatform { root: root.into() }
        }
    }

    impl Default for SysfsPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    #[derive(Debug)]
    pub struct SysfsDevice {
        dir: PathBuf,
        bdf: Bdf,
    }

    impl Platform for SysfsPlatform {
        type Device = SysfsDevice;
        type Window = SysfsWindow;

        fn resolve(&self, bdf: &Bdf) -> Result<SysfsDevice> {
            let dir = self.root.join(bdf.to_string());
            if !dir.is_dir() {
                return Err(Error::DeviceNotFound {
                    bdf: bdf.to_string(),
                });
            }
            Ok(SysfsDevice { dir, bdf: *bdf })
        }

        fn enable(&self, device: &mut SysfsDevice) -> Result<()> {
            write_enable(device, b"1").map_err(|err| Error::EnableFailed {
                bdf: device.bdf.to_string(),
                reason: err.to_string(),
            })
        }

        fn disable(&self, device: &mut SysfsDevice) {
            if let Err(err) = write_enable(device, b"0") {
                tracing::warn!(bdf = %device.bdf, %err, "failed to disable device");
            }
        }

        fn bar0_resource(&self, device: &SysfsDevice) -> Result<PhysicalResource> {
            let path = device.dir.join("resource");
            let text = fs::read_to_string(&path).map_err(|err| Error::DescriptorRead {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            let line = text.lines().next().ok_or_else(|| Error::DescriptorRead {
                path: path.clone(),
                reason: "empty descriptor".to_string(),
            })?;
            let (start, end, _flags) = parse_descriptor_line(line, &path)?;
            let resource = PhysicalResource::from_bounds(start, end, &path)?;
            if !resource.is_valid() {
                return Err(Error::ResourceUnavailable {
                    bdf: device.bdf.to_string(),
                });
            }
            Ok(resource)
        }

        fn map(&self, device: &SysfsDevice, resource: PhysicalResource) -> Result<SysfsWindow> {
            let path = device.dir.join("resource0");
            let file = File::open(&path).map_err(|err| Error::MapFailed {
                reason: format!("open {}: {err}", path.display()),
            })?;
            let len = usize::try_from(resource.len).map_err(|_| Error::MapFailed {
                reason: format!("resource length {:#x} exceeds address space", resource.len),
            })?;
            SysfsWindow::map(&file, len)
        }
    }

    fn write_enable(device: &SysfsDevice, value: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(device.dir.join("enable"))?;
        file.write_all(value)
    }

    /// A `PROT_READ` mapping of a device's `resource0` file. Unmapped
    /// exactly once, on drop.
    pub struct SysfsWindow {
        ptr: NonNull<u8>,
        len: usize,
    }

    // The mapping is read-only for its entire lifetime, so shared access
    // from multiple threads is sound.
    unsafe impl Send for SysfsWindow {}
    unsafe impl Sync for SysfsWindow {}

    impl SysfsWindow {
        fn map(file: &File, len: usize) -> Result<Self> {
            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ,
                    libc::MAP_SHARED,
                    file.as_raw_fd(),
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(Error::MapFailed {
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
            let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| Error::MapFailed {
                reason: "mmap returned a null mapping".to_string(),
            })?;
            Ok(SysfsWindow { ptr, len })
        }

        fn check_bounds(&self, offset: u64, len: usize) {
            let end = offset.checked_add(len as u64);
            assert!(
                end.is_some_and(|end| end <= self.len as u64),
                "read escapes window: offset={offset:#x} len={len}"
            );
        }
    }

    impl Window for SysfsWindow {
        fn len(&self) -> u64 {
            self.len as u64
        }

        fn read_into(&self, offset: u64, buf: &mut [u8]) {
            self.check_bounds(offset, buf.len());
            let base = offset as usize;
            // Device registers must be read with volatile loads; the
            // compiler may not elide or coalesce them.
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = unsafe { self.ptr.as_ptr().add(base + i).read_volatile() };
            }
        }

        fn read_u32(&self, offset: u64) -> u32 {
            self.check_bounds(offset, 4);
            let base = offset as usize;
            let ptr = unsafe { self.ptr.as_ptr().add(base) };
            if (ptr as usize) % std::mem::align_of::<u32>() == 0 {
                unsafe { ptr.cast::<u32>().read_volatile() }
            } else {
                let mut buf = [0u8; 4];
                self.read_into(offset, &mut buf);
                u32::from_le_bytes(buf)
            }
        }
    }

    impl Drop for SysfsWindow {
        fn drop(&mut self) {
            let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
            if rc != 0 {
                tracing::warn!(len = self.len, "munmap failed");
            }
        }
    }
}
