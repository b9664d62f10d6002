//! Stand-alone single-register read over a device's `resource0` file.
//!
//! Unlike [`Session`](crate::Session), this path keeps nothing mapped: it
//! parses the sibling `resource` descriptor for the BAR0 base, maps one
//! page-aligned read-only page around the target offset, performs a single
//! volatile 4-byte read and unmaps before returning.

use std::fmt;
use std::fs::{self, File};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::error::{Error, Result};
use crate::resource::{parse_descriptor_line, PhysicalResource};

/// Result of a one-shot register read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRead {
    /// BAR0 physical base address.
    pub base: u64,
    /// `base + offset`.
    pub effective: u64,
    /// The 4-byte value read.
    pub value: u32,
}

impl fmt::Display for RegisterRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BAR0 Base Address       : 0x{:08X}", self.base)?;
        writeln!(f, "Effective Address       : 0x{:08X}", self.effective)?;
        write!(f, "4-Byte Register Value   : 0x{:08X}", self.value)
    }
}

/// Reads the 4-byte register at `offset` inside the BAR backing
/// `resource_path` (a sysfs `resourceN` file).
///
/// The offset is validated against the descriptor's length before anything
/// is mapped; a read that would not fit entirely inside the BAR fails with
/// [`Error::OutOfRange`].
pub fn read_register(resource_path: &Path, offset: u64) -> Result<RegisterRead> {
    let dir = resource_path.parent().ok_or_else(|| Error::DescriptorRead {
        path: resource_path.to_path_buf(),
        reason: "path has no parent directory".to_string(),
    })?;
    let descriptor = dir.join("resource");
    let text = fs::read_to_string(&descriptor).map_err(|err| Error::DescriptorRead {
        path: descriptor.clone(),
        reason: err.to_string(),
    })?;
    let line = text.lines().next().ok_or_else(|| Error::DescriptorRead {
        path: descriptor.clone(),
        reason: "empty descriptor".to_string(),
    })?;
    let (start, end, _flags) = parse_descriptor_line(line, &descriptor)?;
    let resource = PhysicalResource::from_bounds(start, end, &descriptor)?;

    if offset.checked_add(4).map_or(true, |end| end > resource.len) {
        return Err(Error::OutOfRange {
            offset,
            length: resource.len,
        });
    }

    let file = File::open(resource_path).map_err(|err| Error::MapFailed {
        reason: format!("open {}: {err}", resource_path.display()),
    })?;
    let value = read_word_paged(&file, offset)?;

    // offset < resource.len, so base + offset cannot exceed the descriptor's
    // end address and cannot wrap.
    Ok(RegisterRead {
        base: resource.base,
        effective: resource.base + offset,
        value,
    })
}

fn read_word_paged(file: &File, offset: u64) -> Result<u32> {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;
    let aligned = offset & !(page - 1);
    let in_page = (offset - aligned) as usize;
    // Two pages when the word straddles a page boundary.
    let map_len = if in_page + 4 > page as usize {
        page as usize * 2
    } else {
        page as usize
    };

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            map_len,
            libc::PROT_READ,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            aligned as libc::off_t,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(Error::MapFailed {
            reason: std::io::Error::last_os_error().to_string(),
        });
    }

    let value = unsafe {
        let target = ptr.cast::<u8>().add(in_page);
        if (target as usize) % std::mem::align_of::<u32>() == 0 {
            target.cast::<u32>().read_volatile()
        } else {
            let mut buf = [0u8; 4];
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = target.add(i).read_volatile();
            }
            u32::from_le_bytes(buf)
        }
    };

    let rc = unsafe { libc::munmap(ptr, map_len) };
    if rc != 0 {
        tracing::warn!("munmap failed after register read");
    }
    Ok(value)
}
