use std::path::Path;

use crate::error::{Error, Result};

/// Physical base address and length of a device's first memory resource.
///
/// Obtained once per session and held for its whole lifetime. A resource with
/// a zero base or zero length does not back a live BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalResource {
    pub base: u64,
    pub len: u64,
}

impl PhysicalResource {
    pub fn is_valid(&self) -> bool {
        self.base != 0 && self.len != 0
    }

    /// Derives `{ base, len }` from a descriptor's start/end addresses.
    ///
    /// A descriptor with `end < start`, or one whose length overflows, is
    /// rejected rather than wrapped.
    pub fn from_bounds(start: u64, end: u64, path: &Path) -> Result<Self> {
        let len = end
            .checked_sub(start)
            .and_then(|diff| diff.checked_add(1))
            .ok_or_else(|| Error::DescriptorRead {
                path: path.to_path_buf(),
                reason: format!("invalid address range {start:#x}..{end:#x}"),
            })?;
        Ok(PhysicalResource { base: start, len })
    }
}

/// Parses one `start end flags` line of a textual resource descriptor.
///
/// sysfs writes the three fields as `0x`-prefixed hex; the prefix is accepted
/// but not required. Extra trailing fields are ignored.
pub fn parse_descriptor_line(line: &str, path: &Path) -> Result<(u64, u64, u64)> {
    let mut fields = line.split_whitespace().map(parse_hex);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Some(start)), Some(Some(end)), Some(Some(flags))) => Ok((start, end, flags)),
        _ => Err(Error::DescriptorRead {
            path: path.to_path_buf(),
            reason: format!("malformed line {line:?} (expected `start end flags`)"),
        }),
    }
}

fn parse_hex(field: &str) -> Option<u64> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
