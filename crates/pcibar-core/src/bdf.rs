use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A PCI device address: domain, bus, device, function (`DDDD:BB:DD.F`).
///
/// Parsed from the fixed textual shape used by sysfs and lspci, hex digits in
/// either case with exact field widths. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bdf {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl FromStr for Bdf {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        parse(s).ok_or_else(|| Error::InvalidFormat {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for Bdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

fn parse(s: &str) -> Option<Bdf> {
    let (domain, rest) = s.split_once(':')?;
    let (bus, rest) = rest.split_once(':')?;
    let (device, function) = rest.split_once('.')?;
    Some(Bdf {
        domain: field(domain, 4)? as u16,
        bus: field(bus, 2)? as u8,
        device: field(device, 2)? as u8,
        function: field(function, 1)? as u8,
    })
}

/// One fixed-width hex field. `from_str_radix` alone is too permissive (it
/// accepts a leading `+`), so the digits are checked first.
fn field(s: &str, width: usize) -> Option<u32> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}
