use std::fmt;

use crate::bounds::EffectiveRange;
use crate::platform::Window;

/// Bytes covered by one dump row.
pub const ROW_BYTES: usize = 16;

/// One formatted dump row: up to 16 bytes read from the window into a fixed
/// scratch buffer.
#[derive(Debug, Clone, Copy)]
pub struct DumpRow {
    offset: u64,
    data: [u8; ROW_BYTES],
    len: usize,
}

impl DumpRow {
    /// Window-relative offset of the row's first byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The bytes actually read for this row.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl fmt::Display for DumpRow {
    /// `OOOOOOOO  hh hh hh hh hh hh hh hh  hh hh hh hh hh hh hh hh  |ascii|`
    ///
    /// Slots past the row's final byte render as three blanks each; the
    /// ASCII panel covers only bytes actually read, with non-printable
    /// bytes shown as `.`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}  ", self.offset)?;
        for (i, byte) in self.data.iter().enumerate() {
            if i < self.len {
                write!(f, "{byte:02x} ")?;
            } else {
                f.write_str("   ")?;
            }
            if i == 7 {
                f.write_str(" ")?;
            }
        }
        f.write_str(" |")?;
        for &byte in self.bytes() {
            let shown = if (0x20..=0x7e).contains(&byte) {
                byte as char
            } else {
                '.'
            };
            write!(f, "{shown}")?;
        }
        f.write_str("|")
    }
}

/// Lazy row iterator over a clamped range of a mapped window.
///
/// Finite (`ceil(len / 16)` rows) and not restartable; each `next` performs
/// the reads for one row. The range was validated against the resource that
/// backs the window, so the reads can never cross the window's bounds.
pub struct DumpRows<'w, W: Window> {
    window: &'w W,
    offset: u64,
    remaining: u64,
}

impl<'w, W: Window> DumpRows<'w, W> {
    pub fn new(window: &'w W, range: EffectiveRange) -> Self {
        DumpRows {
            window,
            offset: range.offset,
            remaining: range.len,
        }
    }
}

impl<W: Window> Iterator for DumpRows<'_, W> {
    type Item = DumpRow;

    fn next(&mut self) -> Option<DumpRow> {
        if self.remaining == 0 {
            return None;
        }
        let take = self.remaining.min(ROW_BYTES as u64) as usize;
        let mut data = [0u8; ROW_BYTES];
        self.window.read_into(self.offset, &mut data[..take]);
        let row = DumpRow {
            offset: self.offset,
            data,
            len: take,
        };
        self.offset += take as u64;
        self.remaining -= take as u64;
        Some(row)
    }
}

/// Renders every row of `range` to `out`, one row per line.
pub fn write_dump<W: Window>(
    window: &W,
    range: EffectiveRange,
    out: &mut impl fmt::Write,
) -> fmt::Result {
    for row in DumpRows::new(window, range) {
        writeln!(out, "{row}")?;
    }
    Ok(())
}
