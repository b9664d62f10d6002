#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use pcibar_core::oneshot;

#[derive(Parser, Debug)]
#[command(
    name = "pcibar-read",
    about = "Read one 4-byte register through a PCI device's BAR0 resource file."
)]
struct Args {
    /// The device's sysfs resource file
    /// (e.g. /sys/bus/pci/devices/0000:00:1f.2/resource0)
    resource_path: PathBuf,

    /// Offset within BAR0, hexadecimal (0x prefix optional)
    offset: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let offset = parse_hex(&args.offset)
        .with_context(|| format!("invalid offset {:?} (expected hex)", args.offset))?;
    let read = oneshot::read_register(&args.resource_path, offset)?;
    println!("{read}");
    Ok(())
}

/// Hex digits only. `from_str_radix` alone is too permissive (it accepts a
/// leading `+`), so the digits are checked first.
fn parse_hex(input: &str) -> anyhow::Result<u64> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("not a hexadecimal number");
    }
    Ok(u64::from_str_radix(digits, 16)?)
}
