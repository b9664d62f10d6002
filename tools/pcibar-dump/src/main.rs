//! Expose a live hex dump of a PCI device's BAR0 as a fixed-name read-only
//! entry.
//!
//! The entry is a FIFO: every reader open blocks until the service writes a
//! dump freshly regenerated from the mapped window, so its content is always
//! current without the window ever being remapped. With `--once` the dump is
//! rendered to stdout instead and nothing is registered.

use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use pcibar_core::{Bdf, Session, SessionConfig, SysfsPlatform};

/// Set from the signal handler; the serving loop exits once it is true.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(
    name = "pcibar-dump",
    about = "Serve a hex+ASCII dump of a PCI device's BAR0 through a read-only entry."
)]
struct Args {
    /// PCI device address, DDDD:BB:DD.F
    #[arg(long)]
    bdf: String,

    /// Offset within BAR0 where the dump starts (0x-prefixed hex or decimal)
    #[arg(long, default_value = "0", value_parser = parse_number)]
    offset: u64,

    /// Bytes to dump from the offset; clamped to the BAR length
    #[arg(long, default_value = "64", value_parser = parse_number)]
    dump_size: u64,

    /// Path of the exposed read-only entry
    #[arg(long, default_value = "/run/pci_bar_dump")]
    path: PathBuf,

    /// Root of the sysfs PCI device tree
    #[arg(long, default_value = "/sys/bus/pci/devices")]
    sysfs_root: PathBuf,

    /// Render one dump to stdout and exit without registering the entry
    #[arg(long, action = clap::ArgAction::SetTrue)]
    once: bool,
}

/// Digits only in either radix; `from_str_radix` and `parse` both accept a
/// leading `+`, which a register offset never carries.
fn parse_number(input: &str) -> Result<u64, String> {
    let (digits, radix) = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (input, 10),
    };
    let all_digits = match radix {
        16 => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        _ => digits.bytes().all(|b| b.is_ascii_digit()),
    };
    if digits.is_empty() || !all_digits {
        return Err(format!("not a number: {input:?}"));
    }
    u64::from_str_radix(digits, radix).map_err(|err| err.to_string())
}

fn main() -> anyhow::Result<()> {
    // stdout carries dump data with --once; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let bdf: Bdf = args.bdf.parse()?;
    let mut config = SessionConfig::new(bdf);
    config.offset = args.offset;
    config.dump_size = args.dump_size;

    let session = Session::open(SysfsPlatform::with_root(&args.sysfs_root), &config)?;
    tracing::info!(
        %bdf,
        offset = config.offset,
        dump_size = session.range().len,
        "BAR0 session open"
    );

    if args.once {
        print!("{}", session.dump_to_string());
        return Ok(());
    }

    install_signal_handlers();
    let entry = FifoEntry::register(&args.path)?;
    tracing::info!(path = %args.path.display(), "dump entry registered");

    serve(&session, &entry);

    tracing::info!("shutting down");
    // Drop order does the teardown: remove the entry, then the session
    // unmaps the window and disables the device.
    Ok(())
}

/// The exposed read-only entry: a FIFO whose content is regenerated on every
/// reader open. Removed exactly once, on drop.
struct FifoEntry {
    path: PathBuf,
}

impl FifoEntry {
    fn register(path: &Path) -> anyhow::Result<FifoEntry> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .context("entry path contains a NUL byte")?;
        // Readers get read-only access, like a proc-style dump entry; the
        // owner keeps the write bit so the serving loop can feed them.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("mkfifo {}", path.display()));
        }
        Ok(FifoEntry {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FifoEntry {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to remove dump entry");
        }
    }
}

fn serve(session: &Session<SysfsPlatform>, entry: &FifoEntry) {
    while !SHUTDOWN.load(Ordering::SeqCst) {
        // Blocks until a reader opens the entry; shutdown signals interrupt
        // the open with EINTR.
        let mut writer = match OpenOptions::new().write(true).open(&entry.path) {
            Ok(writer) => writer,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::error!(%err, "failed to open dump entry for writing");
                break;
            }
        };
        let dump = session.dump_to_string();
        if let Err(err) = writer.write_all(dump.as_bytes()) {
            // The reader may vanish mid-write; that only cancels this open.
            tracing::warn!(%err, "short dump write");
        }
    }
}

extern "C" fn on_shutdown_signal(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    // sigaction without SA_RESTART, so a blocking FIFO open returns EINTR
    // instead of resuming.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_shutdown_signal as extern "C" fn(libc::c_int) as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
    }
}
