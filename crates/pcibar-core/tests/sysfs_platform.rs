//! SysfsPlatform against a synthetic sysfs tree. Regular files stand in for
//! the kernel's resource attributes; mmap treats them the same way.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use pcibar_core::{Bdf, Error, Platform, Session, SessionConfig, SysfsPlatform, Window};

const BDF: &str = "0000:00:1f.2";

/// Lays out `<root>/<bdf>/{resource,resource0,enable}` like the kernel does.
fn fake_tree(root: &Path, base: u64, bytes: &[u8]) -> PathBuf {
    let dir = root.join(BDF);
    fs::create_dir_all(&dir).unwrap();
    let end = base + bytes.len() as u64 - 1;
    fs::write(
        dir.join("resource"),
        format!("0x{base:016x} 0x{end:016x} 0x0000000000040200\n"),
    )
    .unwrap();
    fs::write(dir.join("resource0"), bytes).unwrap();
    fs::write(dir.join("enable"), "0").unwrap();
    dir
}

fn bdf() -> Bdf {
    BDF.parse().unwrap()
}

#[test]
fn resolves_only_existing_devices() {
    let root = tempfile::tempdir().unwrap();
    fake_tree(root.path(), 0xfebd_0000, &[0u8; 4096]);
    let platform = SysfsPlatform::with_root(root.path());

    assert!(platform.resolve(&bdf()).is_ok());

    let missing: Bdf = "0000:00:00.0".parse().unwrap();
    let err = platform.resolve(&missing).unwrap_err();
    assert!(matches!(err, Error::DeviceNotFound { .. }));
}

#[test]
fn locates_bar0_from_the_descriptor() {
    let root = tempfile::tempdir().unwrap();
    fake_tree(root.path(), 0xfebd_0000, &[0u8; 4096]);
    let platform = SysfsPlatform::with_root(root.path());

    let device = platform.resolve(&bdf()).unwrap();
    let resource = platform.bar0_resource(&device).unwrap();
    assert_eq!(resource.base, 0xfebd_0000);
    assert_eq!(resource.len, 4096);
}

#[test]
fn mapped_window_reads_resource0_bytes() {
    let root = tempfile::tempdir().unwrap();
    let mut bytes = vec![0u8; 4096];
    bytes[0x10..0x20].copy_from_slice(b"ABCDEFGHIJKLMNOP");
    bytes[0x20..0x24].copy_from_slice(&0xcafe_f00du32.to_le_bytes());
    fake_tree(root.path(), 0xfebd_0000, &bytes);
    let platform = SysfsPlatform::with_root(root.path());

    let device = platform.resolve(&bdf()).unwrap();
    let resource = platform.bar0_resource(&device).unwrap();
    let window = platform.map(&device, resource).unwrap();

    let mut row = [0u8; 16];
    window.read_into(0x10, &mut row);
    assert_eq!(&row, b"ABCDEFGHIJKLMNOP");
    assert_eq!(window.read_u32(0x20), 0xcafe_f00d);
}

#[test]
fn session_toggles_the_enable_attribute() {
    let root = tempfile::tempdir().unwrap();
    let dir = fake_tree(root.path(), 0xfebd_0000, &[0u8; 4096]);
    let platform = SysfsPlatform::with_root(root.path());

    {
        let session = Session::open(platform, &SessionConfig::new(bdf())).unwrap();
        assert_eq!(fs::read_to_string(dir.join("enable")).unwrap(), "1");
        assert_eq!(session.resource().base, 0xfebd_0000);
    }
    assert_eq!(fs::read_to_string(dir.join("enable")).unwrap(), "0");
}

#[test]
fn dump_over_a_synthetic_device_matches_its_bytes() {
    let root = tempfile::tempdir().unwrap();
    let mut bytes = vec![0u8; 4096];
    bytes[..16].copy_from_slice(b"pci bar contents");
    fake_tree(root.path(), 0xfebd_0000, &bytes);

    let mut config = SessionConfig::new(bdf());
    config.dump_size = 16;
    let session = Session::open(SysfsPlatform::with_root(root.path()), &config).unwrap();
    assert_eq!(
        session.dump_to_string(),
        "00000000  70 63 69 20 62 61 72 20  63 6f 6e 74 65 6e 74 73  |pci bar contents|\n"
    );
}

#[test]
fn missing_resource0_fails_to_map() {
    let root = tempfile::tempdir().unwrap();
    let dir = fake_tree(root.path(), 0xfebd_0000, &[0u8; 4096]);
    fs::remove_file(dir.join("resource0")).unwrap();
    let platform = SysfsPlatform::with_root(root.path());

    let err = Session::open(platform, &SessionConfig::new(bdf())).unwrap_err();
    assert!(matches!(err, Error::MapFailed { .. }));
    // Rollback must have disabled the device again.
    assert_eq!(fs::read_to_string(dir.join("enable")).unwrap(), "0");
}

#[test]
fn all_zero_descriptor_is_unavailable() {
    let root = tempfile::tempdir().unwrap();
    let dir = fake_tree(root.path(), 0xfebd_0000, &[0u8; 4096]);
    fs::write(
        dir.join("resource"),
        "0x0000000000000000 0x0000000000000000 0x0000000000000000\n",
    )
    .unwrap();
    let platform = SysfsPlatform::with_root(root.path());

    let err = Session::open(platform, &SessionConfig::new(bdf())).unwrap_err();
    assert!(matches!(err, Error::ResourceUnavailable { .. }));
    assert_eq!(fs::read_to_string(dir.join("enable")).unwrap(), "0");
}
