// SPDX-License-Identifier: AGPL-3.0-only

//! Arena backings over fake sysfs trees
//!
//! A regular file can stand in for a device node: it maps the same way, so
//! the attribute parsing, mapping and arena logic run without hardware.

use sssp_driver::backends::udmabuf::UdmabufBacking;
use sssp_driver::backends::uio::UioBacking;
use sssp_driver::{
    Arena, ArenaBacking, ArenaConfig, BackingType, CoherencyMode, DriverError, MemoryBackend,
    PhysicalMemory, SyncDirection,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn fake_udmabuf(root: &Path, name: &str, phys: &str, size: usize) {
    let attrs = root.join("class").join(name);
    fs::create_dir_all(&attrs).expect("sysfs dir");
    fs::write(attrs.join("phys_addr"), phys).expect("phys_addr");
    fs::write(attrs.join("size"), format!("{size}\n")).expect("size");
    fs::write(attrs.join("sync_mode"), "0\n").expect("sync_mode");
    fs::create_dir_all(root.join("dev")).expect("dev dir");
    fs::write(root.join("dev").join(name), vec![0xFFu8; size]).expect("device");
}

#[test]
fn udmabuf_attributes_drive_the_arena() {
    let root = tempfile::tempdir().expect("tempdir");
    fake_udmabuf(root.path(), "udmabuf0", "0x38000000\n", 64 * 1024);

    let backing = UdmabufBacking::open_at(
        &root.path().join("class"),
        &root.path().join("dev"),
        "udmabuf0",
        CoherencyMode::SyncWriteCombine,
    )
    .expect("open");
    assert_eq!(backing.physical_base(), 0x3800_0000);
    assert_eq!(backing.capacity(), 64 * 1024);
    assert_eq!(backing.backing_type(), BackingType::Udmabuf);

    let written = fs::read_to_string(root.path().join("class/udmabuf0/sync_mode")).expect("mode");
    assert_eq!(written.trim(), "2");

    let mut arena = Arena::from_backing(Arc::new(backing), 64).expect("arena");
    let region = arena.allocate(16).expect("region");
    let address = arena.translate(region);
    assert_eq!(address, 0x3800_0040);
    // Device memory starts dirty; allocations do not
    assert_eq!(arena.load::<u32>(address).expect("load"), 0);
    arena.store(address, &0xCAFE_u32).expect("store");
    arena.synchronize(region, SyncDirection::ToDevice).expect("flush");
    arena.synchronize_all(SyncDirection::FromDevice).expect("invalidate");
}

#[test]
fn cached_udmabuf_flushes_with_msync() {
    let root = tempfile::tempdir().expect("tempdir");
    fake_udmabuf(root.path(), "udmabuf1", "40000000", 16 * 1024);

    let backing = UdmabufBacking::open_at(
        &root.path().join("class"),
        &root.path().join("dev"),
        "udmabuf1",
        CoherencyMode::CacheEnabled,
    )
    .expect("open");
    let mut arena = Arena::from_backing(Arc::new(backing), 64).expect("arena");
    let region = arena.allocate(100).expect("region");
    arena.store(arena.translate(region), &[1u32, 2, 3]).expect("store");
    arena.synchronize(region, SyncDirection::ToDevice).expect("msync");

    let on_disk = fs::read(root.path().join("dev/udmabuf1")).expect("read back");
    assert_eq!(&on_disk[64..68], &1u32.to_ne_bytes());
}

#[test]
fn udmabuf_with_garbage_size_is_rejected() {
    let root = tempfile::tempdir().expect("tempdir");
    fake_udmabuf(root.path(), "udmabuf0", "0x38000000", 4096);
    fs::write(root.path().join("class/udmabuf0/size"), "huge").expect("size");

    let err = UdmabufBacking::open_at(
        &root.path().join("class"),
        &root.path().join("dev"),
        "udmabuf0",
        CoherencyMode::Sync,
    )
    .expect_err("bad size");
    assert!(matches!(err, DriverError::AttributeInvalid { .. }));
}

#[test]
fn udmabuf_above_four_gib_cannot_back_an_arena() {
    let root = tempfile::tempdir().expect("tempdir");
    fake_udmabuf(root.path(), "udmabuf0", "0x100000000", 4096);

    let backing = UdmabufBacking::open_at(
        &root.path().join("class"),
        &root.path().join("dev"),
        "udmabuf0",
        CoherencyMode::Sync,
    )
    .expect("open");
    let err = Arena::from_backing(Arc::new(backing), 64).expect_err("not 32-bit addressable");
    assert!(matches!(err, DriverError::AddressOutOfRange { .. }));
}

#[test]
fn uio_map_offsets_by_page() {
    let root = tempfile::tempdir().expect("tempdir");
    let page = rustix::param::page_size();
    let attrs = root.path().join("class/uio3/maps/map1");
    fs::create_dir_all(&attrs).expect("sysfs dir");
    fs::write(attrs.join("addr"), "0x20000000\n").expect("addr");
    fs::write(attrs.join("size"), format!("{page:#x}\n")).expect("size");
    fs::create_dir_all(root.path().join("dev")).expect("dev dir");

    let mut device = vec![0u8; 2 * page];
    device[page..page + 4].copy_from_slice(&0xA5A5_A5A5u32.to_ne_bytes());
    fs::write(root.path().join("dev/uio3"), device).expect("device");

    let backing = UioBacking::open_at(&root.path().join("class"), &root.path().join("dev"), 3, 1)
        .expect("open");
    assert_eq!(backing.physical_base(), 0x2000_0000);
    assert_eq!(backing.capacity(), page);
    // SAFETY: the mapping is page-sized and the first word is in range.
    let first = unsafe { backing.base().as_ptr().cast::<u32>().read_unaligned() };
    assert_eq!(first, 0xA5A5_A5A5);
}

#[test]
fn heap_config_opens_by_default() {
    let arena = Arena::open(&ArenaConfig::new(ArenaBacking::heap(1 << 20))).expect("heap arena");
    assert_eq!(arena.backing_type(), BackingType::Heap);
    assert_eq!(arena.physical_base(), 0x1000_0000);
    assert_eq!(arena.stats().used, ArenaConfig::DEFAULT_GRANULE);
}

#[test]
fn missing_udmabuf_config_fails_to_open() {
    let config = ArenaConfig::new(ArenaBacking::Udmabuf {
        name: "udmabuf-sssp-absent".to_string(),
        mode: CoherencyMode::Sync,
    });
    let err = Arena::open(&config).expect_err("no such instance");
    assert!(matches!(err, DriverError::DeviceNotFound { .. }));
}

#[test]
#[ignore] // Requires udmabuf0 loaded with a buffer below 4 GiB
fn real_udmabuf_arena() {
    let config = ArenaConfig::new(ArenaBacking::udmabuf(CoherencyMode::Sync));
    let mut arena = Arena::open(&config).expect("udmabuf0");
    let region = arena.allocate(4096).expect("region");
    arena.synchronize(region, SyncDirection::ToDevice).expect("sync");
}
