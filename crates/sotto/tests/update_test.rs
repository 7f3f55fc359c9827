//! Integration tests for the single-point write path and propagation.

use std::path::{Path, PathBuf};

use sotto::{
    AggregationMethod, ArchiveInfo, CreateOptions, Database, Error, FixedClock, Point,
};
use tempfile::TempDir;

const CLOCK: u32 = 100_000;

/// Reads the raw point record at an absolute byte offset.
fn read_slot(path: &Path, offset: usize) -> (u32, f64) {
    let bytes = std::fs::read(path).unwrap();
    let timestamp = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap());
    let value = f64::from_be_bytes(bytes[offset + 4..offset + 12].try_into().unwrap());
    (timestamp, value)
}

/// Creates a `[(10s, 60), (1m, 60)]` database and opens it at a fixed time.
fn two_level_db(
    temp_dir: &TempDir,
    method: AggregationMethod,
    x_files_factor: f32,
) -> (PathBuf, Database<FixedClock>) {
    let path = temp_dir.path().join("db.sotto");
    Database::create(
        &path,
        vec![ArchiveInfo::new(10, 60), ArchiveInfo::new(60, 60)],
        CreateOptions {
            x_files_factor,
            aggregation_method: method,
            sparse: false,
        },
    )
    .unwrap();
    let db = Database::open_with_clock(&path, FixedClock::new(CLOCK)).unwrap();
    (path, db)
}

#[test]
fn test_single_update_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let (path, mut db) = two_level_db(&temp_dir, AggregationMethod::Sum, 0.5);

    db.update(Point::new(99_990, 7.5)).unwrap();

    // The point landed at the base of the finest archive.
    assert_eq!(read_slot(&path, 40), (99_990, 7.5));

    // One of six slots in [99960, 100020) is populated, which is below the
    // 0.5 coverage threshold, so the coarser archive saw nothing.
    assert_eq!(read_slot(&path, 760), (0, 0.0));
}

#[test]
fn test_update_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let (path, mut db) = two_level_db(&temp_dir, AggregationMethod::Sum, 0.5);

    db.update(Point::new(99_990, 7.5)).unwrap();
    let before = std::fs::read(&path).unwrap();

    db.update(Point::new(99_990, 7.5)).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_propagation_fires_once_covered() {
    let temp_dir = TempDir::new().unwrap();
    let (path, db) = two_level_db(&temp_dir, AggregationMethod::Sum, 0.5);
    drop(db);

    // Reopen a little later so the whole interval [99960, 100020) is in the
    // past.
    let mut db = Database::open_with_clock(&path, FixedClock::new(100_020)).unwrap();
    for i in 0..6u32 {
        db.update(Point::new(99_960 + i * 10, (i + 1) as f64)).unwrap();
    }

    // All six 10-second slots of [99960, 100020) are known; their sum was
    // written to the coarser archive.
    assert_eq!(read_slot(&path, 760), (99_960, 21.0));
}

#[test]
fn test_coverage_gate_holds_below_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let (path, mut db) = two_level_db(&temp_dir, AggregationMethod::Sum, 0.75);

    // Four of six slots known: 0.667 < 0.75, nothing propagates.
    for i in 0..4u32 {
        db.update(Point::new(99_960 + i * 10, 1.0)).unwrap();
    }

    assert_eq!(read_slot(&path, 760), (0, 0.0));
}

#[test]
fn test_propagation_chain_reaches_third_archive() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("chain.sotto");
    Database::create(
        &path,
        vec![
            ArchiveInfo::new(10, 60),
            ArchiveInfo::new(60, 60),
            ArchiveInfo::new(300, 60),
        ],
        CreateOptions {
            x_files_factor: 0.1,
            aggregation_method: AggregationMethod::Average,
            sparse: false,
        },
    )
    .unwrap();
    let mut db = Database::open_with_clock(&path, FixedClock::new(CLOCK)).unwrap();

    db.update(Point::new(99_990, 7.5)).unwrap();

    // Header is 16 + 3 × 12 = 52 bytes; the three rings start at 52, 772
    // and 1492. A single known slot clears a 0.1 coverage threshold at
    // every level, so the average cascades all the way down.
    assert_eq!(read_slot(&path, 52), (99_990, 7.5));
    assert_eq!(read_slot(&path, 772), (99_960, 7.5));
    assert_eq!(read_slot(&path, 1492), (99_900, 7.5));
}

#[test]
fn test_propagation_halt_stops_whole_chain() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("halt.sotto");
    Database::create(
        &path,
        vec![
            ArchiveInfo::new(10, 60),
            ArchiveInfo::new(60, 60),
            ArchiveInfo::new(300, 60),
        ],
        CreateOptions {
            x_files_factor: 0.5,
            aggregation_method: AggregationMethod::Average,
            sparse: false,
        },
    )
    .unwrap();
    let mut db = Database::open_with_clock(&path, FixedClock::new(CLOCK)).unwrap();

    db.update(Point::new(99_990, 7.5)).unwrap();

    // 1/6 coverage halts at the second archive; the third is never visited.
    assert_eq!(read_slot(&path, 772), (0, 0.0));
    assert_eq!(read_slot(&path, 1492), (0, 0.0));
}

#[test]
fn test_stale_point_boundaries() {
    let temp_dir = TempDir::new().unwrap();
    let (path, mut db) = two_level_db(&temp_dir, AggregationMethod::Average, 0.5);

    // age == max_retention is rejected.
    let err = db.update(Point::new(CLOCK - 3600, 1.0)).unwrap_err();
    assert!(matches!(err, Error::StalePoint { .. }));

    // Future-dated samples are rejected outright.
    let err = db.update(Point::new(CLOCK + 1, 1.0)).unwrap_err();
    assert!(matches!(err, Error::StalePoint { .. }));

    // age == 0 is accepted into the finest archive.
    db.update(Point::new(CLOCK, 2.0)).unwrap();
    assert_eq!(read_slot(&path, 40), (CLOCK, 2.0));

    // One second inside the window still fits the coarsest archive,
    // quantized down to its one-minute resolution.
    db.update(Point::new(CLOCK - 3599, 3.0)).unwrap();
    assert_eq!(read_slot(&path, 760), (96_360, 3.0));
}

#[test]
fn test_age_at_archive_boundary_selects_finer() {
    let temp_dir = TempDir::new().unwrap();
    let (path, mut db) = two_level_db(&temp_dir, AggregationMethod::Average, 0.5);

    // age exactly equal to the finest retention still lands there.
    db.update(Point::new(CLOCK - 600, 4.0)).unwrap();
    assert_eq!(read_slot(&path, 40), (CLOCK - 600, 4.0));
}

#[test]
fn test_ring_wraps_and_base_shifts() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wrap.sotto");
    Database::create(
        &path,
        vec![ArchiveInfo::new(10, 5)],
        CreateOptions::default(),
    )
    .unwrap();

    {
        let mut db = Database::open_with_clock(&path, FixedClock::new(104)).unwrap();
        db.update(Point::new(100, 0.0)).unwrap();
    }

    // Five writes starting one revolution past the base overwrite the whole
    // ring in order.
    let mut db = Database::open_with_clock(&path, FixedClock::new(194)).unwrap();
    for i in 0..5u32 {
        db.update(Point::new(150 + i * 10, i as f64)).unwrap();
    }

    // Single archive: the ring starts right after the 28-byte header.
    for (slot, expected) in [(0, 150), (1, 160), (2, 170), (3, 180), (4, 190)] {
        let (timestamp, value) = read_slot(&path, 28 + slot * 12);
        assert_eq!(timestamp, expected, "slot {slot}");
        assert_eq!(value, ((expected - 150) / 10) as f64);
    }
}
