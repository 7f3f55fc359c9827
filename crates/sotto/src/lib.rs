//! Sotto - fixed-size round-robin time series database
//!
//! Each database is a single file holding several pre-allocated archives at
//! different resolutions. A sample lands in the finest archive that still
//! covers its age and is downsampled ("propagated") into the coarser
//! archives behind it. The file's byte layout is fixed at creation time and
//! never grows.
//!
//! # Components
//!
//! - [`Database`]: the handle owning the file; creation and the write paths
//! - [`ArchiveInfo`] / [`Metadata`] / [`Header`]: the on-disk schema
//! - [`AggregationMethod`]: how samples consolidate across archives
//! - [`parse_retention`]: `"10s:2w"`-style archive specifications
//!
//! Query APIs live outside the core; the on-disk rings stay directly
//! walkable for them (slot `i` of an archive holds either zero or the base
//! timestamp plus `i` steps, modulo the ring).
//!
//! # Example
//!
//! ```rust,ignore
//! use sotto::{CreateOptions, Database, Point, parse_retention};
//!
//! let archives = vec![parse_retention("10s:1h")?, parse_retention("1m:1d")?];
//! Database::create("metrics.sotto", archives, CreateOptions::default())?;
//!
//! let mut db = Database::open("metrics.sotto")?;
//! db.update(Point::new(now, 0.75))?;
//! ```
//!
//! The engine runs on the caller's thread and performs synchronous blocking
//! I/O against one file descriptor. Concurrent writers must serialize
//! externally; the core takes no lock.

#![deny(missing_docs)]

pub mod clock;
pub mod db;
pub mod error;
pub mod format;
pub mod retention;

pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{CreateOptions, Database};
pub use error::{Error, Result, SchemaError};
pub use format::{
    validate_archive_list, AggregationMethod, ArchiveInfo, Header, Metadata, Point,
    ARCHIVE_INFO_SIZE, METADATA_SIZE, POINT_SIZE,
};
pub use retention::parse_retention;
