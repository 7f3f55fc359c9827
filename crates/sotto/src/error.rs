//! Error and Result types for sotto operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for sotto operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for database operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive list violates a structural rule.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A write was handed more points than the archive holds.
    #[error("archive can store at most {capacity} points, {supplied} supplied")]
    Capacity {
        /// Ring capacity of the archive.
        capacity: u32,
        /// Number of points supplied to the write.
        supplied: usize,
    },

    /// The sample is future-dated or at least `max_retention` seconds old.
    #[error("point at {timestamp} outside the retention window (now {now}, max retention {max_retention}s)")]
    StalePoint {
        /// Timestamp of the rejected sample.
        timestamp: u32,
        /// Clock reading at the time of the update.
        now: u32,
        /// The database's maximum retention in seconds.
        max_retention: u32,
    },

    /// Aggregation method value outside the known set.
    #[error("unknown aggregation method: {0}")]
    BadAggregationMethod(u32),

    /// A database already exists at the target path.
    #[error("database already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Malformed archive specification string.
    #[error("invalid retention specification: {0:?}")]
    ParseRetention(String),
}

/// A structural rule violated by an archive list.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    /// The archive list is empty.
    #[error("archive list cannot be empty")]
    Empty,

    /// Two archives share a resolution.
    #[error("two archives share a resolution of {seconds_per_point}s per point")]
    Duplicate {
        /// The duplicated resolution.
        seconds_per_point: u32,
    },

    /// A finer resolution does not evenly divide a coarser one.
    #[error("resolution {finer}s does not evenly divide {coarser}s")]
    NotEvenlyDivisible {
        /// Seconds per point of the finer archive.
        finer: u32,
        /// Seconds per point of the coarser archive.
        coarser: u32,
    },

    /// A coarser archive does not cover a longer interval than a finer one.
    #[error("coarser archive retention {coarser_retention}s does not exceed {finer_retention}s")]
    RetentionNotIncreasing {
        /// Retention of the finer archive in seconds.
        finer_retention: u32,
        /// Retention of the coarser archive in seconds.
        coarser_retention: u32,
    },

    /// An archive has too few points to consolidate one point of the next.
    #[error("archive holds {points} points but consolidating the next archive needs {required}")]
    InsufficientCoverage {
        /// Points held by the finer archive.
        points: u32,
        /// Points required to fill one slot of the coarser archive.
        required: u32,
    },
}
