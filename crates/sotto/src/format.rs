//! On-disk format for sotto databases.
//!
//! A database is a single file with a byte layout fixed at creation time:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Metadata (16 bytes)                         │
//! │  - aggregation_method : u32                  │
//! │  - max_retention      : u32                  │
//! │  - x_files_factor     : f32                  │
//! │  - archive_count      : u32                  │
//! ├──────────────────────────────────────────────┤
//! │  ArchiveInfo[archive_count] (12 bytes each)  │
//! │  - offset             : u32                  │
//! │  - seconds_per_point  : u32                  │
//! │  - points             : u32                  │
//! ├──────────────────────────────────────────────┤
//! │  archive[0] ring: points × 12-byte records   │
//! │  - timestamp          : u32                  │
//! │  - value              : f64                  │
//! │  archive[1] ring ...                         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All fields are big-endian. The file length is exactly the header size
//! plus the sum of the archive ring sizes. A point timestamp of `0` marks a
//! slot that has never been written.

use crate::error::{Error, Result, SchemaError};
use std::io::{Read, Seek, SeekFrom, Write};

/// Size of the metadata block in bytes.
pub const METADATA_SIZE: u32 = 16;

/// Size of one archive descriptor in bytes.
pub const ARCHIVE_INFO_SIZE: u32 = 12;

/// Size of one point record in bytes.
pub const POINT_SIZE: u32 = 12;

/// How point values are consolidated when propagating to a coarser archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum AggregationMethod {
    /// Arithmetic mean of the known values (default).
    #[default]
    Average = 1,
    /// Sum of the known values.
    Sum = 2,
    /// The last known value in interval order.
    Last = 3,
    /// The largest known value.
    Max = 4,
    /// The smallest known value.
    Min = 5,
}

impl AggregationMethod {
    /// Creates an `AggregationMethod` from its on-disk value.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadAggregationMethod` for values outside `1..=5`.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::Average),
            2 => Ok(Self::Sum),
            3 => Ok(Self::Last),
            4 => Ok(Self::Max),
            5 => Ok(Self::Min),
            other => Err(Error::BadAggregationMethod(other)),
        }
    }

    /// Consolidates a run of points into a single value.
    ///
    /// The run must be non-empty.
    pub fn aggregate(self, points: &[Point]) -> f64 {
        match self {
            Self::Average => {
                points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64
            }
            Self::Sum => points.iter().map(|p| p.value).sum(),
            Self::Last => points[points.len() - 1].value,
            Self::Max => {
                let mut max = points[0].value;
                for point in &points[1..] {
                    if point.value > max {
                        max = point.value;
                    }
                }
                max
            }
            Self::Min => {
                let mut min = points[0].value;
                for point in &points[1..] {
                    if point.value < min {
                        min = point.value;
                    }
                }
                min
            }
        }
    }
}

/// A single sample: seconds past the epoch and a value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Timestamp in seconds past the epoch. `0` marks an unused slot.
    pub timestamp: u32,
    /// Sample value.
    pub value: f64,
}

impl Point {
    /// Creates a new point.
    pub fn new(timestamp: u32, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Writes the record in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.timestamp.to_be_bytes())?;
        writer.write_all(&self.value.to_be_bytes())?;
        Ok(())
    }

    /// Reads a record in big-endian byte order.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; POINT_SIZE as usize];
        reader.read_exact(&mut buf)?;

        let timestamp = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let value = f64::from_be_bytes(buf[4..12].try_into().unwrap());

        Ok(Self { timestamp, value })
    }
}

/// General metadata about a database, stored at offset 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    /// How samples are consolidated across archives.
    pub aggregation_method: AggregationMethod,
    /// The largest retention over all archives, in seconds.
    pub max_retention: u32,
    /// Minimum fraction of known points required to emit an aggregate.
    pub x_files_factor: f32,
    /// Number of archive descriptors following the metadata block.
    pub archive_count: u32,
}

impl Metadata {
    /// Writes the metadata block in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.aggregation_method as u32).to_be_bytes())?;
        writer.write_all(&self.max_retention.to_be_bytes())?;
        writer.write_all(&self.x_files_factor.to_be_bytes())?;
        writer.write_all(&self.archive_count.to_be_bytes())?;
        Ok(())
    }

    /// Reads a metadata block in big-endian byte order.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadAggregationMethod` if the stored method value is
    /// outside the known set.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; METADATA_SIZE as usize];
        reader.read_exact(&mut buf)?;

        let aggregation_method =
            AggregationMethod::from_u32(u32::from_be_bytes(buf[0..4].try_into().unwrap()))?;
        let max_retention = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let x_files_factor = f32::from_be_bytes(buf[8..12].try_into().unwrap());
        let archive_count = u32::from_be_bytes(buf[12..16].try_into().unwrap());

        Ok(Self {
            aggregation_method,
            max_retention,
            x_files_factor,
            archive_count,
        })
    }
}

/// Descriptor of one archive ring within the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Absolute byte offset where this archive's ring begins.
    pub offset: u32,
    /// Resolution: seconds of elapsed time represented by one point.
    pub seconds_per_point: u32,
    /// Ring capacity in points.
    pub points: u32,
}

impl ArchiveInfo {
    /// Creates a descriptor with an unassigned offset.
    ///
    /// [`Database::create`](crate::Database::create) assigns offsets when it
    /// lays the archives out in the file.
    pub fn new(seconds_per_point: u32, points: u32) -> Self {
        Self {
            offset: 0,
            seconds_per_point,
            points,
        }
    }

    /// Returns the retention period of the archive in seconds.
    pub fn retention(&self) -> u32 {
        self.seconds_per_point * self.points
    }

    /// Returns the size of the archive ring in bytes.
    pub fn size(&self) -> u32 {
        self.points * POINT_SIZE
    }

    /// Returns the byte offset one past the last record of the ring.
    pub fn end(&self) -> u32 {
        self.offset + self.size()
    }

    /// Writes the descriptor in big-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.offset.to_be_bytes())?;
        writer.write_all(&self.seconds_per_point.to_be_bytes())?;
        writer.write_all(&self.points.to_be_bytes())?;
        Ok(())
    }

    /// Reads a descriptor in big-endian byte order.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; ARCHIVE_INFO_SIZE as usize];
        reader.read_exact(&mut buf)?;

        let offset = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let seconds_per_point = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let points = u32::from_be_bytes(buf[8..12].try_into().unwrap());

        Ok(Self {
            offset,
            seconds_per_point,
            points,
        })
    }
}

/// The database header: metadata plus the archive descriptor table.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The metadata block.
    pub metadata: Metadata,
    /// Archive descriptors, sorted by ascending resolution.
    pub archives: Vec<ArchiveInfo>,
}

impl Header {
    /// Returns the header size in bytes for a database with `count` archives.
    pub fn size_for(count: u32) -> u32 {
        METADATA_SIZE + count * ARCHIVE_INFO_SIZE
    }

    /// Reads the header from the start of `file`.
    ///
    /// The stream position is restored afterwards, on both success and
    /// failure.
    pub fn read_from<F: Read + Seek>(file: &mut F) -> Result<Self> {
        let saved = file.stream_position()?;
        let result = Self::read_at_start(file);
        file.seek(SeekFrom::Start(saved))?;
        result
    }

    fn read_at_start<F: Read + Seek>(file: &mut F) -> Result<Self> {
        file.seek(SeekFrom::Start(0))?;

        let metadata = Metadata::read_from(file)?;
        let mut archives = Vec::with_capacity(metadata.archive_count as usize);
        for _ in 0..metadata.archive_count {
            archives.push(ArchiveInfo::read_from(file)?);
        }

        Ok(Self { metadata, archives })
    }
}

/// Validates an archive list, sorting it by ascending resolution in place.
///
/// The list must:
///
/// 1. contain at least one archive,
/// 2. contain no two archives with the same resolution,
/// 3. have every finer resolution evenly divide the next coarser one,
/// 4. have strictly increasing retention with coarser resolution,
/// 5. give each archive enough points to consolidate one point of the next.
///
/// # Errors
///
/// Returns the [`SchemaError`] naming the first rule violated.
pub fn validate_archive_list(archives: &mut [ArchiveInfo]) -> Result<()> {
    archives.sort_by_key(|archive| archive.seconds_per_point);

    if archives.is_empty() {
        return Err(SchemaError::Empty.into());
    }

    for pair in archives.windows(2) {
        let (finer, coarser) = (pair[0], pair[1]);

        if finer.seconds_per_point == coarser.seconds_per_point {
            return Err(SchemaError::Duplicate {
                seconds_per_point: finer.seconds_per_point,
            }
            .into());
        }

        if coarser.seconds_per_point % finer.seconds_per_point != 0 {
            return Err(SchemaError::NotEvenlyDivisible {
                finer: finer.seconds_per_point,
                coarser: coarser.seconds_per_point,
            }
            .into());
        }

        if coarser.retention() <= finer.retention() {
            return Err(SchemaError::RetentionNotIncreasing {
                finer_retention: finer.retention(),
                coarser_retention: coarser.retention(),
            }
            .into());
        }

        let required = coarser.seconds_per_point / finer.seconds_per_point;
        if finer.points < required {
            return Err(SchemaError::InsufficientCoverage {
                points: finer.points,
                required,
            }
            .into());
        }
    }

    Ok(())
}
