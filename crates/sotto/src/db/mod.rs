//! The database handle and its creation and write paths.

mod batch;
mod propagate;
mod ring;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::format::{
    validate_archive_list, AggregationMethod, ArchiveInfo, Header, Metadata, Point,
};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Zero-fill chunk size for dense allocation.
const ALLOCATION_CHUNK: usize = 16 * 1024;

/// Options for creating a database.
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Minimum fraction of known points required to emit an aggregate,
    /// in `[0.0, 1.0]`.
    pub x_files_factor: f32,
    /// How samples are consolidated across archives.
    pub aggregation_method: AggregationMethod,
    /// Allocate the archive region as a filesystem hole instead of writing
    /// zeroes.
    pub sparse: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            x_files_factor: 0.5,
            aggregation_method: AggregationMethod::Average,
            sparse: false,
        }
    }
}

/// A single-file round-robin time-series database.
///
/// The handle exclusively owns the file descriptor for the database's
/// lifetime and performs synchronous blocking I/O on the caller's thread.
/// Nothing is cached beyond the header; every operation seeks and reads or
/// writes the backing file directly. Concurrent callers must serialize
/// externally.
#[derive(Debug)]
pub struct Database<C: Clock = SystemClock> {
    file: File,
    header: Header,
    clock: C,
}

impl Database<SystemClock> {
    /// Creates a new database file holding the given archives.
    ///
    /// The archive list is validated and sorted by ascending resolution;
    /// offsets are assigned finest-first behind the header. The file is
    /// allocated at its final size, densely zero-filled or as a sparse
    /// hole per [`CreateOptions::sparse`].
    ///
    /// # Errors
    ///
    /// `Error::Schema` when the archive list violates a structural rule,
    /// `Error::AlreadyExists` when the path is already occupied.
    pub fn create<P: AsRef<Path>>(
        path: P,
        mut archives: Vec<ArchiveInfo>,
        options: CreateOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        validate_archive_list(&mut archives)?;

        let mut file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };

        let max_retention = archives
            .iter()
            .map(ArchiveInfo::retention)
            .max()
            .unwrap_or(0);

        let metadata = Metadata {
            aggregation_method: options.aggregation_method,
            max_retention,
            x_files_factor: options.x_files_factor,
            archive_count: archives.len() as u32,
        };
        metadata.write_to(&mut file)?;

        let header_size = Header::size_for(archives.len() as u32);
        let mut offset = header_size;
        for archive in &mut archives {
            archive.offset = offset;
            archive.write_to(&mut file)?;
            offset += archive.size();
        }

        let data_size = offset - header_size;
        if options.sparse {
            file.seek(SeekFrom::Start((header_size + data_size - 1) as u64))?;
            file.write_all(&[0])?;
        } else {
            let zeroes = [0u8; ALLOCATION_CHUNK];
            let mut remaining = data_size as usize;
            while remaining > 0 {
                let chunk = remaining.min(ALLOCATION_CHUNK);
                file.write_all(&zeroes[..chunk])?;
                remaining -= chunk;
            }
        }
        file.sync_all()?;

        debug!(
            path = %path.display(),
            archives = archives.len(),
            max_retention,
            "created database"
        );
        Ok(())
    }

    /// Opens an existing database using the system clock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock> Database<C> {
    /// Opens an existing database with an injected clock.
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: C) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let header = Header::read_from(&mut file)?;
        Ok(Self {
            file,
            header,
            clock,
        })
    }

    /// Returns the database header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Writes a single sample.
    ///
    /// The sample lands in the finest archive whose retention covers its
    /// age, quantized to that archive's resolution, and is then propagated
    /// into the chain of coarser archives until an interval's coverage
    /// falls short of the x-files-factor.
    ///
    /// # Errors
    ///
    /// `Error::StalePoint` when the sample is future-dated or at least
    /// `max_retention` seconds old.
    pub fn update(&mut self, point: Point) -> Result<()> {
        let now = self.clock.now();
        let max_retention = self.header.metadata.max_retention;

        if point.timestamp > now || now - point.timestamp >= max_retention {
            return Err(Error::StalePoint {
                timestamp: point.timestamp,
                now,
                max_retention,
            });
        }
        let age = now - point.timestamp;

        let index = self
            .header
            .archives
            .iter()
            .position(|archive| archive.retention() >= age)
            .expect("age < max_retention was already checked");
        let archive = self.header.archives[index];

        let quantized = Point::new(
            point.timestamp - point.timestamp % archive.seconds_per_point,
            point.value,
        );
        ring::write_points(&mut self.file, &archive, &[quantized])?;

        let x_files_factor = self.header.metadata.x_files_factor;
        let method = self.header.metadata.aggregation_method;
        let mut higher = archive;
        for lower in &self.header.archives[index + 1..] {
            if !propagate::propagate(
                &mut self.file,
                quantized.timestamp,
                &higher,
                lower,
                x_files_factor,
                method,
            )? {
                break;
            }
            higher = *lower;
        }

        Ok(())
    }

    /// Writes a batch of samples.
    ///
    /// The batch is partitioned into per-archive buckets by sample age;
    /// each bucket is quantized, deduplicated, split into contiguous runs,
    /// written, and propagated down the archive chain. Samples older than
    /// every archive's retention (and future-dated samples) are silently
    /// dropped.
    ///
    /// An error while writing a bucket aborts the batch; preceding writes
    /// are left in place.
    pub fn update_many(&mut self, points: &[Point]) -> Result<()> {
        let now = self.clock.now();
        let (buckets, dropped) = batch::partition(&self.header.archives, points, now);
        if dropped > 0 {
            debug!(dropped, "dropped batch points outside every retention");
        }

        for bucket in buckets {
            self.archive_update_many(bucket.archive_index, bucket.points)?;
        }
        Ok(())
    }

    fn archive_update_many(&mut self, index: usize, mut points: Vec<Point>) -> Result<()> {
        let archive = self.header.archives[index];

        batch::sort_newest_first(&mut points);
        let mut points = batch::quantize(&points, archive.seconds_per_point);
        batch::dedup_adjacent(&mut points);

        for run in batch::split_runs(&points, archive.seconds_per_point) {
            ring::write_points(&mut self.file, &archive, &run)?;
        }

        let x_files_factor = self.header.metadata.x_files_factor;
        let method = self.header.metadata.aggregation_method;
        let mut higher = archive;
        'chain: for lower in &self.header.archives[index + 1..] {
            let mut intervals = batch::quantize(&points, lower.seconds_per_point);
            batch::dedup_adjacent(&mut intervals);

            for interval in &intervals {
                if !propagate::propagate(
                    &mut self.file,
                    interval.timestamp,
                    &higher,
                    lower,
                    x_files_factor,
                    method,
                )? {
                    break 'chain;
                }
            }
            higher = *lower;
        }

        Ok(())
    }

    /// Changes the aggregation method, given as its on-disk value.
    ///
    /// # Errors
    ///
    /// `Error::BadAggregationMethod` for values outside `1..=5`; nothing is
    /// written in that case.
    pub fn set_aggregation_method(&mut self, method: u32) -> Result<()> {
        let method = AggregationMethod::from_u32(method)?;

        self.header.metadata.aggregation_method = method;
        self.file.seek(SeekFrom::Start(0))?;
        self.header.metadata.write_to(&mut self.file)?;
        Ok(())
    }
}
