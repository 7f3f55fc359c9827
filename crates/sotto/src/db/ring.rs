//! Ring-buffer record I/O within an archive.
//!
//! Each archive is a contiguous run of fixed-size records treated as a
//! ring. The record at the archive's starting offset (the base) anchors the
//! ring: a timestamp lives a whole number of slots away from the base,
//! modulo the ring capacity. All index math is unsigned 32-bit, so the
//! arithmetic survives wraparound at the epoch boundary.

use crate::error::{Error, Result};
use crate::format::{ArchiveInfo, Point, POINT_SIZE};
use std::io::{Read, Seek, SeekFrom, Write};

/// Reads one point record at an absolute byte offset.
pub(crate) fn read_point<F>(file: &mut F, offset: u32) -> Result<Point>
where
    F: Read + Seek,
{
    file.seek(SeekFrom::Start(offset as u64))?;
    Point::read_from(file)
}

/// Reads `count` consecutive point records starting at an absolute offset.
pub(crate) fn read_points<F>(file: &mut F, offset: u32, count: u32) -> Result<Vec<Point>>
where
    F: Read + Seek,
{
    file.seek(SeekFrom::Start(offset as u64))?;
    let mut points = Vec::with_capacity(count as usize);
    for _ in 0..count {
        points.push(Point::read_from(file)?);
    }
    Ok(points)
}

/// Writes consecutive point records starting at an absolute offset.
fn write_records<F>(file: &mut F, offset: u32, points: &[Point]) -> Result<()>
where
    F: Write + Seek,
{
    file.seek(SeekFrom::Start(offset as u64))?;
    for point in points {
        point.write_to(file)?;
    }
    Ok(())
}

/// Maps a quantized timestamp to its absolute byte offset in the archive.
///
/// An archive that has never been written reports its starting offset: the
/// next write establishes the base. Timestamps behind the base step
/// backwards around the ring.
pub(crate) fn point_offset<F>(file: &mut F, archive: &ArchiveInfo, timestamp: u32) -> Result<u32>
where
    F: Read + Seek,
{
    let base = read_point(file, archive.offset)?;
    if base.timestamp == 0 {
        return Ok(archive.offset);
    }

    let distance = timestamp.wrapping_sub(base.timestamp);
    let slot = if distance <= u32::MAX / 2 {
        (distance / archive.seconds_per_point) % archive.points
    } else {
        let behind = base.timestamp.wrapping_sub(timestamp) / archive.seconds_per_point;
        (archive.points - behind % archive.points) % archive.points
    };

    Ok(archive.offset + slot * POINT_SIZE)
}

/// Writes a run of quantized points with ascending, contiguous timestamps
/// into the archive, splitting the run where it wraps past the ring end.
///
/// # Errors
///
/// Returns `Error::Capacity` when the run is longer than the ring.
pub(crate) fn write_points<F>(file: &mut F, archive: &ArchiveInfo, points: &[Point]) -> Result<()>
where
    F: Read + Write + Seek,
{
    if points.is_empty() {
        return Ok(());
    }
    if points.len() > archive.points as usize {
        return Err(Error::Capacity {
            capacity: archive.points,
            supplied: points.len(),
        });
    }

    let offset = point_offset(file, archive, points[0].timestamp)?;
    let capacity_to_end = ((archive.end() - offset) / POINT_SIZE) as usize;

    if points.len() <= capacity_to_end {
        write_records(file, offset, points)?;
    } else {
        write_records(file, offset, &points[..capacity_to_end])?;
        write_records(file, archive.offset, &points[capacity_to_end..])?;
    }

    Ok(())
}

/// Reads the records between two absolute offsets in ring order.
///
/// When `first < last` the span is one contiguous read; otherwise it wraps
/// past the ring end and is stitched from a tail read and a head read.
/// Equal offsets select the entire ring.
pub(crate) fn read_span<F>(
    file: &mut F,
    archive: &ArchiveInfo,
    first: u32,
    last: u32,
) -> Result<Vec<Point>>
where
    F: Read + Seek,
{
    if first < last {
        read_points(file, first, (last - first) / POINT_SIZE)
    } else {
        let tail = (archive.end() - first) / POINT_SIZE;
        let head = (last - archive.offset) / POINT_SIZE;
        let mut points = read_points(file, first, tail)?;
        points.extend(read_points(file, archive.offset, head)?);
        Ok(points)
    }
}
