//! Downsampling of one archive interval into the next coarser archive.

use crate::db::ring;
use crate::error::Result;
use crate::format::{AggregationMethod, ArchiveInfo, Point, POINT_SIZE};
use std::io::{Read, Seek, Write};
use tracing::trace;

/// Aggregates the higher-resolution points covering one lower-resolution
/// interval and writes the aggregate into the lower archive.
///
/// A higher-resolution slot belongs to the interval only while its stored
/// timestamp matches the interval position; anything else is an unknown
/// slot. Returns `false` when no slot is known or the known fraction falls
/// short of the x-files-factor, in which case nothing is written and
/// propagation down the archive chain should stop.
pub(crate) fn propagate<F>(
    file: &mut F,
    timestamp: u32,
    higher: &ArchiveInfo,
    lower: &ArchiveInfo,
    x_files_factor: f32,
    method: AggregationMethod,
) -> Result<bool>
where
    F: Read + Write + Seek,
{
    let interval_start = timestamp - (timestamp % lower.seconds_per_point);

    let first = ring::point_offset(file, higher, interval_start)?;

    // Higher-resolution slots covering one lower-resolution interval.
    let slots = lower.seconds_per_point / higher.seconds_per_point;

    let relative_first = first - higher.offset;
    let relative_last = (relative_first + slots * POINT_SIZE) % higher.size();
    let last = higher.offset + relative_last;

    let candidates = ring::read_span(file, higher, first, last)?;

    let mut known = Vec::with_capacity(candidates.len());
    for (i, point) in candidates.iter().enumerate() {
        let expected =
            interval_start.wrapping_add((i as u32).wrapping_mul(higher.seconds_per_point));
        if point.timestamp == expected {
            known.push(*point);
        }
    }

    if known.is_empty() || (known.len() as f32 / slots as f32) < x_files_factor {
        trace!(
            interval_start,
            known = known.len(),
            slots,
            "coverage below x-files-factor, propagation stops"
        );
        return Ok(false);
    }

    let aggregate = Point::new(interval_start, method.aggregate(&known));
    ring::write_points(file, lower, &[aggregate])?;

    Ok(true)
}
