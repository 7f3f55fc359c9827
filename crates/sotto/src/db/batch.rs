//! Pure transformations of the batch update pipeline.
//!
//! Partitioning, quantization, deduplication, and run-splitting are plain
//! functions over point slices. The only side effects in the batch path are
//! the final ring writes and the propagation calls, so the hard logic here
//! is testable without a file.

use crate::format::{ArchiveInfo, Point};

/// A batch bucket: the index of the destination archive and the points
/// assigned to it, in input order.
pub(crate) struct Bucket {
    pub archive_index: usize,
    pub points: Vec<Point>,
}

/// Partitions a batch by destination archive.
///
/// Walks the batch in input order with an archive pointer that starts at
/// the finest archive and only advances: a point whose age exceeds the
/// current archive's retention pushes the pointer towards coarser archives,
/// flushing the accumulated bucket for the archive being left. Points older
/// than every retention are dropped one by one. Ages are computed in
/// wrapping arithmetic, so future-dated samples age past every archive and
/// are dropped as well.
///
/// Returns the buckets in flush order and the number of dropped points.
pub(crate) fn partition(
    archives: &[ArchiveInfo],
    points: &[Point],
    now: u32,
) -> (Vec<Bucket>, usize) {
    let mut buckets = Vec::new();
    let mut current = Vec::new();
    let mut index = 0;
    let mut dropped = 0;

    if archives.is_empty() {
        return (buckets, points.len());
    }

    for point in points {
        let age = now.wrapping_sub(point.timestamp);

        while archives[index].retention() < age && index + 1 < archives.len() {
            if !current.is_empty() {
                buckets.push(Bucket {
                    archive_index: index,
                    points: std::mem::take(&mut current),
                });
            }
            index += 1;
        }

        if archives[index].retention() < age {
            dropped += 1;
            continue;
        }
        current.push(*point);
    }

    if !current.is_empty() {
        buckets.push(Bucket {
            archive_index: index,
            points: current,
        });
    }

    (buckets, dropped)
}

/// Quantizes every timestamp down to a multiple of `resolution`.
pub(crate) fn quantize(points: &[Point], resolution: u32) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point::new(p.timestamp - p.timestamp % resolution, p.value))
        .collect()
}

/// Sorts points newest-first by timestamp.
///
/// The sort is stable and runs before quantization, so among samples that
/// collapse onto one slot the newest raw sample is the one deduplication
/// keeps.
pub(crate) fn sort_newest_first(points: &mut [Point]) {
    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Drops consecutive points sharing a timestamp, keeping the first.
pub(crate) fn dedup_adjacent(points: &mut Vec<Point>) {
    points.dedup_by_key(|p| p.timestamp);
}

/// Splits a newest-first sequence of unique quantized timestamps into
/// ascending runs of consecutive points spaced exactly `step` apart.
pub(crate) fn split_runs(points: &[Point], step: u32) -> Vec<Vec<Point>> {
    let mut runs = Vec::new();
    let mut run: Vec<Point> = Vec::new();

    for point in points {
        if let Some(prev) = run.last() {
            if point.timestamp != prev.timestamp.wrapping_sub(step) {
                run.reverse();
                runs.push(std::mem::take(&mut run));
            }
        }
        run.push(*point);
    }
    if !run.is_empty() {
        run.reverse();
        runs.push(run);
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(seconds_per_point: u32, points: u32) -> ArchiveInfo {
        ArchiveInfo::new(seconds_per_point, points)
    }

    fn stamps(points: &[Point]) -> Vec<u32> {
        points.iter().map(|p| p.timestamp).collect()
    }

    #[test]
    fn test_partition_by_age() {
        let archives = [archive(10, 60), archive(60, 60)];
        let points = [
            Point::new(995, 1.0),
            Point::new(500, 2.0),
            Point::new(100, 3.0),
        ];

        let (buckets, dropped) = partition(&archives, &points, 1000);

        assert_eq!(dropped, 0);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].archive_index, 0);
        assert_eq!(stamps(&buckets[0].points), [995, 500]);
        assert_eq!(buckets[1].archive_index, 1);
        assert_eq!(stamps(&buckets[1].points), [100]);
    }

    #[test]
    fn test_partition_drops_points_older_than_every_archive() {
        let archives = [archive(10, 60), archive(60, 60)];
        let points = [
            Point::new(9990, 1.0),
            Point::new(100, 2.0),
            Point::new(9995, 3.0),
        ];

        let (buckets, dropped) = partition(&archives, &points, 10_000);

        // The ancient point goes away; the fresh point after it survives in
        // the archive the pointer has reached.
        assert_eq!(dropped, 1);
        assert_eq!(buckets.len(), 2);
        assert_eq!(stamps(&buckets[0].points), [9990]);
        assert_eq!(buckets[1].archive_index, 1);
        assert_eq!(stamps(&buckets[1].points), [9995]);
    }

    #[test]
    fn test_partition_drops_future_points() {
        let archives = [archive(10, 60)];
        let points = [Point::new(1100, 1.0), Point::new(995, 2.0)];

        let (buckets, dropped) = partition(&archives, &points, 1000);

        assert_eq!(dropped, 1);
        assert_eq!(buckets.len(), 1);
        assert_eq!(stamps(&buckets[0].points), [995]);
    }

    #[test]
    fn test_partition_age_equal_to_retention_stays() {
        let archives = [archive(10, 60), archive(60, 60)];
        let points = [Point::new(400, 1.0)];

        let (buckets, _) = partition(&archives, &points, 1000);
        assert_eq!(buckets[0].archive_index, 0);
    }

    #[test]
    fn test_quantize_rounds_down() {
        let quantized = quantize(&[Point::new(995, 1.0), Point::new(990, 2.0)], 10);
        assert_eq!(stamps(&quantized), [990, 990]);
        assert_eq!(quantized[0].value, 1.0);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut points = vec![
            Point::new(990, 1.0),
            Point::new(990, 2.0),
            Point::new(980, 3.0),
        ];
        dedup_adjacent(&mut points);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 1.0);
        assert_eq!(points[1].value, 3.0);
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let mut points = vec![
            Point::new(991, 1.0),
            Point::new(990, 2.0),
            Point::new(995, 3.0),
        ];
        sort_newest_first(&mut points);
        assert_eq!(stamps(&points), [995, 991, 990]);
    }

    #[test]
    fn test_split_runs() {
        let points = [
            Point::new(990, 1.0),
            Point::new(980, 2.0),
            Point::new(970, 3.0),
            Point::new(940, 4.0),
            Point::new(930, 5.0),
            Point::new(900, 6.0),
        ];

        let runs = split_runs(&points, 10);

        assert_eq!(runs.len(), 3);
        assert_eq!(stamps(&runs[0]), [970, 980, 990]);
        assert_eq!(stamps(&runs[1]), [930, 940]);
        assert_eq!(stamps(&runs[2]), [900]);
    }

    #[test]
    fn test_split_runs_empty() {
        assert!(split_runs(&[], 10).is_empty());
    }
}
