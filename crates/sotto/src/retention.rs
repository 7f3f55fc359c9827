//! Parsing of retention specification strings.
//!
//! A specification is `"<precision>:<retention>"`, e.g. `"10s:2w"` for one
//! point every ten seconds kept for two weeks. Each side is a number with an
//! optional unit suffix (`s`, `m`, `h`, `d`, `w`, `y`). A bare number on the
//! right is a point count rather than a duration.

use crate::error::{Error, Result};
use crate::format::ArchiveInfo;

/// Parses a retention specification into an archive descriptor.
///
/// The returned descriptor has no offset assigned;
/// [`Database::create`](crate::Database::create) lays the archives out in
/// the file.
///
/// # Errors
///
/// Returns `Error::ParseRetention` on malformed input.
pub fn parse_retention(spec: &str) -> Result<ArchiveInfo> {
    let bad = || Error::ParseRetention(spec.to_string());

    let (precision, retention) = spec.split_once(':').ok_or_else(bad)?;

    let (value, unit) = split_unit(precision).ok_or_else(bad)?;
    let seconds_per_point = match unit {
        Some(unit) => value
            .checked_mul(unit_seconds(unit).ok_or_else(bad)?)
            .ok_or_else(bad)?,
        None => value,
    };
    if seconds_per_point == 0 {
        return Err(bad());
    }

    let (value, unit) = split_unit(retention).ok_or_else(bad)?;
    let points = match unit {
        Some(unit) => {
            let seconds = value
                .checked_mul(unit_seconds(unit).ok_or_else(bad)?)
                .ok_or_else(bad)?;
            seconds / seconds_per_point
        }
        None => value,
    };

    Ok(ArchiveInfo::new(seconds_per_point, points))
}

/// Splits a field into its leading number and optional one-character unit.
fn split_unit(field: &str) -> Option<(u32, Option<char>)> {
    let digits_end = field
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(field.len());
    let value: u32 = field[..digits_end].parse().ok()?;

    let mut rest = field[digits_end..].chars();
    match (rest.next(), rest.next()) {
        (None, _) => Some((value, None)),
        (Some(unit), None) => Some((value, Some(unit))),
        _ => None,
    }
}

fn unit_seconds(unit: char) -> Option<u32> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        'w' => Some(60 * 60 * 24 * 7),
        'y' => Some(60 * 60 * 24 * 365),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_units() {
        let archive = parse_retention("10s:2w").unwrap();
        assert_eq!(archive.offset, 0);
        assert_eq!(archive.seconds_per_point, 10);
        assert_eq!(archive.points, 120_960);

        let archive = parse_retention("1m:1d").unwrap();
        assert_eq!(archive.seconds_per_point, 60);
        assert_eq!(archive.points, 1440);

        let archive = parse_retention("1h:1y").unwrap();
        assert_eq!(archive.seconds_per_point, 3600);
        assert_eq!(archive.points, 8760);
    }

    #[test]
    fn test_bare_numbers() {
        // A bare right side is a point count, not a duration.
        let archive = parse_retention("15s:8").unwrap();
        assert_eq!(archive.seconds_per_point, 15);
        assert_eq!(archive.points, 8);

        let archive = parse_retention("60:1440").unwrap();
        assert_eq!(archive.seconds_per_point, 60);
        assert_eq!(archive.points, 1440);
    }

    #[test]
    fn test_malformed_specs() {
        for spec in ["", "10s", "10s2w", ":1d", "s:1d", "10s:", "10s:w", "10q:1d", "10s:2x", "0s:1d", "10ss:1d"] {
            let err = parse_retention(spec).unwrap_err();
            assert!(
                matches!(err, Error::ParseRetention(_)),
                "expected parse error for {spec:?}"
            );
        }
    }
}
