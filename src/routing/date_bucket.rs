//! Date bucketing for content routing
//!
//! `bucket = (year * 12 + month) / months_per_bucket` with `month` in
//! `1..=12` and truncating integer division. This is the placement that
//! date-sharded indices were historically built with, so it must not be
//! "corrected" to a ceiling.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::{AclShardError, Result};

/// Parse an ISO-8601 timestamp or date into `(year, month)`
///
/// Accepted forms: RFC 3339 (`2014-05-15T10:20:30Z`, with offset or
/// fractional seconds), naive date-time (`2014-05-15T10:20:30`) and plain
/// date (`2014-05-15`).
pub fn parse_year_month(value: &str) -> Result<(i32, u32)> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok((dt.year(), dt.month()));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok((dt.year(), dt.month()));
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => Ok((date.year(), date.month())),
        Err(e) => Err(AclShardError::Parse {
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Bucket index of a month at the given granularity
pub fn month_bucket(year: i32, month: u32, months_per_bucket: u32) -> i64 {
    let months = year as i64 * 12 + month as i64;
    months.div_euclid(months_per_bucket as i64)
}

/// Shard owning a bucket
pub fn bucket_shard(bucket: i64, shard_count: u32) -> u32 {
    bucket.rem_euclid(shard_count as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse_year_month("2014-05-15").unwrap(), (2014, 5));
        assert_eq!(parse_year_month("2014-05-15T10:20:30Z").unwrap(), (2014, 5));
        assert_eq!(parse_year_month("2014-05-15T10:20:30.123+02:00").unwrap(), (2014, 5));
        assert_eq!(parse_year_month("2014-12-31T23:59:59").unwrap(), (2014, 12));
        assert_eq!(parse_year_month(" 2020-01-01 ").unwrap(), (2020, 1));
    }

    #[test]
    fn test_parse_failures() {
        for bad in ["", "yesterday", "2014-13-01", "2014-02-30", "15/05/2014"] {
            match parse_year_month(bad) {
                Err(AclShardError::Parse { value, .. }) => assert_eq!(value, bad),
                other => panic!("expected parse error for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_quarter_bucket_truncates() {
        // 2014 * 12 + 5 = 24173, 24173 / 3 = 8057 (truncated)
        assert_eq!(month_bucket(2014, 5, 3), 8057);
        assert_eq!(bucket_shard(8057, 4), 1);
    }

    #[test]
    fn test_month_bucket_boundaries() {
        // With g = 3 the buckets are (Mar, Apr, May), (Jun, Jul, Aug), ...
        assert_eq!(month_bucket(2014, 3, 3), month_bucket(2014, 5, 3));
        assert_ne!(month_bucket(2014, 5, 3), month_bucket(2014, 6, 3));
        // g = 1 gives one bucket per month
        assert_eq!(month_bucket(2014, 5, 1) + 1, month_bucket(2014, 6, 1));
        assert_eq!(month_bucket(2014, 12, 1) + 1, month_bucket(2015, 1, 1));
    }

    #[test]
    fn test_negative_buckets_stay_in_range() {
        let bucket = month_bucket(-1, 1, 3);
        assert!(bucket < 0);
        assert!(bucket_shard(bucket, 5) < 5);
    }
}
