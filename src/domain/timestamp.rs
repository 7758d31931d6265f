//! Second-precision UTC timestamps encoded into snapshot file names
//!
//! The `%Y-%m-%d_%H-%M-%S` encoding is zero-padded and most-significant
//! first, so lexicographic order of file names equals chronological order.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use std::fmt;
use std::time::SystemTime;

/// Format shared by snapshot file names, `last_seen` markers and archive names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTimestamp(DateTime<Utc>);

impl SnapshotTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.trunc_subsecs(0))
    }

    /// Filesystem modification times are converted as UTC
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_datetime(DateTime::<Utc>::from(time))
    }

    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map(|naive| Self(naive.and_utc()))
    }

    /// Decode `2024-01-01_00-00-00.json`; anything else is not a snapshot
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(SNAPSHOT_EXTENSION)?.strip_suffix('.')?;
        Self::parse(stem).ok()
    }

    pub fn file_name(&self) -> String {
        format!("{self}.{SNAPSHOT_EXTENSION}")
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

impl fmt::Display for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_file_name_encoding() {
        let ts = SnapshotTimestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(ts.file_name(), "2024-01-01_00-00-00.json");
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(SnapshotTimestamp::from_file_name("2024-01-01_00-00-00.json"), Some(ts));
    }

    #[test]
    fn test_non_snapshot_names_are_rejected() {
        assert_eq!(SnapshotTimestamp::from_file_name("last_seen"), None);
        assert_eq!(SnapshotTimestamp::from_file_name("2024-01-01_00-00-00.zip"), None);
        assert_eq!(SnapshotTimestamp::from_file_name("42.json"), None);
        assert_eq!(SnapshotTimestamp::from_file_name("2024-01-01_00-00-00json"), None);
    }

    #[test]
    fn test_subsecond_precision_is_dropped() {
        let precise = Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap();
        let ts = SnapshotTimestamp::from_datetime(precise);
        assert_eq!(ts.as_datetime().timestamp(), 1_700_000_000);
        assert_eq!(ts.as_datetime().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_marker_content_parses_with_trailing_newline() {
        let ts = SnapshotTimestamp::parse("2025-03-04_05-06-07\n").unwrap();
        assert_eq!(ts.to_string(), "2025-03-04_05-06-07");
    }

    proptest! {
        #[test]
        fn file_name_order_matches_chronological_order(a in 0i64..4_102_444_800, b in 0i64..4_102_444_800) {
            let ta = SnapshotTimestamp::from_datetime(Utc.timestamp_opt(a, 0).unwrap());
            let tb = SnapshotTimestamp::from_datetime(Utc.timestamp_opt(b, 0).unwrap());
            prop_assert_eq!(ta.file_name().cmp(&tb.file_name()), ta.cmp(&tb));
            prop_assert_eq!(SnapshotTimestamp::from_file_name(&ta.file_name()), Some(ta));
        }
    }
}
