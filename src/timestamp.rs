// src/timestamp.rs

//! CVS-epoch timestamps and committer-line formatting.
//!
//! Commit dates arrive as unsigned offsets from the RCS epoch
//! (1972-01-01T00:00:00Z), which keeps them in 32 bits well past 2100.
//! Committer lines need `<unix-seconds> <+/-HHMM>` in the author's own
//! timezone; zones are resolved through the embedded tz database, with a
//! numeric-offset fallback, so formatting stays a pure function.

use chrono::{FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Seconds between the Unix epoch and the RCS epoch (1972-01-01T00:00:00Z).
pub const RCS_EPOCH: i64 = 63_072_000;

/// A commit or file-revision date: seconds since the RCS epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct CvsTime(pub u32);

impl CvsTime {
    /// Convert from Unix seconds; `None` if the instant predates the RCS
    /// epoch or overflows the 32-bit range.
    pub fn from_unix(secs: i64) -> Option<CvsTime> {
        u32::try_from(secs.checked_sub(RCS_EPOCH)?).ok().map(CvsTime)
    }

    pub fn to_unix(self) -> i64 {
        RCS_EPOCH + i64::from(self.0)
    }
}

impl fmt::Display for CvsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_unix())
    }
}

/// Format a committer timestamp: Unix seconds followed by the numeric UTC
/// offset of `zone` at that instant. Unknown zones fall back to UTC.
pub fn committer_timestamp(unix: i64, zone: &str) -> String {
    format!("{} {}", unix, offset_suffix(resolve_offset(unix, zone)))
}

/// RFC-3339 rendering, used only in diagnostics.
pub fn rfc3339(unix: i64) -> String {
    match Utc.timestamp_opt(unix, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => format!("@{}", unix),
    }
}

fn resolve_offset(unix: i64, zone: &str) -> FixedOffset {
    if let Ok(tz) = zone.parse::<Tz>() {
        if let Some(dt) = Utc.timestamp_opt(unix, 0).single() {
            return tz.offset_from_utc_datetime(&dt.naive_utc()).fix();
        }
    }
    numeric_offset(zone).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// Parse a `+HHMM` / `-HHMM` style offset.
fn numeric_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn offset_suffix(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.abs();
    format!("{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvs_time_round_trip() {
        let t = CvsTime::from_unix(RCS_EPOCH + 12345).unwrap();
        assert_eq!(t.0, 12345);
        assert_eq!(t.to_unix(), RCS_EPOCH + 12345);
    }

    #[test]
    fn test_pre_epoch_rejected() {
        assert!(CvsTime::from_unix(RCS_EPOCH - 1).is_none());
        assert!(CvsTime::from_unix(0).is_none());
    }

    #[test]
    fn test_committer_timestamp_utc() {
        assert_eq!(committer_timestamp(0, "UTC"), "0 +0000");
        assert_eq!(committer_timestamp(1_000_000, "UTC"), "1000000 +0000");
    }

    #[test]
    fn test_committer_timestamp_named_zone() {
        // 2001-09-09T01:46:40Z, inside Berlin daylight saving.
        let dst_instant = 1_000_000_000;
        assert_eq!(committer_timestamp(dst_instant, "Europe/Berlin"), "1000000000 +0200");
        // Deep winter instant: 2001-01-01T00:00:00Z.
        assert_eq!(committer_timestamp(978_307_200, "Europe/Berlin"), "978307200 +0100");
    }

    #[test]
    fn test_committer_timestamp_numeric_offset() {
        assert_eq!(committer_timestamp(100, "+0530"), "100 +0530");
        assert_eq!(committer_timestamp(100, "-0130"), "100 -0130");
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc() {
        assert_eq!(committer_timestamp(100, "Mars/Olympus"), "100 +0000");
        assert_eq!(committer_timestamp(100, "+9999"), "100 +0000");
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00+00:00");
    }
}
