//! Freshness rule for scraped items.
//!
//! The listing only tells us how long ago an item was posted, in text such as
//! `"5 minutes ago"` or `"2 hours ago"`. This module turns that into an
//! absolute timestamp and decides whether the item is young enough to store.
//!
//! Parsing fails closed: any unit other than minutes or hours, or a count that
//! is not a non-negative integer, makes the item stale.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default freshness window in minutes.
pub const DEFAULT_WINDOW_MINUTES: i64 = 5;

static RELATIVE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s+([A-Za-z]+)\b").expect("static regex"));

/// Resolve a relative age like `"3 minutes ago"` against `now`.
///
/// Only the first two words are read, so a trailing `"ago"` is ignored.
/// Returns `None` for any other unit or an unparseable count.
pub fn parse_posted(posted_relative: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_TIME.captures(posted_relative)?;
    let value: i64 = caps[1].parse().ok()?;

    let offset = match caps[2].to_ascii_lowercase().as_str() {
        "minute" | "minutes" => Duration::try_minutes(value)?,
        "hour" | "hours" => Duration::try_hours(value)?,
        _ => return None,
    };

    now.checked_sub_signed(offset)
}

/// Whether an item posted `posted_relative` before `now` falls inside the window.
pub fn is_fresh(posted_relative: &str, now: DateTime<Utc>, window_minutes: i64) -> bool {
    match parse_posted(posted_relative, now) {
        Some(posted) => (now - posted).num_minutes() <= window_minutes,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_minutes_and_hours() {
        assert_eq!(
            parse_posted("3 minutes ago", now()),
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 11, 57, 0).unwrap())
        );
        assert_eq!(
            parse_posted("1 hour", now()),
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 11, 0, 0).unwrap())
        );
        assert_eq!(
            parse_posted("2 HOURS ago", now()),
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for text in [
            "2 days ago",
            "30 seconds ago",
            "minutes",
            "a few minutes ago",
            "-3 minutes",
            "3",
            "",
            "Unknown Time",
            "99999999999999999999 minutes",
        ] {
            assert_eq!(parse_posted(text, now()), None, "{text:?}");
        }
    }

    #[test]
    fn test_is_fresh_boundary() {
        assert!(is_fresh("0 minutes ago", now(), 5));
        assert!(is_fresh("5 minutes ago", now(), 5));
        assert!(!is_fresh("6 minutes ago", now(), 5));
        assert!(!is_fresh("1 hour ago", now(), 5));
        assert!(is_fresh("1 hour ago", now(), 60));
    }

    #[test]
    fn test_is_fresh_fails_closed() {
        assert!(!is_fresh("1 day ago", now(), 10_000));
        assert!(!is_fresh("garbage", now(), 10_000));
    }

    #[test]
    fn test_is_fresh_matches_elapsed_for_every_minute_count() {
        for minutes in 0..=120 {
            let text = format!("{minutes} minutes ago");
            assert_eq!(
                is_fresh(&text, now(), DEFAULT_WINDOW_MINUTES),
                minutes <= DEFAULT_WINDOW_MINUTES,
                "{text}"
            );
        }
    }
}
