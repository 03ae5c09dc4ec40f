//! Publish-date resolution for RSS items.
//!
//! Feeds in the wild disagree on how `<pubDate>` is written, so a date string
//! is tried against an ordered list of layouts:
//!
//! | # | Format | Example |
//! |---|--------|---------|
//! | 1 | RFC 1123 | `Mon, 02 Jan 2006 15:04:05 MST` |
//! | 2 | RFC 1123 (numeric zone) | `Mon, 02 Jan 2006 15:04:05 -0700` |
//! | 3 | RFC 3339 | `2006-01-02T15:04:05Z` |
//! | 4 | RFC 3339 (fractional) | `2006-01-02T15:04:05.999999999+07:00` |
//! | 5 | RFC 822 | `02 Jan 06 15:04 MST` |
//! | 6 | RFC 822 (numeric zone) | `02 Jan 06 15:04 -0700` |
//! | 7 | RFC 850 | `Monday, 02-Jan-06 15:04:05 MST` |
//!
//! The first layout that parses wins. A string no layout accepts resolves to
//! `None`; that is never an error.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// One accepted `<pubDate>` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Rfc1123,
    Rfc1123Z,
    Rfc3339,
    Rfc3339Nano,
    Rfc822,
    Rfc822Z,
    Rfc850,
}

/// Layouts in resolution order.
pub const ACCEPTED_FORMATS: [DateFormat; 7] = [
    DateFormat::Rfc1123,
    DateFormat::Rfc1123Z,
    DateFormat::Rfc3339,
    DateFormat::Rfc3339Nano,
    DateFormat::Rfc822,
    DateFormat::Rfc822Z,
    DateFormat::Rfc850,
];

const SHORT_WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const LONG_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

impl DateFormat {
    /// Parse `s` with this layout only.
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc1123 => {
                let rest = strip_weekday(s, &SHORT_WEEKDAYS)?;
                parse_with_zone_name(rest, "%d %b %Y %H:%M:%S")
            }
            DateFormat::Rfc1123Z => {
                let rest = strip_weekday(s, &SHORT_WEEKDAYS)?;
                parse_with_numeric_zone(rest, "%d %b %Y %H:%M:%S %z")
            }
            DateFormat::Rfc3339 => {
                if s.contains('.') {
                    return None;
                }
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            DateFormat::Rfc3339Nano => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::Rfc822 => parse_with_zone_name(s, "%d %b %y %H:%M"),
            DateFormat::Rfc822Z => parse_with_numeric_zone(s, "%d %b %y %H:%M %z"),
            DateFormat::Rfc850 => {
                let rest = strip_weekday(s, &LONG_WEEKDAYS)?;
                parse_with_zone_name(rest, "%d-%b-%y %H:%M:%S")
            }
        }
    }
}

/// Find the first accepted layout that parses `raw`.
///
/// Later layouts are never consulted once one has matched, so an ambiguous
/// string always resolves the same way.
pub fn match_format(raw: &str) -> Option<(DateFormat, DateTime<Utc>)> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| format.parse(s).map(|dt| (*format, dt)))
}

/// Resolve a raw `<pubDate>` string to a UTC timestamp, or `None`.
pub fn resolve(raw: &str) -> Option<DateTime<Utc>> {
    match_format(raw).map(|(_, dt)| dt)
}

// Day names are checked for spelling only, never against the date itself.
fn strip_weekday<'a>(s: &'a str, names: &[&str]) -> Option<&'a str> {
    let (day, rest) = s.split_once(", ")?;
    names.contains(&day).then_some(rest)
}

fn parse_with_numeric_zone(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, fmt)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_with_zone_name(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    let (local, zone) = s.rsplit_once(' ')?;
    let offset = FixedOffset::east_opt(zone_offset_seconds(zone)?)?;
    let naive = NaiveDateTime::parse_from_str(local, fmt).ok()?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset in seconds east of UTC for a zone abbreviation.
///
/// Unknown abbreviations are read as UTC; anything that is not a short run
/// of capital letters is rejected so numeric zones fall through to the
/// numeric-zone layouts.
fn zone_offset_seconds(zone: &str) -> Option<i32> {
    if !(1..=5).contains(&zone.len()) || !zone.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let hours = match zone {
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => 0,
    };
    Some(hours * 3600)
}
