// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and parsing.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp as an HTTP date (`Mon, 02 Jan 2006 15:04:05 GMT`).
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a duration in the `24h` / `90m` / `1h30m` / `45s` style.
///
/// Units: `h`, `m`, `s`, `ms`. A bare number is rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    let mut rest = raw;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .filter(|&idx| idx > 0)?;
        let value: i64 = rest[..digits_end].parse().ok()?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_end] {
            "h" => Duration::try_hours(value)?,
            "m" => Duration::try_minutes(value)?,
            "s" => Duration::try_seconds(value)?,
            "ms" => Duration::try_milliseconds(value)?,
            _ => return None,
        };
        total = total.checked_add(&part)?;
        rest = &rest[unit_end..];
    }

    Some(total)
}

/// Which end of a date range a query parameter describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parse a date filter given either as RFC3339 or as a bare `YYYY-MM-DD` day.
///
/// A bare day used as the end of a range covers the whole day, down to its
/// last nanosecond.
pub fn parse_date_bound(raw: &str, bound: RangeBound) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let moment = match bound {
        RangeBound::Start => day.and_hms_opt(0, 0, 0)?,
        RangeBound::End => day.and_hms_nano_opt(23, 59, 59, 999_999_999)?,
    };
    Some(moment.and_utc())
}
