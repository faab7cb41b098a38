// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and day boundaries.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};

/// Last year whose RFC3339 form has four digits. Later years are written as
/// `+10000-...` and no longer sort after earlier timestamps.
pub const MAX_STORED_YEAR: i32 = 9999;

/// Whether `date` formats as a four-digit-year RFC3339 string.
pub fn is_storable_date(date: NaiveDate) -> bool {
    (0..=MAX_STORED_YEAR).contains(&date.year())
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
///
/// Second precision keeps stored strings lexicographically ordered.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp with millisecond precision, e.g. `2025-03-01T09:30:00.000Z`.
pub fn format_utc_millis(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC3339 timestamp into UTC.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
