use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty duration string")]
    EmptyDuration,

    #[error("invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("invalid numeric value: {0}")]
    InvalidNumber(String),

    #[error("invalid time '{0}': expected a relative duration like '10m' or an RFC 3339 timestamp")]
    InvalidInstant(String),

    #[error("window start {start} is after window end {end}")]
    InvertedWindow { start: i64, end: i64 },
}

/// Parse a duration of the form `<n><unit>` where unit is one of
/// `ms`, `s`, `m`, `h` or `d`.
pub fn parse_relative_duration(s: &str) -> Result<Duration, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::EmptyDuration);
    }

    let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
        (v, "ms")
    } else if let Some(v) = s.strip_suffix('s') {
        (v, "s")
    } else if let Some(v) = s.strip_suffix('m') {
        (v, "m")
    } else if let Some(v) = s.strip_suffix('h') {
        (v, "h")
    } else if let Some(v) = s.strip_suffix('d') {
        (v, "d")
    } else {
        return Err(ParseError::InvalidDuration(s.to_string()));
    };

    let value: u64 = value_str
        .parse()
        .map_err(|_| ParseError::InvalidNumber(value_str.to_string()))?;

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| ParseError::InvalidDuration(s.to_string()))
    };

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        _ => secs(86_400),
    }
}

/// Format a duration back into the shortest `<n><unit>` form.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_millis() != 0 || secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Resolve a time expression to epoch milliseconds.
///
/// Accepts `now`, a relative duration meaning "this long before `now`"
/// (`10m`, `2h`), or an RFC 3339 timestamp.
pub fn parse_instant(s: &str, now: DateTime<Utc>) -> Result<i64, ParseError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now.timestamp_millis());
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc).timestamp_millis());
    }

    let ago = parse_relative_duration(s).map_err(|_| ParseError::InvalidInstant(s.to_string()))?;
    let ago = chrono::Duration::from_std(ago).map_err(|_| ParseError::InvalidInstant(s.to_string()))?;

    now.checked_sub_signed(ago)
        .map(|t| t.timestamp_millis())
        .ok_or_else(|| ParseError::InvalidInstant(s.to_string()))
}

/// A `[start, end)` window resolved against a fixed reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn resolve(start: &str, end: &str, now: DateTime<Utc>) -> Result<Self, ParseError> {
        let start = parse_instant(start, now)?;
        let end = parse_instant(end, now)?;

        if start > end {
            return Err(ParseError::InvertedWindow { start, end });
        }

        Ok(Self { start, end })
    }
}
