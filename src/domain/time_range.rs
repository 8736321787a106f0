// Phenomenon time range value type
use crate::domain::error::{Error, Result};
use chrono::{
    DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of the arithmetic day unit (60 * 60 * 24 * 1000 ms)
pub const DAY_MILLIS: i64 = 86_400_000;

/// `$top` value asking the service for every matching row in one page
pub const MAX_TOP: i32 = i32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Parse a `start/end` phenomenon time, or a single instant used for
    /// both ends. Malformed endpoints fall back to the current instant.
    pub fn parse(raw: &str) -> Self {
        let (first, second) = split_phenomenon_time(raw);
        Self::new(parse_instant_or_now(first), parse_instant_or_now(second))
    }

    /// Strict variant of [`TimeRange::parse`].
    pub fn try_parse(raw: &str) -> Result<Self> {
        let (first, second) = split_phenomenon_time(raw);
        Ok(Self::new(parse_instant(first)?, parse_instant(second)?))
    }

    /// Whole-day coverage in the local time zone.
    pub fn normalize(&self) -> Self {
        self.normalize_in(&Local)
    }

    /// Truncate `start` to 00:00:00.000 and extend `end` to 23:59:59.999 of
    /// their calendar days in `tz`.
    pub fn normalize_in<Tz: TimeZone>(&self, tz: &Tz) -> Self {
        let start_of_day = NaiveTime::MIN;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self::new(
            at_time_of_day(self.start, start_of_day, tz),
            at_time_of_day(self.end, end_of_day, tz),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Plain millisecond arithmetic; no calendar handling.
    pub fn increment_by_days(instant: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        Duration::try_milliseconds(days.saturating_mul(DAY_MILLIS))
            .and_then(|delta| instant.checked_add_signed(delta))
            .unwrap_or_else(|| {
                tracing::warn!("Day increment of {} out of range for {}", days, instant);
                instant
            })
    }

    /// Normalized range that always includes `anchor`; the sign of `days`
    /// picks the side the anchor bounds.
    pub fn with_delta(anchor: DateTime<Utc>, days: i64) -> Self {
        Self::with_delta_in(anchor, days, &Local)
    }

    pub fn with_delta_in<Tz: TimeZone>(anchor: DateTime<Utc>, days: i64, tz: &Tz) -> Self {
        let other = Self::increment_by_days(anchor, days);
        let range = if days < 0 {
            Self::new(other, anchor)
        } else {
            Self::new(anchor, other)
        };
        range.normalize_in(tz)
    }

    pub fn filter_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(start, end).normalize()
    }

    /// Bound an instant into this range.
    pub fn clamp(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        if instant < self.start {
            self.start
        } else if instant > self.end {
            self.end
        } else {
            instant
        }
    }

    pub fn to_query_params(&self) -> String {
        let filter = format!(
            "phenomenonTime ge {} and phenomenonTime le {}",
            format_iso(self.start),
            format_iso(self.end)
        );
        format!(
            "$top={}&$orderby=phenomenonTime+desc&$filter={}",
            MAX_TOP,
            urlencoding::encode(&filter)
        )
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_iso(self.start), format_iso(self.end))
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::try_parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a single instant. Values without an offset are read as UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| Error::MalformedTimeString(value.to_string()))
}

fn parse_instant_or_now(raw: &str) -> DateTime<Utc> {
    parse_instant(raw).unwrap_or_else(|e| {
        tracing::warn!("{}, falling back to current instant", e);
        Utc::now()
    })
}

fn split_phenomenon_time(raw: &str) -> (&str, &str) {
    let mut tokens = raw.split('/');
    let first = tokens.next().unwrap_or_default();
    let second = tokens.next().unwrap_or(first);
    (first, second)
}

fn at_time_of_day<Tz: TimeZone>(instant: DateTime<Utc>, time: NaiveTime, tz: &Tz) -> DateTime<Utc> {
    let day = instant.with_timezone(tz).date_naive();
    let naive = day.and_time(time);
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => {
            // Wall-clock time skipped by a DST transition
            tracing::warn!("Local time {} does not exist, using UTC", naive);
            naive.and_utc()
        }
    }
}
