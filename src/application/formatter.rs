// Formatter port - Translation and locale-aware date rendering
use chrono::{DateTime, Utc};

pub trait Formatter: Send + Sync {
    /// Dictionary lookup; unknown keys translate to themselves
    fn translate(&self, key: &str) -> String;

    /// Translated name of the display time zone
    fn timezone_name(&self) -> String;

    /// Calendar date, e.g. `05 Jan 2024`
    fn format_instant(&self, instant: DateTime<Utc>) -> String;

    /// Phenomenon time as `date - date`, `N.D.` when absent
    fn format_phenomenon_time(&self, raw: Option<&str>) -> String;

    /// Start and end as compact date-times; the end is empty for a single
    /// instant
    fn format_range_compact(&self, raw: &str) -> [String; 2];

    /// `YYYYMMDD`, used in export file names
    fn format_compact_date(&self, instant: DateTime<Utc>) -> String;
}
