// Dictionary-backed formatter
use crate::application::formatter::Formatter;
use crate::domain::time_range::parse_instant;
use crate::infrastructure::config::LocaleSettings;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt::Display;

pub struct LocaleFormatter<Tz: TimeZone = Local> {
    dictionary: HashMap<String, String>,
    timezone_label: Option<String>,
    zone: Tz,
}

impl LocaleFormatter<Local> {
    pub fn from_settings(settings: &LocaleSettings) -> Self {
        Self::new(
            settings.dictionary.clone(),
            settings.timezone_label.clone(),
            Local,
        )
    }
}

#[cfg(test)]
impl LocaleFormatter<Utc> {
    /// Untranslated formatter displaying UTC times
    pub fn utc() -> Self {
        Self::new(HashMap::new(), Some("UTC".to_string()), Utc)
    }
}

impl<Tz: TimeZone> LocaleFormatter<Tz> {
    pub fn new(dictionary: HashMap<String, String>, timezone_label: Option<String>, zone: Tz) -> Self {
        // Configuration sources may fold key case
        let dictionary = dictionary
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            dictionary,
            timezone_label,
            zone,
        }
    }

    fn lookup(&self, key: &str) -> Option<&String> {
        self.dictionary.get(&key.to_lowercase()).filter(|v| !v.is_empty())
    }
}

impl<Tz> Formatter for LocaleFormatter<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Display + Send + Sync,
{
    fn translate(&self, key: &str) -> String {
        self.lookup(key).cloned().unwrap_or_else(|| key.to_string())
    }

    fn timezone_name(&self) -> String {
        let name = match &self.timezone_label {
            Some(label) => label.clone(),
            None => Utc::now().with_timezone(&self.zone).format("UTC%:z").to_string(),
        };
        self.translate(&name)
    }

    fn format_instant(&self, instant: DateTime<Utc>) -> String {
        let local = instant.with_timezone(&self.zone);
        let month = self.translate(&local.format("%b").to_string());
        format!("{} {} {}", local.format("%d"), month, local.format("%Y"))
    }

    fn format_phenomenon_time(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw.filter(|r| !r.is_empty()) else {
            return self.translate("N.D.");
        };

        let dates: Result<Vec<String>, _> = raw
            .split('/')
            .map(|token| parse_instant(token).map(|instant| self.format_instant(instant)))
            .collect();

        dates.map(|d| d.join(" - ")).unwrap_or_else(|e| {
            tracing::debug!("Cannot format phenomenon time: {}", e);
            raw.to_string()
        })
    }

    fn format_range_compact(&self, raw: &str) -> [String; 2] {
        let mut out = [String::new(), String::new()];
        for (slot, token) in out.iter_mut().zip(raw.split('/').filter(|t| !t.is_empty())) {
            if let Ok(instant) = parse_instant(token) {
                *slot = instant
                    .with_timezone(&self.zone)
                    .format("%d/%m/%Y %H:%M:%S")
                    .to_string();
            }
        }
        out
    }

    fn format_compact_date(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.zone).format("%Y%m%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn italian() -> LocaleFormatter<Utc> {
        let dictionary = HashMap::from([
            ("Value".to_string(), "Valore".to_string()),
            ("N.D.".to_string(), "N.D.".to_string()),
            ("Jan".to_string(), "gen".to_string()),
            ("UTC".to_string(), "Tempo universale".to_string()),
        ]);
        LocaleFormatter::new(dictionary, Some("UTC".to_string()), Utc)
    }

    fn instant(raw: &str) -> DateTime<Utc> {
        parse_instant(raw).unwrap()
    }

    #[test]
    fn test_translate() {
        let f = italian();
        assert_eq!(f.translate("Value"), "Valore");
        assert_eq!(f.translate("value"), "Valore");
        assert_eq!(f.translate("Sensor"), "Sensor");
        assert_eq!(f.timezone_name(), "Tempo universale");
    }

    #[test]
    fn test_format_phenomenon_time() {
        let f = italian();
        assert_eq!(
            f.format_phenomenon_time(Some("2024-01-05T10:00:00Z/2024-02-01T00:00:00Z")),
            "05 gen 2024 - 01 Feb 2024"
        );
        assert_eq!(f.format_phenomenon_time(None), "N.D.");
        assert_eq!(f.format_phenomenon_time(Some("garbage")), "garbage");
    }

    #[test]
    fn test_format_range_compact() {
        let f = LocaleFormatter::utc();
        assert_eq!(
            f.format_range_compact("2024-01-05T10:20:30Z"),
            ["05/01/2024 10:20:30".to_string(), String::new()]
        );
        assert_eq!(f.format_range_compact(""), [String::new(), String::new()]);
    }

    #[test]
    fn test_compact_date_uses_zone() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let f = LocaleFormatter::new(HashMap::new(), None, zone);
        assert_eq!(f.format_compact_date(instant("2024-12-31T23:30:00Z")), "20250101");
        assert_eq!(f.timezone_name(), "UTC+01:00");
    }
}
