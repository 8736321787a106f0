// Export service - Observations of a date range as a CSV document
use crate::application::formatter::Formatter;
use crate::application::request::{RequestClient, RequestOptions};
use crate::application::series_builder::observations_url;
use crate::domain::error::{Error, Result};
use crate::domain::export::ExportFieldMap;
use crate::domain::stream::StreamRecord;
use crate::domain::time_range::TimeRange;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub file_name: String,
    pub body: String,
    pub rows: usize,
}

#[derive(Clone)]
pub struct CsvExporter {
    client: RequestClient,
    formatter: Arc<dyn Formatter>,
    delimiter: u8,
}

impl CsvExporter {
    pub fn new(client: RequestClient, formatter: Arc<dyn Formatter>, delimiter: u8) -> Self {
        Self {
            client,
            formatter,
            delimiter,
        }
    }

    pub async fn export(&self, record: &StreamRecord, range: &TimeRange, fields: &ExportFieldMap) -> Result<CsvExport> {
        let link = record
            .observations_link
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::RequestFailed("missing observations link".to_string()))?;

        let url = observations_url(link, &range.to_query_params());
        tracing::debug!("Exporting observations: {}", url);

        let rows = match self.client.request(&url, &RequestOptions::collection()).await? {
            Value::Array(rows) => rows,
            _ => return Err(Error::MalformedResponse("expected a list of observations".to_string())),
        };

        if rows.is_empty() {
            return Err(Error::NoObservations(self.date_range_label(range)));
        }

        let body = render_csv(&rows, fields, self.delimiter)?;
        tracing::debug!("Rendered {} observations of {}", rows.len(), record.name);

        Ok(CsvExport {
            file_name: self.file_name(record, range),
            body,
            rows: rows.len(),
        })
    }

    pub fn date_range_label(&self, range: &TimeRange) -> String {
        format!(
            "{} - {}",
            self.formatter.format_instant(range.start()),
            self.formatter.format_instant(range.end())
        )
    }

    /// `<stream-name>_<YYYYMMDD>_<YYYYMMDD>.csv`
    pub fn file_name(&self, record: &StreamRecord, range: &TimeRange) -> String {
        let name = if record.name.trim().is_empty() {
            self.formatter.translate("Observations")
        } else {
            record.name.clone()
        };
        let name: String = name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();

        format!(
            "{}_{}_{}.csv",
            name,
            self.formatter.format_compact_date(range.start()),
            self.formatter.format_compact_date(range.end())
        )
    }
}

pub fn render_csv(rows: &[Value], fields: &ExportFieldMap, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let csv_error = |e: csv::Error| Error::MalformedResponse(e.to_string());

    writer.write_record(fields.labels()).map_err(csv_error)?;
    for row in rows {
        writer.write_record(fields.extract(row)).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::request::testing::FakeTransport;
    use crate::infrastructure::locale::LocaleFormatter;
    use serde_json::json;

    const OBSERVATIONS: &str = "http://h/v1.1/Datastreams(1)/Observations";

    fn range() -> TimeRange {
        TimeRange::parse("2024-03-01T00:00:00.000Z/2024-03-02T23:59:59.999Z")
    }

    fn url() -> String {
        observations_url(OBSERVATIONS, &range().to_query_params())
    }

    fn record() -> StreamRecord {
        serde_json::from_value(json!({
            "name": "Air  temperature",
            "Observations@iot.navigationLink": OBSERVATIONS,
        }))
        .unwrap()
    }

    fn fields() -> ExportFieldMap {
        let mut fields = ExportFieldMap::new();
        fields.push("Observation date", "phenomenonTime", None);
        fields.push("Value", "result", None);
        fields
    }

    fn exporter(fake: FakeTransport, delimiter: u8) -> CsvExporter {
        let (_, client) = fake.into_client();
        CsvExporter::new(client, Arc::new(LocaleFormatter::utc()), delimiter)
    }

    #[tokio::test]
    async fn test_export_csv() {
        let exporter = exporter(
            FakeTransport::new().with(
                &url(),
                json!({ "value": [
                    { "phenomenonTime": "2024-03-02T10:00:00Z", "result": 12.5 },
                    { "phenomenonTime": "2024-03-01T10:00:00Z", "result": "a;b" }
                ]}),
            ),
            b';',
        );

        let export = exporter.export(&record(), &range(), &fields()).await.unwrap();
        assert_eq!(export.rows, 2);
        assert_eq!(export.file_name, "Air--temperature_20240301_20240302.csv");
        assert_eq!(
            export.body,
            "Observation date;Value\n2024-03-02T10:00:00Z;12.5\n2024-03-01T10:00:00Z;\"a;b\"\n"
        );
    }

    #[tokio::test]
    async fn test_export_without_observations() {
        let exporter = exporter(FakeTransport::new().with(&url(), json!({ "value": [] })), b',');

        let result = exporter.export(&record(), &range(), &fields()).await;
        assert_eq!(
            result,
            Err(Error::NoObservations("01 Mar 2024 - 02 Mar 2024".to_string()))
        );
    }

    #[tokio::test]
    async fn test_export_malformed_payload() {
        let exporter = exporter(FakeTransport::new().with(&url(), json!({ "value": { "oops": 1 } })), b',');

        let result = exporter.export(&record(), &range(), &fields()).await;
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_default_file_name() {
        let exporter = exporter(FakeTransport::new(), b',');
        let name = exporter.file_name(&StreamRecord::default(), &range());
        assert_eq!(name, "Observations_20240301_20240302.csv");
    }
}
