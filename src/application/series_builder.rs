// Series builder - Observations of one stream as chart series and table rows
use crate::application::formatter::Formatter;
use crate::application::request::{RequestClient, RequestOptions};
use crate::domain::chart::{Chart, ChartConfig, ChartHandle, Series, SeriesPoint, ValueAxis};
use crate::domain::export::ExportFieldMap;
use crate::domain::observation::{ObservationRecord, decode_observations, scalar_text};
use crate::domain::stream::{ObservedProperty, StreamKind, StreamRecord};
use crate::domain::time_range::TimeRange;
use crate::infrastructure::config::ChartSettings;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything needed to render the observations of a stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesView {
    pub query: String,
    pub filter_time: TimeRange,
    pub columns: Vec<String>,
    pub observations: Vec<ObservationRecord>,
    /// Compact start/end labels, one pair per observation
    pub time_labels: Vec<[String; 2]>,
    pub chart: Chart,
    pub export_fields: ExportFieldMap,
}

#[derive(Clone)]
pub struct SeriesBuilder {
    client: RequestClient,
    formatter: Arc<dyn Formatter>,
    chart_settings: ChartSettings,
    chart: Arc<Mutex<ChartHandle>>,
}

impl SeriesBuilder {
    pub fn new(client: RequestClient, formatter: Arc<dyn Formatter>, chart_settings: ChartSettings) -> Self {
        Self {
            client,
            formatter,
            chart_settings,
            chart: Arc::new(Mutex::new(ChartHandle::default())),
        }
    }

    /// Fetch the observations of `record` over `range` and apply them to the
    /// current chart. Fetch failures render as an empty chart.
    pub async fn build(&self, record: &StreamRecord, range: &TimeRange, kind: StreamKind) -> SeriesView {
        let query = range.to_query_params();
        let observations = self.fetch_observations(record, &query).await;
        let properties = properties_of(record, kind);

        let config = ChartConfig {
            value_axis: classify(&observations, kind, properties.len()),
            legend: kind.is_multi(),
        };
        let datasets = self.build_series(&observations, record, kind);

        // Last writer wins when fetches overlap
        let chart = self.chart.lock().await.apply(config, datasets);

        let time_labels = observations
            .iter()
            .map(|o| self.formatter.format_range_compact(&o.phenomenon_time))
            .collect();

        SeriesView {
            query,
            filter_time: *range,
            columns: self.columns(record, kind),
            observations,
            time_labels,
            chart,
            export_fields: build_export_fields(record, kind, self.formatter.as_ref()),
        }
    }

    pub async fn zoom(&self, from: String, to: String) -> Option<Chart> {
        self.chart.lock().await.zoom(from, to).cloned()
    }

    pub async fn current_chart(&self) -> Option<Chart> {
        self.chart.lock().await.chart().cloned()
    }

    async fn fetch_observations(&self, record: &StreamRecord, query: &str) -> Vec<ObservationRecord> {
        let Some(link) = record.observations_link.as_deref().filter(|l| !l.is_empty()) else {
            tracing::warn!("Stream {} has no observations link", record.name);
            return Vec::new();
        };

        let url = observations_url(link, query);
        tracing::debug!("Fetching observations: {}", url);
        match self.client.request(&url, &RequestOptions::collection()).await {
            Ok(payload) => decode_observations(payload),
            Err(e) => {
                tracing::warn!("Observations load data error for {}: {}", record.name, e);
                Vec::new()
            }
        }
    }

    fn build_series(&self, observations: &[ObservationRecord], record: &StreamRecord, kind: StreamKind) -> Vec<Series> {
        match kind {
            StreamKind::Single => {
                let points = observations
                    .iter()
                    .map(|o| SeriesPoint::new(o.phenomenon_time.clone(), o.result.clone()))
                    .collect();
                vec![Series::new(None, None, self.chart_settings.line_color.clone(), points)]
            }
            StreamKind::Multi => properties_of(record, kind)
                .iter()
                .enumerate()
                .map(|(index, prop)| {
                    let points = observations
                        .iter()
                        .map(|o| {
                            let y = o.result_at(index).cloned().unwrap_or(Value::Null);
                            SeriesPoint::new(o.phenomenon_time.clone(), y)
                        })
                        .collect();
                    Series::new(
                        Some(prop.display_name().to_string()),
                        prop.unit_symbol.clone(),
                        self.chart_settings.color_at(index),
                        points,
                    )
                    .filled()
                })
                .collect(),
        }
    }

    fn columns(&self, record: &StreamRecord, kind: StreamKind) -> Vec<String> {
        let tz = self.formatter.timezone_name();
        let mut columns = vec![
            format!("{} ({})", self.formatter.translate("Start time"), tz),
            format!("{} ({})", self.formatter.translate("End time"), tz),
        ];

        match kind {
            StreamKind::Single => columns.push(format!(
                "{} ({})",
                self.formatter.translate("Value"),
                record.single_unit_symbol()
            )),
            StreamKind::Multi => columns.extend(properties_of(record, kind).iter().map(|p| {
                format!("{} ({})", p.display_name(), p.unit_symbol.as_deref().unwrap_or_default())
            })),
        }

        columns
    }
}

/// Observed properties that get their own series; single streams have none
fn properties_of(record: &StreamRecord, kind: StreamKind) -> &[ObservedProperty] {
    match kind {
        StreamKind::Multi => record.observed_property.as_slice(),
        StreamKind::Single => &[],
    }
}

pub fn observations_url(link: &str, query: &str) -> String {
    let separator = if link.contains('?') { '&' } else { '?' };
    format!("{}{}{}", link, separator, query)
}

/// Linear axis unless any result fails the numeric test, in which case
/// every distinct value becomes a category, in first-seen order.
pub fn classify(observations: &[ObservationRecord], kind: StreamKind, property_count: usize) -> ValueAxis {
    let values: Vec<Option<&Value>> = match kind {
        StreamKind::Single => observations.iter().map(|o| Some(&o.result)).collect(),
        StreamKind::Multi => (0..property_count)
            .flat_map(|index| observations.iter().map(move |o| o.result_at(index)))
            .collect(),
    };

    if values.iter().all(|v| v.is_some_and(is_numeric)) {
        return ValueAxis::Linear;
    }

    // Distinct by value, so `1` and `"1"` stay separate categories
    let mut distinct: Vec<Option<&Value>> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    let labels = distinct
        .into_iter()
        .map(|v| v.map(scalar_text).unwrap_or_default())
        .collect();
    ValueAxis::Category { labels }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Null | Value::Bool(_) => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s.parse::<f64>().is_ok_and(|f| !f.is_nan())
        }
        Value::Array(_) | Value::Object(_) => false,
    }
}

pub fn build_export_fields(record: &StreamRecord, kind: StreamKind, formatter: &dyn Formatter) -> ExportFieldMap {
    let mut fields = ExportFieldMap::new();
    fields.push(formatter.translate("Observation date"), "phenomenonTime", None);

    match kind {
        StreamKind::Single => fields.push(formatter.translate("Value"), "result", None),
        StreamKind::Multi => {
            for (index, prop) in properties_of(record, kind).iter().enumerate() {
                fields.push(prop.display_name(), "result", Some(index));
            }
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::request::testing::FakeTransport;
    use crate::infrastructure::locale::LocaleFormatter;
    use serde_json::json;

    const OBSERVATIONS: &str = "http://h/v1.1/Datastreams(1)/Observations";

    fn range() -> TimeRange {
        TimeRange::parse("2024-01-01T00:00:00.000Z/2024-01-01T23:59:59.999Z")
    }

    fn observations_url_for_range() -> String {
        observations_url(OBSERVATIONS, &range().to_query_params())
    }

    fn builder(fake: FakeTransport) -> (Arc<FakeTransport>, SeriesBuilder) {
        let (fake, client) = fake.into_client();
        let formatter = Arc::new(LocaleFormatter::utc());
        let settings = ChartSettings {
            line_color: "#32CD32".to_string(),
            line_colors: vec!["#FF0000".to_string(), "#0000FF".to_string()],
        };
        (fake, SeriesBuilder::new(client, formatter, settings))
    }

    fn single_stream() -> StreamRecord {
        serde_json::from_value(json!({
            "name": "temperature",
            "unitOfMeasurement": { "symbol": "°C" },
            "Observations@iot.navigationLink": OBSERVATIONS,
        }))
        .unwrap()
    }

    fn multi_stream() -> StreamRecord {
        serde_json::from_value(json!({
            "name": "wind",
            "observedProperty": [
                { "name": "speed", "unitSymbol": "m/s" },
                { "name": "direction", "unitSymbol": "deg" }
            ],
            "Observations@iot.navigationLink": OBSERVATIONS,
        }))
        .unwrap()
    }

    fn obs(results: Vec<Value>) -> Vec<ObservationRecord> {
        results
            .into_iter()
            .enumerate()
            .map(|(i, r)| ObservationRecord::new(format!("2024-01-01T0{}:00:00Z", i), r))
            .collect()
    }

    #[test]
    fn test_classify_categorical() {
        let axis = classify(&obs(vec![json!(1), json!(2), json!("N/A")]), StreamKind::Single, 0);
        assert_eq!(
            axis,
            ValueAxis::Category {
                labels: vec!["1".to_string(), "2".to_string(), "N/A".to_string()]
            }
        );
    }

    #[test]
    fn test_classify_keeps_number_and_string_apart() {
        let axis = classify(&obs(vec![json!(1), json!("1"), json!("N/A"), json!(1)]), StreamKind::Single, 0);
        assert_eq!(
            axis,
            ValueAxis::Category {
                labels: vec!["1".to_string(), "1".to_string(), "N/A".to_string()]
            }
        );
    }

    #[test]
    fn test_classify_infinite_strings_are_numeric() {
        assert_eq!(classify(&obs(vec![json!("Infinity"), json!("-inf"), json!(2)]), StreamKind::Single, 0), ValueAxis::Linear);
        assert!(classify(&obs(vec![json!("NaN"), json!(2)]), StreamKind::Single, 0).is_category());
    }

    #[test]
    fn test_classify_numeric() {
        assert_eq!(classify(&obs(vec![json!(1), json!(2), json!(3)]), StreamKind::Single, 0), ValueAxis::Linear);
        assert_eq!(classify(&obs(vec![json!("1.5"), json!(null)]), StreamKind::Single, 0), ValueAxis::Linear);
        assert_eq!(classify(&[], StreamKind::Single, 0), ValueAxis::Linear);
    }

    #[test]
    fn test_classify_multi_flattens_and_dedups() {
        let observations = obs(vec![json!([1, "on"]), json!([2, "off"]), json!([1, "on"])]);
        assert_eq!(
            classify(&observations, StreamKind::Multi, 2),
            ValueAxis::Category {
                labels: vec!["1".to_string(), "2".to_string(), "on".to_string(), "off".to_string()]
            }
        );
    }

    #[test]
    fn test_classify_multi_short_tuple_is_categorical() {
        let observations = obs(vec![json!([1, 2]), json!([3])]);
        assert!(classify(&observations, StreamKind::Multi, 2).is_category());
    }

    #[tokio::test]
    async fn test_multi_stream_yields_series_per_property() {
        let (_, builder) = builder(FakeTransport::new().with(
            &observations_url_for_range(),
            json!({ "value": [
                { "phenomenonTime": "2024-01-01T02:00:00Z", "result": [5.5, 270] },
                { "phenomenonTime": "2024-01-01T01:00:00Z", "result": [4.0, 180] },
                { "phenomenonTime": "2024-01-01T00:00:00Z", "result": [3.1, 90] }
            ]}),
        ));

        let view = builder.build(&multi_stream(), &range(), StreamKind::Multi).await;

        assert_eq!(view.chart.datasets.len(), 2);
        assert!(view.chart.datasets.iter().all(|s| s.points.len() == 3));
        assert_eq!(view.chart.datasets[1].label.as_deref(), Some("direction"));
        assert_eq!(view.chart.datasets[1].unit_symbol.as_deref(), Some("deg"));
        assert_eq!(view.chart.datasets[1].points[0].y, json!(270));
        assert_eq!(view.chart.datasets[0].border_color, "#FF0000");
        assert!(view.chart.config.legend);
        assert_eq!(view.chart.config.value_axis, ValueAxis::Linear);

        let labels: Vec<&str> = view.export_fields.labels().collect();
        assert_eq!(labels, vec!["Observation date", "speed", "direction"]);
        assert_eq!(view.export_fields.columns()[2].source.index, Some(1));
        assert_eq!(view.columns[2], "speed (m/s)");
    }

    #[tokio::test]
    async fn test_single_stream_series_and_export_fields() {
        let (fake, builder) = builder(FakeTransport::new().with(
            &observations_url_for_range(),
            json!({ "value": [
                { "phenomenonTime": "2024-01-01T01:00:00Z", "result": 21.5 },
                { "phenomenonTime": "2024-01-01T00:00:00Z/2024-01-01T01:00:00Z", "result": 20.0 }
            ]}),
        ));

        let view = builder.build(&single_stream(), &range(), StreamKind::Single).await;

        assert_eq!(fake.calls(), vec![observations_url_for_range()]);
        assert_eq!(view.chart.datasets.len(), 1);
        assert_eq!(view.chart.datasets[0].points[1].x, "2024-01-01T00:00:00Z/2024-01-01T01:00:00Z");
        assert!(!view.chart.config.legend);
        assert_eq!(view.columns, vec!["Start time (UTC)", "End time (UTC)", "Value (°C)"]);
        assert_eq!(view.time_labels[1], ["01/01/2024 00:00:00".to_string(), "01/01/2024 01:00:00".to_string()]);

        let labels: Vec<&str> = view.export_fields.labels().collect();
        assert_eq!(labels, vec!["Observation date", "Value"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_renders_empty_chart() {
        let (_, builder) = builder(FakeTransport::new().failing(&observations_url_for_range(), "500"));

        let view = builder.build(&single_stream(), &range(), StreamKind::Single).await;
        assert!(view.observations.is_empty());
        assert_eq!(view.chart.datasets.len(), 1);
        assert!(view.chart.datasets[0].points.is_empty());
    }

    #[tokio::test]
    async fn test_chart_updated_in_place_across_fetches() {
        let (_, builder) = builder(FakeTransport::new().with(
            &observations_url_for_range(),
            json!({ "value": [{ "phenomenonTime": "2024-01-01T00:00:00Z", "result": 1 }] }),
        ));
        assert!(builder.current_chart().await.is_none());

        let first = builder.build(&single_stream(), &range(), StreamKind::Single).await;
        assert_eq!(first.chart.revision, 0);

        builder.zoom("2024-01-01T00:00:00Z".to_string(), "2024-01-01T06:00:00Z".to_string()).await;
        let second = builder.build(&single_stream(), &range(), StreamKind::Single).await;
        assert_eq!(second.chart.revision, 1);
        assert_eq!(second.chart.viewport, crate::domain::chart::Viewport::Default);
    }

    #[test]
    fn test_observations_url() {
        assert_eq!(observations_url("http://h/O", "$top=1"), "http://h/O?$top=1");
        assert_eq!(observations_url("http://h/O?$expand=x", "$top=1"), "http://h/O?$expand=x&$top=1");
    }
}
