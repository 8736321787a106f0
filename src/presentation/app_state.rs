// Application state for HTTP handlers
use crate::application::export_service::CsvExporter;
use crate::application::formatter::Formatter;
use crate::application::series_builder::SeriesBuilder;
use crate::application::stream_aggregator::StreamAggregator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub base_url: String,
    pub formatter: Arc<dyn Formatter>,
    pub stream_aggregator: StreamAggregator,
    pub series_builder: SeriesBuilder,
    pub exporter: CsvExporter,
}
