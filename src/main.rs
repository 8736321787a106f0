// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::export_service::CsvExporter;
use crate::application::formatter::Formatter;
use crate::application::request::RequestClient;
use crate::application::series_builder::SeriesBuilder;
use crate::application::stream_aggregator::StreamAggregator;
use crate::infrastructure::config::load_service_config;
use crate::infrastructure::http_transport::HttpTransport;
use crate::infrastructure::locale::LocaleFormatter;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    export_observations, health_check, list_streams, load_observations, set_viewport, show_chart,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_service_config()?;

    // Create transport (infrastructure layer)
    let transport = HttpTransport::new(Duration::from_secs(config.service.request_timeout_secs))?;
    let client = RequestClient::new(Arc::new(transport));
    let formatter: Arc<dyn Formatter> = Arc::new(LocaleFormatter::from_settings(&config.locale));

    // Create services (application layer)
    let state = Arc::new(AppState {
        base_url: config.service.base_url.clone(),
        formatter: formatter.clone(),
        stream_aggregator: StreamAggregator::new(client.clone()),
        series_builder: SeriesBuilder::new(client.clone(), formatter.clone(), config.chart.clone()),
        exporter: CsvExporter::new(client, formatter, config.export.delimiter()),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/things/:id/streams", get(list_streams))
        .route("/observations", post(load_observations))
        .route("/observations/export", post(export_observations))
        .route("/chart", get(show_chart))
        .route("/chart/viewport", put(set_viewport))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.service.listen.parse()?;
    tracing::info!(
        "Starting sensorthings-observations on {} for {} (locale {})",
        addr,
        config.service.base_url,
        config.locale.code
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
