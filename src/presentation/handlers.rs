// HTTP request handlers
use crate::application::series_builder::{SeriesView, build_export_fields};
use crate::domain::chart::Chart;
use crate::domain::error::Error;
use crate::domain::stream::{StreamKind, StreamRecord};
use crate::domain::time_range::{TimeRange, parse_instant};
use crate::infrastructure::config::thing_url;
use crate::infrastructure::http_response::{accepts_brotli, csv_response};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct StreamsQuery {
    #[serde(default)]
    pub multi: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRow {
    #[serde(flatten)]
    pub record: StreamRecord,
    pub phenomenon_time_label: String,
    pub observed_property_label: String,
    /// Observations can only be requested for streams with a phenomenon time
    pub has_observations: bool,
}

#[derive(Debug, Serialize)]
pub struct StreamTable {
    pub columns: Vec<String>,
    pub rows: Vec<StreamRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationsRequest {
    pub stream: StreamRecord,
    #[serde(default)]
    pub multi: bool,
    /// `YYYY-MM-DD`
    pub start: Option<String>,
    pub end: Option<String>,
    pub anchor: Option<String>,
    pub delta_days: Option<i64>,
}

impl ObservationsRequest {
    pub fn kind(&self) -> StreamKind {
        StreamKind::from_multi_flag(self.multi)
    }

    /// Explicit dates are bounded by the stream's phenomenon time; without
    /// them the range is `delta_days` around the anchor (default: the last
    /// phenomenon day).
    pub fn filter_range(&self) -> Result<TimeRange, Error> {
        let phenomenon = TimeRange::parse(self.stream.phenomenon_time.as_deref().unwrap_or_default());

        let range = match (self.start.as_deref(), self.end.as_deref()) {
            (Some(start), Some(end)) => {
                let bounds = phenomenon.normalize();
                let start = bounds.clamp(parse_date(start)?);
                let end = bounds.clamp(parse_date(end)?);
                TimeRange::filter_range(start, end)
            }
            _ => {
                let anchor = match self.anchor.as_deref() {
                    Some(raw) => parse_instant(raw)?,
                    None => phenomenon.end(),
                };
                TimeRange::with_delta(anchor, self.delta_days.unwrap_or(0))
            }
        };

        if !range.is_valid() {
            return Err(Error::MalformedTimeString(format!("start after end in {}", range)));
        }
        Ok(range)
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| Error::MalformedTimeString(format!("{}: {}", raw, e)))
}

#[derive(Deserialize)]
pub struct ViewportRequest {
    pub from: String,
    pub to: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Enriched streams of a Thing
pub async fn list_streams(
    Path(thing_id): Path<String>,
    Query(query): Query<StreamsQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<StreamTable> {
    let kind = StreamKind::from_multi_flag(query.multi);
    let url = thing_url(&state.base_url, &thing_id);

    let records = match state.stream_aggregator.streams_for_thing(&url, kind).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Error fetching streams of thing {}: {}", thing_id, e);
            // Render an empty table on error
            Vec::new()
        }
    };

    let f = state.formatter.as_ref();
    let columns = ["Name", "Description", "Ref. dates", "Observed property", "Sensor", "Observations"]
        .iter()
        .map(|key| f.translate(key))
        .collect();

    let rows = records
        .into_iter()
        .map(|record| StreamRow {
            phenomenon_time_label: f.format_phenomenon_time(record.phenomenon_time.as_deref()),
            observed_property_label: record.observed_property_label(kind),
            has_observations: record.has_phenomenon_time(),
            record,
        })
        .collect();

    Json(StreamTable { columns, rows })
}

/// Observations of one stream over the requested range
pub async fn load_observations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ObservationsRequest>,
) -> Result<Json<SeriesView>, (StatusCode, String)> {
    let range = request
        .filter_range()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let view = state
        .series_builder
        .build(&request.stream, &range, request.kind())
        .await;
    Ok(Json(view))
}

/// Chart currently on display
pub async fn show_chart(State(state): State<Arc<AppState>>) -> Result<Json<Chart>, StatusCode> {
    state.series_builder.current_chart().await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Zoom the displayed chart to an x-window
pub async fn set_viewport(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewportRequest>,
) -> Result<Json<Chart>, (StatusCode, String)> {
    state
        .series_builder
        .zoom(request.from, request.to)
        .await
        .map(Json)
        .ok_or((StatusCode::CONFLICT, "no chart displayed".to_string()))
}

/// CSV download of the observations over the requested range
pub async fn export_observations(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ObservationsRequest>,
) -> Response {
    let range = match request.filter_range() {
        Ok(range) => range,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let fields = build_export_fields(&request.stream, request.kind(), state.formatter.as_ref());
    match state.exporter.export(&request.stream, &range, &fields).await {
        Ok(export) => {
            tracing::info!("Sending {} observations as {}", export.rows, export.file_name);
            match csv_response(export.body, &export.file_name, accepts_brotli(&headers)).await {
                Ok(response) => response,
                Err(status) => status.into_response(),
            }
        }
        Err(e @ Error::NoObservations(_)) => {
            tracing::warn!("{}", e);
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Error exporting observations of {}: {}", request.stream.name, e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}
