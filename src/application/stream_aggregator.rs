// Stream aggregator - Fetches a stream collection and enriches every row
use crate::application::request::{RequestClient, RequestOptions};
use crate::domain::error::{Error, Result};
use crate::domain::stream::{ObservedProperties, SensorData, StreamKind, StreamRecord};
use crate::domain::time_range::TimeRange;
use futures::future::join_all;
use serde_json::Value;
use url::Url;

#[derive(Clone)]
pub struct StreamAggregator {
    client: RequestClient,
}

/// One independent enrichment request for a row
#[derive(Debug, Clone)]
enum SubFetch {
    Sensor(Option<String>),
    Properties(Option<String>, StreamKind),
    AggregateFor(String),
}

#[derive(Debug, Clone)]
enum Enrichment {
    Sensor(SensorData),
    Properties(ObservedProperties),
    PhenomenonTime(Option<String>),
}

impl SubFetch {
    fn fallback(&self) -> Enrichment {
        match self {
            Self::Sensor(_) => Enrichment::Sensor(SensorData::unknown()),
            Self::Properties(_, kind) => Enrichment::Properties(ObservedProperties::empty_for(*kind)),
            Self::AggregateFor(_) => Enrichment::PhenomenonTime(None),
        }
    }

    /// Never fails: errors are logged and replaced by the fallback value
    async fn run(self, client: RequestClient) -> Enrichment {
        let fallback = self.fallback();
        match self.fetch(&client).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                match &self {
                    Self::Sensor(_) => tracing::warn!("Sensor load data error: {}", e),
                    Self::Properties(..) => tracing::warn!("Observed property load data error: {}", e),
                    Self::AggregateFor(_) => tracing::warn!("Aggregation for property load data error: {}", e),
                }
                fallback
            }
        }
    }

    async fn fetch(&self, client: &RequestClient) -> Result<Enrichment> {
        match self {
            Self::Sensor(link) => {
                let body = client.request(required(link)?, &RequestOptions::default()).await?;
                Ok(Enrichment::Sensor(decode(body)?))
            }
            Self::Properties(link, _) => {
                let body = client.request(required(link)?, &RequestOptions::collection()).await?;
                Ok(Enrichment::Properties(decode(body)?))
            }
            Self::AggregateFor(url) => {
                let body = client.request(url, &RequestOptions::default()).await?;
                let time = body
                    .get("phenomenonTime")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(Enrichment::PhenomenonTime(time))
            }
        }
    }
}

impl Enrichment {
    fn apply_to(self, row: &mut StreamRecord) {
        match self {
            Self::Sensor(sensor) => row.sensor_data = Some(sensor),
            Self::Properties(props) => row.observed_property = props,
            Self::PhenomenonTime(Some(time)) => row.phenomenon_time = Some(time),
            Self::PhenomenonTime(None) => {}
        }
    }
}

impl StreamAggregator {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }

    /// Fetch a Thing and aggregate the streams behind its navigation link
    pub async fn streams_for_thing(&self, thing_url: &str, kind: StreamKind) -> Result<Vec<StreamRecord>> {
        let thing = self
            .client
            .request(thing_url, &RequestOptions::default())
            .await
            .map_err(|e| Error::CollectionFetchFailed(e.to_string()))?;

        let link = thing.get(kind.collection_link_field()).and_then(Value::as_str);
        self.aggregate(link, kind).await
    }

    /// Fetch the stream collection at `link` and enrich every row. Resolves
    /// only after every sub-fetch of every row has settled.
    pub async fn aggregate(&self, link: Option<&str>, kind: StreamKind) -> Result<Vec<StreamRecord>> {
        let Some(collection_url) = link.filter(|l| !l.is_empty()) else {
            tracing::debug!("No streams navigation link, nothing to aggregate");
            return Ok(Vec::new());
        };

        let payload = self
            .client
            .request(collection_url, &RequestOptions::collection())
            .await
            .map_err(|e| Error::CollectionFetchFailed(e.to_string()))?;
        let mut rows = decode_rows(payload)?;

        let mut targets = Vec::new();
        let mut handles = Vec::new();
        for (index, row) in rows.iter_mut().enumerate() {
            for job in sub_fetches(collection_url, row, kind) {
                targets.push((index, job.fallback()));
                handles.push(tokio::spawn(job.run(self.client.clone())));
            }
        }

        tracing::debug!(
            "Enriching {} streams from {} with {} sub-fetches",
            rows.len(),
            collection_url,
            handles.len()
        );

        let outcomes = join_all(handles).await;
        for ((index, fallback), outcome) in targets.into_iter().zip(outcomes) {
            let enrichment = outcome.unwrap_or_else(|e| {
                tracing::error!("Enrichment task for stream {} did not complete: {}", index, e);
                fallback
            });
            enrichment.apply_to(&mut rows[index]);
        }

        if kind.is_multi() {
            rows.iter_mut().for_each(StreamRecord::attach_unit_symbols);
        }

        Ok(rows)
    }
}

fn sub_fetches(collection_url: &str, row: &mut StreamRecord, kind: StreamKind) -> Vec<SubFetch> {
    let mut jobs = vec![
        SubFetch::Sensor(row.sensor_link.clone()),
        SubFetch::Properties(row.property_link(kind).map(str::to_string), kind),
    ];

    if let Some(reference) = row.aggregate_for() {
        if !row.has_phenomenon_time() {
            if let Some(range) = literal_interval(&reference) {
                row.phenomenon_time = Some(range.to_string());
            } else {
                match resolve_aggregate_url(collection_url, &reference) {
                    Ok(url) => jobs.push(SubFetch::AggregateFor(url)),
                    Err(e) => tracing::warn!("Cannot resolve aggregation reference {}: {}", reference, e),
                }
            }
        }
    }

    jobs
}

fn literal_interval(reference: &str) -> Option<TimeRange> {
    if !reference.contains('/') {
        return None;
    }
    TimeRange::try_parse(reference).ok()
}

/// Absolute links are used as-is; a relative path replaces the last path
/// segment of the collection URL.
fn resolve_aggregate_url(collection_url: &str, reference: &str) -> Result<String> {
    if reference.starts_with("http") {
        return Ok(reference.to_string());
    }

    let mut url = Url::parse(collection_url).map_err(|e| Error::RequestFailed(e.to_string()))?;
    let mut segments: Vec<&str> = url.path().trim_end_matches('/').split('/').collect();
    segments.pop();

    let separator = if reference.starts_with('/') { "" } else { "/" };
    let path = format!("{}{}{}", segments.join("/"), separator, reference);
    url.set_path(&path);
    Ok(url.to_string())
}

fn required(link: &Option<String>) -> Result<&str> {
    link.as_deref()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::RequestFailed("missing navigation link".to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::MalformedResponse(e.to_string()))
}

fn decode_rows(payload: Value) -> Result<Vec<StreamRecord>> {
    let rows = match payload {
        Value::Array(rows) => rows,
        Value::Null => return Ok(Vec::new()),
        _ => return Err(Error::CollectionFetchFailed("stream collection is not a list".to_string())),
    };

    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed stream row: {}", e);
                None
            }
        })
        .collect())
}
