// reqwest-backed transport for the SensorThings service
use crate::application::request::Transport;
use crate::domain::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        tracing::debug!("Request url: {}", url);

        let response = self
            .client
            .get(url.trim())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RequestFailed(format!("HTTP status code: {} {}", status, body)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::RequestFailed(format!("failed to parse response: {}", e)))
    }
}
