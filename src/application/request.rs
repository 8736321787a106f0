// Awaitable requests over an injected transport
use crate::domain::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Network capability used by the fetch pipeline
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a URL and decode its JSON body
    async fn get_json(&self, url: &str) -> Result<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Envelope field holding the payload, e.g. `value` for collections
    pub data_src: Option<String>,
}

impl RequestOptions {
    pub fn collection() -> Self {
        Self::data_src("value")
    }

    pub fn data_src(field: impl Into<String>) -> Self {
        Self {
            data_src: Some(field.into()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RequestClient {
    transport: Option<Arc<dyn Transport>>,
}

impl RequestClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub async fn request(&self, url: &str, options: &RequestOptions) -> Result<Value> {
        let transport = self.transport.as_ref().ok_or(Error::AdapterUnavailable)?;
        let body = transport.get_json(url).await?;
        Ok(unwrap_envelope(body, options))
    }
}

/// Pick the payload out of the envelope; bodies without the field are
/// returned whole.
fn unwrap_envelope(body: Value, options: &RequestOptions) -> Value {
    let Some(field) = options.data_src.as_deref().map(str::trim).filter(|f| !f.is_empty()) else {
        return body;
    };

    match body {
        Value::Object(mut map) if map.contains_key(field) => map.remove(field).unwrap_or(Value::Null),
        other => other,
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory transport that serves canned bodies and records every URL
    #[derive(Default)]
    pub struct FakeTransport {
        responses: HashMap<String, std::result::Result<Value, String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, body: Value) -> Self {
            self.responses.insert(url.to_string(), Ok(body));
            self
        }

        pub fn failing(mut self, url: &str, reason: &str) -> Self {
            self.responses.insert(url.to_string(), Err(reason.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn into_client(self) -> (Arc<Self>, RequestClient) {
            let fake = Arc::new(self);
            (fake.clone(), RequestClient::new(fake))
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(reason)) => Err(Error::RequestFailed(reason.clone())),
                None => Err(Error::RequestFailed(format!("HTTP status code: 404 ({})", url))),
            }
        }
    }
}
