// Observation rows as delivered by the service
use crate::domain::stream::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    #[serde(rename = "phenomenonTime", default, deserialize_with = "null_as_default")]
    pub phenomenon_time: String,
    #[serde(default)]
    pub result: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObservationRecord {
    #[cfg(test)]
    pub fn new(phenomenon_time: impl Into<String>, result: Value) -> Self {
        Self {
            phenomenon_time: phenomenon_time.into(),
            result,
            extra: Map::new(),
        }
    }

    /// Result value at a tuple position; `None` when the result is not a
    /// tuple or is too short
    pub fn result_at(&self, index: usize) -> Option<&Value> {
        self.result.as_array().and_then(|values| values.get(index))
    }
}

/// Decode an observation list, dropping rows that do not have the expected
/// shape.
pub fn decode_observations(payload: Value) -> Vec<ObservationRecord> {
    let Value::Array(rows) = payload else {
        if !payload.is_null() {
            tracing::warn!("Observation payload is not a list, ignoring it");
        }
        return Vec::new();
    };

    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed observation: {}", e);
                None
            }
        })
        .collect()
}

/// Render a scalar the way it appears in tables, category labels and CSV
/// cells
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
