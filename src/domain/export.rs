// CSV export field definitions
use crate::domain::observation::scalar_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a CSV column takes its value from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportField {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportColumn {
    pub label: String,
    #[serde(flatten)]
    pub source: ExportField,
}

/// Ordered label → field mapping; column order is insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportFieldMap {
    columns: Vec<ExportColumn>,
}

impl ExportFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, field: impl Into<String>, index: Option<usize>) {
        self.columns.push(ExportColumn {
            label: label.into(),
            source: ExportField {
                field: field.into(),
                index,
            },
        });
    }

    pub fn columns(&self) -> &[ExportColumn] {
        &self.columns
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }

    /// Pull one CSV record out of a raw observation row. Missing fields and
    /// out-of-range indexes give empty cells.
    pub fn extract(&self, row: &Value) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                let value = row.get(&column.source.field);
                let value = match column.source.index {
                    Some(index) => value.and_then(|v| v.as_array()).and_then(|a| a.get(index)),
                    None => value,
                };
                value.map(scalar_text).unwrap_or_default()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn multi_map() -> ExportFieldMap {
        let mut map = ExportFieldMap::new();
        map.push("Observation date", "phenomenonTime", None);
        map.push("speed", "result", Some(0));
        map.push("direction", "result", Some(1));
        map
    }

    #[test]
    fn test_extract_by_index() {
        let row = json!({ "phenomenonTime": "2024-01-01T00:00:00Z", "result": [3.5, "NE"] });
        assert_eq!(multi_map().extract(&row), vec!["2024-01-01T00:00:00Z", "3.5", "NE"]);
    }

    #[test]
    fn test_extract_missing_values_are_empty() {
        let row = json!({ "phenomenonTime": "2024-01-01T00:00:00Z", "result": [3.5] });
        assert_eq!(multi_map().extract(&row), vec!["2024-01-01T00:00:00Z", "3.5", ""]);

        let row = json!({ "result": 7 });
        assert_eq!(multi_map().extract(&row), vec!["", "", ""]);
    }

    #[test]
    fn test_serialize_keeps_order() {
        let json = serde_json::to_value(multi_map()).unwrap();
        assert_eq!(json[0], json!({ "label": "Observation date", "field": "phenomenonTime" }));
        assert_eq!(json[2], json!({ "label": "direction", "field": "result", "index": 1 }));
    }
}
