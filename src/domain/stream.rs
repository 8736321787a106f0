// Datastream / MultiDatastream domain model
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Read an explicit JSON `null` the same as a missing field
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Whether a stream carries one value per observation or a tuple of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamKind {
    #[default]
    Single,
    Multi,
}

impl StreamKind {
    pub fn from_multi_flag(multi: bool) -> Self {
        if multi { Self::Multi } else { Self::Single }
    }

    pub fn is_multi(self) -> bool {
        self == Self::Multi
    }

    /// Navigation link on the parent Thing pointing at its streams
    pub fn collection_link_field(self) -> &'static str {
        match self {
            Self::Single => "Datastreams@iot.navigationLink",
            Self::Multi => "MultiDatastreams@iot.navigationLink",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOfMeasurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit paired by position, set on multi-valued streams
    #[serde(rename = "unitSymbol", default, skip_serializing_if = "Option::is_none")]
    pub unit_symbol: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObservedProperty {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// `observedProperty` holds one entry for a Datastream and a list for a
/// MultiDatastream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservedProperties {
    Many(Vec<ObservedProperty>),
    One(ObservedProperty),
}

impl Default for ObservedProperties {
    fn default() -> Self {
        Self::One(ObservedProperty::default())
    }
}

impl ObservedProperties {
    pub fn empty_for(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Single => Self::One(ObservedProperty::default()),
            StreamKind::Multi => Self::Many(Vec::new()),
        }
    }

    pub fn as_slice(&self) -> &[ObservedProperty] {
        match self {
            Self::Many(props) => props,
            Self::One(prop) => std::slice::from_ref(prop),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SensorData {
    pub fn unknown() -> Self {
        Self {
            name: "???".to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "phenomenonTime", default)]
    pub phenomenon_time: Option<String>,
    #[serde(rename = "observedProperty", default, deserialize_with = "null_as_default")]
    pub observed_property: ObservedProperties,
    #[serde(rename = "unitOfMeasurement", default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<UnitOfMeasurement>,
    #[serde(
        rename = "unitOfMeasurements",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub units_of_measurement: Vec<UnitOfMeasurement>,
    #[serde(rename = "Sensor@iot.navigationLink", default, skip_serializing_if = "Option::is_none")]
    pub sensor_link: Option<String>,
    #[serde(
        rename = "ObservedProperty@iot.navigationLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_property_link: Option<String>,
    #[serde(
        rename = "ObservedProperties@iot.navigationLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_properties_link: Option<String>,
    #[serde(
        rename = "Observations@iot.navigationLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observations_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(rename = "sensorData", default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<SensorData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamRecord {
    pub fn property_link(&self, kind: StreamKind) -> Option<&str> {
        match kind {
            StreamKind::Single => self.observed_property_link.as_deref(),
            StreamKind::Multi => self.observed_properties_link.as_deref(),
        }
    }

    /// Reference to a sibling stream whose interval backfills a missing
    /// `phenomenonTime`
    pub fn aggregate_for(&self) -> Option<String> {
        let value = self.properties.as_ref()?.get("aggregateFor")?;
        let reference = match value {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (!reference.is_empty()).then_some(reference)
    }

    pub fn has_phenomenon_time(&self) -> bool {
        self.phenomenon_time.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Attach each unit symbol onto the observed property at the same
    /// position; extra entries on either side are left alone.
    pub fn attach_unit_symbols(&mut self) {
        if let ObservedProperties::Many(props) = &mut self.observed_property {
            for (prop, unit) in props.iter_mut().zip(&self.units_of_measurement) {
                prop.unit_symbol = Some(unit.symbol.clone().unwrap_or_default());
            }
        }
    }

    pub fn single_unit_symbol(&self) -> &str {
        self.unit_of_measurement
            .as_ref()
            .and_then(|u| u.symbol.as_deref())
            .unwrap_or_default()
    }

    /// Text shown in the "Observed property" column of the streams table
    pub fn observed_property_label(&self, kind: StreamKind) -> String {
        match kind {
            StreamKind::Multi => self
                .observed_property
                .as_slice()
                .iter()
                .filter_map(|p| {
                    p.unit_symbol
                        .as_ref()
                        .map(|smb| format!("- {} ({})", p.display_name(), smb))
                })
                .collect::<Vec<_>>()
                .join("\n"),
            StreamKind::Single => {
                let name = self
                    .observed_property
                    .as_slice()
                    .first()
                    .map(ObservedProperty::display_name)
                    .unwrap_or_default();
                format!("{} - {}", name, self.single_unit_symbol())
            }
        }
    }
}
