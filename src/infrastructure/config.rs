use serde::Deserialize;
use std::collections::HashMap;

const DEFAULT_LINE_COLOR: &str = "#32CD32";

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service: ServiceSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub chart: ChartSettings,
    #[serde(default)]
    pub locale: LocaleSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    /// SensorThings root, e.g. `https://host/FROST-Server/v1.1`
    pub base_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportSettings {
    #[serde(default = "default_delimiter")]
    pub field_delimiter: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            field_delimiter: default_delimiter(),
        }
    }
}

impl ExportSettings {
    /// First non-blank character of the configured delimiter, `,` otherwise
    pub fn delimiter(&self) -> u8 {
        match self.field_delimiter.trim().chars().next() {
            Some(c) if c.is_ascii() => c as u8,
            Some(c) => {
                tracing::warn!("Unsupported CSV delimiter {:?}, using ','", c);
                b','
            }
            None => b',',
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChartSettings {
    #[serde(default = "default_line_color")]
    pub line_color: String,
    #[serde(default)]
    pub line_colors: Vec<String>,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            line_color: default_line_color(),
            line_colors: Vec::new(),
        }
    }
}

impl ChartSettings {
    /// Colour of the n-th series of a multi-valued stream
    pub fn color_at(&self, index: usize) -> String {
        if self.line_colors.is_empty() {
            return DEFAULT_LINE_COLOR.to_string();
        }
        self.line_colors[index % self.line_colors.len()].clone()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocaleSettings {
    #[serde(default = "default_locale")]
    pub code: String,
    /// Label shown next to times; defaults to the local UTC offset
    #[serde(default)]
    pub timezone_label: Option<String>,
    #[serde(default)]
    pub dictionary: HashMap<String, String>,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            code: default_locale(),
            timezone_label: None,
            dictionary: HashMap::new(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_line_color() -> String {
    DEFAULT_LINE_COLOR.to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

pub fn load_service_config() -> anyhow::Result<ServiceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sensorthings"))
        .add_source(config::Environment::with_prefix("SENSORTHINGS").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// URL of a Thing entity under the service root
pub fn thing_url(base_url: &str, thing_id: &str) -> String {
    let id = if thing_id.parse::<i64>().is_ok() || thing_id.starts_with('\'') {
        thing_id.to_string()
    } else {
        format!("'{}'", thing_id)
    };
    format!("{}/Things({})", base_url.trim_end_matches('/'), id)
}
