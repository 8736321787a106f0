// Chart domain models
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: String,
    pub y: Value,
}

impl SeriesPoint {
    pub fn new(x: String, y: Value) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub label: Option<String>,
    pub unit_symbol: Option<String>,
    pub border_color: String,
    pub background_color: Option<String>,
    pub fill: bool,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(label: Option<String>, unit_symbol: Option<String>, color: String, points: Vec<SeriesPoint>) -> Self {
        Self {
            label,
            unit_symbol,
            border_color: color,
            background_color: None,
            fill: false,
            points,
        }
    }

    /// Fill the area under the line with a translucent copy of the line colour
    pub fn filled(mut self) -> Self {
        self.background_color = Some(format!("{}30", self.border_color));
        self.fill = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValueAxis {
    Linear,
    Category { labels: Vec<String> },
}

impl ValueAxis {
    pub fn is_category(&self) -> bool {
        matches!(self, Self::Category { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub value_axis: ValueAxis,
    pub legend: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Viewport {
    #[default]
    Default,
    Window { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub config: ChartConfig,
    pub datasets: Vec<Series>,
    pub viewport: Viewport,
    pub revision: u64,
}

impl Chart {
    pub fn new(config: ChartConfig, datasets: Vec<Series>) -> Self {
        Self {
            config,
            datasets,
            viewport: Viewport::Default,
            revision: 0,
        }
    }

    pub fn update(&mut self, datasets: Vec<Series>, legend: bool) {
        self.datasets = datasets;
        self.config.legend = legend;
        self.revision += 1;
    }

    pub fn zoom(&mut self, from: String, to: String) {
        self.viewport = Viewport::Window { from, to };
    }

    pub fn reset_zoom(&mut self) {
        self.viewport = Viewport::Default;
    }
}

/// The currently displayed chart. Once initialized it stays initialized.
#[derive(Debug, Clone, Default)]
pub enum ChartHandle {
    #[default]
    Uninitialized,
    Initialized(Chart),
}

impl ChartHandle {
    pub fn chart(&self) -> Option<&Chart> {
        match self {
            Self::Initialized(chart) => Some(chart),
            Self::Uninitialized => None,
        }
    }

    /// Update the existing chart in place, or create it. A change of value
    /// axis kind needs a fresh chart. Returns a snapshot of the result.
    pub fn apply(&mut self, config: ChartConfig, datasets: Vec<Series>) -> Chart {
        let same_axis = self
            .chart()
            .is_some_and(|c| c.config.value_axis.is_category() == config.value_axis.is_category());
        let revision = self.chart().map_or(0, |c| c.revision + 1);

        match self {
            Self::Initialized(chart) if same_axis => {
                chart.config.value_axis = config.value_axis;
                chart.update(datasets, config.legend);
                chart.reset_zoom();
                chart.clone()
            }
            _ => {
                let chart = Chart {
                    revision,
                    ..Chart::new(config, datasets)
                };
                *self = Self::Initialized(chart.clone());
                chart
            }
        }
    }

    pub fn zoom(&mut self, from: String, to: String) -> Option<&Chart> {
        match self {
            Self::Initialized(chart) => {
                chart.zoom(from, to);
                Some(chart)
            }
            Self::Uninitialized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(n: usize) -> Vec<Series> {
        let points = (0..n)
            .map(|i| SeriesPoint::new(format!("2024-01-0{}T00:00:00Z", i + 1), json!(i)))
            .collect();
        vec![Series::new(None, None, "#32CD32".to_string(), points)]
    }

    fn linear() -> ChartConfig {
        ChartConfig {
            value_axis: ValueAxis::Linear,
            legend: false,
        }
    }

    #[test]
    fn test_apply_creates_then_updates_in_place() {
        let mut handle = ChartHandle::default();
        assert!(handle.chart().is_none());

        handle.apply(linear(), series(2));
        assert!(handle.chart().is_some());
        assert_eq!(handle.chart().unwrap().revision, 0);

        handle.zoom("a".to_string(), "b".to_string());
        let chart = handle.apply(linear(), series(3));
        assert_eq!(chart.revision, 1);
        assert_eq!(chart.datasets[0].points.len(), 3);
        assert_eq!(chart.viewport, Viewport::Default);
    }

    #[test]
    fn test_apply_rebuilds_on_axis_change() {
        let mut handle = ChartHandle::default();
        handle.apply(linear(), series(1));
        handle.zoom("a".to_string(), "b".to_string());

        let category = ChartConfig {
            value_axis: ValueAxis::Category {
                labels: vec!["N/A".to_string()],
            },
            legend: false,
        };
        let chart = handle.apply(category.clone(), series(1));
        assert_eq!(chart.config, category);
        assert_eq!(chart.revision, 1);
        assert_eq!(chart.viewport, Viewport::Default);
        assert!(handle.chart().is_some());
    }

    #[test]
    fn test_zoom_requires_chart() {
        let mut handle = ChartHandle::default();
        assert!(handle.zoom("a".to_string(), "b".to_string()).is_none());
    }

    #[test]
    fn test_filled_series() {
        let s = Series::new(Some("wind".to_string()), None, "#0000FF".to_string(), Vec::new()).filled();
        assert!(s.fill);
        assert_eq!(s.background_color.as_deref(), Some("#0000FF30"));
    }
}
