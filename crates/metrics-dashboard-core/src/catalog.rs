//! Chart and metric catalog.
//!
//! The catalog is fetched once at startup from `/api/charts` and
//! `/api/metrics`. It fixes the set of charts to mount and the set of metric
//! keys the poller queries for the rest of the session.
//!
//! Chart entries are decoded tolerantly because backends in the wild use two
//! shapes:
//!
//! ```json
//! { "id": "cpu", "type": "Line", "meta": { "metrics": ["cpu"], "max_metric": "cpu_max" } }
//! { "key": "cpu", "chart_type": { "type": "Bar", "meta": { "max_metric": "cpu_max" } } }
//! ```

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::{DashboardError, Result};
use crate::metric::MetricKey;

/// Rendering style of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum ChartType {
    #[default]
    #[serde(alias = "line")]
    Line,
    #[serde(alias = "bar")]
    Bar,
}

/// Whether a chart plots one metric or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Single,
    Multi,
}

/// Chart variant, fixed when the descriptor is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Line(Arity),
    Bar(Arity),
}

impl ChartKind {
    pub fn of(descriptor: &ChartDescriptor) -> Self {
        let arity = if descriptor.metrics.len() > 1 {
            Arity::Multi
        } else {
            Arity::Single
        };
        match descriptor.chart_type {
            ChartType::Line => ChartKind::Line(arity),
            ChartType::Bar => ChartKind::Bar(arity),
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            ChartKind::Line(a) | ChartKind::Bar(a) => *a,
        }
    }

    /// Only multi-metric bar charts render a snapshot without history.
    pub fn keeps_history(&self) -> bool {
        !matches!(self, ChartKind::Bar(Arity::Multi))
    }
}

/// Definition of one chart as served by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDescriptor {
    pub id: String,
    pub chart_type: ChartType,
    /// Plotted metrics, in display order. Never empty.
    pub metrics: Vec<MetricKey>,
    pub desc: Option<String>,
    pub unit: Option<String>,
    /// Metric whose latest value is drawn as a threshold line.
    pub annotation_metric: Option<MetricKey>,
}

impl ChartDescriptor {
    /// Single-metric line chart for `key`.
    pub fn line(key: impl Into<MetricKey>) -> Self {
        let key = key.into();
        Self {
            id: key.to_string(),
            chart_type: ChartType::Line,
            metrics: vec![key],
            desc: None,
            unit: None,
            annotation_metric: None,
        }
    }

    /// Bar chart over `metrics`.
    pub fn bar(id: impl Into<String>, metrics: Vec<MetricKey>) -> Self {
        Self {
            id: id.into(),
            chart_type: ChartType::Bar,
            metrics,
            desc: None,
            unit: None,
            annotation_metric: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricKey>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<MetricKey>) -> Self {
        self.annotation_metric = Some(key.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn kind(&self) -> ChartKind {
        ChartKind::of(self)
    }

    /// Display title: the description, else the id.
    pub fn title(&self) -> &str {
        self.desc.as_deref().unwrap_or(&self.id)
    }
}

/// Description of one known metric from `/api/metrics`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricDescriptor {
    pub key: MetricKey,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Companion metric holding this metric's upper bound.
    #[serde(default)]
    pub max_key: Option<MetricKey>,
}

// ── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    #[serde(default)]
    metrics: Option<Vec<MetricKey>>,
    #[serde(default)]
    max_metric: Option<MetricKey>,
    #[serde(default)]
    annotation_metric: Option<MetricKey>,
}

#[derive(Debug, Deserialize)]
struct RawChartType {
    #[serde(rename = "type", default)]
    kind: Option<ChartType>,
    #[serde(default)]
    meta: Option<RawMeta>,
}

#[derive(Debug, Deserialize)]
struct RawChart {
    #[serde(alias = "key")]
    id: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<ChartType>,
    #[serde(default)]
    chart_type: Option<RawChartType>,
    #[serde(default)]
    meta: Option<RawMeta>,
    #[serde(default)]
    annotation_metric: Option<MetricKey>,
}

impl TryFrom<RawChart> for ChartDescriptor {
    type Error = DashboardError;

    fn try_from(raw: RawChart) -> Result<Self> {
        let (nested_kind, nested_meta) = match raw.chart_type {
            Some(ct) => (ct.kind, ct.meta),
            None => (None, None),
        };
        let meta = raw.meta.or(nested_meta).unwrap_or_default();

        let metrics = match meta.metrics {
            Some(metrics) if metrics.is_empty() => {
                return Err(DashboardError::Catalog(format!(
                    "chart '{}' lists no metrics",
                    raw.id
                )))
            }
            Some(metrics) => metrics,
            None => vec![MetricKey::new(raw.id.clone())],
        };

        let annotation_metric = raw
            .annotation_metric
            .or(meta.annotation_metric)
            .or(meta.max_metric);

        Ok(ChartDescriptor {
            id: raw.id,
            chart_type: raw.kind.or(nested_kind).unwrap_or_default(),
            metrics,
            desc: raw.desc,
            unit: raw.unit,
            annotation_metric,
        })
    }
}

/// Decode a `/api/charts` response body.
pub fn parse_charts(body: &str) -> Result<Vec<ChartDescriptor>> {
    let raw: Vec<RawChart> = serde_json::from_str(body)?;
    raw.into_iter().map(ChartDescriptor::try_from).collect()
}

/// Decode a `/api/metrics` response body.
pub fn parse_metrics(body: &str) -> Result<Vec<MetricDescriptor>> {
    Ok(serde_json::from_str(body)?)
}

// ── Catalog ─────────────────────────────────────────────────────────────────

/// Charts and metrics known for this session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    charts: Vec<ChartDescriptor>,
    metrics: Vec<MetricDescriptor>,
    keys: Vec<MetricKey>,
}

impl Catalog {
    /// Build a catalog from the two startup responses.
    ///
    /// Charts missing a description or unit borrow them from their metric's
    /// descriptor, and single-metric charts without an annotation inherit the
    /// metric's `max_key`. With no charts at all, one line chart is
    /// synthesized per metric.
    pub fn new(charts: Vec<ChartDescriptor>, metrics: Vec<MetricDescriptor>) -> Self {
        let by_key: HashMap<&str, &MetricDescriptor> =
            metrics.iter().map(|m| (m.key.as_str(), m)).collect();

        let charts: Vec<ChartDescriptor> = if charts.is_empty() {
            metrics
                .iter()
                .map(|m| ChartDescriptor::line(m.key.clone()))
                .collect()
        } else {
            charts
        };

        let charts = charts
            .into_iter()
            .map(|mut chart| {
                if let [only] = chart.metrics.as_slice() {
                    if let Some(meta) = by_key.get(only.as_str()) {
                        if chart.desc.is_none() {
                            chart.desc = meta.desc.clone();
                        }
                        if chart.unit.is_none() {
                            chart.unit = meta.unit.clone();
                        }
                        if chart.annotation_metric.is_none() {
                            chart.annotation_metric = meta.max_key.clone();
                        }
                    }
                }
                chart
            })
            .collect::<Vec<_>>();

        let keys = union_keys(&charts);

        Self {
            charts,
            metrics,
            keys,
        }
    }

    pub fn charts(&self) -> &[ChartDescriptor] {
        &self.charts
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn metric(&self, key: &str) -> Option<&MetricDescriptor> {
        self.metrics.iter().find(|m| m.key.as_str() == key)
    }

    /// Every plotted metric plus every annotation metric, first-seen order,
    /// without duplicates.
    pub fn keys_of_interest(&self) -> &[MetricKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

fn union_keys(charts: &[ChartDescriptor]) -> Vec<MetricKey> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for chart in charts {
        for key in chart.metrics.iter().chain(chart.annotation_metric.iter()) {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_shape() {
        let body = r#"[
            {"id": "cpu", "desc": "CPU", "unit": "%", "type": "Line",
             "meta": {"metrics": ["cpu"], "max_metric": "cpu_max"}},
            {"id": "io", "type": "Bar", "meta": {"metrics": ["a", "b", "c"]}}
        ]"#;
        let charts = parse_charts(body).unwrap();
        assert_eq!(charts.len(), 2);

        assert_eq!(charts[0].id, "cpu");
        assert_eq!(charts[0].kind(), ChartKind::Line(Arity::Single));
        assert_eq!(charts[0].annotation_metric, Some(MetricKey::from("cpu_max")));
        assert_eq!(charts[0].title(), "CPU");
        assert_eq!(charts[0].unit.as_deref(), Some("%"));

        assert_eq!(charts[1].kind(), ChartKind::Bar(Arity::Multi));
        assert_eq!(
            charts[1].metrics,
            vec![MetricKey::from("a"), MetricKey::from("b"), MetricKey::from("c")]
        );
    }

    #[test]
    fn test_parse_nested_shape() {
        let body = r#"[
            {"key": "system.memory.usage", "desc": null, "unit": "percent",
             "chart_type": {"type": "Bar", "meta": {"max_metric": "system.memory.total"}}}
        ]"#;
        let charts = parse_charts(body).unwrap();
        assert_eq!(charts[0].id, "system.memory.usage");
        assert_eq!(charts[0].chart_type, ChartType::Bar);
        assert_eq!(charts[0].metrics, vec![MetricKey::from("system.memory.usage")]);
        assert_eq!(
            charts[0].annotation_metric,
            Some(MetricKey::from("system.memory.total"))
        );
        assert_eq!(charts[0].title(), "system.memory.usage");
    }

    #[test]
    fn test_parse_top_level_annotation_wins() {
        let body = r#"[{"id": "q", "annotation_metric": "q_limit",
                        "meta": {"max_metric": "q_max"}}]"#;
        let charts = parse_charts(body).unwrap();
        assert_eq!(charts[0].annotation_metric, Some(MetricKey::from("q_limit")));
        assert_eq!(charts[0].chart_type, ChartType::Line);
    }

    #[test]
    fn test_parse_rejects_empty_metrics() {
        let body = r#"[{"id": "empty", "type": "Line", "meta": {"metrics": []}}]"#;
        assert!(matches!(
            parse_charts(body),
            Err(DashboardError::Catalog(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let body = r#"[{"id": "pie", "type": "Pie"}]"#;
        assert!(matches!(parse_charts(body), Err(DashboardError::Decode(_))));
    }

    #[test]
    fn test_parse_metrics() {
        let body = r#"[
            {"key": "cpu", "typ": "Gauge", "desc": "CPU usage", "unit": "percent"},
            {"key": "mem", "max_key": "mem_total"}
        ]"#;
        let metrics = parse_metrics(body).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].desc.as_deref(), Some("CPU usage"));
        assert_eq!(metrics[1].max_key, Some(MetricKey::from("mem_total")));
    }

    #[test]
    fn test_keys_of_interest_union() {
        let catalog = Catalog::new(
            vec![
                ChartDescriptor::line("cpu").with_annotation("cpu_max"),
                ChartDescriptor::bar("group", vec!["a".into(), "cpu".into(), "b".into()]),
                ChartDescriptor::line("b").with_annotation("cpu_max"),
            ],
            Vec::new(),
        );
        let keys: Vec<&str> = catalog
            .keys_of_interest()
            .iter()
            .map(MetricKey::as_str)
            .collect();
        assert_eq!(keys, vec!["cpu", "cpu_max", "a", "b"]);
    }

    #[test]
    fn test_enrichment_from_metric_descriptors() {
        let metrics = vec![MetricDescriptor {
            key: "mem".into(),
            desc: Some("Memory".into()),
            unit: Some("bytes".into()),
            max_key: Some("mem_total".into()),
        }];
        let catalog = Catalog::new(vec![ChartDescriptor::line("mem")], metrics);

        let chart = &catalog.charts()[0];
        assert_eq!(chart.title(), "Memory");
        assert_eq!(chart.unit.as_deref(), Some("bytes"));
        assert_eq!(chart.annotation_metric, Some(MetricKey::from("mem_total")));
        assert!(catalog
            .keys_of_interest()
            .contains(&MetricKey::from("mem_total")));
        assert_eq!(catalog.metric("mem").map(|m| m.key.as_str()), Some("mem"));
    }

    #[test]
    fn test_synthesizes_charts_from_metrics() {
        let metrics = vec![
            MetricDescriptor {
                key: "a".into(),
                desc: None,
                unit: None,
                max_key: None,
            },
            MetricDescriptor {
                key: "b".into(),
                desc: Some("B".into()),
                unit: None,
                max_key: None,
            },
        ];
        let catalog = Catalog::new(Vec::new(), metrics);
        assert_eq!(catalog.charts().len(), 2);
        assert_eq!(catalog.charts()[1].title(), "B");
        assert_eq!(catalog.charts()[0].kind(), ChartKind::Line(Arity::Single));
    }

    #[test]
    fn test_kind_history() {
        assert!(ChartKind::Line(Arity::Multi).keeps_history());
        assert!(ChartKind::Bar(Arity::Single).keeps_history());
        assert!(!ChartKind::Bar(Arity::Multi).keeps_history());
    }
}
