//! Backend access.
//!
//! The [`MetricsBackend`] trait is the seam between the poller and whatever
//! serves the catalog and metric values. [`HttpBackend`] talks to the
//! dashboard HTTP API; tests plug in scripted backends.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::catalog::{parse_charts, parse_metrics, ChartDescriptor, MetricDescriptor};
use crate::config::BackendConfig;
use crate::error::{DashboardError, Result};
use crate::metric::MetricKey;

/// One `{ key, value }` entry of a value query response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricValue {
    pub key: MetricKey,
    pub value: f64,
}

impl From<MetricValue> for (MetricKey, f64) {
    fn from(v: MetricValue) -> Self {
        (v.key, v.value)
    }
}

/// Source of the chart catalog and current metric values.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Chart definitions, in display order.
    async fn fetch_charts(&self) -> Result<Vec<ChartDescriptor>>;

    /// Every metric the backend knows about.
    async fn fetch_metrics(&self) -> Result<Vec<MetricDescriptor>>;

    /// Latest values for `keys`. Keys the backend has no value for are
    /// omitted; order is unspecified.
    async fn fetch_values(&self, keys: &[MetricKey]) -> Result<Vec<MetricValue>>;
}

/// [`MetricsBackend`] over the dashboard's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| DashboardError::Config(format!("Invalid backend URL: {}", e)))
    }

    async fn get(&self, url: Url) -> Result<String> {
        debug!(%url, "GET");

        let response = self.client.get(url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> DashboardError {
    if err.is_timeout() {
        DashboardError::Timeout
    } else {
        DashboardError::Http(err)
    }
}

#[async_trait]
impl MetricsBackend for HttpBackend {
    async fn fetch_charts(&self) -> Result<Vec<ChartDescriptor>> {
        let body = self.get(self.endpoint("/api/charts")?).await?;
        parse_charts(&body)
    }

    async fn fetch_metrics(&self) -> Result<Vec<MetricDescriptor>> {
        let body = self.get(self.endpoint("/api/metrics")?).await?;
        parse_metrics(&body)
    }

    async fn fetch_values(&self, keys: &[MetricKey]) -> Result<Vec<MetricValue>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let joined = keys
            .iter()
            .map(MetricKey::as_str)
            .collect::<Vec<_>>()
            .join(";");

        let mut url = self.endpoint("/api/metrics_value")?;
        url.query_pairs_mut().append_pair("keys", &joined);

        let body = self.get(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
