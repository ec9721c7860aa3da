//! Shared test utilities for dashboard integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use metrics_dashboard::backend::MetricValue;
use metrics_dashboard::catalog::MetricDescriptor;
use metrics_dashboard::config::PollerConfig;
use metrics_dashboard::error::{DispatchError, Result};
use metrics_dashboard::widget::ChartUpdate;
use metrics_dashboard::{
    ChartDescriptor, ChartSurface, DashboardError, MetricKey, MetricsBackend, Poller,
    SubscriptionBus, ValueCache,
};

// ============================================================================
// Backend helpers
// ============================================================================

/// In-memory backend replaying queued value responses in order.
///
/// An exhausted queue answers with an empty response.
#[derive(Default)]
pub struct ScriptedBackend {
    charts: Vec<ChartDescriptor>,
    metrics: Vec<MetricDescriptor>,
    responses: Mutex<VecDeque<Result<Vec<MetricValue>>>>,
    requests: Mutex<Vec<Vec<MetricKey>>>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn new(charts: Vec<ChartDescriptor>) -> Self {
        Self {
            charts,
            ..Default::default()
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricDescriptor>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Queue a successful response.
    pub fn respond(&self, values: &[(&str, f64)]) {
        self.responses.lock().push_back(Ok(values
            .iter()
            .map(|(key, value)| MetricValue {
                key: (*key).into(),
                value: *value,
            })
            .collect()));
    }

    /// Queue a failed response.
    pub fn fail(&self, err: DashboardError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Key sets requested so far, one entry per value query.
    pub fn requests(&self) -> Vec<Vec<MetricKey>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MetricsBackend for ScriptedBackend {
    async fn fetch_charts(&self) -> Result<Vec<ChartDescriptor>> {
        Ok(self.charts.clone())
    }

    async fn fetch_metrics(&self) -> Result<Vec<MetricDescriptor>> {
        Ok(self.metrics.clone())
    }

    async fn fetch_values(&self, keys: &[MetricKey]) -> Result<Vec<MetricValue>> {
        self.requests.lock().push(keys.to_vec());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Poller over `backend` with fresh cache and bus.
#[allow(dead_code)]
pub fn new_poller(backend: Arc<ScriptedBackend>) -> Poller {
    Poller::new(
        backend,
        ValueCache::new(),
        SubscriptionBus::new(),
        PollerConfig::default(),
    )
}

// ============================================================================
// Surface helpers
// ============================================================================

/// Chart surface recording every update it receives.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    updates: Arc<Mutex<Vec<ChartUpdate>>>,
    released: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl RecordingSurface {
    pub fn boxed(&self) -> Box<dyn ChartSurface> {
        Box::new(self.clone())
    }

    pub fn last(&self) -> ChartUpdate {
        self.updates
            .lock()
            .last()
            .cloned()
            .expect("surface never redrawn")
    }

    pub fn count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl ChartSurface for RecordingSurface {
    fn redraw(&mut self, update: &ChartUpdate) -> std::result::Result<(), DispatchError> {
        assert!(!self.is_released(), "redraw after release");
        self.updates.lock().push(update.clone());
        Ok(())
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Surface that renders once at mount, then panics on every redraw.
#[derive(Default)]
pub struct ExplodingSurface {
    calls: AtomicUsize,
}

impl ChartSurface for ExplodingSurface {
    fn redraw(&mut self, _update: &ChartUpdate) -> std::result::Result<(), DispatchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            panic!("chart instance destroyed");
        }
        Ok(())
    }
}
