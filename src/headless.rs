//! Headless front-end: every chart redraw becomes a log line.

use std::sync::Arc;

use tracing::info;

use metrics_dashboard_core::{
    format_value, ChartData, ChartSurface, ChartUpdate, ChartWidget, DashboardConfig,
    DispatchError, MetricsBackend, MountedWidget, Poller, SubscriptionBus, ValueCache,
};

/// [`ChartSurface`] that logs a one-line summary of each update.
#[derive(Debug, Clone)]
pub struct LogSurface {
    chart: String,
    released: bool,
}

impl LogSurface {
    pub fn new(chart: impl Into<String>) -> Self {
        Self {
            chart: chart.into(),
            released: false,
        }
    }
}

/// `"cpu=20 (2 pts)"`, `"a=1 b=2 c=3"`.
pub fn summarize(update: &ChartUpdate) -> String {
    let mut parts: Vec<String> = match &update.data {
        ChartData::Series(series) => series
            .iter()
            .map(|s| match s.points.last() {
                Some((_, v)) => format!("{}={} ({} pts)", s.name, format_value(*v), s.points.len()),
                None => format!("{}=--", s.name),
            })
            .collect(),
        ChartData::Categories(categories) => categories
            .iter()
            .map(|c| format!("{}={}", c.x, format_value(c.y)))
            .collect(),
    };
    if let Some(annotation) = &update.annotation {
        parts.push(format!("[{}]", annotation.label));
    }
    parts.join(" ")
}

impl ChartSurface for LogSurface {
    fn redraw(&mut self, update: &ChartUpdate) -> Result<(), DispatchError> {
        if self.released {
            return Err(DispatchError::Released);
        }
        info!(chart = %self.chart, "{}", summarize(update));
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Poll and log until Ctrl-C.
pub async fn run(
    config: &DashboardConfig,
    backend: Arc<dyn MetricsBackend>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache = ValueCache::new();
    let bus = SubscriptionBus::new();
    let poller = Poller::new(backend, cache.clone(), bus.clone(), config.poller.clone());
    let handle = poller.spawn();

    let catalog = tokio::select! {
        catalog = poller.wait_for_catalog() => Some(catalog),
        _ = tokio::signal::ctrl_c() => None,
    };

    let mut widgets: Vec<MountedWidget> = Vec::new();
    if let Some(catalog) = catalog {
        for chart in catalog.charts() {
            let surface = Box::new(LogSurface::new(chart.id.clone()));
            widgets.push(ChartWidget::mount(
                chart.clone(),
                &cache,
                &bus,
                surface,
                config.history.window,
            ));
        }
        info!(charts = widgets.len(), "Dashboard running, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    for widget in widgets {
        widget.unmount();
    }
    handle.shutdown();
    handle.wait().await;
    Ok(())
}
