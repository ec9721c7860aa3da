//! # Metrics Dashboard
//!
//! Live dashboard for metrics served by a metrics-dashboard backend. The
//! engine lives in [`metrics_dashboard_core`] and is re-exported here; this
//! crate adds the front-ends that paint chart updates.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tui`] | Terminal dashboard (ratatui), `tui` feature |
//! | [`headless`] | Logs every chart update instead of drawing it |

// ── Re-exports from metrics-dashboard-core ──────────────────────────────────

pub use metrics_dashboard_core::backend;
pub use metrics_dashboard_core::bus;
pub use metrics_dashboard_core::cache;
pub use metrics_dashboard_core::catalog;
pub use metrics_dashboard_core::config;
pub use metrics_dashboard_core::error;
pub use metrics_dashboard_core::logging;
pub use metrics_dashboard_core::metric;
pub use metrics_dashboard_core::poller;
pub use metrics_dashboard_core::series;
pub use metrics_dashboard_core::widget;

pub use metrics_dashboard_core::{
    ChartDescriptor, ChartSurface, ChartUpdate, ChartWidget, DashboardConfig, DashboardError,
    HttpBackend, MetricKey, MetricsBackend, Poller, SubscriptionBus, ValueCache,
};

// ── Front-ends ──────────────────────────────────────────────────────────────

pub mod headless;

#[cfg(feature = "tui")]
pub mod tui;
