//! # metrics-dashboard-core
//!
//! Engine behind the live metrics dashboard: it polls a backend for metric
//! values, keeps the latest value per metric, and fans each tick out to the
//! mounted chart widgets, which keep a bounded history and push neutral
//! updates to their chart surfaces.
//!
//! ```text
//! Poller ─▶ ValueCache (write) ─▶ SubscriptionBus (fan-out) ─▶ ChartWidget
//!                                                              │
//!                                             SeriesBuffer ◀───┤
//!                                             ChartSurface ◀───┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use metrics_dashboard_core::{
//!     ChartWidget, DashboardConfig, HttpBackend, Poller, SubscriptionBus, ValueCache,
//! };
//!
//! let config = DashboardConfig::default();
//! let backend = Arc::new(HttpBackend::new(&config.backend)?);
//! let (cache, bus) = (ValueCache::new(), SubscriptionBus::new());
//! let poller = Poller::new(backend, cache.clone(), bus.clone(), config.poller.clone());
//! let handle = poller.spawn();
//!
//! let catalog = poller.wait_for_catalog().await;
//! let widgets: Vec<_> = catalog
//!     .charts()
//!     .iter()
//!     .map(|chart| ChartWidget::mount(chart.clone(), &cache, &bus, make_surface(chart), 100))
//!     .collect();
//! ```

pub mod backend;
pub mod bus;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod metric;
pub mod poller;
pub mod series;
pub mod widget;

pub use backend::{HttpBackend, MetricValue, MetricsBackend};
pub use bus::{DispatchFn, DispatchReport, SubscriberId, Subscription, SubscriptionBus};
pub use cache::ValueCache;
pub use catalog::{Arity, Catalog, ChartDescriptor, ChartKind, ChartType, MetricDescriptor};
pub use config::{
    BackendConfig, DashboardConfig, HistoryConfig, LogFormat, LoggingConfig, PollerConfig,
};
pub use error::{DashboardError, DispatchError, Result};
pub use metric::{format_value, MetricKey, Sample};
pub use poller::{Poller, PollerHandle, PollerState, PollerStatus, TickOutcome};
pub use series::SeriesBuffer;
pub use widget::{
    Annotation, BarCategory, ChartData, ChartSurface, ChartUpdate, ChartWidget, MountedWidget,
    Series, WidgetView,
};
