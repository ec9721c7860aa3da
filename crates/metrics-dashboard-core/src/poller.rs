//! Poll loop driving the dashboard.
//!
//! The poller loads the catalog once, then on every interval fetches values
//! for all keys of interest, writes them into the [`ValueCache`] with one
//! shared timestamp and calls [`SubscriptionBus::dispatch_all`] exactly once.
//!
//! ```text
//!   Idle ──load_catalog()──▶ Running ──shutdown──▶ Stopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::MetricsBackend;
use crate::bus::{DispatchReport, SubscriptionBus};
use crate::cache::ValueCache;
use crate::catalog::Catalog;
use crate::config::PollerConfig;
use crate::error::{DashboardError, Result};

/// Lifecycle state of the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    /// Catalog not loaded yet.
    #[default]
    Idle,
    /// Polling on the configured interval.
    Running,
    /// Torn down; no further ticks run.
    Stopped,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerState::Idle => write!(f, "idle"),
            PollerState::Running => write!(f, "running"),
            PollerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of poller progress for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollerStatus {
    pub state: PollerState,
    /// Ticks that reached dispatch.
    pub ticks: u64,
    /// Ticks skipped because the value fetch failed.
    pub failed_ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    /// Most recent catalog or value fetch error, cleared by the next
    /// successful tick.
    pub last_error: Option<String>,
}

/// Result of one [`Poller::tick`].
#[derive(Debug)]
pub enum TickOutcome {
    /// Cache updated and subscribers dispatched.
    Dispatched(DispatchReport),
    /// Value fetch failed; cache and subscribers untouched.
    Failed(DashboardError),
    /// Tick not run: another tick is in flight, or the poller is not running.
    Skipped,
}

impl TickOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, TickOutcome::Dispatched(_))
    }
}

struct PollerInner {
    backend: Arc<dyn MetricsBackend>,
    cache: ValueCache,
    bus: SubscriptionBus,
    config: PollerConfig,
    catalog: RwLock<Option<Arc<Catalog>>>,
    catalog_ready: Notify,
    status: RwLock<PollerStatus>,
    in_flight: AtomicBool,
}

/// Poll engine. Cheap to clone; clones drive the same state.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.inner.config)
            .field("status", &*self.inner.status.read())
            .finish()
    }
}

/// Clears the in-flight flag when a tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        cache: ValueCache,
        bus: SubscriptionBus,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                backend,
                cache,
                bus,
                config,
                catalog: RwLock::new(None),
                catalog_ready: Notify::new(),
                status: RwLock::new(PollerStatus::default()),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn cache(&self) -> &ValueCache {
        &self.inner.cache
    }

    pub fn bus(&self) -> &SubscriptionBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> PollerState {
        self.inner.status.read().state
    }

    pub fn status(&self) -> PollerStatus {
        self.inner.status.read().clone()
    }

    /// The loaded catalog, or `None` while idle.
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.inner.catalog.read().clone()
    }

    /// Wait until the catalog has been loaded.
    pub async fn wait_for_catalog(&self) -> Arc<Catalog> {
        loop {
            let notified = self.inner.catalog_ready.notified();
            if let Some(catalog) = self.catalog() {
                return catalog;
            }
            notified.await;
        }
    }

    /// Fetch charts and metrics and move from Idle to Running.
    ///
    /// The key set derived here is fixed for the rest of the session; calling
    /// this again once running returns the already loaded catalog.
    pub async fn load_catalog(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.catalog() {
            return Ok(catalog);
        }

        let fetched = async {
            let charts = self.inner.backend.fetch_charts().await?;
            let metrics = self.inner.backend.fetch_metrics().await?;
            Ok::<_, DashboardError>(Catalog::new(charts, metrics))
        }
        .await;

        let catalog = match fetched {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                error!("Catalog fetch failed: {}", e);
                self.inner.status.write().last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if catalog.is_empty() {
            warn!("Catalog loaded with no charts");
        }
        info!(
            charts = catalog.charts().len(),
            keys = catalog.keys_of_interest().len(),
            "Catalog loaded"
        );

        *self.inner.catalog.write() = Some(Arc::clone(&catalog));
        {
            let mut status = self.inner.status.write();
            if status.state == PollerState::Idle {
                status.state = PollerState::Running;
            }
            status.last_error = None;
        }
        self.inner.catalog_ready.notify_waiters();

        Ok(catalog)
    }

    /// Run one fetch, write, dispatch cycle.
    pub async fn tick(&self) -> TickOutcome {
        let catalog = match (self.state(), self.catalog()) {
            (PollerState::Running, Some(catalog)) => catalog,
            (state, _) => {
                debug!(%state, "Tick ignored, poller not running");
                return TickOutcome::Skipped;
            }
        };

        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous tick still in flight, skipping");
            return TickOutcome::Skipped;
        }
        let _guard = InFlight(&self.inner.in_flight);

        let values = match self
            .inner
            .backend
            .fetch_values(catalog.keys_of_interest())
            .await
        {
            Ok(values) => values,
            Err(e) => {
                warn!(transient = e.is_transient(), "Value fetch failed, tick skipped: {}", e);
                let mut status = self.inner.status.write();
                status.failed_ticks += 1;
                status.last_error = Some(e.to_string());
                return TickOutcome::Failed(e);
            }
        };

        let now = Utc::now();
        let written = self
            .inner
            .cache
            .write_tick(now, values.into_iter().map(Into::into));
        let report = self.inner.bus.dispatch_all(now);

        debug!(
            written,
            dispatched = report.invoked,
            failures = report.failures.len(),
            "Tick complete"
        );

        let mut status = self.inner.status.write();
        status.ticks += 1;
        status.last_tick = Some(now);
        status.last_error = None;

        TickOutcome::Dispatched(report)
    }

    fn mark_stopped(&self) {
        self.inner.status.write().state = PollerState::Stopped;
    }

    /// Start the background loop: load the catalog (retrying until it
    /// succeeds), tick once immediately, then tick on every interval.
    pub fn spawn(&self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = self.clone();
        let task = tokio::spawn(async move {
            poller.run(shutdown_rx).await;
            poller.mark_stopped();
        });

        PollerHandle {
            poller: self.clone(),
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(&self, mut rx: watch::Receiver<bool>) {
        let retry = self.inner.config.catalog_retry();

        while self.catalog().is_none() {
            if self.load_catalog().await.is_ok() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = rx.changed() => {
                    if *rx.borrow() {
                        info!("Poller shutting down before catalog load");
                        return;
                    }
                }
            }
        }

        let mut interval_timer = tokio::time::interval(self.inner.config.interval());
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    self.tick().await;
                }
                _ = rx.changed() => {
                    if *rx.borrow() {
                        info!("Poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to a spawned poll loop.
pub struct PollerHandle {
    poller: Poller,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Signal the loop to stop. Cancels the interval timer.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the loop to finish.
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.poller.mark_stopped();
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn status(&self) -> PollerStatus {
        self.poller.status()
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.poller.catalog()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
