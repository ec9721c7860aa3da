//! Application state and main event loop for the terminal dashboard.
//!
//! The [`App`] mounts one panel per catalog chart once the poller has loaded
//! the catalog, and [`run`] owns the terminal until the user quits.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use metrics_dashboard_core::{
    Catalog, ChartDescriptor, ChartUpdate, ChartWidget, DashboardConfig, MetricsBackend,
    MountedWidget, Poller, PollerStatus, SubscriptionBus, ValueCache, WidgetView,
};

use super::ui;
use super::widgets::PanelData;

/// How often the UI repaints and checks for input.
const FRAME_INTERVAL: Duration = Duration::from_millis(250);

/// One mounted chart and the data its surface last received.
pub struct Panel {
    pub data: PanelData,
    pub widget: MountedWidget,
}

/// What a panel looks like at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    pub view: WidgetView,
    pub update: Option<ChartUpdate>,
}

impl PanelSnapshot {
    fn of(panel: &Panel) -> Self {
        Self {
            view: panel.widget.view(),
            update: panel.data.latest(),
        }
    }
}

/// Actions the event loop performs after key handling.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    None,
    ForceTick,
}

/// All application state for the terminal dashboard.
pub struct App {
    pub poller: Poller,
    pub base_url: String,
    pub window: usize,
    pub panels: Vec<Panel>,
    pub should_quit: bool,
    /// Set once the catalog's charts are mounted, even when there are none.
    mounted: bool,
    /// Frozen panels while paused. Polling continues underneath.
    frozen: Option<Vec<PanelSnapshot>>,
}

impl App {
    pub fn new(poller: Poller, base_url: impl Into<String>, window: usize) -> Self {
        Self {
            poller,
            base_url: base_url.into(),
            window,
            panels: Vec::new(),
            should_quit: false,
            mounted: false,
            frozen: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn status(&self) -> PollerStatus {
        self.poller.status()
    }

    /// Mount a panel per chart the first time a catalog is available.
    pub fn mount_catalog(&mut self, catalog: &Catalog) {
        if self.mounted {
            return;
        }
        for chart in catalog.charts() {
            self.mount(chart.clone());
        }
        self.mounted = true;
        info!(panels = self.panels.len(), "Panels mounted");
    }

    fn mount(&mut self, chart: ChartDescriptor) {
        let data = PanelData::new();
        let widget = ChartWidget::mount(
            chart,
            self.poller.cache(),
            self.poller.bus(),
            Box::new(data.surface()),
            self.window,
        );
        self.panels.push(Panel { data, widget });
    }

    /// Panels as they should be drawn: live, or as they were when paused.
    pub fn snapshots(&self) -> Vec<PanelSnapshot> {
        match &self.frozen {
            Some(frozen) => frozen.clone(),
            None => self.panels.iter().map(PanelSnapshot::of).collect(),
        }
    }

    fn toggle_pause(&mut self) {
        self.frozen = match self.frozen.take() {
            Some(_) => None,
            None => Some(self.panels.iter().map(PanelSnapshot::of).collect()),
        };
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyCode) -> Action {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                Action::None
            }
            KeyCode::Char('p') => {
                self.toggle_pause();
                Action::None
            }
            KeyCode::Char('r') => Action::ForceTick,
            _ => Action::None,
        }
    }

    fn force_tick(&self) {
        let poller = self.poller.clone();
        tokio::spawn(async move {
            poller.tick().await;
        });
    }

    /// Unmount every panel.
    pub fn unmount_all(&mut self) {
        self.frozen = None;
        self.mounted = false;
        for panel in self.panels.drain(..) {
            panel.widget.unmount();
        }
    }
}

/// Main entry point for the terminal dashboard.
///
/// Starts the poller against `backend`, sets up the terminal and runs the
/// event loop until the user quits.
pub async fn run(
    config: &DashboardConfig,
    backend: Arc<dyn MetricsBackend>,
) -> Result<(), Box<dyn std::error::Error>> {
    let poller = Poller::new(
        backend,
        ValueCache::new(),
        SubscriptionBus::new(),
        config.poller.clone(),
    );
    let handle = poller.spawn();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(poller, config.backend.base_url.clone(), config.history.window);

    let result: Result<(), Box<dyn std::error::Error>> = async {
        loop {
            if let Some(catalog) = handle.catalog() {
                app.mount_catalog(&catalog);
            }

            terminal.draw(|f| ui::draw(f, &app))?;

            if event::poll(FRAME_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && app.handle_key(key.code) == Action::ForceTick
                    {
                        app.force_tick();
                    }
                }
            }

            if app.should_quit {
                break;
            }
        }
        Ok(())
    }
    .await;

    app.unmount_all();
    handle.shutdown();
    handle.wait().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ── Tests ───────────────────────────────────────────────────────────────────
