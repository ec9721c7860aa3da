//! Metrics Dashboard
//!
//! Polls a metrics-dashboard backend and renders its charts in the terminal.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin metrics-dashboard
//! cargo run --bin metrics-dashboard -- -u http://10.0.0.5:3000/dashboard -i 2000
//! cargo run --bin metrics-dashboard -- -c dashboard.toml --headless
//! ```
//!
//! # Keyboard Shortcuts
//!
//! - `q` - Quit
//! - `p` - Pause/resume redraw (polling continues)
//! - `r` - Poll now

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use metrics_dashboard::logging::{self, LogSink};
use metrics_dashboard::{DashboardConfig, HttpBackend, MetricsBackend};

/// Metrics Dashboard - CLI arguments
#[derive(Parser, Debug)]
#[command(name = "metrics-dashboard")]
#[command(about = "Live terminal dashboard for metrics-dashboard backends")]
struct Args {
    /// Backend base URL, e.g. http://127.0.0.1:3000/dashboard
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// Poll interval in milliseconds
    #[arg(short = 'i', long = "interval")]
    interval: Option<u64>,

    /// Samples kept per series
    #[arg(short = 'w', long = "window")]
    window: Option<usize>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,

    /// Log chart updates instead of drawing them
    #[arg(long = "headless")]
    headless: bool,
}

impl Args {
    fn into_config(self) -> Result<(DashboardConfig, bool), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };

        if let Some(url) = self.url {
            config.backend.base_url = url;
        }
        if let Some(interval) = self.interval {
            config.poller.interval_ms = interval;
        }
        if let Some(window) = self.window {
            config.history.window = window;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok((config, self.headless || !cfg!(feature = "tui")))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, headless) = Args::parse().into_config()?;

    let sink = if headless {
        LogSink::Stderr
    } else {
        LogSink::Discard
    };
    logging::init(&config.logging, sink)?;

    let backend: Arc<dyn MetricsBackend> = Arc::new(HttpBackend::new(&config.backend)?);

    #[cfg(feature = "tui")]
    {
        if !headless {
            return metrics_dashboard::tui::app::run(&config, backend).await;
        }
    }

    metrics_dashboard::headless::run(&config, backend).await
}
