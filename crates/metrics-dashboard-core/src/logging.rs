//! Tracing subscriber setup shared by the dashboard front-ends.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{DashboardError, Result};

/// Where log lines go when no file is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    /// Write to stderr (headless mode)
    Stderr,
    /// Drop output; used while the terminal is owned by the TUI
    Discard,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. A configured log file is opened
/// in append mode and takes precedence over `fallback`.
pub fn init(config: &LoggingConfig, fallback: LogSink) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, ansi) = match (&config.file, fallback) {
        (Some(path), _) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        (None, LogSink::Stderr) => (BoxMakeWriter::new(std::io::stderr), true),
        (None, LogSink::Discard) => (BoxMakeWriter::new(std::io::sink), false),
    };

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(writer))
                .try_init()
                .map_err(|e| DashboardError::Config(format!("Logging already initialized: {}", e)))?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(ansi).with_writer(writer))
                .try_init()
                .map_err(|e| DashboardError::Config(format!("Logging already initialized: {}", e)))?;
        }
    }

    Ok(())
}
