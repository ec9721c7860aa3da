//! Error types for the dashboard engine
//!
//! Two families live here: [`DashboardError`] covers everything that can go
//! wrong talking to the backend or loading configuration, and
//! [`DispatchError`] covers a single subscriber failing during fan-out.
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use thiserror::Error;

/// Main error type for dashboard operations
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Transport-level HTTP failure (connect, read, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned HTTP {status}: {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Backend response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Chart/metric catalog is unusable
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    /// Returns true if retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DashboardError::Http(_) | DashboardError::Timeout | DashboardError::Io(_) => true,
            DashboardError::Backend { status, .. } => *status >= 500,
            DashboardError::Decode(_) | DashboardError::Catalog(_) | DashboardError::Config(_) => {
                false
            }
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Decode(err.to_string())
    }
}

/// Failure of one subscriber while handling a dispatch.
///
/// Never propagated past the subscription bus; collected into a
/// [`DispatchReport`](crate::bus::DispatchReport) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The chart surface refused the update
    #[error("render failed: {0}")]
    Render(String),

    /// The chart surface was already released
    #[error("chart surface released")]
    Released,

    /// The callback panicked
    #[error("subscriber panicked: {0}")]
    Panicked(String),
}
