//! Terminal dashboard
//!
//! Renders one panel per catalog chart and keeps them live as the poller
//! ticks.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin metrics-dashboard -- --url http://127.0.0.1:3000/dashboard
//! ```
//!
//! # Architecture
//!
//! - [`app`] - Application state, event loop, and keyboard handling
//! - [`ui`] - Screen layout and status bar
//! - [`widgets`] - Chart panels and the terminal chart surface

pub mod app;
pub mod ui;
pub mod widgets;
