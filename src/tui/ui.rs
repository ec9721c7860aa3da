//! UI layout and rendering for the terminal dashboard.
//!
//! The screen is a header, a grid with one panel per chart (two columns) and
//! a one-line status bar.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use metrics_dashboard_core::{ChartKind, PollerState, PollerStatus};

use super::app::{App, PanelSnapshot};
use super::widgets::{centered_rect, BarChartPanel, LineChartPanel};

const GRID_COLUMNS: usize = 2;

/// Top-level rendering function.
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Chart grid
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let status = app.status();
    let snapshots = app.snapshots();

    draw_header(f, app, snapshots.len(), chunks[0]);
    if snapshots.is_empty() {
        draw_waiting(f, &status, chunks[1]);
    } else {
        draw_grid(f, &snapshots, chunks[1]);
    }
    draw_status_bar(f, app, &status, chunks[2]);
}

// ── Header ──────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, app: &App, charts: usize, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            app.base_url.as_str(),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("  {} charts", charts),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Metrics Dashboard "),
    );
    f.render_widget(header, area);
}

// ── Chart Grid ──────────────────────────────────────────────────────────────

fn draw_grid(f: &mut Frame, snapshots: &[PanelSnapshot], area: Rect) {
    let rows = snapshots.len().div_ceil(GRID_COLUMNS);
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
        .split(area);

    for (row, chunk) in snapshots.chunks(GRID_COLUMNS).enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, GRID_COLUMNS as u32); GRID_COLUMNS])
            .split(row_areas[row]);
        for (snapshot, cell) in chunk.iter().zip(cells.iter()) {
            draw_panel(f, snapshot, *cell);
        }
    }
}

fn draw_panel(f: &mut Frame, snapshot: &PanelSnapshot, area: Rect) {
    let header = snapshot.view.display_text();
    let title = snapshot.view.title.as_str();
    let update = snapshot.update.as_ref();

    match snapshot.view.kind {
        ChartKind::Line(_) => LineChartPanel::new(title, update)
            .with_header(header.as_deref())
            .render(f, area),
        ChartKind::Bar(_) => BarChartPanel::new(title, update)
            .with_header(header.as_deref())
            .render(f, area),
    }
}

fn draw_waiting(f: &mut Frame, status: &PollerStatus, area: Rect) {
    let popup = centered_rect(60, 30, area);
    let message = match status.state {
        PollerState::Running => "Catalog has no charts",
        _ => "Waiting for chart catalog...",
    };
    let mut lines = vec![Line::from(Span::styled(
        message,
        Style::default().fg(Color::Yellow),
    ))];
    if let Some(err) = &status.last_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Loading "));
    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

// ── Status Bar ──────────────────────────────────────────────────────────────

fn state_span(state: PollerState) -> Span<'static> {
    let (label, color) = match state {
        PollerState::Idle => (" IDLE ", Color::Yellow),
        PollerState::Running => (" RUNNING ", Color::Green),
        PollerState::Stopped => (" STOPPED ", Color::Red),
    };
    Span::styled(
        label,
        Style::default()
            .fg(Color::Black)
            .bg(color)
            .add_modifier(Modifier::BOLD),
    )
}

fn draw_status_bar(f: &mut Frame, app: &App, status: &PollerStatus, area: Rect) {
    let live_indicator = if app.is_paused() {
        Span::styled(
            " PAUSED ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            " LIVE ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    };

    let last_tick = status
        .last_tick
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string());

    let mut spans = vec![
        state_span(status.state),
        Span::raw(" "),
        live_indicator,
        Span::raw(format!(
            "  ticks {} failed {} last {}",
            status.ticks, status.failed_ticks, last_tick
        )),
    ];
    if let Some(err) = &status.last_error {
        spans.push(Span::styled(
            format!("  {}", err),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        "  q:quit  p:pause  r:refresh ",
        Style::default().fg(Color::DarkGray),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Tests ───────────────────────────────────────────────────────────────────
