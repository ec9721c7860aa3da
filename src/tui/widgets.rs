//! Chart panels for the terminal dashboard.
//!
//! Provides the ratatui side of the chart surface contract:
//! - [`TuiSurface`] - [`ChartSurface`] that stores the latest update for the UI thread
//! - [`LineChartPanel`] - Braille line chart with an optional threshold line
//! - [`BarChartPanel`] - Snapshot bars or a bar history of one metric
//! - [`centered_rect`] - Popup placement helper

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph,
    },
    Frame,
};

use metrics_dashboard_core::{format_value, ChartSurface, ChartUpdate, DispatchError};

// ── TuiSurface ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PanelState {
    update: Option<ChartUpdate>,
    redraws: u64,
    released: bool,
}

/// Latest chart update of one panel, shared between the poller thread that
/// redraws it and the UI loop that paints it.
#[derive(Debug, Clone, Default)]
pub struct PanelData {
    inner: Arc<Mutex<PanelState>>,
}

impl PanelData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface writing into this panel.
    pub fn surface(&self) -> TuiSurface {
        TuiSurface { data: self.clone() }
    }

    pub fn latest(&self) -> Option<ChartUpdate> {
        self.inner.lock().update.clone()
    }

    pub fn redraws(&self) -> u64 {
        self.inner.lock().redraws
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }
}

/// [`ChartSurface`] backed by a [`PanelData`].
#[derive(Debug)]
pub struct TuiSurface {
    data: PanelData,
}

impl ChartSurface for TuiSurface {
    fn redraw(&mut self, update: &ChartUpdate) -> Result<(), DispatchError> {
        let mut state = self.data.inner.lock();
        if state.released {
            return Err(DispatchError::Released);
        }
        state.update = Some(update.clone());
        state.redraws += 1;
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.data.inner.lock();
        state.released = true;
        state.update = None;
    }
}

// ── Colors ──────────────────────────────────────────────────────────────────

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::LightRed,
];

/// Color of the `index`-th series of a chart.
pub fn series_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

const THRESHOLD_COLOR: Color = Color::Red;

fn panel_block(title: &str, header: Option<&str>, update: Option<&ChartUpdate>) -> Block<'static> {
    let mut spans = vec![Span::styled(
        format!(" {} ", title),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let Some(header) = header {
        spans.push(Span::styled(
            format!("{} ", header),
            Style::default().fg(Color::Cyan),
        ));
    }

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(Line::from(spans));
    if let Some(annotation) = update.and_then(|u| u.annotation.as_ref()) {
        block = block.title_bottom(
            Line::from(Span::styled(
                format!(" {} ", annotation.label),
                Style::default().fg(THRESHOLD_COLOR),
            ))
            .right_aligned(),
        );
    }
    block
}

fn render_no_data(f: &mut Frame, area: Rect, block: Block<'_>) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "no data",
        Style::default().fg(Color::DarkGray),
    )))
    .block(block);
    f.render_widget(paragraph, area);
}

// ── LineChartPanel ──────────────────────────────────────────────────────────

/// Line chart of every series in an update, time on the x axis.
pub struct LineChartPanel<'a> {
    pub title: &'a str,
    /// Text shown after the title, e.g. `"42 / 100 %"`.
    pub header: Option<&'a str>,
    pub update: Option<&'a ChartUpdate>,
}

impl<'a> LineChartPanel<'a> {
    pub fn new(title: &'a str, update: Option<&'a ChartUpdate>) -> Self {
        Self {
            title,
            header: None,
            update,
        }
    }

    pub fn with_header(mut self, header: Option<&'a str>) -> Self {
        self.header = header;
        self
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let block = panel_block(self.title, self.header, self.update);
        let Some(update) = self.update else {
            return render_no_data(f, area, block);
        };

        let series = update.series();
        let origin = series
            .iter()
            .filter_map(|s| s.points.first().map(|p| p.0))
            .min();
        let Some(origin) = origin else {
            return render_no_data(f, area, block);
        };

        let points: Vec<Vec<(f64, f64)>> = series
            .iter()
            .map(|s| {
                s.points
                    .iter()
                    .map(|(t, v)| (seconds_since(origin, *t), *v))
                    .collect()
            })
            .collect();

        let x_max = points
            .iter()
            .flatten()
            .map(|p| p.0)
            .fold(1.0_f64, f64::max);
        let threshold: Vec<(f64, f64)> = update
            .annotation
            .as_ref()
            .map(|a| vec![(0.0, a.value), (x_max, a.value)])
            .unwrap_or_default();
        let (y_min, y_max) = y_bounds(points.iter().flatten().chain(threshold.iter()).map(|p| p.1));

        let mut datasets: Vec<Dataset> = series
            .iter()
            .zip(&points)
            .enumerate()
            .map(|(i, (s, data))| {
                Dataset::default()
                    .name(s.name.clone())
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(series_color(i)))
                    .data(data)
            })
            .collect();
        if let Some(annotation) = &update.annotation {
            datasets.push(
                Dataset::default()
                    .name(annotation.label.clone())
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(THRESHOLD_COLOR))
                    .data(&threshold),
            );
        }

        let end = origin + chrono::Duration::milliseconds((x_max * 1000.0) as i64);
        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(Color::DarkGray))
                    .bounds([0.0, x_max])
                    .labels(vec![
                        Span::raw(origin.format("%H:%M:%S").to_string()),
                        Span::raw(end.format("%H:%M:%S").to_string()),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(Color::DarkGray))
                    .bounds([y_min, y_max])
                    .labels(vec![
                        Span::raw(format_value(y_min)),
                        Span::raw(format_value((y_min + y_max) / 2.0)),
                        Span::raw(format_value(y_max)),
                    ]),
            );
        f.render_widget(chart, area);
    }
}

fn seconds_since(origin: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - origin).num_milliseconds() as f64 / 1000.0
}

/// Y range covering every value and zero, never empty.
fn y_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if (max - min).abs() < f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

// ── BarChartPanel ───────────────────────────────────────────────────────────

/// Bar chart of an update: one bar per category for snapshot charts, or the
/// most recent points of the first series for single-metric bar charts.
pub struct BarChartPanel<'a> {
    pub title: &'a str,
    pub header: Option<&'a str>,
    pub update: Option<&'a ChartUpdate>,
}

impl<'a> BarChartPanel<'a> {
    pub fn new(title: &'a str, update: Option<&'a ChartUpdate>) -> Self {
        Self {
            title,
            header: None,
            update,
        }
    }

    pub fn with_header(mut self, header: Option<&'a str>) -> Self {
        self.header = header;
        self
    }

    /// `(label, value)` pairs to draw, at most `max_bars`.
    fn bars(&self, max_bars: usize) -> Vec<(String, f64)> {
        let Some(update) = self.update else {
            return Vec::new();
        };

        if !update.categories().is_empty() {
            return update
                .categories()
                .iter()
                .take(max_bars)
                .map(|c| (c.x.clone(), c.y))
                .collect();
        }

        let points = update
            .series()
            .first()
            .map(|s| s.points.as_slice())
            .unwrap_or_default();
        let skip = points.len().saturating_sub(max_bars);
        points[skip..]
            .iter()
            .map(|(t, v)| (t.format("%M:%S").to_string(), *v))
            .collect()
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let block = panel_block(self.title, self.header, self.update);

        const BAR_WIDTH: u16 = 5;
        let max_bars = (area.width.saturating_sub(2) / (BAR_WIDTH + 1)).max(1) as usize;
        let bars = self.bars(max_bars);
        if bars.is_empty() {
            return render_no_data(f, area, block);
        }

        // Bar heights are integral; scale to hundredths and label with the
        // real value.
        let bars: Vec<Bar> = bars
            .into_iter()
            .enumerate()
            .map(|(i, (label, value))| {
                Bar::default()
                    .value((value.max(0.0) * 100.0).round() as u64)
                    .text_value(format_value(value))
                    .label(Line::from(label))
                    .style(Style::default().fg(series_color(i)))
            })
            .collect();

        let chart = BarChart::default()
            .block(block)
            .bar_width(BAR_WIDTH)
            .bar_gap(1)
            .data(BarGroup::default().bars(&bars));
        f.render_widget(chart, area);
    }
}

/// Create a centered rectangle within the given area.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

// ── Tests ───────────────────────────────────────────────────────────────────
