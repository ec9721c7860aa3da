//! Chart widgets and the per-tick update contract.
//!
//! A [`ChartWidget`] binds one [`ChartDescriptor`] to an external chart
//! surface. Mounting seeds its series buffers from the value cache, renders
//! once and subscribes to the bus; each dispatch then appends the tick's
//! values, evicts beyond the window and hands a neutral [`ChartUpdate`] to
//! the surface. The surface translates it into whatever its rendering
//! library wants.
//!
//! Per-variant behavior:
//!
//! | Kind          | Buffers           | Payload                      | Text value |
//! |---------------|-------------------|------------------------------|------------|
//! | Line / single | one               | one series                   | yes        |
//! | Bar / single  | one               | one series                   | yes        |
//! | Line / multi  | one per metric    | one series per metric        | no         |
//! | Bar / multi   | none              | one category per metric      | no         |
//!
//! Every variant carries the annotation when one is configured and cached.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bus::{SubscriberId, Subscription, SubscriptionBus};
use crate::cache::ValueCache;
use crate::catalog::{Arity, ChartDescriptor, ChartKind};
use crate::error::DispatchError;
use crate::metric::{format_value, Sample};
use crate::series::SeriesBuffer;

/// One named line of `(timestamp, value)` points, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// One bar of a snapshot bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BarCategory {
    pub x: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Series(Vec<Series>),
    Categories(Vec<BarCategory>),
}

/// Horizontal threshold marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub value: f64,
    /// `"{key}: {value}"`
    pub label: String,
}

/// Payload handed to a [`ChartSurface`] on every redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartUpdate {
    pub data: ChartData,
    pub annotation: Option<Annotation>,
}

impl ChartUpdate {
    /// Line series; empty for category updates.
    pub fn series(&self) -> &[Series] {
        match &self.data {
            ChartData::Series(series) => series,
            ChartData::Categories(_) => &[],
        }
    }

    /// Bar categories; empty for series updates.
    pub fn categories(&self) -> &[BarCategory] {
        match &self.data {
            ChartData::Categories(categories) => categories,
            ChartData::Series(_) => &[],
        }
    }
}

/// External chart instance a widget renders into.
pub trait ChartSurface: Send {
    /// Replace the displayed data with `update`.
    fn redraw(&mut self, update: &ChartUpdate) -> Result<(), DispatchError>;

    /// Free whatever the surface holds. Called once, on unmount.
    fn release(&mut self) {}
}

/// Display snapshot of a mounted widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub id: SubscriberId,
    pub chart_id: String,
    pub title: String,
    pub unit: Option<String>,
    pub kind: ChartKind,
    /// Latest value of the single plotted metric; `None` for multi-metric
    /// charts and while no data has arrived.
    pub current_value: Option<f64>,
    pub current_annotation: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
}

impl WidgetView {
    /// Returns true for single-metric charts.
    pub fn shows_current_value(&self) -> bool {
        self.kind.arity() == Arity::Single
    }

    /// `"42 / 100 percent"`, `"-- percent"`; `None` for multi-metric charts.
    pub fn display_text(&self) -> Option<String> {
        if !self.shows_current_value() {
            return None;
        }

        let mut text = self
            .current_value
            .map(format_value)
            .unwrap_or_else(|| "--".to_string());
        if let Some(annotation) = self.current_annotation {
            text.push_str(" / ");
            text.push_str(&format_value(annotation));
        }
        if let Some(unit) = self.unit.as_deref().filter(|u| !u.is_empty()) {
            text.push(' ');
            text.push_str(unit);
        }
        Some(text)
    }
}

type Step = fn(&mut WidgetState, &ValueCache, DateTime<Utc>) -> ChartUpdate;

struct WidgetState {
    descriptor: ChartDescriptor,
    kind: ChartKind,
    buffers: Vec<SeriesBuffer>,
    current_value: Option<f64>,
    current_annotation: Option<f64>,
    last_update: Option<DateTime<Utc>>,
    surface: Box<dyn ChartSurface>,
    released: bool,
}

impl WidgetState {
    /// Append a tick sample unless this tick was already recorded, which
    /// happens when a widget is seeded between a tick's write and its
    /// dispatch.
    fn append(&mut self, index: usize, now: DateTime<Utc>, value: f64) {
        if let Some(buffer) = self.buffers.get_mut(index) {
            if buffer.latest().is_some_and(|s| s.timestamp == now) {
                return;
            }
            buffer.push(Sample::new(now, value));
        }
    }

    fn series(&self) -> Vec<Series> {
        self.descriptor
            .metrics
            .iter()
            .zip(&self.buffers)
            .map(|(key, buffer)| Series {
                name: key.to_string(),
                points: buffer.points(),
            })
            .collect()
    }

    fn annotation(&mut self, cache: &ValueCache) -> Option<Annotation> {
        let key = self.descriptor.annotation_metric.as_ref()?;
        let value = cache.value(key.as_str());
        self.current_annotation = value;
        value.map(|value| Annotation {
            value,
            label: format!("{}: {}", key, format_value(value)),
        })
    }

    fn view(&self, id: SubscriberId) -> WidgetView {
        WidgetView {
            id,
            chart_id: self.descriptor.id.clone(),
            title: self.descriptor.title().to_string(),
            unit: self.descriptor.unit.clone(),
            kind: self.kind,
            current_value: self.current_value,
            current_annotation: self.current_annotation,
            last_update: self.last_update,
        }
    }

    fn render(&mut self, update: &ChartUpdate) -> Result<(), DispatchError> {
        if self.released {
            return Err(DispatchError::Released);
        }
        self.surface.redraw(update)
    }
}

fn single_metric(state: &mut WidgetState, cache: &ValueCache, now: DateTime<Utc>) -> ChartUpdate {
    let value = state
        .descriptor
        .metrics
        .first()
        .and_then(|key| cache.value(key.as_str()));
    state.current_value = value;
    state.append(0, now, value.unwrap_or(0.0));

    ChartUpdate {
        data: ChartData::Series(state.series()),
        annotation: state.annotation(cache),
    }
}

fn multi_line(state: &mut WidgetState, cache: &ValueCache, now: DateTime<Utc>) -> ChartUpdate {
    let values: Vec<f64> = state
        .descriptor
        .metrics
        .iter()
        .map(|key| cache.value(key.as_str()).unwrap_or(0.0))
        .collect();
    for (index, value) in values.into_iter().enumerate() {
        state.append(index, now, value);
    }

    ChartUpdate {
        data: ChartData::Series(state.series()),
        annotation: state.annotation(cache),
    }
}

fn bar_snapshot(state: &mut WidgetState, cache: &ValueCache, _now: DateTime<Utc>) -> ChartUpdate {
    let categories = state
        .descriptor
        .metrics
        .iter()
        .map(|key| BarCategory {
            x: key.to_string(),
            y: cache.value(key.as_str()).unwrap_or(0.0),
        })
        .collect();

    ChartUpdate {
        data: ChartData::Categories(categories),
        annotation: state.annotation(cache),
    }
}

/// Entry point for mounting charts.
pub struct ChartWidget;

impl ChartWidget {
    /// Mount `descriptor` onto `surface`.
    ///
    /// Buffers are seeded from samples already in `cache` and the seeded
    /// state is rendered once before the widget subscribes to `bus`.
    pub fn mount(
        descriptor: ChartDescriptor,
        cache: &ValueCache,
        bus: &SubscriptionBus,
        surface: Box<dyn ChartSurface>,
        window: usize,
    ) -> MountedWidget {
        let kind = descriptor.kind();
        let step: Step = match kind {
            ChartKind::Line(Arity::Single) | ChartKind::Bar(Arity::Single) => single_metric,
            ChartKind::Line(Arity::Multi) => multi_line,
            ChartKind::Bar(Arity::Multi) => bar_snapshot,
        };

        let buffers = if kind.keeps_history() {
            descriptor
                .metrics
                .iter()
                .map(|key| {
                    let mut buffer = SeriesBuffer::new(window);
                    if let Some(sample) = cache.read(key.as_str()) {
                        buffer.push(sample);
                    }
                    buffer
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut state = WidgetState {
            current_value: match kind.arity() {
                Arity::Single => descriptor
                    .metrics
                    .first()
                    .and_then(|key| cache.value(key.as_str())),
                Arity::Multi => None,
            },
            last_update: buffers
                .iter()
                .filter_map(|b| b.latest().map(|s| s.timestamp))
                .max(),
            descriptor,
            kind,
            buffers,
            current_annotation: None,
            surface,
            released: false,
        };

        let seeded = ChartUpdate {
            data: match kind {
                ChartKind::Bar(Arity::Multi) => bar_snapshot(&mut state, cache, Utc::now()).data,
                _ => ChartData::Series(state.series()),
            },
            annotation: state.annotation(cache),
        };
        if let Err(e) = state.render(&seeded) {
            warn!(chart = %state.descriptor.id, error = %e, "initial render failed");
        }

        let chart_id = state.descriptor.id.clone();
        let state = Arc::new(Mutex::new(state));
        let dispatch_state = Arc::clone(&state);
        let cache = cache.clone();

        let subscription = bus.subscribe(move |now| {
            let mut state = dispatch_state.lock();
            if state.released {
                return Err(DispatchError::Released);
            }
            let update = step(&mut state, &cache, now);
            state.last_update = Some(now);
            state.render(&update)
        });

        debug!(chart = %chart_id, subscriber = %subscription.id(), ?kind, "mounted");

        MountedWidget {
            id: subscription.id(),
            state,
            subscription: Some(subscription),
        }
    }
}

/// A widget live on the bus. Dropping it unmounts.
pub struct MountedWidget {
    id: SubscriberId,
    state: Arc<Mutex<WidgetState>>,
    subscription: Option<Subscription>,
}

impl MountedWidget {
    /// Subscriber id on the bus.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Chart kind picked at mount.
    pub fn kind(&self) -> ChartKind {
        self.state.lock().kind
    }

    /// Descriptor the widget was mounted with.
    pub fn descriptor(&self) -> ChartDescriptor {
        self.state.lock().descriptor.clone()
    }

    /// Current display snapshot.
    pub fn view(&self) -> WidgetView {
        self.state.lock().view(self.id)
    }

    /// Buffered points per plotted metric; empty for snapshot bar charts.
    pub fn series(&self) -> Vec<Series> {
        self.state.lock().series()
    }

    /// Deregister from the bus, then release the surface.
    pub fn unmount(self) {}

    fn teardown(&mut self) {
        // Deregister first so no dispatch can reach a released surface.
        drop(self.subscription.take());

        let mut state = self.state.lock();
        if !state.released {
            state.surface.release();
            state.released = true;
            debug!(chart = %state.descriptor.id, subscriber = %self.id, "unmounted");
        }
    }
}

impl fmt::Debug for MountedWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedWidget")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

impl Drop for MountedWidget {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricKey;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct Recorder {
        updates: Arc<Mutex<Vec<ChartUpdate>>>,
        released: Arc<AtomicBool>,
    }

    impl Recorder {
        fn surface(&self) -> Box<dyn ChartSurface> {
            Box::new(self.clone())
        }

        fn last(&self) -> ChartUpdate {
            self.updates.lock().last().cloned().unwrap()
        }

        fn count(&self) -> usize {
            self.updates.lock().len()
        }
    }

    impl ChartSurface for Recorder {
        fn redraw(&mut self, update: &ChartUpdate) -> Result<(), DispatchError> {
            assert!(!self.released.load(Ordering::SeqCst), "redraw after release");
            self.updates.lock().push(update.clone());
            Ok(())
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn tick(cache: &ValueCache, bus: &SubscriptionBus, now: DateTime<Utc>, values: &[(&str, f64)]) {
        cache.write_tick(now, values.iter().map(|(k, v)| (MetricKey::from(*k), *v)));
        let report = bus.dispatch_all(now);
        assert!(report.is_clean(), "{:?}", report.failures);
    }

    #[test]
    fn test_single_line_with_annotation() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::line("cpu").with_annotation("cpu_max").with_unit("%"),
            &cache,
            &bus,
            rec.surface(),
            100,
        );
        assert_eq!(rec.count(), 1);
        assert!(rec.last().series()[0].points.is_empty());

        let t1 = Utc::now();
        tick(&cache, &bus, t1, &[("cpu", 10.0)]);
        let update = rec.last();
        assert_eq!(update.series()[0].points, vec![(t1, 10.0)]);
        assert_eq!(update.annotation, None);
        assert_eq!(widget.view().display_text().as_deref(), Some("10 %"));

        let t2 = t1 + Duration::seconds(5);
        tick(&cache, &bus, t2, &[("cpu", 20.0), ("cpu_max", 50.0)]);
        let update = rec.last();
        assert_eq!(update.series()[0].points, vec![(t1, 10.0), (t2, 20.0)]);
        assert_eq!(
            update.annotation,
            Some(Annotation {
                value: 50.0,
                label: "cpu_max: 50".to_string()
            })
        );
        let view = widget.view();
        assert_eq!(view.current_annotation, Some(50.0));
        assert_eq!(view.last_update, Some(t2));
        assert_eq!(view.display_text().as_deref(), Some("20 / 50 %"));
    }

    #[test]
    fn test_absent_value_plots_zero_and_shows_placeholder() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::line("disk"),
            &cache,
            &bus,
            rec.surface(),
            100,
        );

        let now = Utc::now();
        tick(&cache, &bus, now, &[]);
        assert_eq!(rec.last().series()[0].points, vec![(now, 0.0)]);
        assert_eq!(widget.view().display_text().as_deref(), Some("--"));
    }

    #[test]
    fn test_multi_line_one_series_per_metric() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::line("net").with_metrics(vec!["rx".into(), "tx".into()]),
            &cache,
            &bus,
            rec.surface(),
            2,
        );
        assert_eq!(widget.kind(), ChartKind::Line(Arity::Multi));

        let t0 = Utc::now();
        for i in 0..3 {
            let t = t0 + Duration::seconds(i);
            tick(&cache, &bus, t, &[("rx", i as f64), ("tx", 10.0 * i as f64)]);
        }

        let update = rec.last();
        let names: Vec<&str> = update.series().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["rx", "tx"]);
        assert_eq!(
            update.series()[1].points,
            vec![
                (t0 + Duration::seconds(1), 10.0),
                (t0 + Duration::seconds(2), 20.0)
            ]
        );
        assert_eq!(widget.view().display_text(), None);
    }

    #[test]
    fn test_multi_bar_snapshot_in_metric_order() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let now = Utc::now();
        cache.write_tick(now, vec![("c".into(), 3.0), ("a".into(), 1.0), ("b".into(), 2.0)]);

        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::bar("abc", vec!["a".into(), "b".into(), "c".into()]),
            &cache,
            &bus,
            rec.surface(),
            100,
        );

        let expected = vec![
            BarCategory { x: "a".into(), y: 1.0 },
            BarCategory { x: "b".into(), y: 2.0 },
            BarCategory { x: "c".into(), y: 3.0 },
        ];
        assert_eq!(rec.last().categories(), expected.as_slice());

        bus.dispatch_all(now + Duration::seconds(5));
        assert_eq!(rec.last().categories(), expected.as_slice());
        assert!(widget.series().is_empty());
    }

    #[test]
    fn test_single_bar_keeps_history() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let _widget = ChartWidget::mount(
            ChartDescriptor::bar("load", vec!["load".into()]),
            &cache,
            &bus,
            rec.surface(),
            100,
        );

        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);
        tick(&cache, &bus, t1, &[("load", 1.0)]);
        tick(&cache, &bus, t2, &[("load", 2.0)]);
        assert_eq!(rec.last().series()[0].points, vec![(t1, 1.0), (t2, 2.0)]);
    }

    #[test]
    fn test_mount_seeds_from_cache() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let t1 = Utc::now();
        cache.write("mem".into(), t1, 42.0);
        cache.write("mem_total".into(), t1, 64.0);

        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::line("mem").with_annotation("mem_total"),
            &cache,
            &bus,
            rec.surface(),
            100,
        );

        let seeded = rec.last();
        assert_eq!(seeded.series()[0].points, vec![(t1, 42.0)]);
        assert_eq!(seeded.annotation.map(|a| a.value), Some(64.0));
        assert_eq!(widget.view().display_text().as_deref(), Some("42 / 64"));

        // Dispatch for the same tick that seeded the buffer adds nothing.
        bus.dispatch_all(t1);
        assert_eq!(widget.series()[0].points.len(), 1);
    }

    #[test]
    fn test_clock_stepping_back_still_appends() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let widget = ChartWidget::mount(ChartDescriptor::line("cpu"), &cache, &bus, rec.surface(), 100);

        let t = Utc::now();
        let earlier = t - Duration::seconds(30);
        let later = t - Duration::seconds(25);
        tick(&cache, &bus, t, &[("cpu", 1.0)]);
        tick(&cache, &bus, earlier, &[("cpu", 2.0)]);
        tick(&cache, &bus, later, &[("cpu", 3.0)]);

        assert_eq!(
            widget.series()[0].points,
            vec![(t, 1.0), (earlier, 2.0), (later, 3.0)]
        );
        assert_eq!(widget.view().display_text().as_deref(), Some("3"));
    }

    #[test]
    fn test_unmount_deregisters_then_releases() {
        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let widget = ChartWidget::mount(
            ChartDescriptor::line("cpu"),
            &cache,
            &bus,
            rec.surface(),
            100,
        );
        let id = widget.id();
        assert!(bus.contains(id));

        widget.unmount();
        assert!(!bus.contains(id));
        assert!(rec.released.load(Ordering::SeqCst));

        let before = rec.count();
        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 0);
        assert_eq!(rec.count(), before);
    }

    #[test]
    fn test_failing_surface_reported_by_bus() {
        struct Broken;
        impl ChartSurface for Broken {
            fn redraw(&mut self, _: &ChartUpdate) -> Result<(), DispatchError> {
                Err(DispatchError::Render("canvas gone".into()))
            }
        }

        let cache = ValueCache::new();
        let bus = SubscriptionBus::new();
        let rec = Recorder::default();
        let broken = ChartWidget::mount(
            ChartDescriptor::line("a"),
            &cache,
            &bus,
            Box::new(Broken),
            100,
        );
        let _ok = ChartWidget::mount(ChartDescriptor::line("b"), &cache, &bus, rec.surface(), 100);

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, broken.id());
        assert_eq!(rec.count(), 2);
    }

    #[test]
    fn test_display_text_formats() {
        let view = WidgetView {
            id: SubscriberId(1),
            chart_id: "cpu".into(),
            title: "CPU".into(),
            unit: Some("percent".into()),
            kind: ChartKind::Line(Arity::Single),
            current_value: None,
            current_annotation: Some(100.0),
            last_update: None,
        };
        assert_eq!(view.display_text().as_deref(), Some("-- / 100 percent"));
    }
}
