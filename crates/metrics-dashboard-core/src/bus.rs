//! Subscription bus: fan-out of poll ticks to mounted chart widgets.
//!
//! Each mounted widget registers one dispatch callback under a
//! [`SubscriberId`]. The poller calls [`SubscriptionBus::dispatch_all`] once
//! per tick, after the value cache has been fully updated. A failing or
//! panicking callback is reported and skipped; it never stops the others.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::DispatchError;

/// Callback invoked with the tick timestamp.
pub type DispatchFn = Arc<dyn Fn(DateTime<Utc>) -> Result<(), DispatchError> + Send + Sync>;

/// Identifier of one mounted subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of one `dispatch_all` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Number of callbacks invoked, failed ones included.
    pub invoked: usize,
    /// Subscribers whose callback returned an error or panicked.
    pub failures: Vec<(SubscriberId, DispatchError)>,
}

impl DispatchReport {
    /// Callbacks that completed without error.
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    /// Returns true if no callback failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct BusInner {
    subscribers: RwLock<HashMap<SubscriberId, DispatchFn>>,
    next_id: AtomicU64,
}

/// Shared registry of dispatch callbacks. Clones share the same registry.
#[derive(Clone)]
pub struct SubscriptionBus {
    inner: Arc<BusInner>,
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl SubscriptionBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Allocate an id never handed out before by this bus.
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add or replace the callback for `id`.
    ///
    /// Callers must pick ids unique among mounted widgets; [`subscribe`]
    /// does that for them.
    ///
    /// [`subscribe`]: Self::subscribe
    pub fn register(&self, id: SubscriberId, dispatch: DispatchFn) {
        if self.inner.subscribers.write().insert(id, dispatch).is_some() {
            debug!(subscriber = %id, "replaced dispatch callback");
        }
    }

    /// Remove the callback for `id`; no-op when absent.
    pub fn deregister(&self, id: SubscriberId) {
        self.inner.subscribers.write().remove(&id);
    }

    /// Register `dispatch` under a fresh id and return a handle that
    /// deregisters it when dropped.
    pub fn subscribe<F>(&self, dispatch: F) -> Subscription
    where
        F: Fn(DateTime<Utc>) -> Result<(), DispatchError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.register(id, Arc::new(dispatch));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every registered callback with `now`.
    ///
    /// Callbacks run outside the registry lock, so they may register or
    /// deregister subscribers themselves.
    pub fn dispatch_all(&self, now: DateTime<Utc>) -> DispatchReport {
        let snapshot: Vec<(SubscriberId, DispatchFn)> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(id, f)| (*id, Arc::clone(f)))
            .collect();

        let mut report = DispatchReport {
            invoked: snapshot.len(),
            failures: Vec::new(),
        };

        for (id, dispatch) in snapshot {
            let outcome = match catch_unwind(AssertUnwindSafe(|| dispatch(now))) {
                Ok(result) => result,
                Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
            };

            if let Err(e) = outcome {
                warn!(subscriber = %id, error = %e, "dispatch failed");
                report.failures.push((id, e));
            }
        }

        report
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.read().contains_key(&id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Returns true if no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration returned by [`SubscriptionBus::subscribe`].
///
/// Dropping the handle deregisters the callback. The handle does not keep
/// the bus alive.
#[must_use = "dropping a Subscription deregisters it immediately"]
pub struct Subscription {
    id: SubscriberId,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Id this handle is registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deregister now. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.subscribers.write().remove(&self.id);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(DateTime<Utc>) -> Result<(), DispatchError> {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_reaches_every_subscriber() {
        let bus = SubscriptionBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = bus.subscribe(counting(&hits));
        let _b = bus.subscribe(counting(&hits));
        let _c = bus.subscribe(counting(&hits));

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 3);
        assert!(report.is_clean());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_is_isolated() {
        let bus = SubscriptionBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = bus.subscribe(counting(&hits));
        let failing = bus.subscribe(|_| Err(DispatchError::Render("boom".into())));
        let _c = bus.subscribe(counting(&hits));

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.failures,
            vec![(failing.id(), DispatchError::Render("boom".into()))]
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_is_isolated() {
        let bus = SubscriptionBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = bus.subscribe(counting(&hits));
        let _p = bus.subscribe(|_| panic!("widget exploded"));
        let _c = bus.subscribe(counting(&hits));

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].1,
            DispatchError::Panicked("widget exploded".into())
        );
    }

    #[test]
    fn test_drop_deregisters() {
        let bus = SubscriptionBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = bus.subscribe(counting(&hits));
        let id = sub.id();
        assert!(bus.contains(id));

        drop(sub);
        assert!(!bus.contains(id));

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_replaces_and_deregister_is_idempotent() {
        let bus = SubscriptionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = bus.next_id();

        let first = Arc::clone(&seen);
        bus.register(
            id,
            Arc::new(move |_| {
                first.lock().push("first");
                Ok(())
            }),
        );
        let second = Arc::clone(&seen);
        bus.register(
            id,
            Arc::new(move |_| {
                second.lock().push("second");
                Ok(())
            }),
        );

        bus.dispatch_all(Utc::now());
        assert_eq!(*seen.lock(), vec!["second"]);
        assert_eq!(bus.len(), 1);

        bus.deregister(id);
        bus.deregister(id);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let bus = SubscriptionBus::new();
        let a = bus.subscribe(|_| Ok(()));
        let b = bus.subscribe(|_| Ok(()));
        assert_ne!(a.id(), b.id());
        let reused = a.id();
        a.cancel();
        let c = bus.subscribe(|_| Ok(()));
        assert_ne!(c.id(), reused);
    }

    #[test]
    fn test_callback_may_deregister_itself() {
        let bus = SubscriptionBus::new();
        let id = bus.next_id();
        let handle = bus.clone();
        bus.register(
            id,
            Arc::new(move |_| {
                handle.deregister(id);
                Ok(())
            }),
        );

        let report = bus.dispatch_all(Utc::now());
        assert_eq!(report.invoked, 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = SubscriptionBus::new();
        let sub = bus.subscribe(|_| Ok(()));
        drop(bus);
        drop(sub);
    }
}
