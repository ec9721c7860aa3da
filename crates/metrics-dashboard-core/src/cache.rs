//! Process-wide latest-value cache.
//!
//! Holds the most recent [`Sample`] per [`MetricKey`]. The poller is the only
//! writer; chart widgets read from it when dispatched and when mounted.
//! Entries are never removed: a key missing from a later poll response keeps
//! its last value.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::metric::{MetricKey, Sample};

/// Shared handle to the latest-value map. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ValueCache {
    entries: Arc<DashMap<MetricKey, Sample>>,
}

impl ValueCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `key`.
    pub fn write(&self, key: MetricKey, timestamp: DateTime<Utc>, value: f64) {
        self.entries.insert(key, Sample::new(timestamp, value));
    }

    /// Write every `(key, value)` of one poll response with a shared timestamp.
    pub fn write_tick<I>(&self, now: DateTime<Utc>, values: I) -> usize
    where
        I: IntoIterator<Item = (MetricKey, f64)>,
    {
        let mut written = 0;
        for (key, value) in values {
            self.write(key, now, value);
            written += 1;
        }
        written
    }

    /// Latest sample for `key`, or `None` if it was never written.
    pub fn read(&self, key: &str) -> Option<Sample> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    /// Latest value for `key`.
    pub fn value(&self, key: &str) -> Option<f64> {
        self.read(key).map(|s| s.value)
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all keys currently cached, sorted.
    pub fn keys(&self) -> Vec<MetricKey> {
        let mut keys: Vec<MetricKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}
