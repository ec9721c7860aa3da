//! Bounded per-series sample history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::DEFAULT_HISTORY_WINDOW;
use crate::metric::Sample;

/// FIFO buffer of samples that never grows past its window.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBuffer {
    samples: VecDeque<Sample>,
    window: usize,
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl SeriesBuffer {
    /// Create an empty buffer. A window of 0 is treated as 1.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Append a sample, evicting and returning the oldest one when full.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.samples.push_back(sample);
        if self.samples.len() > self.window {
            self.samples.pop_front()
        } else {
            None
        }
    }

    /// Iterate samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples kept.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Oldest-first copy of the buffered points.
    pub fn points(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.samples.iter().map(Sample::point).collect()
    }

    /// Drop every buffered sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
