//! Rolling latency window.

use std::collections::VecDeque;

use serde::Serialize;

/// Number of samples kept in a rolling latency window.
pub const LATENCY_WINDOW: usize = 100;

/// Aggregates computed over the current window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub count: usize,
}

/// Bounded FIFO of the most recent latency samples, in milliseconds.
///
/// Aggregates are recomputed from the window on every `stats()` call, so
/// evictions never leave stale running totals behind.
#[derive(Clone, Debug)]
pub struct LatencySampler {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencySampler {
    /// Window of [`LATENCY_WINDOW`] samples.
    pub fn new() -> Self {
        Self::with_capacity(LATENCY_WINDOW)
    }

    /// Window of `capacity` samples, at least one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when the window is full.
    pub fn record(&mut self, latency_ms: u64) {
        if self.samples.len() >= self.capacity {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Average, min, max and count over the window. All zero when empty.
    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let count = self.samples.len();
        let sum: u64 = self.samples.iter().sum();
        LatencyStats {
            avg: sum as f64 / count as f64,
            min: self.samples.iter().copied().min().unwrap_or(0),
            max: self.samples.iter().copied().max().unwrap_or(0),
            count,
        }
    }

    /// Samples in insertion order, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencySampler {
    fn default() -> Self {
        Self::new()
    }
}
