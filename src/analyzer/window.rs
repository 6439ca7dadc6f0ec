use std::collections::VecDeque;
use tracing::trace;

/// Fixed-capacity FIFO of recent motion magnitudes
///
/// Once `capacity` samples have been pushed the window stays full; each further
/// push evicts the oldest sample. The running sum is kept so `mean` is O(1).
#[derive(Debug, Clone)]
pub struct SignalWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    /// Total samples ever pushed
    pushed: u64,
}

impl SignalWindow {
    /// Create a window holding at most `capacity` samples
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Signal window capacity must be greater than 0");
        }

        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            pushed: 0,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
                trace!("Evicted sample {} from signal window", evicted);
            }
        }

        self.samples.push_back(sample);
        self.sum += sample;
        self.pushed += 1;
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Mean of the held samples, `None` before the first push
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as f64)
        }
    }

    /// Largest held sample, `None` before the first push
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Samples oldest first
    pub fn as_sequence(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}
