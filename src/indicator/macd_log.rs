use std::collections::VecDeque;

use super::macd::MacdSample;

/// Ordered, bounded record of recent MACD samples used for look-back.
#[derive(Debug, Clone)]
pub struct MacdLog {
    capacity: usize,
    samples: VecDeque<MacdSample>,
    total: u64,
}

impl MacdLog {
    pub const MIN_CAPACITY: usize = 2;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(Self::MIN_CAPACITY);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            total: 0,
        }
    }

    pub fn push(&mut self, sample: MacdSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total += 1;
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples ever recorded, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn latest(&self) -> Option<&MacdSample> {
        self.samples.back()
    }

    /// The sample recorded before the latest one.
    pub fn previous(&self) -> Option<&MacdSample> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }
        self.samples.get(n - 2)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MacdSample> + ExactSizeIterator {
        self.samples.iter()
    }
}
