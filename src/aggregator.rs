use std::collections::VecDeque;

use crate::model::bar::{bucket_start, Bar};

/// Bounded FIFO of completed bars. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct BarHistory {
    capacity: usize,
    bars: VecDeque<Bar>,
}

impl BarHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be > 0");
        Self {
            capacity,
            bars: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a completed bar, returning the evicted one when full.
    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        let evicted = if self.bars.len() >= self.capacity {
            self.bars.pop_front()
        } else {
            None
        };
        self.bars.push_back(bar);
        evicted
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Bar> + ExactSizeIterator {
        self.bars.iter()
    }
}

/// Result of folding one tick into the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarUpdate {
    /// First tick ever seen; a current bar now exists.
    Opened { bucket_start: i64 },
    /// The tick landed in the current bucket.
    Updated { bucket_start: i64 },
    /// The tick opened a later bucket; the previous current bar is complete.
    Rolled { completed: Bar, bucket_start: i64 },
    /// The tick belongs to a bucket older than the current one and was ignored.
    Stale {
        tick_bucket: i64,
        current_bucket: i64,
    },
}

impl BarUpdate {
    pub fn completed(&self) -> Option<&Bar> {
        match self {
            Self::Rolled { completed, .. } => Some(completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarAggregator {
    interval_secs: u64,
    current: Option<Bar>,
    history: BarHistory,
    stale_dropped: u64,
}

impl BarAggregator {
    pub fn new(interval_secs: u64, history_capacity: usize) -> Self {
        assert!(interval_secs > 0, "interval_secs must be > 0");
        Self {
            interval_secs,
            current: None,
            history: BarHistory::new(history_capacity),
            stale_dropped: 0,
        }
    }

    /// Fold a validated tick into the current bar.
    ///
    /// A tick whose bucket is older than the current bar's is dropped instead of
    /// rewriting history. Duplicate ticks in the current bucket are ordinary updates.
    pub fn update(&mut self, price: f64, timestamp_ms: i64) -> BarUpdate {
        let bucket = bucket_start(timestamp_ms, self.interval_secs);

        let Some(current) = self.current.as_mut() else {
            self.current = Some(Bar::open_at(bucket, price));
            return BarUpdate::Opened {
                bucket_start: bucket,
            };
        };

        if bucket == current.bucket_start {
            current.update(price);
            return BarUpdate::Updated {
                bucket_start: bucket,
            };
        }

        if bucket < current.bucket_start {
            self.stale_dropped += 1;
            return BarUpdate::Stale {
                tick_bucket: bucket,
                current_bucket: current.bucket_start,
            };
        }

        let completed = *current;
        self.history.push(completed);
        self.current = Some(Bar::open_at(bucket, price));
        BarUpdate::Rolled {
            completed,
            bucket_start: bucket,
        }
    }

    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &BarHistory {
        &self.history
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }
}
