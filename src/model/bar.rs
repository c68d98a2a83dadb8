use serde::{Deserialize, Serialize};

/// A completed or in-progress OHLC bar keyed by its bucket start (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// Start a new bar; every price field begins at the opening trade.
    pub fn open_at(bucket_start: i64, price: f64) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Fold a trade price into the bar. `open` is never touched.
    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn direction(&self) -> &'static str {
        if self.is_bullish() {
            "up"
        } else {
            "down"
        }
    }
}

/// Truncate a millisecond timestamp to the start (in seconds) of its bucket.
pub fn bucket_start(timestamp_ms: i64, interval_secs: u64) -> i64 {
    let interval = interval_secs.max(1) as i64;
    let secs = timestamp_ms.div_euclid(1000);
    secs.div_euclid(interval) * interval
}
