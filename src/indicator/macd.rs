use serde::{Deserialize, Serialize};

use super::ema::Ema;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSample {
    pub timestamp_ms: i64,
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdSample {
    pub fn is_finite(&self) -> bool {
        self.macd.is_finite() && self.signal.is_finite() && self.histogram.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast_span: usize,
    pub slow_span: usize,
    pub signal_span: usize,
    /// Observations required before samples are reported; the engine is
    /// ready once it has seen strictly more than this many closes.
    pub warmup_bars: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast_span: 18,
            slow_span: 26,
            signal_span: 9,
            warmup_bars: 26,
        }
    }
}

impl MacdParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.fast_span == 0 || self.slow_span == 0 || self.signal_span == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "EMA spans must be > 0 (fast={}, slow={}, signal={})",
                self.fast_span, self.slow_span, self.signal_span
            )));
        }
        if self.fast_span >= self.slow_span {
            return Err(CoreError::InvalidConfig(format!(
                "fast_span ({}) must be < slow_span ({})",
                self.fast_span, self.slow_span
            )));
        }
        Ok(())
    }
}

/// What one observation produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorOutcome {
    /// State advanced but not enough closes have been seen yet.
    Warming { observed: usize, required: usize },
    Ready(MacdSample),
    /// The update would have produced a non-finite value; state was left as it was.
    Defect { close: f64, timestamp_ms: i64 },
}

impl IndicatorOutcome {
    pub fn sample(&self) -> Option<&MacdSample> {
        match self {
            Self::Ready(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Incremental MACD: fast/slow EMAs of the close, a signal EMA of their
/// difference, and the histogram between them. Each close is applied once,
/// in arrival order.
#[derive(Debug, Clone)]
pub struct MacdEngine {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    warmup_bars: usize,
    observed: usize,
    defects: u64,
}

struct Candidate {
    macd: f64,
    signal: f64,
    histogram: f64,
}

impl MacdEngine {
    pub fn new(params: MacdParams) -> Result<Self, CoreError> {
        params.validate()?;
        Ok(Self {
            fast: Ema::new(params.fast_span),
            slow: Ema::new(params.slow_span),
            signal: Ema::new(params.signal_span),
            warmup_bars: params.warmup_bars,
            observed: 0,
            defects: 0,
        })
    }

    fn candidate(&self, close: f64) -> Option<Candidate> {
        let fast = self.fast.peek(close);
        let slow = self.slow.peek(close);
        let macd = fast - slow;
        let signal = self.signal.peek(macd);
        let histogram = macd - signal;
        [fast, slow, macd, signal, histogram]
            .iter()
            .all(|v| v.is_finite())
            .then_some(Candidate {
                macd,
                signal,
                histogram,
            })
    }

    fn outcome(&self, observed: usize, candidate: &Candidate, timestamp_ms: i64) -> IndicatorOutcome {
        if observed <= self.warmup_bars {
            return IndicatorOutcome::Warming {
                observed,
                required: self.warmup_bars + 1,
            };
        }
        IndicatorOutcome::Ready(MacdSample {
            timestamp_ms,
            macd: candidate.macd,
            signal: candidate.signal,
            histogram: candidate.histogram,
        })
    }

    /// Apply one completed bar close.
    pub fn observe(&mut self, close: f64, timestamp_ms: i64) -> IndicatorOutcome {
        let Some(candidate) = self.candidate(close) else {
            self.defects += 1;
            tracing::warn!(close, timestamp_ms, "MACD update produced a non-finite value; skipped");
            return IndicatorOutcome::Defect {
                close,
                timestamp_ms,
            };
        };

        self.fast.push(close);
        self.slow.push(close);
        self.signal.push(candidate.macd);
        self.observed += 1;
        self.outcome(self.observed, &candidate, timestamp_ms)
    }

    /// The indicator as if `current_close` (the in-progress bar) were the next
    /// completed close. Engine state is not modified.
    pub fn preview(&self, current_close: f64, timestamp_ms: i64) -> IndicatorOutcome {
        match self.candidate(current_close) {
            Some(candidate) => self.outcome(self.observed + 1, &candidate, timestamp_ms),
            None => IndicatorOutcome::Defect {
                close: current_close,
                timestamp_ms,
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.observed > self.warmup_bars
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn defects(&self) -> u64 {
        self.defects
    }

    pub fn fast_value(&self) -> Option<f64> {
        self.fast.value()
    }

    pub fn slow_value(&self) -> Option<f64> {
        self.slow.value()
    }

    pub fn signal_value(&self) -> Option<f64> {
        self.signal.value()
    }
}
