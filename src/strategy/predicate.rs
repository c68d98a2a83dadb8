use std::fmt;

use serde::{Deserialize, Serialize};

use crate::indicator::macd::MacdSample;
use crate::indicator::macd_log::MacdLog;

/// A buy or sell rule over the latest MACD sample.
///
/// `history` already contains `sample` as its latest entry, so
/// `history.previous()` is the sample one step back.
pub trait Predicate: Send + fmt::Debug {
    fn name(&self) -> &'static str;
    fn evaluate(&self, sample: &MacdSample, history: &MacdLog) -> bool;
}

/// Fires while the histogram sits inside `(-threshold, threshold)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBand {
    pub threshold: f64,
}

impl Predicate for HistogramBand {
    fn name(&self) -> &'static str {
        "histogram_band"
    }

    fn evaluate(&self, sample: &MacdSample, _history: &MacdLog) -> bool {
        sample.histogram.abs() < self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    Above,
    Below,
}

/// MACD crossing its signal line between the previous and latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalCross {
    pub direction: CrossDirection,
}

impl Predicate for SignalCross {
    fn name(&self) -> &'static str {
        match self.direction {
            CrossDirection::Above => "cross_above",
            CrossDirection::Below => "cross_below",
        }
    }

    fn evaluate(&self, sample: &MacdSample, history: &MacdLog) -> bool {
        let Some(prev) = history.previous() else {
            return false;
        };
        match self.direction {
            CrossDirection::Above => prev.macd <= prev.signal && sample.macd > sample.signal,
            CrossDirection::Below => prev.macd >= prev.signal && sample.macd < sample.signal,
        }
    }
}

/// MACD still above its signal with a positive histogram, but turning down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FadingMomentum;

impl Predicate for FadingMomentum {
    fn name(&self) -> &'static str {
        "fading_momentum"
    }

    fn evaluate(&self, sample: &MacdSample, history: &MacdLog) -> bool {
        let Some(prev) = history.previous() else {
            return false;
        };
        sample.macd < prev.macd && sample.macd > sample.signal && sample.histogram > 0.0
    }
}

/// Adapts a closure into a named predicate.
pub struct FnPredicate<F> {
    name: &'static str,
    f: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&MacdSample, &MacdLog) -> bool + Send,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("name", &self.name).finish()
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&MacdSample, &MacdLog) -> bool + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn evaluate(&self, sample: &MacdSample, history: &MacdLog) -> bool {
        (self.f)(sample, history)
    }
}

/// Config-selectable predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateKind {
    HistogramBand { threshold: f64 },
    CrossAbove,
    CrossBelow,
    FadingMomentum,
}

impl PredicateKind {
    pub fn default_buy() -> Self {
        Self::HistogramBand { threshold: 0.01 }
    }

    pub fn default_sell() -> Self {
        Self::FadingMomentum
    }

    pub fn build(self) -> Box<dyn Predicate> {
        match self {
            Self::HistogramBand { threshold } => Box::new(HistogramBand { threshold }),
            Self::CrossAbove => Box::new(SignalCross {
                direction: CrossDirection::Above,
            }),
            Self::CrossBelow => Box::new(SignalCross {
                direction: CrossDirection::Below,
            }),
            Self::FadingMomentum => Box::new(FadingMomentum),
        }
    }
}
