use serde::{Deserialize, Serialize};

use crate::indicator::macd::MacdSample;
use crate::model::bar::Bar;
use crate::model::signal::SignalFired;

/// Everything the core reports to its sinks, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    BarCompleted {
        symbol: String,
        bar: Bar,
    },
    IndicatorUpdated {
        symbol: String,
        sample: MacdSample,
    },
    SignalFired {
        symbol: String,
        signal: SignalFired,
    },
    /// Tick failed boundary validation.
    TickRejected {
        symbol: String,
        price: f64,
        timestamp_ms: i64,
    },
    /// Tick mapped to a bucket older than the current bar.
    TickDropped {
        symbol: String,
        price: f64,
        timestamp_ms: i64,
        tick_bucket: i64,
        current_bucket: i64,
    },
    NumericDefect {
        symbol: String,
        close: f64,
        timestamp_ms: i64,
    },
}

impl CoreEvent {
    pub fn symbol(&self) -> &str {
        match self {
            Self::BarCompleted { symbol, .. }
            | Self::IndicatorUpdated { symbol, .. }
            | Self::SignalFired { symbol, .. }
            | Self::TickRejected { symbol, .. }
            | Self::TickDropped { symbol, .. }
            | Self::NumericDefect { symbol, .. } => symbol,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BarCompleted { .. } => "bar_completed",
            Self::IndicatorUpdated { .. } => "indicator_updated",
            Self::SignalFired { .. } => "signal_fired",
            Self::TickRejected { .. } => "tick_rejected",
            Self::TickDropped { .. } => "tick_dropped",
            Self::NumericDefect { .. } => "numeric_defect",
        }
    }
}
