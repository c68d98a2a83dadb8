use crate::aggregator::{BarAggregator, BarUpdate};
use crate::error::CoreError;
use crate::event::CoreEvent;
use crate::indicator::macd::{IndicatorOutcome, MacdEngine, MacdParams, MacdSample};
use crate::indicator::macd_log::MacdLog;
use crate::model::tick::validate_tick;
use crate::strategy::machine::{Decision, SignalMachine};
use crate::strategy::predicate::Predicate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub interval_secs: u64,
    pub macd: MacdParams,
    pub history_capacity: usize,
    pub macd_log_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            macd: MacdParams::default(),
            history_capacity: 500,
            macd_log_capacity: 32,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "interval_secs must be > 0".to_string(),
            ));
        }
        self.macd.validate()?;
        if self.history_capacity <= self.macd.warmup_bars {
            return Err(CoreError::InvalidConfig(format!(
                "history_capacity ({}) must exceed warmup_bars ({})",
                self.history_capacity, self.macd.warmup_bars
            )));
        }
        Ok(())
    }
}

/// Per-instrument state: aggregator, MACD engine, sample log and signal
/// machine. One `feed` call is one indivisible unit of work; callers must
/// serialize calls for the same instrument.
#[derive(Debug)]
pub struct InstrumentPipeline {
    symbol: String,
    aggregator: BarAggregator,
    engine: MacdEngine,
    macd_log: MacdLog,
    machine: SignalMachine,
    ticks_accepted: u64,
}

impl InstrumentPipeline {
    pub fn new(
        symbol: impl Into<String>,
        config: PipelineConfig,
        buy: Box<dyn Predicate>,
        sell: Box<dyn Predicate>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            symbol: symbol.into(),
            aggregator: BarAggregator::new(config.interval_secs, config.history_capacity),
            engine: MacdEngine::new(config.macd)?,
            macd_log: MacdLog::new(config.macd_log_capacity),
            machine: SignalMachine::new(buy, sell),
            ticks_accepted: 0,
        })
    }

    /// Apply one tick: aggregate, update the indicator on bar completion and
    /// evaluate the signal machine at the tick price once the engine is ready.
    ///
    /// Ticks inside the current bar are evaluated against the latest
    /// completed-bar sample; a rolling tick is evaluated against the new one.
    pub fn feed(&mut self, price: f64, timestamp_ms: i64) -> Result<Vec<CoreEvent>, CoreError> {
        validate_tick(price, timestamp_ms)?;
        self.ticks_accepted += 1;

        let completed = match self.aggregator.update(price, timestamp_ms) {
            BarUpdate::Opened { .. } | BarUpdate::Updated { .. } => {
                if !self.engine.is_ready() {
                    return Ok(Vec::new());
                }
                let Some(sample) = self.macd_log.latest().copied() else {
                    return Ok(Vec::new());
                };
                return Ok(Vec::from_iter(self.evaluate_signal(sample, price, timestamp_ms)));
            }
            BarUpdate::Stale {
                tick_bucket,
                current_bucket,
            } => {
                tracing::debug!(
                    symbol = %self.symbol,
                    price,
                    timestamp_ms,
                    tick_bucket,
                    current_bucket,
                    "dropping out-of-order tick"
                );
                return Ok(vec![CoreEvent::TickDropped {
                    symbol: self.symbol.clone(),
                    price,
                    timestamp_ms,
                    tick_bucket,
                    current_bucket,
                }]);
            }
            BarUpdate::Rolled { completed, .. } => completed,
        };

        let mut events = vec![CoreEvent::BarCompleted {
            symbol: self.symbol.clone(),
            bar: completed,
        }];

        let sample = match self.engine.observe(completed.close, timestamp_ms) {
            IndicatorOutcome::Ready(sample) => sample,
            IndicatorOutcome::Warming { observed, required } => {
                tracing::trace!(symbol = %self.symbol, observed, required, "MACD warming up");
                return Ok(events);
            }
            IndicatorOutcome::Defect {
                close,
                timestamp_ms,
            } => {
                events.push(CoreEvent::NumericDefect {
                    symbol: self.symbol.clone(),
                    close,
                    timestamp_ms,
                });
                return Ok(events);
            }
        };

        self.macd_log.push(sample);
        events.push(CoreEvent::IndicatorUpdated {
            symbol: self.symbol.clone(),
            sample,
        });

        events.extend(self.evaluate_signal(sample, price, timestamp_ms));
        Ok(events)
    }

    fn evaluate_signal(
        &mut self,
        sample: MacdSample,
        price: f64,
        timestamp_ms: i64,
    ) -> Option<CoreEvent> {
        let decision = self
            .machine
            .evaluate_at(&sample, &self.macd_log, price, timestamp_ms);
        let Decision::Fired(signal) = decision else {
            return None;
        };
        tracing::info!(
            symbol = %self.symbol,
            kind = signal.kind.as_str(),
            price = signal.price,
            timestamp_ms = signal.timestamp_ms,
            realized_return = signal.realized_return_after,
            max_drawdown = signal.max_drawdown_after,
            "signal fired"
        );
        Some(CoreEvent::SignalFired {
            symbol: self.symbol.clone(),
            signal,
        })
    }

    /// MACD including the in-progress bar, without advancing any state.
    pub fn preview(&self) -> Option<IndicatorOutcome> {
        let current = self.aggregator.current()?;
        Some(
            self.engine
                .preview(current.close, current.bucket_start.saturating_mul(1000)),
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn aggregator(&self) -> &BarAggregator {
        &self.aggregator
    }

    pub fn engine(&self) -> &MacdEngine {
        &self.engine
    }

    pub fn macd_log(&self) -> &MacdLog {
        &self.macd_log
    }

    pub fn machine(&self) -> &SignalMachine {
        &self.machine
    }

    pub fn ticks_accepted(&self) -> u64 {
        self.ticks_accepted
    }
}
