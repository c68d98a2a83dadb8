use super::predicate::Predicate;
use crate::indicator::macd::MacdSample;
use crate::indicator::macd_log::MacdLog;
use crate::model::signal::{SignalFired, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedState {
    ArmedToBuy,
    ArmedToSell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Fired(SignalFired),
    Hold,
    /// The sample carried a non-finite value and was ignored.
    SkippedDefect,
}

impl Decision {
    pub fn fired(&self) -> Option<&SignalFired> {
        match self {
            Self::Fired(sig) => Some(sig),
            _ => None,
        }
    }
}

/// How many times each predicate was consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationCounters {
    pub buy_evaluations: u64,
    pub sell_evaluations: u64,
    pub skipped_defects: u64,
}

/// Two-state BUY/SELL machine. Only the predicate for the armed side is
/// ever evaluated.
#[derive(Debug)]
pub struct SignalMachine {
    state: ArmedState,
    buy: Box<dyn Predicate>,
    sell: Box<dyn Predicate>,
    entry_price: f64,
    realized_return: f64,
    max_drawdown: f64,
    completed_trades: u32,
    counters: EvaluationCounters,
}

impl SignalMachine {
    pub fn new(buy: Box<dyn Predicate>, sell: Box<dyn Predicate>) -> Self {
        Self {
            state: ArmedState::ArmedToBuy,
            buy,
            sell,
            entry_price: 0.0,
            realized_return: 0.0,
            max_drawdown: 0.0,
            completed_trades: 0,
            counters: EvaluationCounters::default(),
        }
    }

    /// Evaluate the armed predicate against `sample`, whose latest entry in
    /// `history` is `sample` itself. `price` is the current bar close.
    pub fn evaluate(&mut self, sample: &MacdSample, history: &MacdLog, price: f64) -> Decision {
        self.evaluate_at(sample, history, price, sample.timestamp_ms)
    }

    /// Same as [`evaluate`](Self::evaluate), stamping a fired signal with
    /// `timestamp_ms` instead of the sample's own time.
    pub fn evaluate_at(
        &mut self,
        sample: &MacdSample,
        history: &MacdLog,
        price: f64,
        timestamp_ms: i64,
    ) -> Decision {
        if !sample.is_finite() || !price.is_finite() {
            self.counters.skipped_defects += 1;
            tracing::warn!(
                timestamp_ms = sample.timestamp_ms,
                macd = sample.macd,
                signal = sample.signal,
                histogram = sample.histogram,
                price,
                "non-finite MACD sample skipped by signal machine"
            );
            return Decision::SkippedDefect;
        }

        match self.state {
            ArmedState::ArmedToBuy => {
                self.counters.buy_evaluations += 1;
                if !self.buy.evaluate(sample, history) {
                    return Decision::Hold;
                }
                self.entry_price = price;
                self.state = ArmedState::ArmedToSell;
                Decision::Fired(SignalFired {
                    kind: SignalKind::Buy,
                    price,
                    timestamp_ms,
                    trade_pnl: None,
                    realized_return_after: self.realized_return,
                    max_drawdown_after: self.max_drawdown,
                })
            }
            ArmedState::ArmedToSell => {
                if history.len() < 2 {
                    return Decision::Hold;
                }
                self.counters.sell_evaluations += 1;
                if !self.sell.evaluate(sample, history) {
                    return Decision::Hold;
                }
                let pnl = price - self.entry_price;
                self.realized_return += pnl;
                self.max_drawdown = self.max_drawdown.min(pnl);
                self.completed_trades += 1;
                self.state = ArmedState::ArmedToBuy;
                Decision::Fired(SignalFired {
                    kind: SignalKind::Sell,
                    price,
                    timestamp_ms,
                    trade_pnl: Some(pnl),
                    realized_return_after: self.realized_return,
                    max_drawdown_after: self.max_drawdown,
                })
            }
        }
    }

    pub fn state(&self) -> ArmedState {
        self.state
    }

    pub fn entry_price(&self) -> Option<f64> {
        (self.state == ArmedState::ArmedToSell).then_some(self.entry_price)
    }

    pub fn realized_return(&self) -> f64 {
        self.realized_return
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn completed_trades(&self) -> u32 {
        self.completed_trades
    }

    pub fn counters(&self) -> EvaluationCounters {
        self.counters
    }

    pub fn buy_predicate(&self) -> &'static str {
        self.buy.name()
    }

    pub fn sell_predicate(&self) -> &'static str {
        self.sell.name()
    }
}
