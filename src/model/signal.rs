use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// A confirmed BUY/SELL transition with the bookkeeping after it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalFired {
    pub kind: SignalKind,
    pub price: f64,
    pub timestamp_ms: i64,
    /// P&L of the trade closed by this signal; `None` for BUY.
    pub trade_pnl: Option<f64>,
    pub realized_return_after: f64,
    pub max_drawdown_after: f64,
}
