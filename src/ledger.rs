use std::collections::HashMap;

use serde::Serialize;

use crate::error::LedgerError;
use crate::model::signal::SignalKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerFill {
    pub fill_id: String,
    pub asset: String,
    pub side: SignalKind,
    pub qty: f64,
    pub price: f64,
    pub balance_after: f64,
}

/// Cash balance plus per-asset holdings. Never lets either go negative.
#[derive(Debug, Clone)]
pub struct Ledger {
    name: String,
    balance: f64,
    holdings: HashMap<String, f64>,
    fills: Vec<LedgerFill>,
}

impl Ledger {
    pub fn new(name: impl Into<String>, initial_balance: f64) -> Self {
        Self {
            name: name.into(),
            balance: initial_balance,
            holdings: HashMap::new(),
            fills: Vec::new(),
        }
    }

    fn check_order(qty: f64, price: f64) -> Result<(), LedgerError> {
        if !(qty.is_finite() && qty > 0.0 && price.is_finite() && price >= 0.0) {
            return Err(LedgerError::InvalidQuantity { qty, price });
        }
        Ok(())
    }

    fn record(&mut self, asset: &str, side: SignalKind, qty: f64, price: f64) -> LedgerFill {
        let fill = LedgerFill {
            fill_id: uuid::Uuid::new_v4().to_string(),
            asset: asset.to_string(),
            side,
            qty,
            price,
            balance_after: self.balance,
        };
        self.fills.push(fill.clone());
        fill
    }

    pub fn buy(&mut self, asset: &str, qty: f64, price: f64) -> Result<LedgerFill, LedgerError> {
        Self::check_order(qty, price)?;
        let cost = qty * price;
        if cost > self.balance {
            return Err(LedgerError::InsufficientBalance {
                required: cost,
                available: self.balance,
            });
        }
        self.balance -= cost;
        *self.holdings.entry(asset.to_string()).or_insert(0.0) += qty;
        Ok(self.record(asset, SignalKind::Buy, qty, price))
    }

    pub fn sell(&mut self, asset: &str, qty: f64, price: f64) -> Result<LedgerFill, LedgerError> {
        Self::check_order(qty, price)?;
        let held = self.holding(asset);
        if held < qty {
            return Err(LedgerError::InsufficientHoldings {
                asset: asset.to_string(),
                required: qty,
                available: held,
            });
        }
        self.balance += qty * price;
        let remaining = held - qty;
        if remaining <= f64::EPSILON {
            self.holdings.remove(asset);
        } else {
            self.holdings.insert(asset.to_string(), remaining);
        }
        Ok(self.record(asset, SignalKind::Sell, qty, price))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn holding(&self, asset: &str) -> f64 {
        self.holdings.get(asset).copied().unwrap_or(0.0)
    }

    pub fn holdings(&self) -> &HashMap<String, f64> {
        &self.holdings
    }

    pub fn fills(&self) -> &[LedgerFill] {
        &self.fills
    }
}
