use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub timestamp_ms: i64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp_ms,
        }
    }

    /// Reject ticks that must never reach the aggregator: non-finite or
    /// negative price, or a timestamp before the epoch.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_tick(self.price, self.timestamp_ms)
    }
}

pub fn validate_tick(price: f64, timestamp_ms: i64) -> Result<(), CoreError> {
    if !price.is_finite() || price < 0.0 || timestamp_ms < 0 {
        return Err(CoreError::InvalidTick {
            price,
            timestamp_ms,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_tick() {
        assert!(Tick::new("BTCUSDT", 42_000.5, 1_700_000_000_000)
            .validate()
            .is_ok());
        assert!(validate_tick(0.0, 0).is_ok());
    }

    #[test]
    fn rejects_non_finite_and_negative_values() {
        assert!(validate_tick(f64::NAN, 0).is_err());
        assert!(validate_tick(f64::INFINITY, 0).is_err());
        assert!(validate_tick(-1.0, 0).is_err());
        assert_eq!(
            validate_tick(10.0, -5),
            Err(CoreError::InvalidTick {
                price: 10.0,
                timestamp_ms: -5
            })
        );
    }
}
