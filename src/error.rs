use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid tick: price={price} timestamp_ms={timestamp_ms}")]
    InvalidTick { price: f64, timestamp_ms: i64 },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient balance: need {required:.4}, have {available:.4}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("insufficient holdings of {asset}: need {required}, have {available}")]
    InsufficientHoldings {
        asset: String,
        required: f64,
        available: f64,
    },

    #[error("invalid quantity {qty} at price {price}")]
    InvalidQuantity { qty: f64, price: f64 },
}
