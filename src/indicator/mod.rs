pub mod ema;
pub mod macd;
pub mod macd_log;
