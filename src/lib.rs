pub mod aggregator;
pub mod binance;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod indicator;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod replay;
pub mod sink;
pub mod strategy;
