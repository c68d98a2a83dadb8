use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::event::CoreEvent;
use crate::ledger::Ledger;
use crate::model::signal::SignalKind;

/// Receives core events after the core has committed its own state.
/// An `Err` is advisory: it is logged and never unwinds the pipeline.
pub trait EventSink: Send {
    fn name(&self) -> &'static str;

    fn handle(&mut self, event: &CoreEvent) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Structured log line per event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn handle(&mut self, event: &CoreEvent) -> Result<()> {
        match event {
            CoreEvent::BarCompleted { symbol, bar } => tracing::info!(
                symbol = %symbol,
                bucket_start = bar.bucket_start,
                open = bar.open,
                high = bar.high,
                low = bar.low,
                close = bar.close,
                direction = bar.direction(),
                "bar completed"
            ),
            CoreEvent::IndicatorUpdated { symbol, sample } => tracing::info!(
                symbol = %symbol,
                timestamp_ms = sample.timestamp_ms,
                macd = sample.macd,
                signal = sample.signal,
                histogram = sample.histogram,
                "MACD updated"
            ),
            CoreEvent::SignalFired { symbol, signal } => tracing::info!(
                symbol = %symbol,
                kind = signal.kind.as_str(),
                price = signal.price,
                trade_pnl = ?signal.trade_pnl,
                realized_return = signal.realized_return_after,
                max_drawdown = signal.max_drawdown_after,
                "trade signal"
            ),
            CoreEvent::TickRejected {
                symbol,
                price,
                timestamp_ms,
            } => tracing::warn!(symbol = %symbol, price, timestamp_ms, "tick rejected"),
            CoreEvent::TickDropped {
                symbol,
                timestamp_ms,
                tick_bucket,
                current_bucket,
                ..
            } => tracing::debug!(
                symbol = %symbol,
                timestamp_ms,
                tick_bucket,
                current_bucket,
                "stale tick dropped"
            ),
            CoreEvent::NumericDefect {
                symbol,
                close,
                timestamp_ms,
            } => tracing::warn!(symbol = %symbol, close, timestamp_ms, "numeric defect in MACD update"),
        }
        Ok(())
    }
}

/// Appends every event as one JSON line to `<dir>/events_<symbol>.jsonl`.
#[derive(Debug)]
pub struct JournalSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JournalSink {
    pub fn open(dir: &Path, symbol: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("events_{}.jsonl", symbol.to_ascii_lowercase()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JournalSink {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn handle(&mut self, event: &CoreEvent) -> Result<()> {
        let line = serde_json::to_string(event).context("failed to serialize core event")?;
        writeln!(self.writer, "{}", line)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }
}

/// Turns BUY/SELL signals into ledger orders of a fixed quantity.
#[derive(Debug)]
pub struct LedgerSink {
    ledger: Arc<Mutex<Ledger>>,
    order_qty: f64,
}

impl LedgerSink {
    pub fn new(ledger: Arc<Mutex<Ledger>>, order_qty: f64) -> Self {
        Self { ledger, order_qty }
    }
}

impl EventSink for LedgerSink {
    fn name(&self) -> &'static str {
        "ledger"
    }

    fn handle(&mut self, event: &CoreEvent) -> Result<()> {
        let CoreEvent::SignalFired { symbol, signal } = event else {
            return Ok(());
        };
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| anyhow::anyhow!("ledger lock poisoned"))?;
        let fill = match signal.kind {
            SignalKind::Buy => ledger.buy(symbol, self.order_qty, signal.price),
            SignalKind::Sell => ledger.sell(symbol, self.order_qty, signal.price),
        }
        .with_context(|| {
            format!(
                "ledger rejected {} {} x{} @ {}",
                signal.kind.as_str(),
                symbol,
                self.order_qty,
                signal.price
            )
        })?;
        tracing::info!(
            fill_id = %fill.fill_id,
            symbol = %symbol,
            side = fill.side.as_str(),
            qty = fill.qty,
            price = fill.price,
            balance = fill.balance_after,
            "ledger fill"
        );
        Ok(())
    }
}
