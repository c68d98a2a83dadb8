use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::dispatch::TickDispatcher;
use crate::event::CoreEvent;
use crate::model::signal::SignalFired;
use crate::model::tick::Tick;

#[derive(Debug, Clone, Default)]
pub struct ReplayTicks {
    pub ticks: Vec<Tick>,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub ticks: u64,
    pub bars_completed: u64,
    pub samples: u64,
    pub signals: Vec<SignalFired>,
    pub realized_return: f64,
    pub max_drawdown: f64,
    pub completed_trades: u32,
}

const TIME_COLUMNS: [&str; 4] = ["date", "datetime", "timestamp", "time"];
const PRICE_COLUMNS: [&str; 2] = ["close", "price"];

fn find_column(header: &StringRecord, names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

/// Parse a row timestamp into epoch milliseconds. Accepts RFC 3339,
/// `YYYY-MM-DD HH:MM:SS[+HH:MM]` (naive values are UTC), bare dates and
/// integer milliseconds.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Read historic rows (needs a date-like and a close/price column) as ticks, in file order.
pub fn parse_csv<R: Read>(input: R, symbol: &str) -> Result<ReplayTicks> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);
    let header = reader
        .headers()
        .context("failed to read csv header")?
        .clone();
    let Some(time_idx) = find_column(&header, &TIME_COLUMNS) else {
        bail!("csv header has no date/timestamp column: {:?}", header);
    };
    let Some(price_idx) = find_column(&header, &PRICE_COLUMNS) else {
        bail!("csv header has no close/price column: {:?}", header);
    };

    let mut out = ReplayTicks::default();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read csv row {}", row + 1))?;
        let parsed = record
            .get(time_idx)
            .and_then(parse_timestamp_ms)
            .zip(record.get(price_idx).and_then(|p| p.parse::<f64>().ok()));
        match parsed {
            Some((timestamp_ms, price)) => out.ticks.push(Tick::new(symbol, price, timestamp_ms)),
            None => {
                out.skipped_rows += 1;
                tracing::debug!(row = row + 1, record = ?record, "skipping unparseable csv row");
            }
        }
    }
    Ok(out)
}

pub fn load_csv(path: &Path, symbol: &str) -> Result<ReplayTicks> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_csv(file, symbol)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Feed `ticks` through the dispatcher in order and summarize the run.
pub fn replay(dispatcher: &mut TickDispatcher, ticks: &[Tick]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for tick in ticks {
        summary.ticks += 1;
        for event in dispatcher.feed_tick(tick) {
            match event {
                CoreEvent::BarCompleted { .. } => summary.bars_completed += 1,
                CoreEvent::IndicatorUpdated { .. } => summary.samples += 1,
                CoreEvent::SignalFired { signal, .. } => summary.signals.push(signal),
                _ => {}
            }
        }
    }
    dispatcher.flush();

    let machine = dispatcher.pipeline().machine();
    summary.realized_return = machine.realized_return();
    summary.max_drawdown = machine.max_drawdown();
    summary.completed_trades = machine.completed_trades();
    summary
}
