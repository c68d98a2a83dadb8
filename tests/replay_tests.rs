use std::sync::{Arc, Mutex};

use tokio_test::assert_ok;

use macd_pulse::dispatch::TickDispatcher;
use macd_pulse::ledger::Ledger;
use macd_pulse::model::signal::SignalKind;
use macd_pulse::pipeline::{InstrumentPipeline, PipelineConfig};
use macd_pulse::replay::{parse_csv, replay};
use macd_pulse::sink::LedgerSink;
use macd_pulse::strategy::predicate::PredicateKind;

fn minute_csv(closes: &[f64]) -> String {
    let mut out = String::from(",symbol,date,open,high,low,close,volume\n");
    for (i, close) in closes.iter().enumerate() {
        let minutes = i as i64;
        out.push_str(&format!(
            "{},mu,1970-01-01 {:02}:{:02}:00,{c},{c},{c},{c},1000\n",
            i,
            minutes / 60,
            minutes % 60,
            c = close
        ));
    }
    out
}

fn minute_dispatcher(ledger: Arc<Mutex<Ledger>>) -> TickDispatcher {
    dispatcher_with(
        ledger,
        PredicateKind::default_buy(),
        PredicateKind::default_sell(),
    )
}

fn dispatcher_with(
    ledger: Arc<Mutex<Ledger>>,
    buy: PredicateKind,
    sell: PredicateKind,
) -> TickDispatcher {
    let pipeline =
        InstrumentPipeline::new("MU", PipelineConfig::default(), buy.build(), sell.build())
            .expect("valid config");
    TickDispatcher::new(pipeline).with_sink(Box::new(LedgerSink::new(ledger, 1.0)))
}

#[test]
fn flat_history_buys_once_and_never_sells() {
    let csv = minute_csv(&[100.0; 30]);
    let loaded = assert_ok!(parse_csv(csv.as_bytes(), "MU"));
    assert_eq!(loaded.ticks.len(), 30);

    let ledger = Arc::new(Mutex::new(Ledger::new("replay", 1_000.0)));
    let mut dispatcher = minute_dispatcher(ledger.clone());
    let summary = replay(&mut dispatcher, &loaded.ticks);

    assert_eq!(summary.ticks, 30);
    assert_eq!(summary.bars_completed, 29);
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.signals.len(), 1);
    assert_eq!(summary.signals[0].kind, SignalKind::Buy);
    assert_eq!(summary.signals[0].timestamp_ms, 27 * 60_000);
    assert_eq!(summary.completed_trades, 0);
    assert_eq!(summary.realized_return, 0.0);

    let ledger = ledger.lock().unwrap();
    assert!((ledger.balance() - 900.0).abs() < 1e-9);
    assert!((ledger.holding("MU") - 1.0).abs() < f64::EPSILON);
}

#[test]
fn replay_is_deterministic() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + (i as f64 / 7.0).sin() * 5.0 + (i % 5) as f64 * 0.3)
        .collect();
    let csv = minute_csv(&closes);
    let loaded = assert_ok!(parse_csv(csv.as_bytes(), "MU"));

    let run = || {
        let ledger = Arc::new(Mutex::new(Ledger::new("replay", 1_000_000.0)));
        let mut dispatcher = minute_dispatcher(ledger);
        replay(&mut dispatcher, &loaded.ticks)
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.bars_completed, 119);
    assert_eq!(first.samples, 119 - 26);

    // Signals strictly alternate starting with BUY.
    for (i, signal) in first.signals.iter().enumerate() {
        let expected = if i % 2 == 0 { SignalKind::Buy } else { SignalKind::Sell };
        assert_eq!(signal.kind, expected);
    }
    assert!(first.max_drawdown <= 0.0);
}

/// A band wide enough to always hold turns every ready bar into a signal, so
/// the round trips and their P&L can be worked out by hand.
#[test]
fn round_trips_book_hand_computed_pnl() {
    let mut closes = vec![100.0; 28];
    closes.extend([97.0, 90.0, 95.0]);
    let csv = minute_csv(&closes);
    let loaded = assert_ok!(parse_csv(csv.as_bytes(), "MU"));

    let always = PredicateKind::HistogramBand { threshold: 1e9 };
    let ledger = Arc::new(Mutex::new(Ledger::new("replay", 1_000.0)));
    let mut dispatcher = dispatcher_with(ledger.clone(), always, always);
    let summary = replay(&mut dispatcher, &loaded.ticks);

    let fired: Vec<(SignalKind, f64, Option<f64>)> = summary
        .signals
        .iter()
        .map(|s| (s.kind, s.price, s.trade_pnl))
        .collect();
    assert_eq!(
        fired,
        vec![
            (SignalKind::Buy, 100.0, None),
            (SignalKind::Sell, 97.0, Some(-3.0)),
            (SignalKind::Buy, 90.0, None),
            (SignalKind::Sell, 95.0, Some(5.0)),
        ]
    );
    assert_eq!(summary.signals[0].timestamp_ms, 27 * 60_000);
    assert_eq!(summary.signals[3].timestamp_ms, 30 * 60_000);
    assert_eq!(summary.completed_trades, 2);
    assert!((summary.realized_return - 2.0).abs() < 1e-12);
    assert!((summary.max_drawdown + 3.0).abs() < 1e-12);
    assert!((summary.signals[1].max_drawdown_after + 3.0).abs() < 1e-12);

    let ledger = ledger.lock().unwrap();
    assert!((ledger.balance() - 1_002.0).abs() < 1e-9);
    assert!(ledger.holdings().is_empty());
    assert_eq!(ledger.fills().len(), 4);
}
