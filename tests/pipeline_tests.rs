use proptest::prelude::*;

use macd_pulse::event::CoreEvent;
use macd_pulse::indicator::macd::{IndicatorOutcome, MacdParams, MacdSample};
use macd_pulse::indicator::macd_log::MacdLog;
use macd_pulse::model::signal::SignalKind;
use macd_pulse::pipeline::{InstrumentPipeline, PipelineConfig};
use macd_pulse::strategy::machine::ArmedState;
use macd_pulse::strategy::predicate::{FnPredicate, Predicate, PredicateKind};

fn pipeline(interval_secs: u64) -> InstrumentPipeline {
    InstrumentPipeline::new(
        "MU",
        PipelineConfig {
            interval_secs,
            ..PipelineConfig::default()
        },
        PredicateKind::default_buy().build(),
        PredicateKind::default_sell().build(),
    )
    .expect("valid pipeline config")
}

/// Deterministic oscillating price path, one tick every 20 s.
fn price_path(n: usize) -> Vec<(f64, i64)> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let price = 100.0 + (x / 15.0).sin() * 4.0 + (x / 3.7).cos() * 0.8;
            (price, i as i64 * 20_000)
        })
        .collect()
}

#[test]
fn first_bar_completes_on_bucket_roll() {
    let mut p = pipeline(300);
    assert!(p.feed(10.0, 0).unwrap().is_empty());
    assert!(p.feed(12.0, 150_000).unwrap().is_empty());
    let events = p.feed(9.0, 305_000).unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        CoreEvent::BarCompleted { symbol, bar } => {
            assert_eq!(symbol, "MU");
            assert_eq!(bar.bucket_start, 0);
            assert!((bar.high - 12.0).abs() < f64::EPSILON);
            assert!((bar.close - 12.0).abs() < f64::EPSILON);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(p.engine().observed(), 1);
}

/// Flat prices: the first ready sample has a zero histogram and buys at the
/// current bar close.
#[test]
fn flat_market_buys_once_after_warmup() {
    let mut p = pipeline(1);
    let mut buys = Vec::new();
    for i in 0..40i64 {
        for event in p.feed(100.0, i * 1_000).unwrap() {
            if let CoreEvent::SignalFired { signal, .. } = event {
                buys.push((i, signal));
            }
        }
    }
    assert_eq!(buys.len(), 1);
    let (tick_index, signal) = buys[0];
    // Bars complete from tick 1 on; the 27th completed bar is the first ready sample.
    assert_eq!(tick_index, 27);
    assert_eq!(signal.kind, SignalKind::Buy);
    assert!((signal.price - 100.0).abs() < f64::EPSILON);
    assert_eq!(p.machine().state(), ArmedState::ArmedToSell);
    assert_eq!(p.macd_log().total(), 39 - 26);
}

/// Two fresh pipelines fed the same ticks emit identical event streams.
#[test]
fn replay_is_deterministic() {
    let run = || {
        let mut p = pipeline(60);
        let mut events = Vec::new();
        for (price, ts) in price_path(4_000) {
            events.extend(p.feed(price, ts).unwrap());
        }
        events
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
    assert!(a
        .iter()
        .any(|e| matches!(e, CoreEvent::IndicatorUpdated { .. })));
}

#[test]
fn stale_tick_produces_drop_event_only() {
    let mut p = pipeline(60);
    p.feed(10.0, 0).unwrap();
    p.feed(11.0, 120_000).unwrap();
    let events = p.feed(50.0, 5_000).unwrap();
    assert_eq!(
        events,
        vec![CoreEvent::TickDropped {
            symbol: "MU".to_string(),
            price: 50.0,
            timestamp_ms: 5_000,
            tick_bucket: 0,
            current_bucket: 120,
        }]
    );
    assert!((p.aggregator().current().unwrap().high - 11.0).abs() < f64::EPSILON);
}

#[test]
fn history_never_exceeds_capacity() {
    let mut p = InstrumentPipeline::new(
        "MU",
        PipelineConfig {
            interval_secs: 1,
            history_capacity: 30,
            ..PipelineConfig::default()
        },
        PredicateKind::default_buy().build(),
        PredicateKind::default_sell().build(),
    )
    .unwrap();
    for i in 0..500i64 {
        p.feed(100.0 + (i % 7) as f64, i * 1_000).unwrap();
        assert!(p.aggregator().history().len() <= 30);
    }
    assert_eq!(p.aggregator().history().iter().next().unwrap().bucket_start, 469);
    assert_eq!(p.engine().observed(), 499);
}

#[test]
fn preview_includes_current_bar_without_advancing() {
    let mut p = InstrumentPipeline::new(
        "MU",
        PipelineConfig {
            interval_secs: 1,
            macd: MacdParams {
                warmup_bars: 0,
                ..MacdParams::default()
            },
            ..PipelineConfig::default()
        },
        PredicateKind::default_buy().build(),
        PredicateKind::default_sell().build(),
    )
    .unwrap();
    assert!(p.preview().is_none());
    p.feed(100.0, 0).unwrap();
    p.feed(105.0, 1_000).unwrap();

    let observed = p.engine().observed();
    let preview = p.preview().unwrap();
    assert!(matches!(preview, IndicatorOutcome::Ready(s) if s.macd > 0.0));
    assert_eq!(p.engine().observed(), observed);
}

#[test]
fn invalid_config_is_rejected() {
    let bad = InstrumentPipeline::new(
        "MU",
        PipelineConfig {
            interval_secs: 0,
            ..PipelineConfig::default()
        },
        PredicateKind::default_buy().build(),
        PredicateKind::default_sell().build(),
    );
    assert!(bad.is_err());
}

fn always(name: &'static str) -> Box<dyn Predicate> {
    Box::new(FnPredicate::new(name, |_: &MacdSample, _: &MacdLog| true))
}

fn signals(events: &[CoreEvent]) -> Vec<(i64, SignalKind, f64)> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::SignalFired { signal, .. } => {
                Some((signal.timestamp_ms, signal.kind, signal.price))
            }
            _ => None,
        })
        .collect()
}

/// Once warm, ticks inside a bar are evaluated too, so a SELL and the
/// following BUY can both happen before the next bar completes.
#[test]
fn intra_bar_ticks_can_sell_and_rebuy() {
    let mut p = InstrumentPipeline::new(
        "MU",
        PipelineConfig {
            interval_secs: 60,
            macd: MacdParams {
                warmup_bars: 0,
                ..MacdParams::default()
            },
            ..PipelineConfig::default()
        },
        always("buy"),
        always("sell"),
    )
    .unwrap();

    let mut events = Vec::new();
    for (price, ts) in [
        (10.0, 0),
        (11.0, 60_000),
        (12.0, 120_000),
        (13.0, 121_000),
        (14.0, 122_000),
    ] {
        events.extend(p.feed(price, ts).unwrap());
    }

    assert_eq!(
        signals(&events),
        vec![
            (60_000, SignalKind::Buy, 11.0),
            (120_000, SignalKind::Sell, 12.0),
            (121_000, SignalKind::Buy, 13.0),
            (122_000, SignalKind::Sell, 14.0),
        ]
    );
    assert_eq!(p.machine().completed_trades(), 2);
    assert!((p.machine().realized_return() - 2.0).abs() < 1e-12);
    assert_eq!(p.engine().observed(), 2);
    assert_eq!(p.macd_log().total(), 2);
}

#[test]
fn intra_bar_ticks_are_ignored_during_warmup() {
    let mut p = InstrumentPipeline::new(
        "MU",
        PipelineConfig::default(),
        always("buy"),
        always("sell"),
    )
    .unwrap();
    let mut events = Vec::new();
    for i in 0..120i64 {
        events.extend(p.feed(100.0, i * 1_000).unwrap());
    }
    assert!(signals(&events).is_empty());
    assert_eq!(p.engine().observed(), 1);
    assert_eq!(p.machine().counters().buy_evaluations, 0);
}

proptest! {
    /// Two fresh pipelines fed the same arbitrary ticks emit identical events.
    #[test]
    fn identical_ticks_replay_identically(
        steps in prop::collection::vec((-5_000i64..40_000, 50.0f64..150.0), 0..300)
    ) {
        let mut ts = 0i64;
        let ticks: Vec<(f64, i64)> = steps
            .iter()
            .map(|&(gap, price)| {
                ts = (ts + gap).max(0);
                (price, ts)
            })
            .collect();
        let run = || {
            let mut p = InstrumentPipeline::new(
                "MU",
                PipelineConfig {
                    interval_secs: 10,
                    macd: MacdParams {
                        fast_span: 3,
                        slow_span: 6,
                        signal_span: 3,
                        warmup_bars: 6,
                    },
                    ..PipelineConfig::default()
                },
                PredicateKind::default_buy().build(),
                PredicateKind::default_sell().build(),
            )
            .unwrap();
            let mut events = Vec::new();
            for &(price, ts) in &ticks {
                events.extend(p.feed(price, ts).unwrap());
            }
            events
        };
        prop_assert_eq!(run(), run());
    }
}
