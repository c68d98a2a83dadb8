use macd_pulse::error::LedgerError;
use macd_pulse::ledger::Ledger;
use macd_pulse::model::signal::SignalKind;

#[test]
fn buy_then_sell_moves_cash_and_holdings() {
    let mut ledger = Ledger::new("bot", 1_000.0);
    let fill = ledger.buy("MU", 3.0, 100.0).unwrap();
    assert_eq!(fill.side, SignalKind::Buy);
    assert!((fill.balance_after - 700.0).abs() < 1e-9);
    assert!((ledger.holding("MU") - 3.0).abs() < f64::EPSILON);

    ledger.buy("MU", 1.0, 50.0).unwrap();
    assert!((ledger.holding("MU") - 4.0).abs() < f64::EPSILON);

    ledger.sell("MU", 4.0, 120.0).unwrap();
    assert!((ledger.balance() - 1_130.0).abs() < 1e-9);
    assert!(ledger.holdings().get("MU").is_none());
    assert_eq!(ledger.fills().len(), 3);
    assert_ne!(ledger.fills()[0].fill_id, ledger.fills()[1].fill_id);
}

#[test]
fn buy_fails_without_enough_balance() {
    let mut ledger = Ledger::new("bot", 100.0);
    let err = ledger.buy("MU", 2.0, 60.0).unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            required: 120.0,
            available: 100.0
        }
    );
    assert!((ledger.balance() - 100.0).abs() < f64::EPSILON);
    assert!(ledger.fills().is_empty());
}

#[test]
fn sell_fails_without_enough_holdings() {
    let mut ledger = Ledger::new("bot", 100.0);
    assert!(matches!(
        ledger.sell("MU", 1.0, 10.0),
        Err(LedgerError::InsufficientHoldings { .. })
    ));
    ledger.buy("MU", 1.0, 10.0).unwrap();
    assert!(ledger.sell("MU", 2.0, 10.0).is_err());
    assert!((ledger.holding("MU") - 1.0).abs() < f64::EPSILON);
}

#[test]
fn partial_sell_keeps_remaining_position() {
    let mut ledger = Ledger::new("bot", 100.0);
    ledger.buy("MU", 4.0, 10.0).unwrap();
    ledger.sell("MU", 1.5, 12.0).unwrap();
    assert!((ledger.holding("MU") - 2.5).abs() < 1e-12);
    assert!((ledger.balance() - 78.0).abs() < 1e-9);
}

#[test]
fn rejects_non_positive_quantity() {
    let mut ledger = Ledger::new("bot", 100.0);
    assert!(matches!(
        ledger.buy("MU", 0.0, 10.0),
        Err(LedgerError::InvalidQuantity { .. })
    ));
    assert!(ledger.sell("MU", -1.0, 10.0).is_err());
    assert_eq!(ledger.name(), "bot");
}
