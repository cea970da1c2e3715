//! End-to-end scenarios for the capital and leverage rules, run through the
//! full engine rather than the checker alone.

mod common;

use backtester::TerminationReason;
use common::*;
use core_types::{Action, PositionSide};
use executor::LIQUIDATION_AGENT;
use market_data::HistoricalPrices;
use risk::RejectReason;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn thirty_percent_buy_is_rejected_and_twenty_percent_is_filled_with_commission() {
    let strategy = scripted().on(
        d(1),
        vec![
            decision("A", Action::Buy, dec!(300)),
            decision("A", Action::Buy, dec!(200)),
        ],
    );
    let result = engine(strategy, flat_prices(&["A"], 1, dec!(100)), dec!(2)).run(&[d(1)], dec!(100000));

    assert_eq!(result.final_status, TerminationReason::Completed);
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].quantity, dec!(300));
    assert_eq!(result.rejections[0].reason, RejectReason::PositionLimit);

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].quantity, dec!(200));
    assert_eq!(result.trades[0].commission, dec!(2));
    assert_eq!(result.trades[0].agent, "desk");

    let day = &result.snapshots[0];
    assert_eq!(day.cash, dec!(79998));
    assert_eq!(day.nav, dec!(99998));
    assert_eq!(day.gross_exposure, dec!(20000));
    assert_eq!((day.decisions_accepted, day.decisions_rejected), (1, 1));
}

/// Four 20% longs in B..E plus a small long in A, then B..E fall to `crash`.
fn crash_book(crash: Decimal) -> HistoricalPrices {
    let mut prices = flat_prices(&["A", "B", "C", "D", "E", "F"], 1, dec!(100));
    for ticker in ["A", "F"] {
        prices.insert(ticker, d(2), dec!(100)).unwrap();
    }
    for ticker in ["B", "C", "D", "E"] {
        prices.insert(ticker, d(2), crash).unwrap();
    }
    prices
}

fn opening_day() -> Vec<core_types::Decision> {
    let mut day = vec![];
    for ticker in ["B", "C", "D", "E"] {
        day.push(decision(ticker, Action::Buy, dec!(200)));
    }
    day.push(decision("A", Action::Buy, dec!(10)));
    day
}

#[test]
fn underwater_book_cannot_open_new_sides_but_can_reduce() {
    let strategy = scripted().on(d(1), opening_day()).on(
        d(2),
        vec![
            decision("F", Action::Buy, dec!(10)),
            decision("A", Action::Short, dec!(5)),
            decision("B", Action::Sell, dec!(100)),
        ],
    );
    let result = engine(strategy, crash_book(dec!(31.25)), dec!(0)).run(&days(1..=2), dec!(100000));

    assert_eq!(result.snapshots[0].decisions_accepted, 5);
    let reasons: Vec<_> = result
        .rejections
        .iter()
        .map(|r| (r.ticker.as_str(), r.reason.clone()))
        .collect();
    assert_eq!(
        reasons,
        vec![("F", RejectReason::Underwater), ("A", RejectReason::Underwater)]
    );

    let last = result.trades.last().unwrap();
    assert_eq!((last.ticker.as_str(), last.action), ("B", Action::Sell));
    // 19000 cash + 1000 A + 4 x 6250
    assert_eq!(result.snapshots[1].nav, dec!(45000));
    assert_eq!(result.snapshots[1].decisions_rejected, 2);
}

#[test]
fn adding_to_an_open_side_at_forty_nine_percent_is_allowed() {
    let strategy = scripted().on(d(1), opening_day()).on(
        d(2),
        vec![
            decision("A", Action::Buy, dec!(50)),
            decision("F", Action::Buy, dec!(10)),
        ],
    );
    let result = engine(strategy, crash_book(dec!(36.25)), dec!(0)).run(&days(1..=2), dec!(100000));

    let day2 = &result.snapshots[1];
    assert_eq!(day2.decisions_accepted, 1);
    assert_eq!(day2.positions["A"].quantity(PositionSide::Long), dec!(60));
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].reason, RejectReason::Underwater);
    // NAV was 49% of initial when the order was checked.
    assert_eq!(result.snapshots[1].nav, dec!(49000));
}

#[test]
fn executed_trades_never_breach_the_limits() {
    let tickers = ["A", "B", "C", "D", "E", "F"];
    let mut day1 = Vec::new();
    for ticker in tickers {
        day1.push(decision(ticker, Action::Buy, dec!(500)));
        day1.push(decision(ticker, Action::Buy, dec!(400)));
    }
    let strategy = scripted()
        .on(d(1), day1)
        .on(
            d(2),
            vec![
                decision("A", Action::Buy, dec!(1)),
                decision("F", Action::Short, dec!(100)),
            ],
        )
        .on(
            d(3),
            vec![
                decision("A", Action::Sell, dec!(400)),
                decision("F", Action::Buy, dec!(400)),
            ],
        );
    let result = engine(strategy, flat_prices(&tickers, 3, dec!(50)), dec!(0)).run(&days(1..=3), dec!(100000));

    assert_eq!(result.trades.len(), 7);
    assert_eq!(result.rejections.len(), 9);
    assert!(result.rejections.iter().all(|r| r.reason.is_constraint_violation()));
    assert!(result
        .rejections
        .iter()
        .any(|r| r.reason == RejectReason::GrossExposure));

    for snapshot in &result.snapshots {
        assert!(snapshot.gross_exposure <= snapshot.nav);
        for (_, _, notional) in snapshot.side_notionals() {
            assert!(notional <= snapshot.nav * dec!(0.20));
        }
    }
    assert!(result.snapshots[2].positions.get("A").is_none());
    assert_eq!(result.snapshots[2].positions["F"].long_qty, dec!(400));
}

#[test]
fn non_positive_nav_forces_liquidation_and_ends_the_run() {
    let mut prices = HistoricalPrices::new();
    prices.insert("A", d(1), dec!(100)).unwrap();
    prices.insert("A", d(2), dec!(700)).unwrap();
    prices.insert("A", d(3), dec!(700)).unwrap();
    let strategy = scripted()
        .on(d(1), vec![decision("A", Action::Short, dec!(200))])
        .on(d(3), vec![decision("A", Action::Buy, dec!(1))]);

    let result = engine(strategy, prices, dec!(0)).run(&days(1..=3), dec!(100000));

    assert_eq!(result.final_status, TerminationReason::Liquidated { date: d(2) });
    assert_eq!(result.snapshots.len(), 2);
    assert_eq!(result.determinism_digest_sequence.len(), 2);
    assert_eq!(result.invariant_log.len(), 2);

    let last = result.snapshots.last().unwrap();
    assert!(last.positions.is_empty());
    assert_eq!(last.gross_exposure, Decimal::ZERO);
    assert!(last.nav <= Decimal::ZERO);
    assert!(last.health_checked);

    let closing = result.trades.last().unwrap();
    assert!(closing.liquidation);
    assert_eq!(closing.agent, LIQUIDATION_AGENT);
    assert_eq!((closing.action, closing.quantity, closing.price), (Action::Cover, dec!(200), dec!(700)));
    assert!(result.trades.iter().all(|t| t.date <= d(2)));

    let report = result.summary().unwrap();
    assert_eq!(report.termination, "liquidated");
    assert_eq!(report.liquidation_trades, 1);
}

#[test]
fn oversized_sells_are_clamped_and_empty_sides_cannot_be_reduced() {
    let strategy = scripted()
        .on(d(1), vec![decision("A", Action::Buy, dec!(100))])
        .on(d(2), vec![decision("A", Action::Sell, dec!(500))])
        .on(d(3), vec![decision("A", Action::Cover, dec!(5))]);
    let result = engine(strategy, flat_prices(&["A"], 3, dec!(100)), dec!(0)).run(&days(1..=3), dec!(100000));

    assert_eq!(result.trades[1].quantity, dec!(100));
    assert_eq!(result.trades[1].realized_pnl, Some(dec!(0)));
    assert!(result.snapshots[1].positions.is_empty());
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].reason, RejectReason::NothingToReduce);
}
