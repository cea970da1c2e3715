//! Loop-level guarantees of the backtest engine: ordering guards, failure
//! isolation, determinism and the health cadence.

mod common;

use backtester::{Backtester, EngineFailure, RunRequest, TerminationReason, verify_replay};
use common::*;
use configuration::{MACrossoverParams, parse_config};
use core_types::Action;
use health::{HealthCheckPolicy, ScheduleContext};
use market_data::{HistoricalPrices, PriceProvider};
use risk::RejectReason;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use strategies::{MACrossover, MarketView, StrategyId, create_strategy};

/// Two tickers oscillating around 100 with different periods.
fn wavy_prices() -> HistoricalPrices {
    let wave = [0, 3, 6, 9, 12, 9, 6, 3, 0, -3, -6, -9, -12, -9, -6, -3];
    let mut prices = HistoricalPrices::new();
    for day in 1..=30u32 {
        let i = day as usize;
        prices
            .insert("A", d(day), Decimal::from(100 + wave[i % wave.len()]))
            .unwrap();
        prices
            .insert("B", d(day), Decimal::from(80 + wave[(i * 2) % wave.len()] / 2))
            .unwrap();
    }
    prices
}

fn ma_engine(commission: Decimal) -> Backtester {
    let provider: Arc<dyn PriceProvider> = Arc::new(wavy_prices());
    let market = MarketView::new(
        provider.clone(),
        vec!["A".to_string(), "B".to_string()],
        dec!(100000),
        dec!(0.20),
    );
    let strategy = MACrossover::new(
        MACrossoverParams {
            fast_period: 3,
            slow_period: 8,
        },
        market,
    )
    .unwrap();
    let costs = costs(commission);
    Backtester::new(
        Box::new(strategy),
        provider,
        Box::new(
            risk::LeverageConstraints::new(configuration::Constraints::default(), costs.clone())
                .unwrap(),
        ),
        Box::new(executor::SimulatedExecutor::with_cost_model(costs)),
    )
}

#[test]
fn identical_inputs_replay_identically() {
    let first = ma_engine(dec!(1)).run(&days(1..=30), dec!(100000));
    let second = ma_engine(dec!(1)).run(&days(1..=30), dec!(100000));

    assert_eq!(first.final_status, TerminationReason::Completed);
    assert!(!first.trades.is_empty());
    assert_eq!(first.snapshots.len(), 30);
    assert!(verify_replay(&first, &second).is_ok());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.final_nav(), second.final_nav());
    assert_eq!(first.trades, second.trades);
    assert!(first.audit().is_ok());
}

#[test]
fn divergent_runs_are_caught_at_the_first_different_day() {
    let cheap = ma_engine(dec!(0)).run(&days(1..=30), dec!(100000));
    let costly = ma_engine(dec!(5)).run(&days(1..=30), dec!(100000));

    let violation = verify_replay(&cheap, &costly).unwrap_err();
    let first_trade_day = cheap.trades[0].date;
    assert_eq!(violation.date, first_trade_day);
    assert_eq!(cheap.snapshots[violation.index].date, first_trade_day);
    assert_ne!(violation.expected, violation.actual);
}

#[test]
fn strategy_failure_costs_only_that_day() {
    let mut strategy = scripted().fail_on(d(3));
    for day in 1..=5 {
        strategy = strategy.on(d(day), vec![decision("A", Action::Buy, dec!(10))]);
    }
    let result = engine(strategy, flat_prices(&["A"], 5, dec!(100)), dec!(0)).run(&days(1..=5), dec!(100000));

    assert_eq!(result.final_status, TerminationReason::Completed);
    assert_eq!(result.snapshots.len(), 5);
    assert_eq!(result.invariant_log.len(), 5);
    assert_eq!(result.determinism_digest_sequence.len(), 5);

    let day3 = &result.snapshots[2];
    assert!(day3.strategy_failed);
    assert_eq!(day3.decisions_accepted, 0);
    assert_eq!(result.trades.len(), 4);
    assert_eq!(result.summary().unwrap().strategy_failure_days, 1);
}

#[test]
fn duplicate_date_aborts_before_the_repeat_is_traded() {
    let mut strategy = scripted();
    for day in 1..=3 {
        strategy = strategy.on(d(day), vec![decision("A", Action::Buy, dec!(10))]);
    }
    let dates = [d(1), d(2), d(2), d(3)];
    let result = engine(strategy, flat_prices(&["A"], 3, dec!(100)), dec!(0)).run(&dates, dec!(100000));

    assert_eq!(
        result.final_status,
        TerminationReason::Aborted(EngineFailure::DuplicateDate { date: d(2), index: 2 })
    );
    assert_eq!(result.snapshots.len(), 2);
    assert_eq!(result.trades.len(), 2);

    let report = result.summary().unwrap();
    assert_eq!(report.termination, "aborted");
    assert_eq!(report.days_processed, 2);
}

#[test]
fn out_of_order_date_aborts() {
    let result = engine(scripted(), flat_prices(&["A"], 3, dec!(100)), dec!(0))
        .run(&[d(1), d(3), d(2)], dec!(100000));
    assert_eq!(
        result.final_status.failure(),
        Some(&EngineFailure::NonMonotonicDate {
            date: d(2),
            previous: d(3),
            index: 2
        })
    );
    assert_eq!(result.snapshots.len(), 2);
}

#[test]
fn missing_or_zero_price_rejects_only_that_decision() {
    let quotes = RawQuotes::default()
        .with("A", d(1), dec!(100))
        .with("Z", d(1), dec!(0));
    let strategy = scripted().on(
        d(1),
        vec![
            decision("A", Action::Buy, dec!(10)),
            decision("Z", Action::Buy, dec!(10)),
            decision("Q", Action::Buy, dec!(10)),
        ],
    );
    let result = engine(strategy, quotes, dec!(0)).run(&[d(1)], dec!(100000));

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.rejections.len(), 2);
    assert!(result
        .rejections
        .iter()
        .all(|r| r.reason == RejectReason::PriceUnavailable));
}

#[test]
fn negative_price_is_malformed_input() {
    let quotes = RawQuotes::default()
        .with("A", d(1), dec!(100))
        .with("A", d(2), dec!(-5));
    let strategy = scripted().on(d(1), vec![decision("A", Action::Buy, dec!(10))]);
    let result = engine(strategy, quotes, dec!(0)).run(&days(1..=2), dec!(100000));

    assert!(matches!(
        result.final_status,
        TerminationReason::Aborted(EngineFailure::MalformedInput(_))
    ));
    assert_eq!(result.snapshots.len(), 1);
    assert!(result.summary().is_ok());
}

#[test]
fn held_ticker_without_a_quote_keeps_its_last_mark() {
    let quotes = RawQuotes::default()
        .with("A", d(1), dec!(100))
        .with("B", d(2), dec!(50));
    let strategy = scripted().on(d(1), vec![decision("A", Action::Buy, dec!(10))]);
    let result = engine(strategy, quotes, dec!(0)).run(&days(1..=2), dec!(100000));

    let day2 = &result.snapshots[1];
    assert_eq!(day2.marks["A"], dec!(100));
    assert_eq!(day2.nav, dec!(100000));
    assert_eq!(day2.gross_exposure, dec!(1000));
}

#[test]
fn health_runs_on_first_last_and_scheduled_days() {
    let result = engine(scripted(), flat_prices(&["A"], 7, dec!(100)), dec!(0)).run(&days(1..=7), dec!(100000));

    let checked: Vec<bool> = result.snapshots.iter().map(|s| s.health_checked).collect();
    assert_eq!(checked, vec![true, false, false, false, false, true, true]);
    assert_eq!(result.health_history.len(), 3);
    assert!(result
        .snapshots
        .iter()
        .all(|s| s.health_status == core_types::HealthStatus::Excellent));
    assert!(result.invariant_log[1].contains("(carried)"));
}

#[test]
fn day_before_a_refused_date_is_health_checked() {
    let dates = [d(1), d(2), d(3), d(3)];
    let result = engine(scripted(), flat_prices(&["A"], 3, dec!(100)), dec!(0)).run(&dates, dec!(100000));

    assert!(matches!(
        result.final_status,
        TerminationReason::Aborted(EngineFailure::DuplicateDate { .. })
    ));
    let checked: Vec<bool> = result.snapshots.iter().map(|s| s.health_checked).collect();
    assert_eq!(checked, vec![true, false, true]);
    assert_eq!(result.health_history.len(), 2);
}

#[test]
fn mid_day_abort_still_assesses_the_last_processed_day() {
    let quotes = RawQuotes::default()
        .with("A", d(1), dec!(100))
        .with("A", d(2), dec!(100))
        .with("A", d(3), dec!(100))
        .with("A", d(4), dec!(-1));
    let strategy = scripted().on(d(1), vec![decision("A", Action::Buy, dec!(10))]);
    let result = engine(strategy, quotes, dec!(0)).run(&days(1..=6), dec!(100000));

    assert!(matches!(
        result.final_status,
        TerminationReason::Aborted(EngineFailure::MalformedInput(_))
    ));
    assert_eq!(result.snapshots.len(), 3);
    assert!(!result.snapshots[2].health_checked);
    assert_eq!(result.health_history.len(), 2);
    assert_eq!(result.health_history[1].0, d(3));
    // The late reading does not touch the recorded snapshot or its digest.
    assert!(result.audit().is_ok());
}

#[test]
fn absurd_quantity_is_rejected_and_the_day_goes_on() {
    let huge = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
    let strategy = scripted().on(
        d(1),
        vec![
            decision("A", Action::Buy, huge),
            decision("A", Action::Buy, dec!(10)),
        ],
    );
    let result = engine(strategy, flat_prices(&["A"], 2, dec!(100)), dec!(0)).run(&days(1..=2), dec!(100000));

    assert_eq!(result.final_status, TerminationReason::Completed);
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].quantity, dec!(10));
    assert_eq!(result.rejections.len(), 1);
    assert!(matches!(
        result.rejections[0].reason,
        RejectReason::InvalidDecision(_)
    ));
}

/// Checks only on one chosen day; everything else comes from the mandatory rules.
struct OnlyDay(usize);

impl HealthCheckPolicy for OnlyDay {
    fn should_check(&self, ctx: &ScheduleContext) -> bool {
        ctx.day_index == self.0
    }
}

#[test]
fn a_degraded_reading_forces_a_check_the_next_day() {
    let mut prices = flat_prices(&["A", "B", "C", "D", "E"], 1, dec!(100));
    for day in 2..=5 {
        prices.insert("A", d(day), dec!(100)).unwrap();
        for ticker in ["B", "C", "D", "E"] {
            prices.insert(ticker, d(day), dec!(31.25)).unwrap();
        }
    }
    let mut opening = Vec::new();
    for ticker in ["B", "C", "D", "E"] {
        opening.push(decision(ticker, Action::Buy, dec!(200)));
    }
    opening.push(decision("A", Action::Buy, dec!(10)));
    let strategy = scripted().on(d(1), opening);

    let result = engine(strategy, prices, dec!(0))
        .with_health_policy(Box::new(OnlyDay(1)))
        .run(&days(1..=5), dec!(100000));

    assert!(result.snapshots[1].health_status.is_degraded());
    let checked: Vec<bool> = result.snapshots.iter().map(|s| s.health_checked).collect();
    assert_eq!(checked, vec![true; 5]);

    let calm = engine(scripted(), flat_prices(&["A"], 5, dec!(100)), dec!(0))
        .with_health_policy(Box::new(OnlyDay(1)))
        .run(&days(1..=5), dec!(100000));
    let checked: Vec<bool> = calm.snapshots.iter().map(|s| s.health_checked).collect();
    assert_eq!(checked, vec![true, true, false, false, true]);
}

#[test]
fn run_request_uses_the_union_calendar_in_range() {
    let mut prices = HistoricalPrices::new();
    for (ticker, day) in [("A", 1), ("A", 2), ("A", 4), ("B", 3), ("B", 10)] {
        prices.insert(ticker, d(day), dec!(10)).unwrap();
    }
    let request = RunRequest {
        tickers: vec!["A".to_string(), "B".to_string()],
        start_date: d(2),
        end_date: d(5),
        initial_capital: dec!(5000),
        margin_requirement: dec!(1),
    };
    let result = engine(scripted(), prices, dec!(0)).run_request(&request);

    let dates: Vec<_> = result.snapshots.iter().map(|s| s.date).collect();
    assert_eq!(dates, vec![d(2), d(3), d(4)]);
    assert_eq!(result.initial_capital, dec!(5000));
}

#[test]
fn non_positive_capital_is_refused_up_front() {
    let result = engine(scripted(), flat_prices(&["A"], 1, dec!(1)), dec!(0)).run(&[d(1)], dec!(0));
    assert!(result.is_aborted());
    assert!(result.snapshots.is_empty());
}

const CONFIG: &str = r#"
[backtest]
tickers = ["A", "B"]
start_date = "2024-03-01"
end_date = "2024-03-30"
initial_capital = 100000
strategy = "ensemble"
prices_path = "unused.csv"

[simulation]
commission_per_trade = 1
slippage_bps = 5

[health]
check_interval_days = 10

[strategies.ma_crossover]
fast_period = 3
slow_period = 8

[strategies.rsi_reversion]
rsi_period = 5
oversold = 30
overbought = 70
"#;

#[test]
fn configured_engine_runs_end_to_end() {
    let config = parse_config(CONFIG).unwrap();
    let provider: Arc<dyn PriceProvider> = Arc::new(wavy_prices());
    let strategy = create_strategy(StrategyId::Ensemble, &config, provider.clone()).unwrap();

    let backtester = Backtester::from_config(&config, strategy, provider).unwrap();
    let result = backtester.run_request(&RunRequest::from_config(&config));

    assert_eq!(result.final_status, TerminationReason::Completed);
    assert_eq!(result.snapshots.len(), 30);
    assert_eq!(result.run_id, backtester.run_id());

    let report = result.summary().unwrap();
    assert_eq!(report.total_trades, result.trades.len());
    let attributed: usize = report.attribution.values().map(|a| a.trades).sum();
    assert_eq!(attributed, result.trades.len());
    for trade in &result.trades {
        assert!(trade.agent == "ma_crossover" || trade.agent == "rsi_reversion");
    }
}
