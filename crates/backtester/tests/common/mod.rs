#![allow(dead_code)]

use backtester::Backtester;
use chrono::NaiveDate;
use configuration::Constraints;
use core_types::{Action, Decision, TradingDate};
use executor::{CostModel, SimulatedExecutor};
use market_data::{HistoricalPrices, MarketDataError, PriceProvider};
use risk::LeverageConstraints;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use strategies::{ScriptedStrategy, Strategy};
use uuid::Uuid;

pub fn d(day: u32) -> TradingDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

pub fn days(range: std::ops::RangeInclusive<u32>) -> Vec<TradingDate> {
    range.map(d).collect()
}

/// Every ticker quoted at `price` on days `1..=n`.
pub fn flat_prices(tickers: &[&str], n: u32, price: Decimal) -> HistoricalPrices {
    let mut prices = HistoricalPrices::new();
    for ticker in tickers {
        for day in 1..=n {
            prices.insert(ticker, d(day), price).unwrap();
        }
    }
    prices
}

pub fn decision(ticker: &str, action: Action, quantity: Decimal) -> Decision {
    Decision::new("", ticker, action, quantity, dec!(100))
}

pub fn costs(commission_per_trade: Decimal) -> CostModel {
    CostModel {
        commission_per_trade,
        ..CostModel::frictionless()
    }
}

/// An engine with default limits, a flat per-trade commission and the default
/// health cadence.
pub fn engine<P: PriceProvider + 'static>(
    strategy: impl Strategy + 'static,
    prices: P,
    commission_per_trade: Decimal,
) -> Backtester {
    let costs = costs(commission_per_trade);
    let checker = LeverageConstraints::new(Constraints::default(), costs.clone()).unwrap();
    Backtester::new(
        Box::new(strategy),
        Arc::new(prices),
        Box::new(checker),
        Box::new(SimulatedExecutor::with_cost_model(costs)),
    )
    .with_run_id(Uuid::nil())
}

pub fn scripted() -> ScriptedStrategy {
    ScriptedStrategy::new("desk")
}

/// A raw quote table that, unlike `HistoricalPrices`, will hand out whatever
/// it was given, negative prices included.
#[derive(Debug, Default)]
pub struct RawQuotes(pub BTreeMap<(String, TradingDate), Decimal>);

impl RawQuotes {
    pub fn with(mut self, ticker: &str, date: TradingDate, price: Decimal) -> Self {
        self.0.insert((ticker.to_string(), date), price);
        self
    }
}

impl PriceProvider for RawQuotes {
    fn get_price(&self, ticker: &str, date: TradingDate) -> Result<Decimal, MarketDataError> {
        self.0
            .get(&(ticker.to_string(), date))
            .copied()
            .ok_or_else(|| MarketDataError::NotFound {
                ticker: ticker.to_string(),
                date,
            })
    }

    fn history(&self, _ticker: &str, _until: TradingDate, _n: usize) -> Vec<Decimal> {
        Vec::new()
    }

    fn trading_dates(
        &self,
        _tickers: &[String],
        _start: TradingDate,
        _end: TradingDate,
    ) -> Vec<TradingDate> {
        Vec::new()
    }
}
