use crate::error::StrategyError;
use configuration::Config;
use core_types::{DailySnapshot, PositionSide, TradingDate};
use market_data::PriceProvider;
use risk::size_for_confidence;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;

/// What a rule-based strategy is allowed to see: a universe of tickers, the
/// price history up to today, and enough capital context to size a proposal.
#[derive(Clone)]
pub struct MarketView {
    provider: Arc<dyn PriceProvider>,
    tickers: Vec<String>,
    initial_capital: Decimal,
    max_position_pct: Decimal,
}

impl MarketView {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        tickers: Vec<String>,
        initial_capital: Decimal,
        max_position_pct: Decimal,
    ) -> Self {
        Self {
            provider,
            tickers,
            initial_capital,
            max_position_pct,
        }
    }

    pub fn from_config(config: &Config, provider: Arc<dyn PriceProvider>) -> Self {
        Self::new(
            provider,
            config.backtest.tickers.clone(),
            config.backtest.initial_capital,
            config.constraints.max_position_pct,
        )
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Today's close, if the ticker traded and the quote is usable.
    pub fn price(&self, ticker: &str, date: TradingDate) -> Option<Decimal> {
        self.provider
            .get_price(ticker, date)
            .ok()
            .filter(|p| *p > Decimal::ZERO)
    }

    /// The last `n` closes up to and including `date`, as `f64` for the `ta` crate.
    pub fn closes(
        &self,
        ticker: &str,
        date: TradingDate,
        n: usize,
    ) -> Result<Vec<f64>, StrategyError> {
        self.provider
            .history(ticker, date, n)
            .into_iter()
            .map(|close| {
                close.to_f64().ok_or_else(|| {
                    StrategyError::IndicatorError(format!(
                        "close {close} for {ticker} does not fit in f64"
                    ))
                })
            })
            .collect()
    }

    /// Shares to propose for a new position at the given conviction.
    pub fn size(
        &self,
        confidence: Decimal,
        price: Decimal,
        prior: Option<&DailySnapshot>,
    ) -> Decimal {
        let nav = prior.map(|s| s.nav).unwrap_or(self.initial_capital);
        size_for_confidence(confidence, nav, price, self.max_position_pct)
    }
}

/// Quantity held on one side of a ticker as of the prior snapshot.
pub fn held(prior: Option<&DailySnapshot>, ticker: &str, side: PositionSide) -> Decimal {
    prior
        .and_then(|s| s.positions.get(ticker))
        .map(|p| p.quantity(side))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use core_types::{DailySnapshot, HealthStatus, Position, TradingDate};
    use market_data::HistoricalPrices;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    pub fn d(day: u32) -> TradingDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    /// One close per day starting on Jan 1st.
    pub fn series(ticker: &str, closes: &[i64]) -> HistoricalPrices {
        HistoricalPrices::from_series([(
            ticker,
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| (d(i as u32 + 1), Decimal::from(*c)))
                .collect::<Vec<_>>(),
        )])
        .unwrap()
    }

    pub fn snapshot_holding(date: TradingDate, ticker: &str, position: Position) -> DailySnapshot {
        let mut positions = BTreeMap::new();
        positions.insert(ticker.to_string(), position);
        DailySnapshot {
            date,
            nav: Decimal::from(100_000),
            cash: Decimal::from(100_000),
            gross_exposure: Decimal::ZERO,
            net_exposure: Decimal::ZERO,
            positions,
            marks: BTreeMap::new(),
            decisions_accepted: 0,
            decisions_rejected: 0,
            health_status: HealthStatus::Excellent,
            health_checked: true,
            strategy_failed: false,
        }
    }
}
