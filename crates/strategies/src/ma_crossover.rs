use crate::error::StrategyError;
use crate::market::{MarketView, held};
use crate::Strategy;
use configuration::MACrossoverParams;
use core_types::{Action, DailySnapshot, Decision, PositionSide, TradingDate};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use ta::indicators::SimpleMovingAverage as Sma;
use ta::Next;

/// The dual Moving Average Crossover strategy, long only.
///
/// Enters when the fast SMA is above the slow SMA and the ticker is flat long;
/// exits the whole long when the fast SMA drops below the slow SMA.
pub struct MACrossover {
    name: String,
    params: MACrossoverParams,
    market: MarketView,
}

impl MACrossover {
    /// Creates a new `MACrossover` instance with the given parameters.
    ///
    /// It performs validation to ensure the parameters are logical.
    pub fn new(params: MACrossoverParams, market: MarketView) -> Result<Self, StrategyError> {
        if params.fast_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "MA periods cannot be zero".to_string(),
            ));
        }
        if params.fast_period >= params.slow_period {
            return Err(StrategyError::InvalidParameters(
                "Fast MA period must be less than Slow MA period".to_string(),
            ));
        }
        Ok(Self {
            name: "ma_crossover".to_string(),
            params,
            market,
        })
    }

    /// Fast and slow SMA at `date`, or `None` during warm-up.
    fn averages(
        &self,
        ticker: &str,
        date: TradingDate,
    ) -> Result<Option<(f64, f64)>, StrategyError> {
        let closes = self.market.closes(ticker, date, self.params.slow_period)?;
        if closes.len() < self.params.slow_period {
            return Ok(None);
        }

        let mut fast = Sma::new(self.params.fast_period)
            .map_err(|e| StrategyError::IndicatorError(format!("{e:?}")))?;
        let mut slow = Sma::new(self.params.slow_period)
            .map_err(|e| StrategyError::IndicatorError(format!("{e:?}")))?;
        let (mut fast_ma, mut slow_ma) = (0.0, 0.0);
        for close in closes {
            fast_ma = fast.next(close);
            slow_ma = slow.next(close);
        }
        Ok(Some((fast_ma, slow_ma)))
    }
}

/// 50 at a touch, 100 once the spread reaches 5% of the slow average.
fn confidence_from_spread(fast: f64, slow: f64) -> Decimal {
    if slow <= 0.0 {
        return Decimal::ZERO;
    }
    let spread = ((fast - slow) / slow).abs();
    let score = (0.5 + spread * 10.0).min(1.0) * 100.0;
    Decimal::from_f64(score)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

impl Strategy for MACrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(
        &self,
        date: TradingDate,
        prior: Option<&DailySnapshot>,
    ) -> Result<Vec<Decision>, StrategyError> {
        let mut decisions = Vec::new();

        for ticker in self.market.tickers() {
            let Some(price) = self.market.price(ticker, date) else {
                continue;
            };
            let Some((fast, slow)) = self.averages(ticker, date)? else {
                tracing::debug!(%ticker, %date, "MACrossover: warming up");
                continue;
            };
            tracing::debug!(%ticker, %date, fast, slow, "MACrossover: averages");

            let long_qty = held(prior, ticker, PositionSide::Long);
            if fast > slow && long_qty.is_zero() {
                let confidence = confidence_from_spread(fast, slow);
                let quantity = self.market.size(confidence, price, prior);
                if quantity > Decimal::ZERO {
                    decisions.push(Decision::new(
                        &self.name,
                        ticker,
                        Action::Buy,
                        quantity,
                        confidence,
                    ));
                }
            } else if fast < slow && long_qty > Decimal::ZERO {
                decisions.push(Decision::new(
                    &self.name,
                    ticker,
                    Action::Sell,
                    long_qty,
                    dec!(100),
                ));
            }
        }

        Ok(decisions)
    }
}
