use crate::error::StrategyError;
use crate::market::{MarketView, held};
use crate::Strategy;
use configuration::RsiReversionParams;
use core_types::{Action, DailySnapshot, Decision, PositionSide, TradingDate};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use ta::indicators::RelativeStrengthIndex as Rsi;
use ta::Next as _;

const MIDLINE: Decimal = dec!(50);

/// RSI mean reversion on both sides of the book.
///
/// Buys oversold tickers and shorts overbought ones, then closes each side once
/// the RSI crosses back over the 50 midline.
pub struct RsiReversion {
    name: String,
    params: RsiReversionParams,
    market: MarketView,
}

impl RsiReversion {
    pub fn new(params: RsiReversionParams, market: MarketView) -> Result<Self, StrategyError> {
        if params.rsi_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "RSI period cannot be zero".to_string(),
            ));
        }
        if !(Decimal::ZERO < params.oversold
            && params.oversold < MIDLINE
            && MIDLINE < params.overbought
            && params.overbought < Decimal::ONE_HUNDRED)
        {
            return Err(StrategyError::InvalidParameters(format!(
                "need 0 < oversold < 50 < overbought < 100, got {} / {}",
                params.oversold, params.overbought
            )));
        }
        Ok(Self {
            name: "rsi_reversion".to_string(),
            params,
            market,
        })
    }

    /// RSI at `date` over a window long enough for the smoothing to settle.
    fn rsi(&self, ticker: &str, date: TradingDate) -> Result<Option<Decimal>, StrategyError> {
        let closes = self.market.closes(ticker, date, self.params.rsi_period * 3)?;
        if closes.len() <= self.params.rsi_period {
            return Ok(None);
        }
        let mut rsi = Rsi::new(self.params.rsi_period).map_err(|e| {
            StrategyError::IndicatorError(format!("Failed to initialize RSI: {e:?}"))
        })?;
        let value = closes.into_iter().fold(50.0, |_, c| rsi.next(c));
        Decimal::from_f64(value)
            .map(|v| Some(v.round_dp(4)))
            .ok_or_else(|| StrategyError::IndicatorError(format!("RSI {value} is not finite")))
    }

    /// Conviction grows with the distance past the threshold.
    fn confidence(&self, rsi: Decimal, threshold: Decimal) -> Decimal {
        let span = if threshold < MIDLINE {
            threshold
        } else {
            Decimal::ONE_HUNDRED - threshold
        };
        if span.is_zero() {
            return dec!(100);
        }
        let depth = (rsi - threshold).abs() / span;
        (dec!(50) + dec!(50) * depth).min(dec!(100)).round_dp(2)
    }
}

impl Strategy for RsiReversion {
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
            let Some(rsi) = self.rsi(ticker, date)? else {
                continue;
            };
            tracing::debug!(%ticker, %date, %rsi, "RsiReversion: evaluated");

            let long_qty = held(prior, ticker, PositionSide::Long);
            let short_qty = held(prior, ticker, PositionSide::Short);

            if rsi < self.params.oversold && long_qty.is_zero() {
                let confidence = self.confidence(rsi, self.params.oversold);
                let quantity = self.market.size(confidence, price, prior);
                if quantity > Decimal::ZERO {
                    decisions.push(Decision::new(&self.name, ticker, Action::Buy, quantity, confidence));
                }
            } else if rsi > MIDLINE && long_qty > Decimal::ZERO {
                decisions.push(Decision::new(&self.name, ticker, Action::Sell, long_qty, dec!(100)));
            }

            if rsi > self.params.overbought && short_qty.is_zero() {
                let confidence = self.confidence(rsi, self.params.overbought);
                let quantity = self.market.size(confidence, price, prior);
                if quantity > Decimal::ZERO {
                    decisions.push(Decision::new(&self.name, ticker, Action::Short, quantity, confidence));
                }
            } else if rsi < MIDLINE && short_qty > Decimal::ZERO {
                decisions.push(Decision::new(&self.name, ticker, Action::Cover, short_qty, dec!(100)));
            }
        }

        Ok(decisions)
    }
}
