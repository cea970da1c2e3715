use crate::enums::{Action, HealthStatus, PositionSide};
use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A calendar date with trading activity.
pub type TradingDate = NaiveDate;

/// A single proposal produced by a strategy for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Name of the strategy (or ensemble member) that produced it.
    #[serde(default)]
    pub agent: String,
    pub ticker: String,
    pub action: Action,
    pub quantity: Decimal,
    /// Conviction in the range `[0, 100]`.
    pub confidence: Decimal,
}

impl Decision {
    pub fn new(
        agent: impl Into<String>,
        ticker: impl Into<String>,
        action: Action,
        quantity: Decimal,
        confidence: Decimal,
    ) -> Self {
        Self {
            agent: agent.into(),
            ticker: ticker.into(),
            action,
            quantity,
            confidence,
        }
    }

    /// A decision that asks for nothing to happen.
    pub fn is_noop(&self) -> bool {
        self.action == Action::Hold || self.quantity.is_zero()
    }

    /// Rejects decisions no strategy should have produced.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ticker.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "ticker".to_string(),
                "empty ticker".to_string(),
            ));
        }
        if self.quantity.is_sign_negative() {
            return Err(CoreError::InvalidInput(
                "quantity".to_string(),
                format!("{} is negative", self.quantity),
            ));
        }
        if self.confidence < Decimal::ZERO || self.confidence > Decimal::ONE_HUNDRED {
            return Err(CoreError::InvalidInput(
                "confidence".to_string(),
                format!("{} is outside [0, 100]", self.confidence),
            ));
        }
        Ok(())
    }
}

/// The holding in one ticker. Long and short sides are tracked independently,
/// so a ticker can be hedged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub long_qty: Decimal,
    pub short_qty: Decimal,
    pub avg_long_cost: Decimal,
    pub avg_short_cost: Decimal,
    /// Cash locked as collateral against the short side.
    pub short_margin: Decimal,
}

impl Position {
    pub fn quantity(&self, side: PositionSide) -> Decimal {
        match side {
            PositionSide::Long => self.long_qty,
            PositionSide::Short => self.short_qty,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.long_qty.is_zero() && self.short_qty.is_zero()
    }

    pub fn long_notional(&self, price: Decimal) -> Decimal {
        self.long_qty * price
    }

    pub fn short_notional(&self, price: Decimal) -> Decimal {
        self.short_qty * price
    }

    /// What the short side is worth to the account right now: the collateral
    /// it holds plus its unrealised profit.
    pub fn short_value(&self, price: Decimal) -> Decimal {
        self.short_margin + self.short_qty * (self.avg_short_cost - price)
    }

    /// Contribution of this position to NAV at the given mark.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.long_notional(price) + self.short_value(price)
    }
}

/// An executed decision. Immutable once it is in the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: TradingDate,
    pub ticker: String,
    pub agent: String,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    /// Profit booked by a `Sell` or `Cover`, net of this trade's friction.
    pub realized_pnl: Option<Decimal>,
    /// Set for trades generated by forced liquidation.
    pub liquidation: bool,
}

impl Trade {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }

    pub fn total_cost(&self) -> Decimal {
        self.commission + self.slippage
    }
}

/// End-of-day record of the run. One per processed date, append-only.
///
/// Field order is part of the determinism digest; do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: TradingDate,
    pub nav: Decimal,
    pub cash: Decimal,
    pub gross_exposure: Decimal,
    pub net_exposure: Decimal,
    pub positions: BTreeMap<String, Position>,
    /// Prices used to mark `positions`.
    pub marks: BTreeMap<String, Decimal>,
    pub decisions_accepted: usize,
    pub decisions_rejected: usize,
    pub health_status: HealthStatus,
    pub health_checked: bool,
    pub strategy_failed: bool,
}

impl DailySnapshot {
    pub fn open_position_count(&self) -> usize {
        self.positions.values().filter(|p| !p.is_flat()).count()
    }

    /// Notional of each open side, keyed by ticker and side.
    pub fn side_notionals(&self) -> Vec<(String, PositionSide, Decimal)> {
        let mut out = Vec::new();
        for (ticker, position) in &self.positions {
            let price = self.marks.get(ticker).copied().unwrap_or(Decimal::ZERO);
            if !position.long_qty.is_zero() {
                out.push((ticker.clone(), PositionSide::Long, position.long_notional(price)));
            }
            if !position.short_qty.is_zero() {
                out.push((ticker.clone(), PositionSide::Short, position.short_notional(price)));
            }
        }
        out
    }
}

/// Content hash of one day's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismRecord {
    pub date: TradingDate,
    pub digest: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn short_value_includes_collateral_and_pnl() {
        let position = Position {
            short_qty: dec!(10),
            avg_short_cost: dec!(50),
            short_margin: dec!(500),
            ..Default::default()
        };
        // Price fell by 5, so the short is up 50.
        assert_eq!(position.short_value(dec!(45)), dec!(550));
        assert_eq!(position.short_notional(dec!(45)), dec!(450));
    }

    #[test]
    fn decision_validation() {
        let ok = Decision::new("a", "AAPL", Action::Buy, dec!(10), dec!(80));
        assert!(ok.validate().is_ok());

        let bad_conf = Decision::new("a", "AAPL", Action::Buy, dec!(10), dec!(101));
        assert!(bad_conf.validate().is_err());

        let bad_qty = Decision::new("a", "AAPL", Action::Sell, dec!(-1), dec!(50));
        assert!(bad_qty.validate().is_err());

        assert!(Decision::new("a", "AAPL", Action::Hold, dec!(10), dec!(0)).is_noop());
    }

    #[test]
    fn decision_deserializes_lowercase_actions() {
        let raw = r#"{"ticker":"MSFT","action":"short","quantity":"5","confidence":"70"}"#;
        let decision: Decision = serde_json::from_str(raw).unwrap();
        assert_eq!(decision.action, Action::Short);
        assert_eq!(decision.agent, "");
    }
}
