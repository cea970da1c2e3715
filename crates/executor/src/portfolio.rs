use crate::error::ExecutorError;
use core_types::{Action, Position, PositionSide};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A priced fill waiting to be booked. Produced by an `Executor`, consumed by
/// `Portfolio::apply_fill`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub ticker: String,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
}

impl Fill {
    pub fn costs(&self) -> Decimal {
        self.commission + self.slippage
    }
}

/// Manages the state of a trading account: cash, positions and the last known
/// price of every ticker it has seen.
///
/// Its sole responsibility is to accurately reflect the current state based on
/// fills. Maps are ordered so iteration (and anything hashed from it) is
/// deterministic.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    marks: BTreeMap<String, Decimal>,
    initial_capital: Decimal,
    margin_requirement: Decimal,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting capital.
    pub fn new(initial_capital: Decimal, margin_requirement: Decimal) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            initial_capital,
            margin_requirement,
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn margin_requirement(&self) -> Decimal {
        self.margin_requirement
    }

    /// Records the latest price for a ticker. Positions are valued at their mark.
    pub fn mark(&mut self, ticker: &str, price: Decimal) {
        self.marks.insert(ticker.to_string(), price);
    }

    pub fn mark_price(&self, ticker: &str) -> Option<Decimal> {
        self.marks.get(ticker).copied()
    }

    /// Marks for the tickers currently held.
    pub fn held_marks(&self) -> BTreeMap<String, Decimal> {
        self.positions
            .keys()
            .filter_map(|t| self.marks.get(t).map(|p| (t.clone(), *p)))
            .collect()
    }

    /// A simple utility to get a snapshot of a single position.
    pub fn get_position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn side_quantity(&self, ticker: &str, side: PositionSide) -> Decimal {
        self.positions
            .get(ticker)
            .map(|p| p.quantity(side))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn has_open_positions(&self) -> bool {
        self.positions.values().any(|p| !p.is_flat())
    }

    fn mark_or_zero(&self, ticker: &str) -> Decimal {
        self.marks.get(ticker).copied().unwrap_or(Decimal::ZERO)
    }

    /// Net asset value: cash plus the mark-to-market value of every position.
    pub fn nav(&self) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .iter()
            .map(|(ticker, p)| p.market_value(self.mark_or_zero(ticker)))
            .sum();
        self.cash + positions_value
    }

    /// Notional of one side of one ticker at its mark.
    pub fn side_notional(&self, ticker: &str, side: PositionSide) -> Decimal {
        let qty = self.side_quantity(ticker, side);
        qty * self.mark_or_zero(ticker)
    }

    /// Sum of long and short notionals, both taken as absolute values.
    pub fn gross_exposure(&self) -> Decimal {
        self.positions
            .iter()
            .map(|(ticker, p)| {
                let price = self.mark_or_zero(ticker);
                p.long_notional(price).abs() + p.short_notional(price).abs()
            })
            .sum()
    }

    /// Long notional minus short notional.
    pub fn net_exposure(&self) -> Decimal {
        self.positions
            .iter()
            .map(|(ticker, p)| {
                let price = self.mark_or_zero(ticker);
                p.long_notional(price) - p.short_notional(price)
            })
            .sum()
    }

    /// Books a fill. This is the core state transition logic.
    ///
    /// Returns the realised profit for `Sell` and `Cover` fills, net of the
    /// fill's own commission and slippage.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<Option<Decimal>, ExecutorError> {
        if fill.quantity <= Decimal::ZERO {
            return Err(ExecutorError::InvalidFill(format!(
                "quantity {} for {} must be positive",
                fill.quantity, fill.ticker
            )));
        }
        if fill.price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidFill(format!(
                "price {} for {} must be positive",
                fill.price, fill.ticker
            )));
        }

        let side = fill
            .action
            .side()
            .ok_or(ExecutorError::UnsupportedAction(fill.action))?;
        if fill.action.reduces_exposure() {
            let available = self.side_quantity(&fill.ticker, side);
            if fill.quantity > available {
                return Err(ExecutorError::InvalidClosingQuantity {
                    ticker: fill.ticker.clone(),
                    requested: fill.quantity.to_string(),
                    available: available.to_string(),
                });
            }
        }

        let margin_requirement = self.margin_requirement;
        let costs = fill.costs();
        let notional = fill.quantity * fill.price;
        let position = self.positions.entry(fill.ticker.clone()).or_default();

        let realized = match fill.action {
            Action::Buy => {
                let total = position.long_qty + fill.quantity;
                position.avg_long_cost =
                    (position.avg_long_cost * position.long_qty + notional) / total;
                position.long_qty = total;
                self.cash -= notional + costs;
                None
            }
            Action::Sell => {
                let pnl = (fill.price - position.avg_long_cost) * fill.quantity - costs;
                position.long_qty -= fill.quantity;
                if position.long_qty.is_zero() {
                    position.avg_long_cost = Decimal::ZERO;
                }
                self.cash += notional - costs;
                Some(pnl)
            }
            Action::Short => {
                let margin = notional * margin_requirement;
                let total = position.short_qty + fill.quantity;
                position.avg_short_cost =
                    (position.avg_short_cost * position.short_qty + notional) / total;
                position.short_qty = total;
                position.short_margin += margin;
                self.cash -= margin + costs;
                None
            }
            Action::Cover => {
                let released = position.short_margin * fill.quantity / position.short_qty;
                let gross_pnl = (position.avg_short_cost - fill.price) * fill.quantity;
                position.short_qty -= fill.quantity;
                position.short_margin -= released;
                if position.short_qty.is_zero() {
                    position.avg_short_cost = Decimal::ZERO;
                    position.short_margin = Decimal::ZERO;
                }
                self.cash += released + gross_pnl - costs;
                Some(gross_pnl - costs)
            }
            // Rejected above: hold has no side.
            Action::Hold => None,
        };

        // If the position is flat after an update, remove it from the map.
        if position.is_flat() {
            self.positions.remove(&fill.ticker);
        }
        self.marks.insert(fill.ticker.clone(), fill.price);

        Ok(realized)
    }
}
