use crate::error::ExecutorError;
use crate::portfolio::{Fill, Portfolio};
use configuration::Simulation;
use core_types::{Action, Trade, TradingDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Agent name stamped on trades produced by forced liquidation.
pub const LIQUIDATION_AGENT: &str = "liquidation";

const BPS: Decimal = dec!(10000);

/// A request to trade a fixed quantity at a known price.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub agent: String,
    pub ticker: String,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Deterministic trading friction.
///
/// Commission is a flat fee plus a per-share fee. Slippage is charged in cash as
/// basis points of notional, plus half the quoted spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub commission_per_trade: Decimal,
    pub commission_per_share: Decimal,
    pub slippage_bps: Decimal,
    pub spread_bps: Decimal,
}

impl CostModel {
    /// A model with no friction at all.
    pub fn frictionless() -> Self {
        Self {
            commission_per_trade: Decimal::ZERO,
            commission_per_share: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
            spread_bps: Decimal::ZERO,
        }
    }

    pub fn commission(&self, quantity: Decimal) -> Decimal {
        self.commission_per_trade + self.commission_per_share * quantity
    }

    pub fn slippage(&self, quantity: Decimal, price: Decimal) -> Decimal {
        let bps = self.slippage_bps + self.spread_bps / dec!(2);
        quantity * price * bps / BPS
    }

    /// Commission plus slippage, or `None` when the amounts do not fit in a `Decimal`.
    pub fn checked_costs(&self, quantity: Decimal, price: Decimal) -> Option<Decimal> {
        let commission = self
            .commission_per_share
            .checked_mul(quantity)?
            .checked_add(self.commission_per_trade)?;
        let bps = self.slippage_bps + self.spread_bps / dec!(2);
        let slippage = quantity
            .checked_mul(price)?
            .checked_mul(bps)?
            .checked_div(BPS)?;
        commission.checked_add(slippage)
    }

    /// Prices a fill without touching any state.
    pub fn fill(&self, ticker: &str, action: Action, quantity: Decimal, price: Decimal) -> Fill {
        Fill {
            ticker: ticker.to_string(),
            action,
            quantity,
            price,
            commission: self.commission(quantity),
            slippage: self.slippage(quantity, price),
        }
    }
}

impl From<&Simulation> for CostModel {
    fn from(params: &Simulation) -> Self {
        Self {
            commission_per_trade: params.commission_per_trade,
            commission_per_share: params.commission_per_share,
            slippage_bps: params.slippage_bps,
            spread_bps: params.spread_bps,
        }
    }
}

/// A generic trait for an execution engine.
///
/// Only the engine calls it, and only for orders the constraint checker has
/// accepted (or for forced liquidation, which bypasses the checker).
pub trait Executor {
    /// The friction model used to price fills.
    fn cost_model(&self) -> &CostModel;

    /// Books an accepted order into the portfolio and returns the trade receipt.
    ///
    /// Fails with `PostTradeInvariant` when NAV is not positive afterwards; the
    /// checker should have made that impossible, so the caller must treat it as
    /// fatal.
    fn execute(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
        order: &OrderRequest,
    ) -> Result<Trade, ExecutorError>;

    /// Closes every open long and short at its current mark.
    fn liquidate(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
    ) -> Result<Vec<Trade>, ExecutorError>;
}

/// The "virtual exchange" for backtesting.
///
/// It holds the simulation parameters and implements the `Executor` trait to
/// book fills with deterministic costs.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    costs: CostModel,
}

impl SimulatedExecutor {
    pub fn new(params: &Simulation) -> Self {
        Self {
            costs: CostModel::from(params),
        }
    }

    pub fn with_cost_model(costs: CostModel) -> Self {
        Self { costs }
    }

    fn book(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
        agent: &str,
        fill: &Fill,
        liquidation: bool,
    ) -> Result<Trade, ExecutorError> {
        let realized_pnl = portfolio.apply_fill(fill)?;
        Ok(Trade {
            date,
            ticker: fill.ticker.clone(),
            agent: agent.to_string(),
            action: fill.action,
            quantity: fill.quantity,
            price: fill.price,
            commission: fill.commission,
            slippage: fill.slippage,
            realized_pnl,
            liquidation,
        })
    }
}

impl Executor for SimulatedExecutor {
    fn cost_model(&self) -> &CostModel {
        &self.costs
    }

    fn execute(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
        order: &OrderRequest,
    ) -> Result<Trade, ExecutorError> {
        let fill = self
            .costs
            .fill(&order.ticker, order.action, order.quantity, order.price);
        tracing::debug!(
            %date,
            ticker = %fill.ticker,
            action = %fill.action,
            quantity = %fill.quantity,
            price = %fill.price,
            commission = %fill.commission,
            slippage = %fill.slippage,
            "SimulatedExecutor: booking fill"
        );

        let trade = self.book(portfolio, date, &order.agent, &fill, false)?;

        let nav = portfolio.nav();
        if nav <= Decimal::ZERO {
            return Err(ExecutorError::PostTradeInvariant {
                ticker: order.ticker.clone(),
                nav,
            });
        }
        Ok(trade)
    }

    fn liquidate(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
    ) -> Result<Vec<Trade>, ExecutorError> {
        let open: Vec<(String, Decimal, Decimal)> = portfolio
            .positions
            .iter()
            .map(|(t, p)| (t.clone(), p.long_qty, p.short_qty))
            .collect();

        let mut trades = Vec::new();
        for (ticker, long_qty, short_qty) in open {
            let price = portfolio.mark_price(&ticker).ok_or_else(|| {
                ExecutorError::InvalidFill(format!("no mark for {ticker} during liquidation"))
            })?;

            for (action, quantity) in [(Action::Sell, long_qty), (Action::Cover, short_qty)] {
                if quantity.is_zero() {
                    continue;
                }
                let fill = self.costs.fill(&ticker, action, quantity, price);
                let trade = self.book(portfolio, date, LIQUIDATION_AGENT, &fill, true)?;
                tracing::warn!(
                    %date,
                    ticker = %trade.ticker,
                    action = %trade.action,
                    quantity = %trade.quantity,
                    price = %trade.price,
                    "Forced liquidation fill"
                );
                trades.push(trade);
            }
        }
        Ok(trades)
    }
}
