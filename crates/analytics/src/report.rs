use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one agent contributed to the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentAttribution {
    pub trades: usize,
    /// Sell and cover trades, the ones that realise PnL.
    pub closing_trades: usize,
    pub wins: usize,
    pub realized_pnl: Decimal,
    /// Commission plus slippage paid on this agent's fills.
    pub costs: Decimal,
}

/// A comprehensive, standardized report of a backtest run.
///
/// This struct is the final output of the `AnalyticsEngine` and the summary
/// printed at the end of every run, whatever way the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// How the run ended: "completed", "liquidated" or "aborted".
    pub termination: String,
    pub days_processed: usize,

    // I. Core Profitability Metrics
    pub initial_capital: Decimal,
    pub final_nav: Decimal,
    pub cumulative_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Option<Decimal>, // None when there were no losing closes
    pub total_costs: Decimal,

    // II. Risk and Drawdown
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>,
    pub annualized_sharpe: Option<Decimal>,

    // III. Trade-Level Statistics
    pub total_trades: usize,
    pub closing_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Option<Decimal>, // None when nothing was closed
    pub liquidation_trades: usize,

    // IV. Decision Flow
    pub decisions_accepted: usize,
    pub decisions_rejected: usize,
    pub strategy_failure_days: usize,

    pub attribution: BTreeMap<String, AgentAttribution>,
}

impl PerformanceReport {
    /// Creates a new, zeroed-out report for a run that started with `initial_capital`.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            termination: String::new(),
            days_processed: 0,
            initial_capital,
            final_nav: initial_capital,
            cumulative_pnl: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: None,
            total_costs: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: None,
            annualized_sharpe: None,
            total_trades: 0,
            closing_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: None,
            liquidation_trades: 0,
            decisions_accepted: 0,
            decisions_rejected: 0,
            strategy_failure_days: 0,
            attribution: BTreeMap::new(),
        }
    }
}
