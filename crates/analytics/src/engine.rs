use crate::error::AnalyticsError;
use crate::report::PerformanceReport;
use core_types::{DailySnapshot, Trade};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Used to annualise the daily Sharpe ratio.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// A stateless calculator for deriving performance metrics from a run.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `trades` - Every trade of the run, in execution order.
    /// * `snapshots` - One snapshot per processed day, in date order.
    /// * `initial_capital` - The starting capital of the run.
    /// * `termination` - Label describing how the run ended.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PerformanceReport` or an `AnalyticsError`.
    /// Empty inputs are valid and produce a zeroed report.
    pub fn calculate(
        &self,
        trades: &[Trade],
        snapshots: &[DailySnapshot],
        initial_capital: Decimal,
        termination: &str,
    ) -> Result<PerformanceReport, AnalyticsError> {
        if initial_capital <= Decimal::ZERO {
            return Err(AnalyticsError::InvalidInput(format!(
                "initial capital must be positive, got {initial_capital}"
            )));
        }

        let mut report = PerformanceReport::new(initial_capital);
        report.termination = termination.to_string();

        self.calculate_profitability(trades, snapshots, &mut report);
        self.calculate_attribution(trades, &mut report);

        // The equity curve starts at the initial capital, before the first day.
        let equity_curve: Vec<Decimal> = std::iter::once(initial_capital)
            .chain(snapshots.iter().map(|s| s.nav))
            .collect();
        self.calculate_drawdown(&equity_curve, &mut report);
        self.calculate_sharpe(&equity_curve, &mut report)?;

        tracing::debug!(
            final_nav = %report.final_nav,
            trades = report.total_trades,
            "AnalyticsEngine: report calculated"
        );
        Ok(report)
    }

    /// Calculates all profitability-related metrics.
    fn calculate_profitability(
        &self,
        trades: &[Trade],
        snapshots: &[DailySnapshot],
        report: &mut PerformanceReport,
    ) {
        report.days_processed = snapshots.len();
        if let Some(last) = snapshots.last() {
            report.final_nav = last.nav;
        }
        report.cumulative_pnl = report.final_nav - report.initial_capital;
        report.total_return_pct =
            report.cumulative_pnl / report.initial_capital * Decimal::ONE_HUNDRED;

        for snapshot in snapshots {
            report.decisions_accepted += snapshot.decisions_accepted;
            report.decisions_rejected += snapshot.decisions_rejected;
            if snapshot.strategy_failed {
                report.strategy_failure_days += 1;
            }
        }

        report.total_trades = trades.len();
        for trade in trades {
            report.total_costs += trade.total_cost();
            if trade.liquidation {
                report.liquidation_trades += 1;
            }

            // Only closing trades realise PnL.
            let Some(pnl) = trade.realized_pnl else {
                continue;
            };
            report.closing_trades += 1;
            if pnl > Decimal::ZERO {
                report.gross_profit += pnl;
                report.winning_trades += 1;
            } else {
                report.gross_loss += pnl.abs();
                report.losing_trades += 1;
            }
        }

        // --- Ratios ---
        if report.gross_loss > Decimal::ZERO {
            report.profit_factor = Some(report.gross_profit / report.gross_loss);
        }
        if report.closing_trades > 0 {
            report.win_rate_pct = Some(
                Decimal::from(report.winning_trades) / Decimal::from(report.closing_trades)
                    * Decimal::ONE_HUNDRED,
            );
        }
    }

    fn calculate_attribution(&self, trades: &[Trade], report: &mut PerformanceReport) {
        for trade in trades {
            let entry = report.attribution.entry(trade.agent.clone()).or_default();
            entry.trades += 1;
            entry.costs += trade.total_cost();
            if let Some(pnl) = trade.realized_pnl {
                entry.closing_trades += 1;
                entry.realized_pnl += pnl;
                if pnl > Decimal::ZERO {
                    entry.wins += 1;
                }
            }
        }
    }

    /// Calculates maximum drawdown from the equity curve.
    fn calculate_drawdown(&self, equity_curve: &[Decimal], report: &mut PerformanceReport) {
        let Some(&first) = equity_curve.first() else {
            return;
        };

        let mut peak_equity = first;
        for &equity in equity_curve {
            if equity > peak_equity {
                peak_equity = equity;
            }
            let drawdown = peak_equity - equity;
            if drawdown > report.max_drawdown {
                report.max_drawdown = drawdown;
                if peak_equity > Decimal::ZERO {
                    report.max_drawdown_pct = drawdown / peak_equity * Decimal::ONE_HUNDRED;
                }
            }
        }
    }

    /// Sharpe ratio of daily returns with a zero risk-free rate.
    fn calculate_sharpe(
        &self,
        equity_curve: &[Decimal],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        // Returns off a non-positive base are meaningless; the day is skipped.
        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .filter(|w| w[0] > Decimal::ZERO)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();

        if returns.len() < 2 {
            return Ok(());
        }

        let count = Decimal::from(returns.len());
        let mean_return = returns.iter().sum::<Decimal>() / count;
        let variance = returns
            .iter()
            .map(|r| (*r - mean_return) * (*r - mean_return))
            .sum::<Decimal>()
            / count;

        if variance <= Decimal::ZERO {
            return Ok(());
        }

        let std_dev = variance.sqrt().ok_or_else(|| {
            AnalyticsError::Calculation(format!("square root of variance {variance}"))
        })?;
        let annualizer = Decimal::from(TRADING_DAYS_PER_YEAR).sqrt().ok_or_else(|| {
            AnalyticsError::Calculation("square root of trading days".to_string())
        })?;

        let sharpe = mean_return / std_dev;
        report.sharpe_ratio = Some(sharpe.round_dp(6));
        report.annualized_sharpe = Some((sharpe * annualizer).round_dp(6));
        Ok(())
    }
}
