use crate::digest::snapshot_digest;
use crate::error::EngineFailure;
use crate::result::{Rejection, RunResult, TerminationReason};
use configuration::Config;
use core_types::{DailySnapshot, Decision, DeterminismRecord, HealthStatus, Trade, TradingDate};
use executor::{Executor, OrderRequest, Portfolio, SimulatedExecutor};
use health::{HealthCheckPolicy, HealthMonitor, PeriodicHealthCheck, ScheduleContext};
use indicatif::{ProgressBar, ProgressStyle};
use market_data::{MarketDataError, PriceProvider};
use risk::{CheckOutcome, ConstraintChecker, LeverageConstraints, RejectReason, RiskError};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use strategies::Strategy;
use uuid::Uuid;

/// The parameters of one run. The trading calendar is resolved from the price
/// store: every date in range on which any of the tickers has a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub tickers: Vec<String>,
    pub start_date: TradingDate,
    pub end_date: TradingDate,
    pub initial_capital: Decimal,
    pub margin_requirement: Decimal,
}

impl RunRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tickers: config.backtest.tickers.clone(),
            start_date: config.backtest.start_date,
            end_date: config.backtest.end_date,
            initial_capital: config.backtest.initial_capital,
            margin_requirement: config.backtest.margin_requirement,
        }
    }
}

/// What happened to one decision.
enum Handled {
    Skipped,
    Executed(Trade),
    Rejected(RejectReason),
}

/// Mutable state owned by a single run. Dropped when the run ends; only the
/// `RunResult` survives.
struct RunState {
    portfolio: Portfolio,
    monitor: HealthMonitor,
    processed: BTreeSet<TradingDate>,
    last_status: Option<HealthStatus>,
}

/// The main backtesting engine.
///
/// Steps through trading dates strictly in order. For each date it asks the
/// strategy for decisions, sends each one through the constraint checker and
/// then the executor, marks the book, assesses health when the policy says so,
/// and appends one snapshot and one digest.
///
/// A strategy failure costs the day its decisions and nothing else. An engine
/// failure stops the run. Either way `run` hands back everything produced.
pub struct Backtester {
    run_id: Uuid,
    strategy: Box<dyn Strategy>,
    provider: Arc<dyn PriceProvider>,
    checker: Box<dyn ConstraintChecker>,
    executor: Box<dyn Executor>,
    health_policy: Box<dyn HealthCheckPolicy>,
    margin_requirement: Decimal,
    show_progress: bool,
}

impl Backtester {
    /// Constructs a new `Backtester` from its components.
    ///
    /// The checker and the executor must price friction the same way, or the
    /// post-trade invariant can fail on a trade the checker accepted.
    pub fn new(
        strategy: Box<dyn Strategy>,
        provider: Arc<dyn PriceProvider>,
        checker: Box<dyn ConstraintChecker>,
        executor: Box<dyn Executor>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy,
            provider,
            checker,
            executor,
            health_policy: Box::new(PeriodicHealthCheck::new(5)),
            margin_requirement: Decimal::ONE,
            show_progress: false,
        }
    }

    /// Wires the standard components from configuration.
    pub fn from_config(
        config: &Config,
        strategy: Box<dyn Strategy>,
        provider: Arc<dyn PriceProvider>,
    ) -> Result<Self, RiskError> {
        let executor = SimulatedExecutor::new(&config.simulation);
        let checker =
            LeverageConstraints::new(config.constraints.clone(), executor.cost_model().clone())?;
        Ok(Self::new(strategy, provider, Box::new(checker), Box::new(executor))
            .with_health_policy(Box::new(PeriodicHealthCheck::new(
                config.health.check_interval_days,
            )))
            .with_margin_requirement(config.backtest.margin_requirement))
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_health_policy(mut self, policy: Box<dyn HealthCheckPolicy>) -> Self {
        self.health_policy = policy;
        self
    }

    pub fn with_margin_requirement(mut self, margin_requirement: Decimal) -> Self {
        self.margin_requirement = margin_requirement;
        self
    }

    /// Draws a progress bar on stderr while running.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs the simulation over `dates`, which must be strictly increasing.
    ///
    /// Never fails: engine failures are reported in `RunResult::final_status`.
    pub fn run(&self, dates: &[TradingDate], initial_capital: Decimal) -> RunResult {
        self.simulate(dates, initial_capital, self.margin_requirement)
    }

    /// Resolves the calendar for `request` and runs it.
    pub fn run_request(&self, request: &RunRequest) -> RunResult {
        let dates =
            self.provider
                .trading_dates(&request.tickers, request.start_date, request.end_date);
        tracing::info!(
            start = %request.start_date,
            end = %request.end_date,
            days = dates.len(),
            "Resolved trading calendar"
        );
        self.simulate(&dates, request.initial_capital, request.margin_requirement)
    }

    fn simulate(
        &self,
        dates: &[TradingDate],
        initial_capital: Decimal,
        margin_requirement: Decimal,
    ) -> RunResult {
        let result = RunResult::new(self.run_id, initial_capital);
        if initial_capital <= Decimal::ZERO {
            return self.abort(
                result,
                EngineFailure::MalformedInput(format!(
                    "initial capital must be positive, got {initial_capital}"
                )),
            );
        }
        if margin_requirement <= Decimal::ZERO || margin_requirement > Decimal::ONE {
            return self.abort(
                result,
                EngineFailure::MalformedInput(format!(
                    "margin requirement must be in (0, 1], got {margin_requirement}"
                )),
            );
        }

        let mut result = result;
        let mut state = RunState {
            portfolio: Portfolio::new(initial_capital, margin_requirement),
            monitor: HealthMonitor::new(initial_capital),
            processed: BTreeSet::new(),
            last_status: None,
        };

        tracing::info!(
            run_id = %self.run_id,
            strategy = self.strategy.name(),
            days = dates.len(),
            %initial_capital,
            "Starting backtest"
        );
        let progress = self.progress_bar(dates.len());

        for (index, &date) in dates.iter().enumerate() {
            // A next date that the ordering guards will refuse ends the run here.
            let is_final_day = dates.get(index + 1).is_none_or(|next| *next <= date);
            match self.step(&mut state, &mut result, index, date, is_final_day) {
                Ok(false) => progress.inc(1),
                Ok(true) => {
                    progress.inc(1);
                    result.final_status = TerminationReason::Liquidated { date };
                    break;
                }
                Err(failure) => {
                    progress.abandon();
                    return self.abort(result, failure);
                }
            }
        }

        progress.finish_and_clear();
        tracing::info!(
            run_id = %self.run_id,
            status = result.final_status.label(),
            days = result.snapshots.len(),
            trades = result.trades.len(),
            final_nav = %result.final_nav(),
            "Backtest finished"
        );
        result
    }

    /// Guards the date sequence around one day of processing. Returns `true`
    /// when the day ended in forced liquidation.
    fn step(
        &self,
        state: &mut RunState,
        result: &mut RunResult,
        index: usize,
        date: TradingDate,
        is_final_day: bool,
    ) -> Result<bool, EngineFailure> {
        if state.processed.contains(&date) {
            return Err(EngineFailure::DuplicateDate { date, index });
        }
        if let Some(&previous) = state.processed.last() {
            if date < previous {
                return Err(EngineFailure::NonMonotonicDate {
                    date,
                    previous,
                    index,
                });
            }
        }

        let liquidated = self.process_day(state, result, index, date, is_final_day)?;

        state.processed.insert(date);
        if state.processed.len() != index + 1 {
            return Err(EngineFailure::LoopIndexMismatch {
                date,
                index,
                processed: state.processed.len(),
            });
        }
        Ok(liquidated)
    }

    fn process_day(
        &self,
        state: &mut RunState,
        result: &mut RunResult,
        index: usize,
        date: TradingDate,
        is_final_day: bool,
    ) -> Result<bool, EngineFailure> {
        // --- 1. Strategy ---
        let prior = result.snapshots.last();
        let (decisions, strategy_failed) = match self.strategy.decide(date, prior) {
            Ok(decisions) => (decisions, false),
            Err(e) => {
                tracing::warn!(
                    %date,
                    strategy = self.strategy.name(),
                    error = %e,
                    "Strategy failed; day continues with no decisions"
                );
                (Vec::new(), true)
            }
        };

        // --- 2. Decisions ---
        self.mark_to_market(&mut state.portfolio, date)?;
        let (mut accepted, mut rejected) = (0usize, 0usize);
        for decision in &decisions {
            match self.handle_decision(&mut state.portfolio, date, decision)? {
                Handled::Skipped => {}
                Handled::Executed(trade) => {
                    tracing::debug!(
                        %date,
                        ticker = %trade.ticker,
                        action = %trade.action,
                        quantity = %trade.quantity,
                        price = %trade.price,
                        "Trade executed"
                    );
                    accepted += 1;
                    result.trades.push(trade);
                }
                Handled::Rejected(reason) => {
                    tracing::warn!(
                        %date,
                        ticker = %decision.ticker,
                        action = %decision.action,
                        quantity = %decision.quantity,
                        %reason,
                        "Decision rejected"
                    );
                    rejected += 1;
                    result.rejections.push(Rejection {
                        date,
                        agent: decision.agent.clone(),
                        ticker: decision.ticker.clone(),
                        action: decision.action,
                        quantity: decision.quantity,
                        reason,
                    });
                }
            }
        }

        // --- 3. Valuation and solvency ---
        self.mark_to_market(&mut state.portfolio, date)?;
        let nav = state.portfolio.nav();
        let liquidated = nav <= Decimal::ZERO;
        if liquidated {
            tracing::error!(%date, %nav, "NAV non-positive; forcing liquidation");
            let trades = self
                .executor
                .liquidate(&mut state.portfolio, date)
                .map_err(|e| EngineFailure::PostTradeInvariant {
                    date,
                    reason: e.to_string(),
                })?;
            result.trades.extend(trades);
        }

        // --- 4. Snapshot ---
        let portfolio = &state.portfolio;
        let mut snapshot = DailySnapshot {
            date,
            nav: portfolio.nav(),
            cash: portfolio.cash,
            gross_exposure: portfolio.gross_exposure(),
            net_exposure: portfolio.net_exposure(),
            positions: portfolio.positions.clone(),
            marks: portfolio.held_marks(),
            decisions_accepted: accepted,
            decisions_rejected: rejected,
            health_status: state.last_status.unwrap_or(HealthStatus::Excellent),
            health_checked: false,
            strategy_failed,
        };

        // --- 5. Health ---
        let ctx = ScheduleContext {
            day_index: index,
            is_final_day: is_final_day || liquidated,
            prior_status: state.last_status,
        };
        if ctx.is_mandatory() || self.health_policy.should_check(&ctx) {
            let metrics = state.monitor.assess(&snapshot, &result.snapshots);
            for alert in &metrics.active_alerts {
                tracing::warn!(%date, %alert, "Health alert");
            }
            snapshot.health_status = metrics.overall_status;
            snapshot.health_checked = true;
            state.last_status = Some(metrics.overall_status);
            result.health_history.push((date, metrics));
        }

        // --- 6. Digest and invariant log ---
        let digest = snapshot_digest(&snapshot)?;
        let line = format!(
            "day={index} date={date} nav={} cash={} gross={} net={} open={} accepted={accepted} rejected={rejected} health={}{} digest={}",
            snapshot.nav,
            snapshot.cash,
            snapshot.gross_exposure,
            snapshot.net_exposure,
            snapshot.open_position_count(),
            snapshot.health_status,
            if snapshot.health_checked { "" } else { "(carried)" },
            digest.get(..12).unwrap_or(digest.as_str()),
        );
        tracing::info!(target: "invariants", "{line}");

        result.invariant_log.push(line);
        result
            .determinism_digest_sequence
            .push(DeterminismRecord { date, digest });
        result.snapshots.push(snapshot);
        Ok(liquidated)
    }

    /// Routes one decision through pricing, clamping, the checker and the executor.
    fn handle_decision(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
        decision: &Decision,
    ) -> Result<Handled, EngineFailure> {
        if decision.is_noop() {
            return Ok(Handled::Skipped);
        }
        if let Err(e) = decision.validate() {
            return Ok(Handled::Rejected(RejectReason::InvalidDecision(e.to_string())));
        }
        let Some(side) = decision.action.side() else {
            return Ok(Handled::Skipped);
        };

        let ticker = decision.ticker.as_str();
        let price = match self.provider.get_price(ticker, date) {
            Ok(price) if price < Decimal::ZERO => {
                return Err(EngineFailure::MalformedInput(format!(
                    "negative price {price} for {ticker} on {date}"
                )));
            }
            Ok(price) if price > Decimal::ZERO => price,
            Err(MarketDataError::InvalidPrice { price, .. }) => {
                return Err(EngineFailure::MalformedInput(format!(
                    "invalid price {price} for {ticker} on {date}"
                )));
            }
            Ok(_) | Err(_) => return Ok(Handled::Rejected(RejectReason::PriceUnavailable)),
        };

        let mut quantity = decision.quantity;
        if decision.action.reduces_exposure() {
            let held = portfolio.side_quantity(ticker, side);
            if held.is_zero() {
                return Ok(Handled::Rejected(RejectReason::NothingToReduce));
            }
            if quantity > held {
                tracing::debug!(%date, %ticker, requested = %quantity, %held, "Clamping to held quantity");
                quantity = held;
            }
        }

        match self
            .checker
            .check(portfolio, ticker, decision.action, quantity, price)
        {
            CheckOutcome::Reject(reason) => Ok(Handled::Rejected(reason)),
            CheckOutcome::Accept => {
                let agent = if decision.agent.is_empty() {
                    self.strategy.name().to_string()
                } else {
                    decision.agent.clone()
                };
                let order = OrderRequest {
                    agent,
                    ticker: ticker.to_string(),
                    action: decision.action,
                    quantity,
                    price,
                };
                let trade = self
                    .executor
                    .execute(portfolio, date, &order)
                    .map_err(|e| EngineFailure::PostTradeInvariant {
                        date,
                        reason: e.to_string(),
                    })?;
                Ok(Handled::Executed(trade))
            }
        }
    }

    /// Marks every held ticker at today's close. Tickers without a usable
    /// quote keep their last mark.
    fn mark_to_market(
        &self,
        portfolio: &mut Portfolio,
        date: TradingDate,
    ) -> Result<(), EngineFailure> {
        let held: Vec<String> = portfolio.positions.keys().cloned().collect();
        for ticker in held {
            match self.provider.get_price(&ticker, date) {
                Ok(price) if price < Decimal::ZERO => {
                    return Err(EngineFailure::MalformedInput(format!(
                        "negative price {price} for {ticker} on {date}"
                    )));
                }
                Ok(price) if price > Decimal::ZERO => portfolio.mark(&ticker, price),
                _ => {}
            }
        }
        Ok(())
    }

    fn abort(&self, mut result: RunResult, failure: EngineFailure) -> RunResult {
        tracing::error!(
            run_id = %self.run_id,
            error = %failure,
            days = result.snapshots.len(),
            trades = result.trades.len(),
            "Engine failure; aborting run"
        );
        // The last processed day always gets a health reading. The snapshot is
        // already hashed, so the reading only goes into the history.
        if let Some((last, earlier)) = result.snapshots.split_last() {
            if !last.health_checked {
                let metrics = HealthMonitor::new(result.initial_capital).assess(last, earlier);
                tracing::warn!(
                    date = %last.date,
                    status = %metrics.overall_status,
                    "Health at abort"
                );
                result.health_history.push((last.date, metrics));
            }
        }
        result.final_status = TerminationReason::Aborted(failure);
        result
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days ({eta})",
        )
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(len as u64);
        bar.set_style(style);
        bar
    }
}
