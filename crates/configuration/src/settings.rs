use chrono::NaiveDate;
use core_types::StrategyId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backtest: Backtest,
    pub simulation: Simulation,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub health: Health,
    pub strategies: Strategies,
    #[serde(default)]
    pub logging: Logging,
}

/// Contains parameters for a single backtest run.
#[derive(Debug, Clone, Deserialize)]
pub struct Backtest {
    /// The universe of tickers the run trades.
    pub tickers: Vec<String>,
    /// First calendar date of the run (inclusive).
    pub start_date: NaiveDate,
    /// Last calendar date of the run (inclusive).
    pub end_date: NaiveDate,
    /// The initial starting capital for the simulation.
    pub initial_capital: Decimal,
    /// Fraction of short notional locked as collateral. 1.0 is a fully cash-secured short.
    #[serde(default = "default_margin_requirement")]
    pub margin_requirement: Decimal,
    /// Which strategy adapter to drive the run with.
    pub strategy: StrategyId,
    /// CSV file with `date,ticker,close` rows.
    pub prices_path: PathBuf,
}

/// Contains parameters for the fill simulation. All costs are deterministic.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    /// Flat fee charged on every fill.
    #[serde(default)]
    pub commission_per_trade: Decimal,
    /// Fee charged per share filled.
    #[serde(default)]
    pub commission_per_share: Decimal,
    /// Market impact in basis points of notional. 5 means 0.05%.
    #[serde(default)]
    pub slippage_bps: Decimal,
    /// Full bid/ask spread in basis points; half of it is paid on every fill.
    #[serde(default)]
    pub spread_bps: Decimal,
}

/// Capital and leverage limits enforced before every trade.
#[derive(Debug, Clone, Deserialize)]
pub struct Constraints {
    /// Max notional of one side of one ticker as a fraction of NAV.
    pub max_position_pct: Decimal,
    /// Max gross exposure as a fraction of NAV.
    pub max_gross_exposure_pct: Decimal,
    /// At or below this fraction of initial capital no new positions may be opened.
    pub underwater_nav_pct: Decimal,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(0.20),
            max_gross_exposure_pct: dec!(1.00),
            underwater_nav_pct: dec!(0.50),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    /// Run the health monitor every N processed days (first, last and post-degraded days are always checked).
    pub check_interval_days: usize,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            check_interval_days: 5,
        }
    }
}

/// Contains the parameter sets for all available strategies.
#[derive(Debug, Deserialize, Clone)]
pub struct Strategies {
    pub ma_crossover: MACrossoverParams,
    pub rsi_reversion: RsiReversionParams,
    #[serde(default)]
    pub scripted: ScriptedParams,
}

/// Parameters for the dual moving average crossover strategy.
#[derive(Debug, Deserialize, Clone)]
pub struct MACrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
}

/// Parameters for the RSI mean-reversion strategy.
#[derive(Debug, Deserialize, Clone)]
pub struct RsiReversionParams {
    pub rsi_period: usize,
    pub oversold: Decimal,
    pub overbought: Decimal,
}

/// Parameters for the scripted strategy, which replays decisions from a JSON file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScriptedParams {
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

fn default_margin_requirement() -> Decimal {
    Decimal::ONE
}

fn is_fraction(value: Decimal) -> bool {
    value > Decimal::ZERO && value <= Decimal::ONE
}

impl Config {
    /// Checks the values that serde cannot: ranges, orderings and cross-field rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.tickers.is_empty() {
            return Err(ConfigError::ValidationError("backtest.tickers must not be empty".to_string()));
        }
        if bt.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "backtest.initial_capital must be positive, got {}",
                bt.initial_capital
            )));
        }
        if bt.start_date > bt.end_date {
            return Err(ConfigError::ValidationError(format!(
                "backtest.start_date {} is after end_date {}",
                bt.start_date, bt.end_date
            )));
        }
        if !is_fraction(bt.margin_requirement) {
            return Err(ConfigError::ValidationError(format!(
                "backtest.margin_requirement must be in (0, 1], got {}",
                bt.margin_requirement
            )));
        }

        let sim = &self.simulation;
        for (name, value) in [
            ("commission_per_trade", sim.commission_per_trade),
            ("commission_per_share", sim.commission_per_share),
            ("slippage_bps", sim.slippage_bps),
            ("spread_bps", sim.spread_bps),
        ] {
            if value.is_sign_negative() {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.{name} must not be negative, got {value}"
                )));
            }
        }

        let c = &self.constraints;
        for (name, value) in [
            ("max_position_pct", c.max_position_pct),
            ("max_gross_exposure_pct", c.max_gross_exposure_pct),
            ("underwater_nav_pct", c.underwater_nav_pct),
        ] {
            if !is_fraction(value) {
                return Err(ConfigError::ValidationError(format!(
                    "constraints.{name} must be in (0, 1], got {value}"
                )));
            }
        }

        if self.health.check_interval_days == 0 {
            return Err(ConfigError::ValidationError(
                "health.check_interval_days must be at least 1".to_string(),
            ));
        }

        let ma = &self.strategies.ma_crossover;
        if ma.fast_period == 0 || ma.fast_period >= ma.slow_period {
            return Err(ConfigError::ValidationError(format!(
                "ma_crossover.fast_period ({}) must be positive and below slow_period ({})",
                ma.fast_period, ma.slow_period
            )));
        }

        let rsi = &self.strategies.rsi_reversion;
        if rsi.rsi_period == 0 || rsi.oversold >= rsi.overbought {
            return Err(ConfigError::ValidationError(
                "rsi_reversion needs a positive period and oversold < overbought".to_string(),
            ));
        }

        Ok(())
    }
}

/// Command-line overrides for the `[backtest]` section.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BacktestOverrides {
    /// Price file to load instead of `backtest.prices_path`.
    #[arg(long)]
    pub prices: Option<PathBuf>,

    /// Strategy to run (ma_crossover, rsi_reversion, scripted, ensemble).
    #[arg(long)]
    pub strategy: Option<StrategyId>,

    /// Starting capital.
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// First date of the run (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last date of the run (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[cfg(feature = "clap")]
impl BacktestOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(prices) = &self.prices {
            config.backtest.prices_path = prices.clone();
        }
        if let Some(strategy) = self.strategy {
            config.backtest.strategy = strategy;
        }
        if let Some(capital) = self.capital {
            config.backtest.initial_capital = capital;
        }
        if let Some(from) = self.from {
            config.backtest.start_date = from;
        }
        if let Some(to) = self.to {
            config.backtest.end_date = to;
        }
    }
}
