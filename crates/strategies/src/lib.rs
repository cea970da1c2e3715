//! # Zenith Strategy Library
//!
//! The strategy adapters the backtest engine calls once per simulated day. It
//! defines a universal `Strategy` trait and provides several concrete
//! implementations.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** A strategy has no knowledge of the ledger, the checker or
//!   execution. It sees yesterday's `DailySnapshot` and reads prices through
//!   `PriceProvider`, nothing else.
//! - **Deterministic:** `decide` takes `&self`. Calling it twice with the same
//!   inputs yields the same decisions.
//! - **Extensibility:** Adding a new strategy involves creating a new module,
//!   implementing the `Strategy` trait, and adding it to the `StrategyId` enum
//!   and `factory`.

pub mod ensemble;
pub mod error;
pub mod factory;
pub mod ma_crossover;
pub mod market;
pub mod rsi_reversion;
pub mod scripted;

pub use ensemble::Ensemble;
pub use error::StrategyError;
pub use factory::create_strategy;
pub use ma_crossover::MACrossover;
pub use market::MarketView;
pub use rsi_reversion::RsiReversion;
pub use scripted::ScriptedStrategy;

pub use core_types::StrategyId;

use core_types::{DailySnapshot, Decision, TradingDate};

/// The core trait that all trading strategies must implement.
///
/// The engine treats any `Err` as a strategy failure for that day only: it is
/// logged, the day proceeds with no decisions, and the run continues.
pub trait Strategy {
    /// Name stamped on every decision for attribution.
    fn name(&self) -> &str;

    /// Proposes decisions for `date`.
    ///
    /// # Arguments
    ///
    /// * `date` - The trading day being simulated.
    /// * `prior` - The snapshot of the previous processed day, `None` on the first day.
    fn decide(
        &self,
        date: TradingDate,
        prior: Option<&DailySnapshot>,
    ) -> Result<Vec<Decision>, StrategyError>;
}
