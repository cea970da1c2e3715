//! # Zenith Executor
//!
//! Books accepted orders into the simulated account. The `Portfolio` ledger
//! holds cash, long and short positions and the last mark of every ticker;
//! a `SimulatedExecutor` prices each fill with a `CostModel` and applies it.
//!
//! ## Architectural Principles
//!
//! - **State vs. Pricing Decoupling:** The `CostModel` is a pure calculator that
//!   prices a fill (commission and slippage) without mutating state. The `Portfolio`
//!   is the state machine that books fills into cash and positions. The checker in
//!   the `risk` crate uses the same two pieces on a cloned ledger to preview a trade.
//! - **Single Writer:** Only the engine, through an `Executor`, mutates the ledger.
//!
//! ## Public API
//!
//! - `Executor`: The core trait for execution engines.
//! - `SimulatedExecutor`: The "virtual exchange" for backtesting, including forced liquidation.
//! - `CostModel`: Deterministic commission and slippage.
//! - `Portfolio`: The in-memory ledger of a trading account.
//! - `ExecutorError`: Invalid fills and post-trade invariant breaches.

pub mod error;
pub mod exchange;
pub mod portfolio;

pub use error::ExecutorError;
pub use exchange::{CostModel, Executor, LIQUIDATION_AGENT, OrderRequest, SimulatedExecutor};
pub use portfolio::{Fill, Portfolio};
