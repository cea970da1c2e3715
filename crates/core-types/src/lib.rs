//! # Zenith Core Types
//!
//! The shared vocabulary of the backtest engine. Every other crate speaks in
//! these types: the dates the engine steps through, the decisions a strategy
//! proposes, the trades the executor books, and the snapshots the engine
//! records once per day.
//!
//! This is a Layer 0 crate and depends on nothing else in the workspace.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{Action, HealthStatus, PositionSide, StrategyId};
pub use error::CoreError;
pub use structs::{DailySnapshot, Decision, DeterminismRecord, Position, Trade, TradingDate};
