//! # Zenith Analytics Engine
//!
//! This crate turns the trade log and daily snapshots of a backtest into a
//! `PerformanceReport`. It acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** It depends only on `core-types` and knows nothing about
//!   the engine that produced its inputs.
//! - **Stateless Calculation:** The `AnalyticsEngine` takes the raw run data as
//!   input and produces a `PerformanceReport` as output. A run that made no
//!   trades (or processed no days) still gets a zeroed report, so every
//!   termination path has a summary.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `PerformanceReport`: Run-level metrics plus per-agent attribution.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::{AnalyticsEngine, TRADING_DAYS_PER_YEAR};
pub use error::AnalyticsError;
pub use report::{AgentAttribution, PerformanceReport};
