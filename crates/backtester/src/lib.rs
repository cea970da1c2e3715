//! # Zenith Backtester
//!
//! The deterministic simulation loop. A `Backtester` drives one strategy over a
//! sequence of trading dates against historical prices, enforcing capital and
//! leverage constraints on every trade, and records one `DailySnapshot` plus
//! one SHA-256 digest per processed day.
//!
//! ## Guarantees
//!
//! - **Deterministic:** the same inputs always produce the same digest sequence.
//!   `verify_replay` compares two runs day by day.
//! - **Failure isolation:** a strategy error loses that day's decisions only.
//!   An `EngineFailure` (duplicate or out-of-order date, broken ledger
//!   invariant, malformed prices) aborts the run.
//! - **Always a result:** `run` returns a `RunResult` on every path, and every
//!   `RunResult` can produce a performance summary.

pub mod digest;
pub mod engine;
pub mod error;
pub mod result;

pub use digest::{sequence_fingerprint, snapshot_digest};
pub use engine::{Backtester, RunRequest};
pub use error::{DeterminismViolation, EngineFailure};
pub use result::{Rejection, RunResult, TerminationReason, verify_replay};
