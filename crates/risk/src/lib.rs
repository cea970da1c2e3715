//! # Zenith Risk
//!
//! Pre-trade capital and leverage control. The `ConstraintChecker` is the sole
//! authority on whether a proposed trade may be executed; it reads the ledger
//! and never changes it.

pub mod constraints;
pub mod error;
pub mod sizing;

pub use constraints::LeverageConstraints;
pub use error::RiskError;
pub use sizing::size_for_confidence;

use core_types::Action;
use executor::Portfolio;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a decision did not turn into a trade. Rejections are expected outcomes,
/// not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    NavNonPositive,
    Underwater,
    WouldMakeNavNegative,
    GrossExposure,
    PositionLimit,
    /// No usable price for the ticker on that date.
    PriceUnavailable,
    /// A sell or cover against a side that is not held.
    NothingToReduce,
    InvalidDecision(String),
}

impl RejectReason {
    /// True for the five capital and leverage rules.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            RejectReason::NavNonPositive
                | RejectReason::Underwater
                | RejectReason::WouldMakeNavNegative
                | RejectReason::GrossExposure
                | RejectReason::PositionLimit
        )
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NavNonPositive => f.write_str("NAV non-positive"),
            RejectReason::Underwater => {
                f.write_str("no new positions while NAV <= 50% of initial capital")
            }
            RejectReason::WouldMakeNavNegative => f.write_str("would make NAV negative"),
            RejectReason::GrossExposure => f.write_str("gross exposure would exceed 100%"),
            RejectReason::PositionLimit => f.write_str("position would exceed 20% of NAV"),
            RejectReason::PriceUnavailable => f.write_str("no price available"),
            RejectReason::NothingToReduce => f.write_str("no position to reduce"),
            RejectReason::InvalidDecision(msg) => write!(f, "invalid decision: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Accept,
    Reject(RejectReason),
}

impl CheckOutcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, CheckOutcome::Accept)
    }
}

/// The core trait for pre-trade checks.
///
/// Implementations are pure functions of the ledger: same portfolio, same
/// proposal, same answer.
pub trait ConstraintChecker {
    fn check(
        &self,
        portfolio: &Portfolio,
        ticker: &str,
        action: Action,
        quantity: Decimal,
        price: Decimal,
    ) -> CheckOutcome;
}
