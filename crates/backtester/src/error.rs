use core_types::TradingDate;
use thiserror::Error;

/// A fatal contract violation. It aborts the rest of the run; whatever was
/// produced before it is still returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineFailure {
    #[error("duplicate date {date} at index {index}")]
    DuplicateDate { date: TradingDate, index: usize },

    #[error("non-monotonic date {date} at index {index}, after {previous}")]
    NonMonotonicDate {
        date: TradingDate,
        previous: TradingDate,
        index: usize,
    },

    #[error("loop index mismatch on {date}: index {index} but {processed} dates processed")]
    LoopIndexMismatch {
        date: TradingDate,
        index: usize,
        processed: usize,
    },

    #[error("post-trade invariant broken on {date}: {reason}")]
    PostTradeInvariant { date: TradingDate, reason: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("failed to digest snapshot for {date}: {reason}")]
    Digest { date: TradingDate, reason: String },
}

/// Two runs that should be identical produced different snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("determinism violation at day {index} ({date}): expected {expected}, got {actual}")]
pub struct DeterminismViolation {
    pub index: usize,
    pub date: TradingDate,
    pub expected: String,
    pub actual: String,
}
