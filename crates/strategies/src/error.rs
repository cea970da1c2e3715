use core_types::TradingDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("Decision script is invalid: {0}")]
    ScriptError(String),

    #[error("Scripted failure on {0}")]
    ScriptedFailure(TradingDate),

    #[error("Ensemble member '{member}' failed: {source}")]
    MemberFailed {
        member: String,
        #[source]
        source: Box<StrategyError>,
    },

    #[error("Failed to read decision script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse decision script: {0}")]
    Json(#[from] serde_json::Error),
}
