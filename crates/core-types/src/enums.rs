use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a strategy wants to do with a ticker on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Short,
    Cover,
    Hold,
}

impl Action {
    /// The side of the book this action touches. `Hold` touches nothing.
    pub fn side(&self) -> Option<PositionSide> {
        match self {
            Action::Buy | Action::Sell => Some(PositionSide::Long),
            Action::Short | Action::Cover => Some(PositionSide::Short),
            Action::Hold => None,
        }
    }

    /// True for actions that add exposure (`Buy`, `Short`).
    pub fn increases_exposure(&self) -> bool {
        matches!(self, Action::Buy | Action::Short)
    }

    /// True for actions that take exposure off (`Sell`, `Cover`).
    pub fn reduces_exposure(&self) -> bool {
        matches!(self, Action::Sell | Action::Cover)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Short => "short",
            Action::Cover => "cover",
            Action::Hold => "hold",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Overall portfolio health, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Excellent,
    Healthy,
    Caution,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Anything below `Healthy` counts as degraded and forces a re-check the next day.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            HealthStatus::Caution | HealthStatus::Warning | HealthStatus::Critical
        )
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Excellent => "EXCELLENT",
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Caution => "CAUTION",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Identifies which strategy adapter the factory should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    #[serde(rename = "ma_crossover")]
    MACrossover,
    RsiReversion,
    Scripted,
    Ensemble,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::MACrossover => "ma_crossover",
            StrategyId::RsiReversion => "rsi_reversion",
            StrategyId::Scripted => "scripted",
            StrategyId::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ma_crossover" => Ok(StrategyId::MACrossover),
            "rsi_reversion" => Ok(StrategyId::RsiReversion),
            "scripted" => Ok(StrategyId::Scripted),
            "ensemble" => Ok(StrategyId::Ensemble),
            other => Err(CoreError::InvalidInput(
                "strategy".to_string(),
                format!("unknown strategy id '{other}'"),
            )),
        }
    }
}
