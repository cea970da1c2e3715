use crate::error::StrategyError;
use crate::Strategy;
use core_types::{DailySnapshot, Decision, TradingDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// On-disk shape of a decision script.
///
/// ```json
/// {
///   "name": "desk",
///   "days": {
///     "2024-01-02": [
///       { "ticker": "A", "action": "buy", "quantity": "200", "confidence": "100" }
///     ]
///   },
///   "fail_on": ["2024-01-05"]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub days: BTreeMap<TradingDate, Vec<Decision>>,
    #[serde(default)]
    pub fail_on: BTreeSet<TradingDate>,
}

fn default_name() -> String {
    "scripted".to_string()
}

/// Replays a fixed date → decisions table. Dates listed in `fail_on` return an
/// error instead, which the engine treats as a strategy failure for that day.
#[derive(Debug, Clone)]
pub struct ScriptedStrategy {
    script: Script,
}

impl ScriptedStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            script: Script {
                name: name.into(),
                ..Script::default()
            },
        }
    }

    /// Adds decisions for `date`. Decisions without an agent are attributed to this strategy.
    pub fn on(mut self, date: TradingDate, decisions: Vec<Decision>) -> Self {
        self.script.days.entry(date).or_default().extend(decisions);
        self
    }

    pub fn fail_on(mut self, date: TradingDate) -> Self {
        self.script.fail_on.insert(date);
        self
    }

    pub fn from_script(script: Script) -> Self {
        Self { script }
    }

    pub fn from_json(json: &str) -> Result<Self, StrategyError> {
        let script: Script = serde_json::from_str(json)?;
        for decisions in script.days.values() {
            for decision in decisions {
                decision
                    .validate()
                    .map_err(|e| StrategyError::ScriptError(e.to_string()))?;
            }
        }
        Ok(Self::from_script(script))
    }

    pub fn from_path(path: &Path) -> Result<Self, StrategyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.script.name
    }

    fn decide(
        &self,
        date: TradingDate,
        _prior: Option<&DailySnapshot>,
    ) -> Result<Vec<Decision>, StrategyError> {
        if self.script.fail_on.contains(&date) {
            return Err(StrategyError::ScriptedFailure(date));
        }
        let decisions = self
            .script
            .days
            .get(&date)
            .map(|decisions| {
                decisions
                    .iter()
                    .cloned()
                    .map(|mut d| {
                        if d.agent.is_empty() {
                            d.agent = self.script.name.clone();
                        }
                        d
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(decisions)
    }
}
