use crate::error::StrategyError;
use crate::Strategy;
use core_types::{DailySnapshot, Decision, TradingDate};

/// Runs several strategies on the same day and pools their decisions in member
/// order. Decisions keep the member's name as their agent, so attribution stays
/// per member. If any member fails, the whole day fails.
pub struct Ensemble {
    name: String,
    members: Vec<Box<dyn Strategy>>,
}

impl Ensemble {
    pub fn new(name: impl Into<String>, members: Vec<Box<dyn Strategy>>) -> Result<Self, StrategyError> {
        if members.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "an ensemble needs at least one member".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            members,
        })
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name())
    }
}

impl Strategy for Ensemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(
        &self,
        date: TradingDate,
        prior: Option<&DailySnapshot>,
    ) -> Result<Vec<Decision>, StrategyError> {
        let mut pooled = Vec::new();
        for member in &self.members {
            let decisions =
                member
                    .decide(date, prior)
                    .map_err(|e| StrategyError::MemberFailed {
                        member: member.name().to_string(),
                        source: Box::new(e),
                    })?;
            pooled.extend(decisions);
        }
        Ok(pooled)
    }
}
