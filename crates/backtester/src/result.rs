use crate::digest::{sequence_fingerprint, snapshot_digest};
use crate::error::{DeterminismViolation, EngineFailure};
use analytics::{AnalyticsEngine, AnalyticsError, PerformanceReport};
use core_types::{Action, DailySnapshot, DeterminismRecord, Trade, TradingDate};
use health::HealthMetrics;
use risk::RejectReason;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A decision that was considered and turned down.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub date: TradingDate,
    pub agent: String,
    pub ticker: String,
    pub action: Action,
    pub quantity: Decimal,
    pub reason: RejectReason,
}

/// How a run ended. Every variant still carries a full `RunResult`.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationReason {
    /// Every date was processed.
    Completed,
    /// NAV fell to zero or below on `date`; the book was flattened and the run stopped.
    Liquidated { date: TradingDate },
    /// An engine failure stopped the run.
    Aborted(EngineFailure),
}

impl TerminationReason {
    pub fn label(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::Liquidated { .. } => "liquidated",
            TerminationReason::Aborted(_) => "aborted",
        }
    }

    pub fn failure(&self) -> Option<&EngineFailure> {
        match self {
            TerminationReason::Aborted(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Everything a run produced, in the order it was produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: Uuid,
    pub initial_capital: Decimal,
    pub trades: Vec<Trade>,
    pub rejections: Vec<Rejection>,
    pub snapshots: Vec<DailySnapshot>,
    pub determinism_digest_sequence: Vec<DeterminismRecord>,
    pub final_status: TerminationReason,
    /// One line per processed day.
    pub invariant_log: Vec<String>,
    /// Assessments made on checked days only.
    pub health_history: Vec<(TradingDate, HealthMetrics)>,
}

impl RunResult {
    pub fn new(run_id: Uuid, initial_capital: Decimal) -> Self {
        Self {
            run_id,
            initial_capital,
            trades: Vec::new(),
            rejections: Vec::new(),
            snapshots: Vec::new(),
            determinism_digest_sequence: Vec::new(),
            final_status: TerminationReason::Completed,
            invariant_log: Vec::new(),
            health_history: Vec::new(),
        }
    }

    /// NAV after the last processed day, or the starting capital if none was processed.
    pub fn final_nav(&self) -> Decimal {
        self.snapshots
            .last()
            .map(|s| s.nav)
            .unwrap_or(self.initial_capital)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.final_status, TerminationReason::Aborted(_))
    }

    /// SHA-256 over the whole digest sequence.
    pub fn fingerprint(&self) -> String {
        sequence_fingerprint(&self.determinism_digest_sequence)
    }

    /// The end-of-run performance summary.
    pub fn summary(&self) -> Result<PerformanceReport, AnalyticsError> {
        AnalyticsEngine::new().calculate(
            &self.trades,
            &self.snapshots,
            self.initial_capital,
            self.final_status.label(),
        )
    }

    /// Re-hashes every snapshot and compares against the recorded digests.
    pub fn audit(&self) -> Result<(), DeterminismViolation> {
        for (index, (snapshot, record)) in self
            .snapshots
            .iter()
            .zip(&self.determinism_digest_sequence)
            .enumerate()
        {
            let actual = snapshot_digest(snapshot).map_err(|e| DeterminismViolation {
                index,
                date: snapshot.date,
                expected: record.digest.clone(),
                actual: e.to_string(),
            })?;
            if actual != record.digest {
                return Err(DeterminismViolation {
                    index,
                    date: snapshot.date,
                    expected: record.digest.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Compares the digest sequences of two runs that were given the same inputs.
///
/// A sequence that ends early is a violation at the first missing day.
pub fn verify_replay(expected: &RunResult, actual: &RunResult) -> Result<(), DeterminismViolation> {
    let left = &expected.determinism_digest_sequence;
    let right = &actual.determinism_digest_sequence;

    for index in 0..left.len().max(right.len()) {
        match (left.get(index), right.get(index)) {
            (Some(a), Some(b)) if a == b => continue,
            (a, b) => {
                let date = a.or(b).map(|r| r.date).unwrap_or_default();
                return Err(DeterminismViolation {
                    index,
                    date,
                    expected: a.map(|r| r.digest.clone()).unwrap_or_else(|| "<missing>".to_string()),
                    actual: b.map(|r| r.digest.clone()).unwrap_or_else(|| "<missing>".to_string()),
                });
            }
        }
    }
    Ok(())
}
