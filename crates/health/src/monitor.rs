use core_types::{DailySnapshot, HealthStatus};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

const CAPITAL_WEIGHT: f64 = 0.30;
const EXPOSURE_WEIGHT: f64 = 0.25;
const RISK_WEIGHT: f64 = 0.25;
const CONSTRAINT_WEIGHT: f64 = 0.20;

/// Default number of trailing days used for volatility and compliance.
pub const DEFAULT_WINDOW: usize = 20;

/// Severity of one sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Ok,
    Caution,
    Warning,
    Critical,
}

impl Level {
    fn score(self) -> f64 {
        match self {
            Level::Ok => 1.0,
            Level::Caution => 0.75,
            Level::Warning => 0.5,
            Level::Critical => 0.2,
        }
    }
}

/// Derived health readings. Never a source of truth; recomputable from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub capital_score: f64,
    pub exposure_score: f64,
    pub risk_score: f64,
    pub constraint_score: f64,
    pub overall_score: f64,
    pub overall_status: HealthStatus,
    pub active_alerts: Vec<String>,
    pub nav_pct_of_initial: f64,
    pub gross_exposure_pct: f64,
    pub drawdown_pct: f64,
}

/// Maps an overall score to a status.
pub fn status_for_score(score: f64) -> HealthStatus {
    if score >= 0.9 {
        HealthStatus::Excellent
    } else if score >= 0.75 {
        HealthStatus::Healthy
    } else if score >= 0.6 {
        HealthStatus::Caution
    } else if score >= 0.4 {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

fn f(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator <= Decimal::ZERO {
        return 0.0;
    }
    f(numerator / denominator)
}

/// Stateless calculator for portfolio health.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    initial_capital: Decimal,
    window: usize,
}

impl HealthMonitor {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(2);
        self
    }

    /// Scores `current` in the light of the snapshots that came before it.
    pub fn assess(&self, current: &DailySnapshot, history: &[DailySnapshot]) -> HealthMetrics {
        let mut alerts = Vec::new();

        let (capital_level, nav_pct) = self.capital(current, &mut alerts);
        let (exposure_level, gross_pct) = self.exposure(current, &mut alerts);
        let (risk_level, drawdown) = self.risk(current, history, &mut alerts);
        let constraint_score = self.compliance(current, history, &mut alerts);

        let capital_score = capital_level.score();
        let exposure_score = exposure_level.score();
        let risk_score = risk_level.score();

        let overall_score = CAPITAL_WEIGHT * capital_score
            + EXPOSURE_WEIGHT * exposure_score
            + RISK_WEIGHT * risk_score
            + CONSTRAINT_WEIGHT * constraint_score;
        let overall_status = status_for_score(overall_score);
        if overall_status.is_degraded() {
            tracing::debug!(
                date = %current.date,
                score = overall_score,
                status = %overall_status,
                alerts = alerts.len(),
                "Health degraded"
            );
        }

        HealthMetrics {
            capital_score,
            exposure_score,
            risk_score,
            constraint_score,
            overall_score,
            overall_status,
            active_alerts: alerts,
            nav_pct_of_initial: nav_pct,
            gross_exposure_pct: gross_pct,
            drawdown_pct: drawdown,
        }
    }

    fn capital(&self, s: &DailySnapshot, alerts: &mut Vec<String>) -> (Level, f64) {
        let nav_pct = ratio(s.nav, self.initial_capital);
        let cash_ratio = ratio(s.cash, s.nav);

        let level = if nav_pct < 0.30 || cash_ratio < 0.05 {
            Level::Critical
        } else if nav_pct < 0.50 || cash_ratio < 0.10 {
            Level::Warning
        } else if nav_pct < 0.70 {
            Level::Caution
        } else {
            Level::Ok
        };

        if level >= Level::Warning {
            alerts.push(format!(
                "{}: NAV at {:.1}% of initial capital, cash {:.1}% of NAV",
                if level == Level::Critical { "CRITICAL" } else { "WARNING" },
                nav_pct * 100.0,
                cash_ratio * 100.0
            ));
        }
        (level, nav_pct)
    }

    fn exposure(&self, s: &DailySnapshot, alerts: &mut Vec<String>) -> (Level, f64) {
        if s.nav <= Decimal::ZERO {
            alerts.push("CRITICAL: NAV is non-positive, exposure is unbounded".to_string());
            return (Level::Critical, 0.0);
        }

        let gross_pct = ratio(s.gross_exposure, s.nav);
        let sides = s.side_notionals();
        let max_position_pct = sides
            .iter()
            .map(|(_, _, notional)| ratio(*notional, s.nav))
            .fold(0.0, f64::max);
        let hhi = if s.gross_exposure > Decimal::ZERO {
            sides
                .iter()
                .map(|(_, _, notional)| ratio(*notional, s.gross_exposure).powi(2))
                .sum::<f64>()
        } else {
            0.0
        };

        let level = if gross_pct > 2.0 || max_position_pct > 0.30 {
            Level::Critical
        } else if gross_pct > 1.5 || max_position_pct > 0.25 {
            Level::Warning
        } else if hhi > 0.5 {
            Level::Caution
        } else {
            Level::Ok
        };

        match level {
            Level::Critical | Level::Warning => alerts.push(format!(
                "{}: gross exposure {:.1}%, largest position {:.1}% of NAV",
                if level == Level::Critical { "CRITICAL" } else { "WARNING" },
                gross_pct * 100.0,
                max_position_pct * 100.0
            )),
            Level::Caution => alerts.push(format!("CAUTION: concentrated book (HHI {hhi:.2})")),
            Level::Ok => {}
        }
        (level, gross_pct)
    }

    fn risk(
        &self,
        current: &DailySnapshot,
        history: &[DailySnapshot],
        alerts: &mut Vec<String>,
    ) -> (Level, f64) {
        let navs: Vec<Decimal> = history
            .iter()
            .map(|s| s.nav)
            .chain(std::iter::once(current.nav))
            .collect();

        let peak = navs
            .iter()
            .copied()
            .chain(std::iter::once(self.initial_capital))
            .max()
            .unwrap_or(current.nav);
        let drawdown = if peak > Decimal::ZERO {
            ratio(peak - current.nav, peak)
        } else {
            0.0
        };

        let tail_start = navs.len().saturating_sub(self.window + 1);
        let returns: Vec<f64> = navs[tail_start..]
            .windows(2)
            .filter(|w| w[0] > Decimal::ZERO)
            .map(|w| ratio(w[1] - w[0], w[0]))
            .collect();
        let last_return = returns.last().copied().unwrap_or(0.0);
        let daily_loss = (-last_return).max(0.0);
        let volatility = if returns.len() >= 2 {
            let mean = returns.iter().sum::<f64>() / returns.len() as f64;
            let variance =
                returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let level = if drawdown > 0.20 {
            Level::Critical
        } else if drawdown > 0.10 || daily_loss > 0.05 {
            Level::Warning
        } else if volatility > 0.03 {
            Level::Caution
        } else {
            Level::Ok
        };

        match level {
            Level::Critical => alerts.push(format!(
                "CRITICAL: drawdown {:.1}% from peak",
                drawdown * 100.0
            )),
            Level::Warning => alerts.push(format!(
                "WARNING: drawdown {:.1}%, last day {:+.1}%",
                drawdown * 100.0,
                last_return * 100.0
            )),
            Level::Caution => alerts.push(format!(
                "CAUTION: daily volatility {:.1}%",
                volatility * 100.0
            )),
            Level::Ok => {}
        }
        (level, drawdown)
    }

    fn compliance(
        &self,
        current: &DailySnapshot,
        history: &[DailySnapshot],
        alerts: &mut Vec<String>,
    ) -> f64 {
        let tail_start = history.len().saturating_sub(self.window - 1);
        let (accepted, rejected) = history[tail_start..]
            .iter()
            .chain(std::iter::once(current))
            .fold((0usize, 0usize), |(a, r), s| {
                (a + s.decisions_accepted, r + s.decisions_rejected)
            });

        let total = accepted + rejected;
        if total == 0 {
            return 1.0;
        }
        let compliance = accepted as f64 / total as f64;
        if compliance < 0.5 {
            alerts.push(format!(
                "WARNING: {rejected} of {total} recent decisions rejected by constraints"
            ));
        }
        compliance
    }
}
