use crate::error::RiskError;
use crate::{CheckOutcome, ConstraintChecker, RejectReason};
use configuration::Constraints;
use core_types::Action;
use executor::{CostModel, Portfolio};
use rust_decimal::Decimal;

/// The capital and leverage rules every trade must pass before execution.
///
/// Rules are evaluated in a fixed order and the first failure wins:
///
/// 1. NAV must be positive.
/// 2. No new position (zero-to-nonzero on a side) while NAV is at or below the
///    underwater fraction of initial capital.
/// 3. NAV after the trade, friction included, must stay positive.
/// 4. Gross exposure after the trade must stay within the gross limit.
/// 5. The traded side of the ticker must stay within the single-position limit.
///
/// Rules 4 and 5 are ratios against the NAV at check time and apply only to
/// trades that add exposure; a sell or cover can only shrink both numerators.
/// A trim of a side that has drifted above the limits is therefore accepted
/// even though the side is still over the limit afterwards.
///
/// A proposal whose notional does not fit in a `Decimal` is rejected as an
/// invalid decision. One whose notional alone exceeds the gross limit is
/// rejected before the preview, with the reason rule 3 or rule 4 would give.
#[derive(Debug, Clone)]
pub struct LeverageConstraints {
    limits: Constraints,
    costs: CostModel,
}

impl LeverageConstraints {
    /// Creates a checker. `costs` must be the executor's cost model so the
    /// preview and the real fill agree to the cent.
    pub fn new(limits: Constraints, costs: CostModel) -> Result<Self, RiskError> {
        for (name, value) in [
            ("max_position_pct", limits.max_position_pct),
            ("max_gross_exposure_pct", limits.max_gross_exposure_pct),
            ("underwater_nav_pct", limits.underwater_nav_pct),
        ] {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(RiskError::InvalidParameters(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        Ok(Self { limits, costs })
    }

    pub fn limits(&self) -> &Constraints {
        &self.limits
    }
}

impl ConstraintChecker for LeverageConstraints {
    fn check(
        &self,
        portfolio: &Portfolio,
        ticker: &str,
        action: Action,
        quantity: Decimal,
        price: Decimal,
    ) -> CheckOutcome {
        let Some(side) = action.side() else {
            return CheckOutcome::Reject(RejectReason::InvalidDecision(
                "hold cannot be traded".to_string(),
            ));
        };

        // --- 1. Solvency ---
        let nav = portfolio.nav();
        if nav <= Decimal::ZERO {
            return CheckOutcome::Reject(RejectReason::NavNonPositive);
        }

        // --- 2. Underwater: reduce only ---
        let opens_new_side = action.increases_exposure()
            && portfolio.side_quantity(ticker, side).is_zero();
        let initial = portfolio.initial_capital();
        if opens_new_side
            && initial > Decimal::ZERO
            && nav / initial <= self.limits.underwater_nav_pct
        {
            return CheckOutcome::Reject(RejectReason::Underwater);
        }

        // --- Oversized proposals ---
        // Settled without previewing, so the ledger arithmetic never sees them.
        let Some(notional) = quantity.checked_mul(price) else {
            return CheckOutcome::Reject(RejectReason::InvalidDecision(format!(
                "notional of {quantity} x {price} is out of range"
            )));
        };
        if action.increases_exposure() && notional > nav * self.limits.max_gross_exposure_pct {
            let solvent = self
                .costs
                .checked_costs(quantity, price)
                .is_some_and(|costs| nav - costs > Decimal::ZERO);
            return CheckOutcome::Reject(if solvent {
                RejectReason::GrossExposure
            } else {
                RejectReason::WouldMakeNavNegative
            });
        }

        // --- 3. Preview the fill on a copy of the ledger ---
        let mut preview = portfolio.clone();
        let fill = self.costs.fill(ticker, action, quantity, price);
        if let Err(e) = preview.apply_fill(&fill) {
            return CheckOutcome::Reject(RejectReason::InvalidDecision(e.to_string()));
        }
        if preview.nav() <= Decimal::ZERO {
            return CheckOutcome::Reject(RejectReason::WouldMakeNavNegative);
        }

        if action.reduces_exposure() {
            return CheckOutcome::Accept;
        }

        // --- 4. Gross leverage ---
        let gross_ratio = preview.gross_exposure() / nav;
        if gross_ratio > self.limits.max_gross_exposure_pct {
            return CheckOutcome::Reject(RejectReason::GrossExposure);
        }

        // --- 5. Concentration ---
        let single_ratio = preview.side_notional(ticker, side) / nav;
        if single_ratio > self.limits.max_position_pct {
            return CheckOutcome::Reject(RejectReason::PositionLimit);
        }

        CheckOutcome::Accept
    }
}
