use rust_decimal::Decimal;

/// Whole-share quantity for a conviction-scaled slice of the position cap.
///
/// `confidence / 100 × (max_position_pct × nav) / price`, rounded down. A
/// strategy uses this to pre-size its proposals; the constraint checker still
/// has the final word because NAV can move between sizing and checking.
pub fn size_for_confidence(
    confidence: Decimal,
    nav: Decimal,
    price: Decimal,
    max_position_pct: Decimal,
) -> Decimal {
    if nav <= Decimal::ZERO || price <= Decimal::ZERO || confidence <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let confidence = confidence.min(Decimal::ONE_HUNDRED);
    let budget = confidence / Decimal::ONE_HUNDRED * max_position_pct * nav;
    (budget / price).floor()
}
