//! Decimal arithmetic helpers shared across the ledger engine.
//!
//! All cost, proceeds, and unit quantities are exact decimal values
//! (`rust_decimal::Decimal`); binary floats never enter this crate.

use rust_decimal::Decimal;

/// Tolerance used for sanity assertions on derived sums (never for core
/// arithmetic, which stays exact).
pub fn tolerance() -> Decimal {
    Decimal::new(1, 8)
}

/// True if `a` and `b` differ by no more than [`tolerance`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= tolerance()
}

/// Sign-preserving minimum magnitude of two decimals that share a sign,
/// used by the wash-sale engine's replacement/loss reconciliation.
///
/// Returns `sign(a) * min(|a|, |b|)`.
pub fn signed_min_magnitude(a: Decimal, b: Decimal) -> Decimal {
    let sign = if a.is_sign_negative() {
        -Decimal::ONE
    } else {
        Decimal::ONE
    };
    sign * a.abs().min(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tolerance_accepts_small_drift() {
        assert!(within_tolerance(dec!(1.00000001), dec!(1.00000002)));
    }

    #[test]
    fn tolerance_rejects_large_drift() {
        assert!(!within_tolerance(dec!(1.0), dec!(1.1)));
    }

    #[test]
    fn signed_min_magnitude_preserves_sign() {
        assert_eq!(signed_min_magnitude(dec!(-500), dec!(300)), dec!(-300));
        assert_eq!(signed_min_magnitude(dec!(-200), dec!(300)), dec!(-200));
        assert_eq!(signed_min_magnitude(dec!(500), dec!(300)), dec!(300));
    }
}
