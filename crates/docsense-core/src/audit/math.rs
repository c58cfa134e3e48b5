//! Fixed-point arithmetic validation of invoice totals.

use rust_decimal::Decimal;

use crate::models::audit::MathValidation;

/// Check `subtotal + tax == grand_total` at two decimal places.
pub fn validate(subtotal: Decimal, tax: Decimal, grand_total: Decimal) -> MathValidation {
    let expected = (subtotal + tax).round_dp(2);
    let actual = grand_total.round_dp(2);
    let delta = (expected - actual).abs();
    let is_valid = delta.is_zero();

    let error = (!is_valid).then(|| {
        format!(
            "Math mismatch: subtotal + tax = {:.2} but grand total is {:.2} (delta {:.2})",
            expected, actual, delta
        )
    });

    MathValidation {
        is_valid,
        expected,
        actual,
        delta,
        error,
    }
}
