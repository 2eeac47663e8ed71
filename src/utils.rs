//! Numeric helpers shared by the solver, the record writer and the overlay.

pub mod safe_cast;

/// Round to a fixed number of decimals, half away from zero.
///
/// Negative zero is normalised to positive zero so that persisted angles
/// never read `-0.000`.
#[must_use]
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_decimals() {
        assert_eq!(round_to_decimals(1.234_56, 3), 1.235);
        assert_eq!(round_to_decimals(-1.234_44, 3), -1.234);
        assert_eq!(round_to_decimals(2.0, 3), 2.0);
        assert_eq!(round_to_decimals(0.000_6, 3), 0.001);
    }

    #[test]
    fn test_round_to_decimals_negative_zero() {
        let rounded = round_to_decimals(-0.000_2, 3);
        assert_eq!(rounded, 0.0);
        assert!(rounded.is_sign_positive());
        assert_eq!(format!("{rounded:.3}"), "0.000");
    }

    #[test]
    fn test_round_to_decimals_non_finite() {
        assert!(round_to_decimals(f64::NAN, 3).is_nan());
        assert_eq!(round_to_decimals(f64::INFINITY, 3), f64::INFINITY);
    }
}
