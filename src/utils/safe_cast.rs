//! Checked conversions between landmark, pixel and solver number types

use crate::{Error, Result};

/// Safely convert f64 to i32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::OutOfRange(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Round to the nearest pixel and clamp into `[min, max]`
///
/// Non-finite input maps to `min`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i64_clamp(value: f64, min: i64, max: i64) -> i64 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    #[allow(clippy::cast_precision_loss)] // Bounds only need to be approximate
    let clamped = value.round().clamp(min as f64, max as f64);
    (clamped as i64).clamp(min, max)
}

/// Landmark coordinate as read from a record: rounded to three decimals, then truncated toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
pub fn landmark_coordinate(value: f64) -> Result<i32> {
    f64_to_i32(crate::utils::round_to_decimals(value, 3).trunc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_f64_to_i32() {
        assert_eq!(f64_to_i32(42.0).unwrap(), 42);
        assert_eq!(f64_to_i32(-42.0).unwrap(), -42);
        assert_eq!(f64_to_i32(0.0).unwrap(), 0);
        assert_eq!(f64_to_i32(2147483647.0).unwrap(), i32::MAX);
        assert_eq!(f64_to_i32(-2147483648.0).unwrap(), i32::MIN);

        assert!(f64_to_i32(f64::INFINITY).is_err());
        assert!(f64_to_i32(f64::NEG_INFINITY).is_err());
        assert!(f64_to_i32(f64::NAN).is_err());
        assert!(f64_to_i32(2147483648.0).is_err());
        assert!(f64_to_i32(-2147483649.0).is_err());
    }

    #[test]
    fn test_f64_to_i64_clamp() {
        assert_eq!(f64_to_i64_clamp(50.4, 0, 100), 50);
        assert_eq!(f64_to_i64_clamp(50.6, 0, 100), 51);
        assert_eq!(f64_to_i64_clamp(-10.0, 0, 100), 0);
        assert_eq!(f64_to_i64_clamp(150.0, 0, 100), 100);
        assert_eq!(f64_to_i64_clamp(f64::NAN, 0, 100), 0);
        assert_eq!(f64_to_i64_clamp(f64::INFINITY, -5, 5), -5);
        assert_eq!(f64_to_i64_clamp(3.0, 10, -10), 3);
    }

    #[test]
    fn test_landmark_coordinate_truncates() {
        assert_eq!(landmark_coordinate(123.9).unwrap(), 123);
        assert_eq!(landmark_coordinate(123.9996).unwrap(), 124);
        assert_eq!(landmark_coordinate(-4.7).unwrap(), -4);
        assert_eq!(landmark_coordinate(88.0).unwrap(), 88);
        assert!(landmark_coordinate(f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn prop_f64_to_i32_finite_within_bounds(value in i32::MIN..=i32::MAX) {
            let result = f64_to_i32(f64::from(value));
            prop_assert!(result.is_ok());
            prop_assert_eq!(result.unwrap(), value);
        }

        #[test]
        fn prop_f64_to_i64_clamp_always_within_bounds(
            value in any::<f64>(),
            min in -100_000i64..100_000,
            max in -100_000i64..100_000
        ) {
            let (min, max) = if min <= max { (min, max) } else { (max, min) };
            let result = f64_to_i64_clamp(value, min, max);
            prop_assert!(result >= min);
            prop_assert!(result <= max);
        }
    }
}
