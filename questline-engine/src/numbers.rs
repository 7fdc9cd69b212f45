//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 half-to-even and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn round_half_even_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round_ties_even();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Convert a count to u32, saturating on overflow.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Percentage of `part` over `whole` in `0.0..=100.0`; zero when `whole` is zero.
#[must_use]
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (i64_to_f64(part.clamp(0, whole)) / i64_to_f64(whole)) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_uses_ties_to_even() {
        assert_eq!(round_half_even_to_i64(121.875), 122);
        assert_eq!(round_half_even_to_i64(2.5), 2);
        assert_eq!(round_half_even_to_i64(3.5), 4);
        assert_eq!(round_half_even_to_i64(f64::NAN), 0);
        assert_eq!(round_half_even_to_i64(f64::INFINITY), 0);
    }

    #[test]
    fn percent_clamps_and_handles_zero() {
        assert!((percent(5, 10) - 50.0).abs() < f64::EPSILON);
        assert!((percent(15, 10) - 100.0).abs() < f64::EPSILON);
        assert!(percent(3, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn usize_conversion_saturates() {
        assert_eq!(usize_to_u32(7), 7);
    }
}
