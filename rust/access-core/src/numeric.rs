//! Decimal normalization, half-even rounding, and serial-date conversion.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_traits::Zero;

/// Smallest serial double this engine round-trips (documented Access
/// temporal floor, year 100).
pub const SERIAL_MIN: f64 = -657_434.0;
/// Largest serial double this engine round-trips (documented Access
/// temporal ceiling, year 9999).
pub const SERIAL_MAX: f64 = 2_958_465.999_988_426;

fn epoch() -> NaiveDate {
    // Access epoch: day 0 is 1899-12-30.
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch date")
}

/// Normalize a `BigDecimal` into the engine's "normal form": scale >= 0,
/// no trailing fractional zeros, and zero always represented at scale 0.
pub fn normalize_big_decimal(value: &BigDecimal) -> BigDecimal {
    let normalized = value.normalized();
    if normalized.is_zero() {
        BigDecimal::from(0)
    } else if normalized.fractional_digit_count() < 0 {
        // `normalized()` can return a negative scale for whole numbers;
        // the spec requires scale >= 0.
        normalized.with_scale(0)
    } else {
        normalized
    }
}

/// Round `value` to `digits` fractional digits using banker's rounding
/// (round-half-to-even), then renormalize.
pub fn round_half_even(value: &BigDecimal, digits: i64) -> BigDecimal {
    let rounded = value.with_scale_round(digits.max(0), RoundingMode::HalfEven);
    normalize_big_decimal(&rounded)
}

/// Round an `f64` to `digits` fractional digits using banker's rounding,
/// by routing through `BigDecimal` so behaviour matches the decimal path.
pub fn round_f64_half_even(value: f64, digits: i32) -> f64 {
    let Ok(bd) = BigDecimal::try_from(value) else {
        return value;
    };
    let rounded = bd.with_scale_round(digits as i64, RoundingMode::HalfEven);
    rounded.to_string().parse().unwrap_or(value)
}

/// Convert an Access serial double (days since 1899-12-30, fractional part
/// is time of day) into a naive date-time.
///
/// Uses a floor/fractional split (whole part always rounds toward negative
/// infinity, fractional part always non-negative) rather than replicating
/// the original engine's sign-dependent quirk for negative serials; that
/// quirk is a host bug this engine does not emulate.
pub fn from_serial_double(serial: f64) -> NaiveDateTime {
    let whole_days = serial.floor();
    let frac = serial - whole_days;
    let date = epoch() + chrono::Duration::days(whole_days as i64);
    let total_nanos = (frac * 86_400_000_000_000.0).round() as i64;
    let total_nanos = total_nanos.clamp(0, 86_399_999_999_999);
    let secs = (total_nanos / 1_000_000_000) as u32;
    let nanos = (total_nanos % 1_000_000_000) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    NaiveDateTime::new(date, time)
}

/// Convert a naive date-time back into an Access serial double.
pub fn to_serial_double(dt: NaiveDateTime) -> f64 {
    let days = (dt.date() - epoch()).num_days() as f64;
    let secs = dt.time().num_seconds_from_midnight() as f64
        + dt.time().nanosecond() as f64 / 1_000_000_000.0;
    days + secs / 86_400.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn normalize_strips_trailing_zeros() {
        let v = BigDecimal::from_str("1.230000").unwrap();
        assert_eq!(normalize_big_decimal(&v).to_string(), "1.23");
    }

    #[test]
    fn normalize_zero_is_scale_zero() {
        let v = BigDecimal::from_str("0.000").unwrap();
        assert_eq!(normalize_big_decimal(&v).to_string(), "0");
    }

    #[test]
    fn round_half_even_ties_to_even() {
        let v = BigDecimal::from_str("2.5").unwrap();
        assert_eq!(round_half_even(&v, 0).to_string(), "2");
        let v = BigDecimal::from_str("3.5").unwrap();
        assert_eq!(round_half_even(&v, 0).to_string(), "4");
    }

    #[test]
    fn epoch_round_trips_to_zero() {
        let dt = NaiveDateTime::new(epoch(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(to_serial_double(dt), 0.0);
        assert_eq!(from_serial_double(0.0), dt);
    }

    #[test]
    fn serial_round_trip_with_time() {
        let serial = 45000.5; // noon on some day well within range
        let dt = from_serial_double(serial);
        let back = to_serial_double(dt);
        assert!((back - serial).abs() < 1e-9);
    }

    #[test]
    fn negative_serial_uses_floor_convention() {
        // -1.25 => one day before epoch, 18:00 (0.75 of a day).
        let dt = from_serial_double(-1.25);
        assert_eq!(dt.date(), epoch() - chrono::Duration::days(1));
        assert_eq!(dt.time(), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }
}
