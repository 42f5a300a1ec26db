//! Numeric primitives
//!
//! Pure functions for the operations where WebAssembly semantics diverge
//! from Rust's defaults: trapping division, trapping versus saturating
//! float-to-int truncation, and min/max with NaN propagation and
//! `-0.0 < +0.0` ordering. Everything here is deterministic and
//! bit-for-bit specified.
//!
//! Plain wrapping arithmetic, masked shifts and rotates map directly onto
//! `wrapping_*` / `rotate_*` and stay in the dispatch loop.

use super::RuntimeError;

// ---- trapping division ----

pub fn i32_div_s(a: i32, b: i32) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    if a == i32::MIN && b == -1 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(a.wrapping_div(b))
}

pub fn i32_div_u(a: i32, b: i32) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(((a as u32) / (b as u32)) as i32)
}

/// `i32::MIN % -1` is defined (zero), unlike the division.
pub fn i32_rem_s(a: i32, b: i32) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

pub fn i32_rem_u(a: i32, b: i32) -> Result<i32, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(((a as u32) % (b as u32)) as i32)
}

pub fn i64_div_s(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    if a == i64::MIN && b == -1 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(a.wrapping_div(b))
}

pub fn i64_div_u(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(((a as u64) / (b as u64)) as i64)
}

pub fn i64_rem_s(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(a.wrapping_rem(b))
}

pub fn i64_rem_u(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(((a as u64) % (b as u64)) as i64)
}

// ---- min/max: propagate NaN, -0 < +0 ----

pub fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == 0.0 && b == 0.0 && a.is_sign_negative() != b.is_sign_negative() {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

pub fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == 0.0 && b == 0.0 && a.is_sign_negative() != b.is_sign_negative() {
        if a.is_sign_negative() { b } else { a }
    } else {
        a.max(b)
    }
}

pub fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 && a.is_sign_negative() != b.is_sign_negative() {
        if a.is_sign_negative() { a } else { b }
    } else {
        a.min(b)
    }
}

pub fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 && a.is_sign_negative() != b.is_sign_negative() {
        if a.is_sign_negative() { b } else { a }
    } else {
        a.max(b)
    }
}

// ---- trapping truncation ----
//
// The f32 sources are widened to f64 first (exact) so each destination
// needs a single range check. NaN and infinity trap as invalid; a finite
// value outside the destination range traps as overflow.

pub fn trunc_i32_s(v: f64) -> Result<i32, RuntimeError> {
    if v.is_nan() {
        return Err(RuntimeError::InvalidConversion);
    }
    let t = v.trunc();
    if t < -2147483648.0 || t > 2147483647.0 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as i32)
}

pub fn trunc_i32_u(v: f64) -> Result<u32, RuntimeError> {
    if v.is_nan() {
        return Err(RuntimeError::InvalidConversion);
    }
    let t = v.trunc();
    if t < 0.0 || t > 4294967295.0 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as u32)
}

pub fn trunc_i64_s(v: f64) -> Result<i64, RuntimeError> {
    if v.is_nan() {
        return Err(RuntimeError::InvalidConversion);
    }
    let t = v.trunc();
    // 2^63 is exact in f64; i64::MAX itself is not, so compare exclusively
    if t < -9223372036854775808.0 || t >= 9223372036854775808.0 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as i64)
}

pub fn trunc_i64_u(v: f64) -> Result<u64, RuntimeError> {
    if v.is_nan() {
        return Err(RuntimeError::InvalidConversion);
    }
    let t = v.trunc();
    if t < 0.0 || t >= 18446744073709551616.0 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(t as u64)
}

// ---- saturating truncation ----
//
// Rust's float-to-int `as` casts already saturate and map NaN to zero,
// which is exactly the `trunc_sat` contract.

pub fn trunc_sat_i32_s(v: f64) -> i32 {
    v as i32
}

pub fn trunc_sat_i32_u(v: f64) -> u32 {
    v as u32
}

pub fn trunc_sat_i64_s(v: f64) -> i64 {
    v as i64
}

pub fn trunc_sat_i64_u(v: f64) -> u64 {
    v as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_div_traps() {
        assert_eq!(i32_div_s(7, -2).unwrap(), -3);
        assert_eq!(i32_div_s(1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(i32_div_s(i32::MIN, -1), Err(RuntimeError::IntegerOverflow));
        assert_eq!(i64_div_s(i64::MIN, -1), Err(RuntimeError::IntegerOverflow));
        // unsigned interpretation of -1 is the max value
        assert_eq!(i32_div_u(-1, 2).unwrap(), 0x7FFF_FFFF);
    }

    #[test]
    fn test_rem_min_by_minus_one_is_zero() {
        assert_eq!(i32_rem_s(i32::MIN, -1).unwrap(), 0);
        assert_eq!(i64_rem_s(i64::MIN, -1).unwrap(), 0);
        assert_eq!(i32_rem_s(1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(i64_rem_u(-1, 10).unwrap(), (u64::MAX % 10) as i64);
    }

    #[test]
    fn test_min_max_zero_ordering() {
        assert!(f64_min(0.0, -0.0).is_sign_negative());
        assert!(f64_min(-0.0, 0.0).is_sign_negative());
        assert!(!f64_max(0.0, -0.0).is_sign_negative());
        assert!(f32_min(0.0, -0.0).is_sign_negative());
        assert!(!f32_max(-0.0, 0.0).is_sign_negative());
    }

    #[test]
    fn test_min_max_nan_propagation() {
        assert!(f64_min(f64::NAN, 1.0).is_nan());
        assert!(f64_max(1.0, f64::NAN).is_nan());
        assert!(f32_min(f32::NAN, f32::NAN).is_nan());
        assert_eq!(f64_min(1.0, 2.0), 1.0);
        assert_eq!(f32_max(1.0, 2.0), 2.0);
    }

    #[rstest]
    #[case(3.9, 3)]
    #[case(-3.9, -3)]
    #[case(2147483647.0, i32::MAX)]
    #[case(-2147483648.0, i32::MIN)]
    fn test_trunc_i32_s(#[case] input: f64, #[case] expected: i32) {
        assert_eq!(trunc_i32_s(input).unwrap(), expected);
    }

    #[test]
    fn test_trunc_traps() {
        assert_eq!(trunc_i32_s(f64::NAN), Err(RuntimeError::InvalidConversion));
        assert_eq!(
            trunc_i32_s(f64::INFINITY),
            Err(RuntimeError::IntegerOverflow)
        );
        assert_eq!(trunc_i32_s(2147483648.0), Err(RuntimeError::IntegerOverflow));
        assert_eq!(trunc_i32_u(-1.0), Err(RuntimeError::IntegerOverflow));
        // fractional values just inside the range are fine
        assert_eq!(trunc_i32_u(-0.9).unwrap(), 0);
        assert_eq!(trunc_i64_s(9223372036854775808.0), Err(RuntimeError::IntegerOverflow));
        assert_eq!(trunc_i64_u(18446744073709551616.0), Err(RuntimeError::IntegerOverflow));
    }

    #[test]
    fn test_trunc_sat_clamps() {
        assert_eq!(trunc_sat_i32_u(-1.0), 0);
        assert_eq!(trunc_sat_i32_s(f64::NAN), 0);
        assert_eq!(trunc_sat_i32_s(1e10), i32::MAX);
        assert_eq!(trunc_sat_i32_s(-1e10), i32::MIN);
        assert_eq!(trunc_sat_i64_u(f64::INFINITY), u64::MAX);
        assert_eq!(trunc_sat_i64_s(-3.5), -3);
    }
}
