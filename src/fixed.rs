// ============================================================================
// Fixed-Point Arithmetic
// ============================================================================
//
// All settlement math runs on u128 amounts at SCALE (1e18). Two u128 inputs
// at that scale overflow a u128 product, so `mul_div_floor` widens through a
// 256-bit intermediate built from 64-bit limbs and divides with a restoring
// long division. No unsafe, no external bigint.
//
// Every payoff formula floors at its final division. Helpers here never
// round in any other direction; callers that need a different order compose
// these primitives explicitly.

use crate::constants::SCALE;
use crate::error::{Error, Result};

/// Full 128x128 -> 256 bit multiply. Returns (hi, lo) limbs of the product.
#[inline]
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let a0 = a as u64 as u128;
    let a1 = (a >> 64) as u64 as u128;
    let b0 = b as u64 as u128;
    let b1 = (b >> 64) as u64 as u128;

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    // Middle partial sums can carry past 128 bits; track it explicitly.
    let (mid, mid_carry) = p01.overflowing_add(p10);
    let mid_lo = mid << 64;
    let mid_hi = (mid >> 64) + ((mid_carry as u128) << 64);

    let (lo, lo_carry) = p00.overflowing_add(mid_lo);
    let hi = p11 + mid_hi + lo_carry as u128;
    (hi, lo)
}

/// 256 / 128 -> 128 restoring division. Requires `hi < d` (quotient fits
/// in a u128); callers enforce this before entering the loop.
#[inline]
fn div_wide(hi: u128, lo: u128, d: u128) -> u128 {
    let mut rem = hi;
    let mut quo = 0u128;
    let mut i = 128;
    while i > 0 {
        i -= 1;
        // The bit shifted out of `rem` makes the conceptual remainder
        // exceed any u128 divisor, so a set carry always subtracts.
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quo <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quo |= 1;
        }
    }
    quo
}

/// Exact floor(a * b / d). Fails on division by zero or a quotient wider
/// than 128 bits.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Result<u128> {
    if d == 0 {
        return Err(Error::Overflow);
    }
    let (hi, lo) = mul_wide(a, b);
    if hi == 0 {
        return Ok(lo / d);
    }
    if hi >= d {
        return Err(Error::Overflow);
    }
    Ok(div_wide(hi, lo, d))
}

/// Apply a SCALE-relative rate to an amount: floor(amount * rate / SCALE).
pub fn apply_rate(amount: u128, rate: u128) -> Result<u128> {
    mul_div_floor(amount, rate, SCALE)
}

/// Checked addition on amounts.
pub fn add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow)
}

/// Checked subtraction on amounts.
pub fn sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Overflow)
}

/// Checked u128 -> i128 conversion.
pub fn to_signed(a: u128) -> Result<i128> {
    i128::try_from(a).map_err(|_| Error::Overflow)
}

/// Checked i128 addition.
pub fn add_i128(a: i128, b: i128) -> Result<i128> {
    a.checked_add(b).ok_or(Error::Overflow)
}

/// Apply a signed delta to an unsigned amount. Fails if the result would
/// go negative or overflow.
pub fn add_signed(a: u128, delta: i128) -> Result<u128> {
    if delta >= 0 {
        add(a, delta as u128)
    } else {
        a.checked_sub(delta.unsigned_abs()).ok_or(Error::Overflow)
    }
}

/// floor(|a| * num / den) with the sign of `a` restored: truncation toward
/// zero, the normative rounding for the signed pool fee.
pub fn mul_div_signed(a: i128, num: u128, den: u128) -> Result<i128> {
    let magnitude = mul_div_floor(a.unsigned_abs(), num, den)?;
    let signed = to_signed(magnitude)?;
    Ok(if a < 0 { -signed } else { signed })
}
