//! Fixed-point wad/ray arithmetic.
//!
//! ## Overview
//!
//! Balances use the "wad" scale (10^18) and exchange rates and growth factors
//! use the "ray" scale (10^27). Values are `U256`, so a product of two rays
//! (10^54) still fits before it is scaled back down.
//!
//! ## Rounding
//!
//! Every multiply and divide rounds half up at the target scale:
//!
//! - `mul(a, b) = (a * b + scale / 2) / scale`
//! - `div(a, b) = (a * scale + b / 2) / b`
//!
//! Overflow is reported as [`CoreError::ArithmeticOverflow`] and a zero divisor
//! as [`CoreError::DivisionByZero`]; nothing wraps.
//!
//! ## Examples
//!
//! ```
//! use p2p_overlay::types::math::{ray_mul, to_ray, from_ray};
//!
//! let a = to_ray("1.5").unwrap();
//! let b = to_ray("2").unwrap();
//! let product = ray_mul(a, b).unwrap();
//! assert_eq!(from_ray(product).as_deref(), Some("3"));
//! ```

use alloy_primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::error::{CoreError, Result};

/// 10^18
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub const HALF_WAD: U256 = U256::from_limbs([500_000_000_000_000_000, 0, 0, 0]);

/// 10^27, the value 1.0 for rates and growth factors
pub const RAY: U256 = U256::from_limbs([11_515_845_246_265_065_472, 54_210_108, 0, 0]);

pub const HALF_RAY: U256 = U256::from_limbs([5_757_922_623_132_532_736, 27_105_054, 0, 0]);

/// Ratio between the ray and wad scales (10^9)
pub const WAD_RAY_RATIO: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// Number of decimals of the wad scale
pub const WAD_DECIMALS: u32 = 18;

/// Number of decimals of the ray scale
pub const RAY_DECIMALS: u32 = 27;

/// 100% expressed in basis points
pub const MAX_BASIS_POINTS: u16 = 10_000;

/// Largest accepted reserve factor (bps).
///
/// At half of `MAX_BASIS_POINTS` the spread taken from suppliers equals the
/// blended growth of a flat pool, leaving a zero supply P2P growth.
pub const MAX_RESERVE_FACTOR: u16 = MAX_BASIS_POINTS / 2 - 1;

// ============================================================================
// Checked primitives
// ============================================================================

#[inline]
pub fn add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(CoreError::ArithmeticOverflow)
}

#[inline]
pub fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(CoreError::ArithmeticUnderflow)
}

#[inline]
pub fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(CoreError::ArithmeticOverflow)
}

/// Integer division rounding down
#[inline]
pub fn div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(CoreError::DivisionByZero)
}

fn mul_half_up(a: U256, b: U256, scale: U256, half: U256) -> Result<U256> {
    let product = mul(a, b)?;
    Ok(add(product, half)? / scale)
}

fn div_half_up(a: U256, b: U256, scale: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(CoreError::DivisionByZero);
    }
    let numerator = add(mul(a, scale)?, b >> 1usize)?;
    Ok(numerator / b)
}

// ============================================================================
// Wad / ray operations
// ============================================================================

/// Multiply two wads, rounding half up
///
/// ```
/// use p2p_overlay::types::math::{wad_mul, to_wad};
///
/// let a = to_wad("100").unwrap();
/// let b = to_wad("0.5").unwrap();
/// assert_eq!(wad_mul(a, b).unwrap(), to_wad("50").unwrap());
/// ```
pub fn wad_mul(a: U256, b: U256) -> Result<U256> {
    mul_half_up(a, b, WAD, HALF_WAD)
}

/// Divide two wads, rounding half up
pub fn wad_div(a: U256, b: U256) -> Result<U256> {
    div_half_up(a, b, WAD)
}

/// Multiply two rays, rounding half up
///
/// The first operand may be of any scale: `ray_mul(balance, rate)` converts a
/// rate-scaled balance into underlying units of the balance's own scale.
pub fn ray_mul(a: U256, b: U256) -> Result<U256> {
    mul_half_up(a, b, RAY, HALF_RAY)
}

/// Divide two rays, rounding half up
///
/// # Errors
///
/// * [`CoreError::DivisionByZero`] if `b` is zero
/// * [`CoreError::ArithmeticOverflow`] if `a * RAY` does not fit
pub fn ray_div(a: U256, b: U256) -> Result<U256> {
    div_half_up(a, b, RAY)
}

/// Rescale a wad into a ray (exact)
pub fn wad_to_ray(a: U256) -> Result<U256> {
    mul(a, WAD_RAY_RATIO)
}

/// Rescale a ray into a wad, rounding half up
pub fn ray_to_wad(a: U256) -> Result<U256> {
    let half_ratio = WAD_RAY_RATIO >> 1usize;
    Ok(add(a, half_ratio)? / WAD_RAY_RATIO)
}

/// Raise a ray to a non-negative integer power
///
/// Square-and-multiply over `ray_mul`, so each step rounds half up. Used to
/// compound a per-block rate over several blocks.
///
/// ```
/// use p2p_overlay::types::math::{ray_pow, to_ray, RAY};
///
/// assert_eq!(ray_pow(to_ray("1.1").unwrap(), 0).unwrap(), RAY);
/// assert_eq!(ray_pow(to_ray("1.1").unwrap(), 2).unwrap(), to_ray("1.21").unwrap());
/// ```
pub fn ray_pow(base: U256, exponent: u64) -> Result<U256> {
    let mut x = base;
    let mut n = exponent;
    let mut z = if n % 2 != 0 { x } else { RAY };

    n /= 2;
    while n != 0 {
        x = ray_mul(x, x)?;
        if n % 2 != 0 {
            z = ray_mul(z, x)?;
        }
        n /= 2;
    }

    Ok(z)
}

#[inline]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

/// Arithmetic mean, rounded down, without intermediate overflow
#[inline]
pub fn average(a: U256, b: U256) -> U256 {
    (a & b) + ((a ^ b) >> 1usize)
}

// ============================================================================
// Decimal conversion (using rust_decimal for parsing and display)
// ============================================================================

/// Parse a decimal string into a fixed-point integer with `decimals` digits
///
/// # Returns
///
/// * `Some(U256)` - The fixed-point representation (rounded half up)
/// * `None` - If parsing fails, the value is negative, or it does not fit
///   the 96-bit mantissa of `Decimal` at that scale
pub fn to_fixed(s: &str, decimals: u32) -> Option<U256> {
    let mut decimal = Decimal::from_str(s).ok()?;
    if decimal.is_sign_negative() && !decimal.is_zero() {
        return None;
    }

    decimal.rescale(decimals);
    if decimal.scale() != decimals {
        return None;
    }

    let mantissa = u128::try_from(decimal.mantissa()).ok()?;
    Some(U256::from(mantissa))
}

/// Parse a decimal string as a ray
///
/// ```
/// use p2p_overlay::types::math::{to_ray, RAY};
///
/// assert_eq!(to_ray("1"), Some(RAY));
/// assert_eq!(to_ray("-1"), None);
/// ```
pub fn to_ray(s: &str) -> Option<U256> {
    to_fixed(s, RAY_DECIMALS)
}

/// Parse a decimal string as a wad
pub fn to_wad(s: &str) -> Option<U256> {
    to_fixed(s, WAD_DECIMALS)
}

/// Convert a fixed-point integer into a `Decimal`
///
/// Returns `None` when the value exceeds what `Decimal` can hold.
pub fn fixed_to_decimal(value: U256, decimals: u32) -> Option<Decimal> {
    let raw = u128::try_from(value).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals).ok()
}

/// Render a ray as a trimmed decimal string
pub fn from_ray(value: U256) -> Option<String> {
    fixed_to_decimal(value, RAY_DECIMALS).map(|d| d.normalize().to_string())
}

/// Render a wad as a trimmed decimal string
pub fn from_wad(value: U256) -> Option<String> {
    fixed_to_decimal(value, WAD_DECIMALS).map(|d| d.normalize().to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================
