//! 2.0: 18 decimal fixed point over a 256 bit unsigned domain.
//!
//! Every amount, price, rate and accumulator in the protocol is a [`FixedPoint`].
//! Multiplication and division truncate toward zero. Nothing here touches floats,
//! so identical inputs give bit identical outputs everywhere.

use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Permille;

// 1e18 fits in the low limb
const SCALE: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);
const PERMILLE_SCALE: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum MathError {
    #[error("fixed point overflow")]
    Overflow,

    #[error("fixed point underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("decimal not representable as unsigned 18 decimal fixed point")]
    InvalidDecimal,
}

/// Unsigned fixed point number with 18 decimals. `raw = value * 1e18`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixedPoint(U256);

impl FixedPoint {
    pub const DECIMALS: u32 = 18;
    pub const ZERO: FixedPoint = FixedPoint(U256([0, 0, 0, 0]));
    pub const ONE: FixedPoint = FixedPoint(SCALE);
    pub const MAX: FixedPoint = FixedPoint(U256::MAX);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    /// whole units. `from_uint(5)` is 5.0
    pub fn from_uint(value: u128) -> Self {
        // u128 * 1e18 stays well inside 256 bits
        Self(U256::from(value) * SCALE)
    }

    pub fn from_uint_checked(value: U256) -> Result<Self, MathError> {
        value.checked_mul(SCALE).map(Self).ok_or(MathError::Overflow)
    }

    /// truncating integer part
    pub fn to_uint(&self) -> U256 {
        self.0 / SCALE
    }

    /// `num / den` as fixed point, truncated
    pub fn from_ratio(num: impl Into<U256>, den: impl Into<U256>) -> Result<Self, MathError> {
        let num = num.into();
        let den = den.into();
        if den.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let scaled = num.checked_mul(SCALE).ok_or(MathError::Overflow)?;
        Ok(Self(scaled / den))
    }

    pub fn from_permille(permille: u32) -> Self {
        // p / 1000 == p * 1e15 raw, exact
        Self(U256::from(permille) * U256::exp10(15))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(self, other: FixedPoint) -> Result<Self, MathError> {
        self.0.checked_add(other.0).map(Self).ok_or(MathError::Overflow)
    }

    pub fn sub(self, other: FixedPoint) -> Result<Self, MathError> {
        self.0.checked_sub(other.0).map(Self).ok_or(MathError::Underflow)
    }

    pub fn saturating_sub(self, other: FixedPoint) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn mul(self, other: FixedPoint) -> Result<Self, MathError> {
        let product = self.0.checked_mul(other.0).ok_or(MathError::Overflow)?;
        Ok(Self(product / SCALE))
    }

    pub fn div(self, other: FixedPoint) -> Result<Self, MathError> {
        if other.0.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let scaled = self.0.checked_mul(SCALE).ok_or(MathError::Overflow)?;
        Ok(Self(scaled / other.0))
    }

    /// integer exponent by repeated truncating multiplication. `x^0 == 1`.
    pub fn pow(self, exponent: u32) -> Result<Self, MathError> {
        let mut result = Self::ONE;
        for _ in 0..exponent {
            result = result.mul(self)?;
        }
        Ok(result)
    }

    /// 1 / x
    pub fn reverse(self) -> Result<Self, MathError> {
        Self::ONE.div(self)
    }

    pub fn mul_permille(self, permille: Permille) -> Result<Self, MathError> {
        self.mul_div(permille.value() as u64, PERMILLE_SCALE)
    }

    pub fn div_permille(self, permille: Permille) -> Result<Self, MathError> {
        self.mul_div(PERMILLE_SCALE, permille.value() as u64)
    }

    /// `self * num / den` on the raw value. used for time and weight proration.
    pub fn mul_div(self, num: u64, den: u64) -> Result<Self, MathError> {
        if den == 0 {
            return Err(MathError::DivisionByZero);
        }
        let product = self.0.checked_mul(U256::from(num)).ok_or(MathError::Overflow)?;
        Ok(Self(product / U256::from(den)))
    }

    /// drop everything below `10^-digits`
    pub fn truncate_to(self, digits: u32) -> Self {
        if digits >= Self::DECIMALS {
            return self;
        }
        let unit = U256::exp10((Self::DECIMALS - digits) as usize);
        Self(self.0 - self.0 % unit)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MathError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MathError::InvalidDecimal);
        }
        let mantissa = U256::from(value.mantissa().unsigned_abs());
        let scale = value.scale();
        let raw = if scale <= Self::DECIMALS {
            let factor = U256::exp10((Self::DECIMALS - scale) as usize);
            mantissa.checked_mul(factor).ok_or(MathError::Overflow)?
        } else {
            mantissa / U256::exp10((scale - Self::DECIMALS) as usize)
        };
        Ok(Self(raw))
    }

    /// lossless when the value fits in a 96 bit decimal mantissa
    pub fn to_decimal(&self) -> Result<Decimal, MathError> {
        if self.0.bits() > 127 {
            return Err(MathError::Overflow);
        }
        let raw = self.0.low_u128() as i128;
        Decimal::try_from_i128_with_scale(raw, Self::DECIMALS)
            .map(|d| d.normalize())
            .map_err(|_| MathError::Overflow)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac.is_zero() {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0>18}", frac.to_string());
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl TryFrom<Decimal> for FixedPoint {
    type Error = MathError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

// 2.1: erf approximation (Abramowitz & Stegun 7.1.28). coefficients in units of 1e-10.
const ERF_COEFFICIENTS: [u64; 6] = [705_230_784, 422_820_123, 92_705_272, 1_520_143, 2_765_672, 430_638];
const ERF_COEFFICIENT_SCALE: u64 = 10_000_000_000;
// results keep 12 decimals
const ERF_RESULT_DIGITS: u32 = 12;

/// `1 + erf(±x / scale)`, in [0, 2].
///
/// Evaluates `P = 1 + a1·x + … + a6·x⁶` with a signed Horner scheme, then returns
/// `2 - 1/P^16`. Zero when `1/P^16` reaches 2 or `P` is not positive.
pub fn erf_plus_one(positive: bool, x: U256, scale: U256) -> Result<FixedPoint, MathError> {
    let x = FixedPoint::from_ratio(x, scale)?;

    // accumulator sign and magnitude
    let mut negative = false;
    let mut magnitude = FixedPoint::ZERO;
    for coefficient in ERF_COEFFICIENTS.iter().rev() {
        let c = FixedPoint::from_ratio(*coefficient, ERF_COEFFICIENT_SCALE)?;
        if negative {
            if magnitude > c {
                magnitude = magnitude.sub(c)?;
            } else {
                magnitude = c.sub(magnitude)?;
                negative = false;
            }
        } else {
            magnitude = magnitude.add(c)?;
        }
        magnitude = magnitude.mul(x)?;
        if !positive {
            negative = !negative;
        }
    }

    let p = if negative {
        if magnitude >= FixedPoint::ONE {
            return Ok(FixedPoint::ZERO);
        }
        FixedPoint::ONE.sub(magnitude)?
    } else {
        FixedPoint::ONE.add(magnitude)?
    };

    let mut p16 = p;
    for _ in 0..4 {
        p16 = p16.mul(p16)?;
    }
    if p16.is_zero() {
        return Ok(FixedPoint::ZERO);
    }

    let two = FixedPoint::from_uint(2);
    let inverse = p16.reverse()?;
    if inverse >= two {
        return Ok(FixedPoint::ZERO);
    }
    Ok(two.sub(inverse)?.truncate_to(ERF_RESULT_DIGITS))
}
