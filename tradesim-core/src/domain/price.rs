//! Price: fixed-point money.
//!
//! Every monetary quantity in the engine (bar prices, cash, cost basis,
//! commission, PnL) is a `Price`: an `i64` holding the value multiplied by
//! [`Price::SCALE`]. Sums, differences and cost-basis bookkeeping stay in the
//! integer domain so accounting identities hold exactly. Conversion to and
//! from decimal only happens at parsing and reporting boundaries.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use thiserror::Error;

/// Number of fractional decimal digits carried by a [`Price`].
pub const PRICE_DECIMALS: u32 = 5;

/// Errors from converting external values into a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("not a decimal number: '{0}'")]
    Malformed(String),

    #[error("value is not finite")]
    NotFinite,

    #[error("value out of range: '{0}'")]
    OutOfRange(String),
}

/// Fixed-point monetary value (value × 10^5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// Scale constant: one currency unit == `SCALE` raw units.
    pub const SCALE: i64 = 100_000;

    pub const ZERO: Price = Price(0);

    /// Wrap an already-scaled raw value.
    pub const fn from_scaled(raw: i64) -> Self {
        Self(raw)
    }

    /// Whole currency units (e.g. `from_units(10)` is 10.00000).
    pub const fn from_units(units: i64) -> Self {
        Self(units * Self::SCALE)
    }

    /// Raw scaled integer.
    pub const fn scaled(self) -> i64 {
        self.0
    }

    /// Convert from a float, rounding to the nearest representable value.
    pub fn from_f64(value: f64) -> Result<Self, PriceError> {
        if !value.is_finite() {
            return Err(PriceError::NotFinite);
        }
        let scaled = (value * Self::SCALE as f64).round();
        if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return Err(PriceError::OutOfRange(value.to_string()));
        }
        Ok(Self(scaled as i64))
    }

    /// Parse a decimal string exactly.
    ///
    /// Digits past the fifth fractional place are rounded half away from zero.
    /// Exponent notation (`1.5e2`) falls back to float parsing.
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let s = input.trim();
        if s.contains(&['e', 'E'][..]) {
            let value: f64 = s
                .parse()
                .map_err(|_| PriceError::Malformed(input.to_string()))?;
            return Self::from_f64(value);
        }

        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(PriceError::Malformed(input.to_string()));
        }

        let out_of_range = || PriceError::OutOfRange(input.to_string());

        let mut raw: i64 = 0;
        for b in int_part.bytes() {
            raw = raw
                .checked_mul(10)
                .and_then(|r| r.checked_add(i64::from(b - b'0')))
                .ok_or_else(out_of_range)?;
        }
        raw = raw.checked_mul(Self::SCALE).ok_or_else(out_of_range)?;

        let frac = frac_part.as_bytes();
        let mut place = Self::SCALE / 10;
        for &b in frac.iter().take(PRICE_DECIMALS as usize) {
            raw = raw
                .checked_add(i64::from(b - b'0') * place)
                .ok_or_else(out_of_range)?;
            place /= 10;
        }
        if frac.len() > PRICE_DECIMALS as usize && frac[PRICE_DECIMALS as usize] >= b'5' {
            raw = raw.checked_add(1).ok_or_else(out_of_range)?;
        }

        Ok(Self(if negative { -raw } else { raw }))
    }

    /// Lossy conversion for reporting.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// `self × quantity`, e.g. unit price × share count.
    pub fn times(self, quantity: i64) -> Self {
        Self(self.0 * quantity)
    }

    /// `self × quantity`, or `None` if the result does not fit.
    pub fn checked_times(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, rhs: Price) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self × numerator / denominator`, truncating toward zero.
    ///
    /// Intermediate product is widened to `i128`. Panics if `denominator` is 0.
    pub fn mul_ratio(self, numerator: i64, denominator: i64) -> Self {
        let raw = i128::from(self.0) * i128::from(numerator) / i128::from(denominator);
        Self(raw as i64)
    }

    /// Midpoint of two prices, truncating toward zero.
    pub fn midpoint(a: Price, b: Price) -> Self {
        Self(a.0 + (b.0 - a.0) / 2)
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = PRICE_DECIMALS as usize
        )
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Price;
    fn sub(self, rhs: Price) -> Price {
        Price(self.0 - rhs.0)
    }
}

impl Neg for Price {
    type Output = Price;
    fn neg(self) -> Price {
        Price(-self.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Price) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Price {
    fn sub_assign(&mut self, rhs: Price) {
        self.0 -= rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, |acc, p| acc + p)
    }
}

impl<'a> Sum<&'a Price> for Price {
    fn sum<I: Iterator<Item = &'a Price>>(iter: I) -> Price {
        iter.copied().sum()
    }
}

// Serialized as a decimal string so persisted artifacts stay exact.
impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriceVisitor;

        impl Visitor<'_> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
                Price::parse(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
                Price::from_f64(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
                v.checked_mul(Price::SCALE)
                    .map(Price)
                    .ok_or_else(|| E::custom(PriceError::OutOfRange(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(Price::SCALE))
                    .map(Price)
                    .ok_or_else(|| E::custom(PriceError::OutOfRange(v.to_string())))
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}
