//! Signed fixed-point decimal with 18 fractional digits.
//!
//! A value is a raw `i128` mantissa scaled by `10^18`, the precision of the
//! tokens being priced. Products and quotients widen into [`U256`] so the
//! intermediate never overflows; a result that does not fit back into the
//! mantissa yields `None`. Multiplication and division always truncate toward
//! zero so floor, ceiling and delta computations round the same way.

use std::fmt::{self, Display};
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::error::{CoreError, Result};

mod uint256 {
  use uint::construct_uint;

  construct_uint! {
    /// 256-bit unsigned integer for widened intermediates and on-chain values.
    pub struct U256(4);
  }
}

pub use uint256::U256;

/// Number of fractional digits.
pub const SCALE: u32 = 18;

const UNIT: i128 = 1_000_000_000_000_000_000;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedDecimal(i128);

fn widen(raw: i128) -> U256 {
  U256::from(raw.unsigned_abs())
}

fn narrow(magnitude: U256, negative: bool) -> Option<i128> {
  if magnitude.bits() > 127 {
    return None;
  }
  let magnitude = i128::try_from(magnitude.low_u128()).ok()?;
  Some(if negative { -magnitude } else { magnitude })
}

impl FixedDecimal {
  /// Wraps a raw mantissa already scaled by `10^18`.
  #[must_use]
  pub const fn from_raw(raw: i128) -> FixedDecimal {
    FixedDecimal(raw)
  }

  #[must_use]
  pub const fn from_int(value: i64) -> FixedDecimal {
    FixedDecimal(value as i128 * UNIT)
  }

  /// Integer basis points, `10_000` being one.
  #[must_use]
  pub const fn from_bps(bps: u64) -> FixedDecimal {
    FixedDecimal(bps as i128 * (UNIT / 10_000))
  }

  #[must_use]
  pub const fn zero() -> FixedDecimal {
    FixedDecimal(0)
  }

  #[must_use]
  pub const fn one() -> FixedDecimal {
    FixedDecimal(UNIT)
  }

  #[must_use]
  pub const fn raw(self) -> i128 {
    self.0
  }

  /// Builds a value from `mantissa * 10^-scale`. Digits beyond the 18th
  /// fractional place are truncated.
  #[must_use]
  pub fn from_parts(mantissa: i128, scale: u32) -> Option<FixedDecimal> {
    if scale <= SCALE {
      let factor = 10i128.pow(SCALE - scale);
      mantissa.checked_mul(factor).map(FixedDecimal)
    } else {
      match 10i128.checked_pow(scale - SCALE) {
        Some(divisor) => Some(FixedDecimal(mantissa / divisor)),
        None => Some(FixedDecimal::zero()),
      }
    }
  }

  #[must_use]
  pub fn from_decimal(value: Decimal) -> Option<FixedDecimal> {
    FixedDecimal::from_parts(value.mantissa(), value.scale())
  }

  /// Converts a native float, e.g. a price returned by a market data API.
  #[must_use]
  pub fn from_f64(value: f64) -> Option<FixedDecimal> {
    Decimal::from_f64(value).and_then(FixedDecimal::from_decimal)
  }

  /// Reads an unsigned on-chain integer carrying `decimals` fractional digits.
  #[must_use]
  pub fn from_scaled_u256(value: U256, decimals: u32) -> Option<FixedDecimal> {
    let rescaled = if decimals <= SCALE {
      value.checked_mul(U256::exp10((SCALE - decimals) as usize))?
    } else {
      value / U256::exp10((decimals - SCALE) as usize)
    };
    narrow(rescaled, false).map(FixedDecimal)
  }

  /// Unsigned on-chain integer carrying `decimals` fractional digits.
  /// Returns `None` for negative values.
  #[must_use]
  pub fn to_scaled_u256(self, decimals: u32) -> Option<U256> {
    if self.is_negative() {
      return None;
    }
    let raw = widen(self.0);
    if decimals >= SCALE {
      raw.checked_mul(U256::exp10((decimals - SCALE) as usize))
    } else {
      Some(raw / U256::exp10((SCALE - decimals) as usize))
    }
  }

  #[must_use]
  pub fn is_zero(self) -> bool {
    self.0 == 0
  }

  #[must_use]
  pub fn is_negative(self) -> bool {
    self.0 < 0
  }

  #[must_use]
  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  #[must_use]
  pub fn abs(self) -> FixedDecimal {
    FixedDecimal(self.0.abs())
  }

  #[must_use]
  pub fn checked_add(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
    self.0.checked_add(other.0).map(FixedDecimal)
  }

  #[must_use]
  pub fn checked_sub(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
    self.0.checked_sub(other.0).map(FixedDecimal)
  }

  #[must_use]
  pub fn checked_mul(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
    let product = widen(self.0) * widen(other.0) / widen(UNIT);
    narrow(product, (self.0 < 0) != (other.0 < 0)).map(FixedDecimal)
  }

  /// `None` on division by zero.
  #[must_use]
  pub fn checked_div(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
    if other.is_zero() {
      return None;
    }
    let quotient = widen(self.0) * widen(UNIT) / widen(other.0);
    narrow(quotient, (self.0 < 0) != (other.0 < 0)).map(FixedDecimal)
  }

  /// `self * mul / div` with a single truncation at the end.
  #[must_use]
  pub fn mul_div(
    &self,
    mul: FixedDecimal,
    div: FixedDecimal,
  ) -> Option<FixedDecimal> {
    if div.is_zero() {
      return None;
    }
    let result = widen(self.0) * widen(mul.0) / widen(div.0);
    let negative = (self.0 < 0) ^ (mul.0 < 0) ^ (div.0 < 0);
    narrow(result, negative).map(FixedDecimal)
  }

  /// Integer power by repeated multiplication. A negative exponent takes the
  /// reciprocal first, so `powi(0, -1)` is `None`.
  #[must_use]
  pub fn checked_powi(&self, exponent: i32) -> Option<FixedDecimal> {
    match exponent {
      0 => Some(FixedDecimal::one()),
      1 => Some(*self),
      _ => {
        let base = if exponent > 0 {
          *self
        } else {
          FixedDecimal::one().checked_div(self)?
        };
        (0..exponent.unsigned_abs())
          .try_fold(FixedDecimal::one(), |acc, _| acc.checked_mul(&base))
      }
    }
  }

  /// Square root by Babylonian iteration on the widened mantissa.
  ///
  /// Starts at `(x + 1) / 2` and stops once an iterate no longer decreases,
  /// which leaves the largest fixed-point value whose square does not exceed
  /// `self`.
  ///
  /// # Errors
  /// * `InvalidDomain` for negative input
  pub fn sqrt(&self) -> Result<FixedDecimal> {
    if self.is_negative() {
      return Err(CoreError::InvalidDomain);
    }
    if self.is_zero() {
      return Ok(FixedDecimal::zero());
    }
    let n = widen(self.0) * widen(UNIT);
    let mut guess = (n + U256::one()) / 2;
    loop {
      let next = (n / guess + guess) / 2;
      if next >= guess {
        break;
      }
      guess = next;
    }
    narrow(guess, false)
      .map(FixedDecimal)
      .ok_or(CoreError::Arithmetic("square root"))
  }

  /// Rounds toward positive infinity to a whole number.
  #[must_use]
  pub fn ceil(&self) -> Option<FixedDecimal> {
    let whole = self.0 / UNIT * UNIT;
    if whole == self.0 || self.0 < 0 {
      Some(FixedDecimal(whole))
    } else {
      whole.checked_add(UNIT).map(FixedDecimal)
    }
  }

  /// Integer part, truncated toward zero.
  #[must_use]
  pub fn trunc_int(&self) -> i128 {
    self.0 / UNIT
  }
}

impl FromStr for FixedDecimal {
  type Err = CoreError;

  fn from_str(s: &str) -> Result<FixedDecimal> {
    let invalid = || CoreError::InvalidDecimal(s.to_string());
    let text = s.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) =
      unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
      || !all_digits(int_part)
      || !all_digits(frac_part)
    {
      return Err(invalid());
    }
    let int = if int_part.is_empty() {
      0
    } else {
      int_part.parse::<i128>().map_err(|_| invalid())?
    };
    let mut frac_digits: String =
      frac_part.chars().take(SCALE as usize).collect();
    while frac_digits.len() < SCALE as usize {
      frac_digits.push('0');
    }
    let frac = frac_digits.parse::<i128>().map_err(|_| invalid())?;
    let raw = int
      .checked_mul(UNIT)
      .and_then(|v| v.checked_add(frac))
      .ok_or_else(invalid)?;
    Ok(FixedDecimal(if negative { -raw } else { raw }))
  }
}

impl Display for FixedDecimal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let magnitude = self.0.unsigned_abs();
    let unit = UNIT.unsigned_abs();
    let (int, frac) = (magnitude / unit, magnitude % unit);
    if frac == 0 {
      write!(f, "{sign}{int}")
    } else {
      let digits = format!("{frac:018}");
      write!(f, "{sign}{int}.{}", digits.trim_end_matches('0'))
    }
  }
}

impl Serialize for FixedDecimal {
  fn serialize<S: Serializer>(
    &self,
    serializer: S,
  ) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for FixedDecimal {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> std::result::Result<FixedDecimal, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
  }
}
