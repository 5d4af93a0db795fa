//! Pegged secondary currency: its exchange rate against the reserve token and
//! the reserve-token balance its peg reserve must hold.

use crate::error::{CoreError, Result};
use crate::fixed_decimal::{FixedDecimal, U256};

/// Fixed USD price of one unit of the pegged currency.
pub const PEGGED_USD_PRICE: FixedDecimal =
  FixedDecimal::from_raw(558_659_217_877_094_900);

/// Fractional digits of values reported to the sorted oracles contract.
pub const SORTED_ORACLE_DECIMALS: u32 = 24;

/// Units of the pegged currency needed to buy one reserve token, rounded up
/// to a whole number.
///
/// # Errors
/// * `PriceTooSmall` for a non-positive reserve token price
/// * Overflow or zero pegged price
pub fn pegged_exchange_rate(
  priced_price: FixedDecimal,
  pegged_usd_price: FixedDecimal,
) -> Result<FixedDecimal> {
  if !priced_price.is_positive() {
    return Err(CoreError::PriceTooSmall(priced_price));
  }
  priced_price
    .checked_div(&pegged_usd_price)
    .and_then(|rate| rate.ceil())
    .ok_or(CoreError::Arithmetic("pegged exchange rate"))
}

/// Rate as the 24-decimal integer the sorted oracles contract expects.
///
/// # Errors
/// * Negative rate or overflow
pub fn sorted_oracle_value(rate: FixedDecimal) -> Result<U256> {
  rate
    .to_scaled_u256(SORTED_ORACLE_DECIMALS)
    .ok_or(CoreError::Arithmetic("sorted oracle value"))
}

/// Reserve token transfer that realigns the peg reserve with the value of the
/// pegged currency in circulation. Amounts are in reserve tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PegAdjustment {
  Balanced,
  /// Move tokens from the relayer into the peg reserve.
  TopUp { amount: FixedDecimal },
  /// Release tokens from the peg reserve to the relayer.
  Withdraw { amount: FixedDecimal },
}

/// Compares the value of reserve tokens held by the peg reserve with the value
/// of the pegged supply and converts the shortfall or excess back into
/// reserve tokens at `priced_price`.
///
/// # Errors
/// * `PriceTooSmall` for a non-positive reserve token price
/// * Overflow
pub fn peg_adjustment(
  reserve_token_held: FixedDecimal,
  priced_price: FixedDecimal,
  pegged_supply: FixedDecimal,
  pegged_usd_price: FixedDecimal,
) -> Result<PegAdjustment> {
  if !priced_price.is_positive() {
    return Err(CoreError::PriceTooSmall(priced_price));
  }
  let arithmetic = CoreError::Arithmetic("peg adjustment");
  let held_value = reserve_token_held
    .checked_mul(&priced_price)
    .ok_or(arithmetic.clone())?;
  let pegged_value = pegged_supply
    .checked_mul(&pegged_usd_price)
    .ok_or(arithmetic.clone())?;
  let amount = pegged_value
    .checked_sub(&held_value)
    .and_then(|gap| gap.abs().checked_div(&priced_price))
    .ok_or(arithmetic)?;
  Ok(if amount.is_zero() {
    PegAdjustment::Balanced
  } else if held_value < pegged_value {
    PegAdjustment::TopUp { amount }
  } else {
    PegAdjustment::Withdraw { amount }
  })
}

#[cfg(test)]
mod tests {
  use anyhow::Result;

  use super::*;
  use crate::util::test_fixtures::fd;

  #[test]
  fn rate_rounds_up_to_whole_units() -> Result<()> {
    assert_eq!(pegged_exchange_rate(fd("0.55"), PEGGED_USD_PRICE)?, fd("1"));
    assert_eq!(pegged_exchange_rate(fd("1.2"), PEGGED_USD_PRICE)?, fd("3"));
    assert_eq!(pegged_exchange_rate(fd("1"), fd("0.5"))?, fd("2"));
    Ok(())
  }

  #[test]
  fn rate_rejects_non_positive_price() {
    assert_eq!(
      pegged_exchange_rate(fd("0"), PEGGED_USD_PRICE),
      Err(CoreError::PriceTooSmall(fd("0")))
    );
  }

  #[test]
  fn oracle_value_has_24_decimals() -> Result<()> {
    let value = sorted_oracle_value(fd("2"))?;
    assert_eq!(value, U256::from(2u64) * U256::exp10(24));
    Ok(())
  }

  #[test]
  fn short_reserve_is_topped_up() -> Result<()> {
    let adjustment =
      peg_adjustment(fd("1000"), fd("0.5"), fd("1000"), fd("0.6"))?;
    assert_eq!(adjustment, PegAdjustment::TopUp { amount: fd("200") });
    Ok(())
  }

  #[test]
  fn long_reserve_is_withdrawn() -> Result<()> {
    let adjustment =
      peg_adjustment(fd("1000"), fd("0.5"), fd("500"), fd("0.6"))?;
    assert_eq!(adjustment, PegAdjustment::Withdraw { amount: fd("400") });
    Ok(())
  }

  #[test]
  fn matching_values_are_balanced() -> Result<()> {
    let adjustment =
      peg_adjustment(fd("1200"), fd("0.5"), fd("1000"), fd("0.6"))?;
    assert_eq!(adjustment, PegAdjustment::Balanced);
    Ok(())
  }
}
