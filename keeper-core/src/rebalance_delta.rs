//! Corrective trade size for a breached reserve invariant.
//!
//! Replicates the weighted pool trading formulas off-chain for an equally
//! weighted pool, only to decide how much to trade.

use std::fmt::{self, Display};

use crate::error::{CoreError, Result};
use crate::fixed_decimal::FixedDecimal;
use crate::pool::{PoolLegs, PoolSnapshot, TokenPair};

/// Pool swap fee, 0.1%.
pub const SWAP_FEE: FixedDecimal =
  FixedDecimal::from_raw(1_000_000_000_000_000);

/// The full theoretical trade is divided by this before execution so one
/// correction cannot push the price past its target.
pub const DAMPING_DIVISOR: FixedDecimal =
  FixedDecimal::from_raw(1_500_000_000_000_000_000);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
  /// Buy the reserve token with the reference token.
  Buy,
  /// Sell the reserve token for the reference token.
  Sell,
}

impl Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Direction::Buy => f.write_str("Buy"),
      Direction::Sell => f.write_str("Sell"),
    }
  }
}

/// Quantity of the reserve token to move, already damped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RebalanceDelta {
  pub token_amount: FixedDecimal,
  pub direction: Direction,
}

/// # Errors
/// * `DegenerateSupply` if `total_supply` is not positive
pub fn ensure_supply(total_supply: FixedDecimal) -> Result<()> {
  if total_supply.is_positive() {
    Ok(())
  } else {
    Err(CoreError::DegenerateSupply)
  }
}

/// Pre-trade pool price of the priced token in reference units, grossed up by
/// the swap fee.
///
/// ```text
///   sp1 = balance_reference / balance_priced * 1 / (1 - fee)
/// ```
#[must_use]
pub fn fee_adjusted_spot(legs: &PoolLegs) -> Option<FixedDecimal> {
  let fee_factor = FixedDecimal::one()
    .checked_sub(&SWAP_FEE)
    .and_then(|complement| FixedDecimal::one().checked_div(&complement))?;
  legs
    .reference
    .balance
    .checked_div(&legs.priced.balance)?
    .checked_mul(&fee_factor)
}

/// Solves the damped trade that moves the pool price toward `target_price`
/// (in reference token units).
///
/// ```text
///   ratio      = target_price / sp1
///   amount_in  = balance_priced * (sqrt(ratio) - 1)
///   amount_out = balance_priced
///     * (1 - balance_reference / (balance_reference + amount_in))
///   delta      = amount_out / 1.5
/// ```
///
/// A positive `amount_out` means reference tokens go in and priced tokens come
/// out (a buy); a negative one is the mirror-image sell. The result tracks
/// the exact trade only while both pool balances are of comparable size.
///
/// # Errors
/// * `DegenerateSupply` if the reserve token supply is zero, checked first
/// * `PriceTooSmall` for a non-positive target
/// * Pair does not match the pool
/// * Overflow or an empty pool side
pub fn compute_delta(
  total_supply: FixedDecimal,
  target_price: FixedDecimal,
  snapshot: &PoolSnapshot,
  pair: &TokenPair,
) -> Result<RebalanceDelta> {
  ensure_supply(total_supply)?;
  if !target_price.is_positive() {
    return Err(CoreError::PriceTooSmall(target_price));
  }
  let legs = snapshot.legs(pair)?;
  let arithmetic = CoreError::Arithmetic("rebalance delta");
  let current = fee_adjusted_spot(&legs).ok_or(arithmetic.clone())?;
  let ratio = target_price
    .checked_div(&current)
    .ok_or(arithmetic.clone())?;
  let balance_reference = legs.reference.balance;
  let balance_priced = legs.priced.balance;
  let amount_in = ratio
    .sqrt()?
    .checked_sub(&FixedDecimal::one())
    .and_then(|growth| balance_priced.checked_mul(&growth))
    .ok_or(arithmetic.clone())?;
  let amount_out = balance_reference
    .checked_add(&amount_in)
    .and_then(|after| balance_reference.checked_div(&after))
    .and_then(|share| FixedDecimal::one().checked_sub(&share))
    .and_then(|complement| balance_priced.checked_mul(&complement))
    .ok_or(arithmetic.clone())?;
  let damped = amount_out
    .checked_div(&DAMPING_DIVISOR)
    .ok_or(arithmetic)?;
  let direction = if damped.is_negative() {
    Direction::Sell
  } else {
    Direction::Buy
  };
  Ok(RebalanceDelta {
    token_amount: damped.abs(),
    direction,
  })
}

/// Amount the relayer pays for the delta: reference tokens for a buy
/// (constant product in-given-out, grossed up by the fee), the reserve tokens
/// themselves for a sell.
///
/// # Errors
/// * Pair does not match the pool
/// * Delta drains the priced side
pub fn payment_for(
  delta: &RebalanceDelta,
  snapshot: &PoolSnapshot,
  pair: &TokenPair,
) -> Result<FixedDecimal> {
  match delta.direction {
    Direction::Sell => Ok(delta.token_amount),
    Direction::Buy => {
      let legs = snapshot.legs(pair)?;
      let remaining = legs
        .priced
        .balance
        .checked_sub(&delta.token_amount)
        .filter(|left| left.is_positive())
        .ok_or(CoreError::Arithmetic("payment exceeds pool balance"))?;
      legs
        .reference
        .balance
        .mul_div(delta.token_amount, remaining)
        .and_then(|net| {
          let complement = FixedDecimal::one().checked_sub(&SWAP_FEE)?;
          net.checked_div(&complement)
        })
        .ok_or(CoreError::Arithmetic("payment"))
    }
  }
}
