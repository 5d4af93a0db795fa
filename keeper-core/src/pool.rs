//! Two-asset weighted pool state and spot pricing.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{CoreError, Result};
use crate::fixed_decimal::FixedDecimal;

/// Largest tolerated deviation of `weight_a + weight_b` from one.
pub const WEIGHT_TOLERANCE: FixedDecimal = FixedDecimal::from_raw(1_000_000);

/// Balances and normalized weights of a two-asset weighted pool, read at a
/// single block. Assets appear in pool registration order. Never cache one
/// across cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
  pub token_a: Address,
  pub token_b: Address,
  pub balance_a: FixedDecimal,
  pub balance_b: FixedDecimal,
  pub weight_a: FixedDecimal,
  pub weight_b: FixedDecimal,
}

/// The two pool assets by role: `priced` is the reserve-backed token,
/// `reference` carries an externally known fiat price.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
  pub priced: Address,
  pub reference: Address,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolLeg {
  pub token: Address,
  pub balance: FixedDecimal,
  pub weight: FixedDecimal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolLegs {
  pub reference: PoolLeg,
  pub priced: PoolLeg,
}

impl PoolSnapshot {
  /// Checks balances are non-negative and weights are positive and sum to one.
  ///
  /// # Errors
  /// * `InvalidPoolSnapshot` naming the violated constraint
  pub fn validate(self) -> Result<PoolSnapshot> {
    if self.balance_a.is_negative() || self.balance_b.is_negative() {
      return Err(CoreError::InvalidPoolSnapshot("negative balance"));
    }
    if !self.weight_a.is_positive() || !self.weight_b.is_positive() {
      return Err(CoreError::InvalidPoolSnapshot("non-positive weight"));
    }
    let deviation = self
      .weight_a
      .checked_add(&self.weight_b)
      .and_then(|sum| sum.checked_sub(&FixedDecimal::one()))
      .ok_or(CoreError::Arithmetic("pool weight sum"))?
      .abs();
    if deviation > WEIGHT_TOLERANCE {
      return Err(CoreError::InvalidPoolSnapshot("weights do not sum to one"));
    }
    Ok(self)
  }

  fn leg(&self, index: usize) -> PoolLeg {
    if index == 0 {
      PoolLeg {
        token: self.token_a,
        balance: self.balance_a,
        weight: self.weight_a,
      }
    } else {
      PoolLeg {
        token: self.token_b,
        balance: self.balance_b,
        weight: self.weight_b,
      }
    }
  }

  /// Splits the snapshot into reference and priced legs.
  ///
  /// The pool keeps its assets sorted by address, so the priced asset sits at
  /// index 0 exactly when its address is the smaller of the two. The spot
  /// price formula is asymmetric, so the same ordering must be used
  /// everywhere.
  ///
  /// # Errors
  /// * `TokenNotInPool` if the pair does not match the snapshot's assets
  pub fn legs(&self, pair: &TokenPair) -> Result<PoolLegs> {
    let priced_index = usize::from(pair.priced >= pair.reference);
    let priced = self.leg(priced_index);
    let reference = self.leg(1 - priced_index);
    if priced.token != pair.priced {
      Err(CoreError::TokenNotInPool(pair.priced))
    } else if reference.token != pair.reference {
      Err(CoreError::TokenNotInPool(pair.reference))
    } else {
      Ok(PoolLegs { reference, priced })
    }
  }
}

/// Fiat spot price of the priced asset.
///
/// ```text
///   (balance_reference / weight_reference)
///   ────────────────────────────────────── * reference_price
///      (balance_priced / weight_priced)
/// ```
///
/// # Errors
/// * Pair does not match the pool
/// * Zero priced balance or weight
pub fn compute_spot_price(
  snapshot: &PoolSnapshot,
  pair: &TokenPair,
  reference_price: FixedDecimal,
) -> Result<FixedDecimal> {
  let PoolLegs { reference, priced } = snapshot.legs(pair)?;
  let reference_side = reference.balance.checked_div(&reference.weight);
  let priced_side = priced.balance.checked_div(&priced.weight);
  reference_side
    .zip(priced_side)
    .and_then(|(r, p)| r.checked_div(&p))
    .and_then(|ratio| ratio.checked_mul(&reference_price))
    .ok_or(CoreError::Arithmetic("spot price"))
}
