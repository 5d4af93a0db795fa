//! Reserve backing ratio, price bounds and breach classification.
//!
//! The floor is the reserve value backing each unit of the reserve token:
//!
//! ```text
//!   floor   = backing_ratio * price = reserve_value / supply
//!   ceiling = floor * ceiling_multiplier
//! ```
//!
//! With `supply_value = supply * price` the backing ratio exceeds one exactly
//! when `price < floor`, and `backing_ratio * ceiling_multiplier < 1` exactly
//! when `price > ceiling`.

use std::fmt::{self, Display};

use crate::error::{CoreError, Result};
use crate::fixed_decimal::FixedDecimal;

/// Basis points in one.
pub const BPS_SCALE: u64 = 10_000;

/// Reserve valuation against circulating supply valuation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReserveStatus {
  pub reserve_value: FixedDecimal,
  pub supply_value: FixedDecimal,
  /// `reserve_value * 10_000 / supply_value`, truncated.
  pub backing_ratio_bps: u64,
}

impl ReserveStatus {
  /// # Errors
  /// * `DegenerateSupply` if the supply value is not positive
  /// * Negative reserve value
  /// * Overflow
  pub fn new(
    reserve_value: FixedDecimal,
    supply_value: FixedDecimal,
  ) -> Result<ReserveStatus> {
    if !supply_value.is_positive() {
      return Err(CoreError::DegenerateSupply);
    }
    if reserve_value.is_negative() {
      return Err(CoreError::Negative("reserve value"));
    }
    let ratio = reserve_value
      .mul_div(FixedDecimal::from_int(10_000), supply_value)
      .ok_or(CoreError::Arithmetic("backing ratio"))?;
    let backing_ratio_bps = u64::try_from(ratio.trunc_int())
      .map_err(|_| CoreError::Arithmetic("backing ratio"))?;
    Ok(ReserveStatus {
      reserve_value,
      supply_value,
      backing_ratio_bps,
    })
  }
}

/// Outcome of one invariant evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BreachState {
  NoBreach,
  /// Market price sits below the floor.
  FloorBreach { floor: FixedDecimal },
  /// Market price sits above the ceiling.
  CeilingBreach { ceiling: FixedDecimal },
}

impl BreachState {
  /// Price the corrective trade should steer toward.
  #[must_use]
  pub fn target_price(&self) -> Option<FixedDecimal> {
    match self {
      BreachState::NoBreach => None,
      BreachState::FloorBreach { floor } => Some(*floor),
      BreachState::CeilingBreach { ceiling } => Some(*ceiling),
    }
  }
}

impl Display for BreachState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BreachState::NoBreach => f.write_str("NoBreach"),
      BreachState::FloorBreach { floor } => write!(f, "FloorBreach({floor})"),
      BreachState::CeilingBreach { ceiling } => {
        write!(f, "CeilingBreach({ceiling})")
      }
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BreachEvaluation {
  pub status: ReserveStatus,
  pub floor: FixedDecimal,
  pub ceiling: FixedDecimal,
  pub breach: BreachState,
}

/// Floor and ceiling prices from a backing ratio.
///
/// # Errors
/// * Overflow
pub fn price_bounds(
  backing_ratio_bps: u64,
  priced_asset_price: FixedDecimal,
  ceiling_multiplier_bps: u64,
) -> Result<(FixedDecimal, FixedDecimal)> {
  let floor = FixedDecimal::from_bps(backing_ratio_bps)
    .checked_mul(&priced_asset_price)
    .ok_or(CoreError::Arithmetic("price floor"))?;
  let ceiling = floor
    .checked_mul(&FixedDecimal::from_bps(ceiling_multiplier_bps))
    .ok_or(CoreError::Arithmetic("price ceiling"))?;
  Ok((floor, ceiling))
}

/// Breach rule on integer basis points.
///
/// A ratio of exactly `10_000` is not a floor breach; it falls through to the
/// ceiling test.
#[must_use]
pub fn classify_bps(
  backing_ratio_bps: u64,
  ceiling_multiplier_bps: u64,
  floor: FixedDecimal,
  ceiling: FixedDecimal,
) -> BreachState {
  let scaled =
    u128::from(backing_ratio_bps) * u128::from(ceiling_multiplier_bps);
  let one = u128::from(BPS_SCALE) * u128::from(BPS_SCALE);
  if backing_ratio_bps > BPS_SCALE {
    BreachState::FloorBreach { floor }
  } else if scaled < one {
    BreachState::CeilingBreach { ceiling }
  } else {
    BreachState::NoBreach
  }
}

/// Computes the backing ratio, price bounds and breach state.
///
/// # Errors
/// * `DegenerateSupply` for a non-positive supply value
/// * Overflow
pub fn classify_breach(
  reserve_value: FixedDecimal,
  supply_value_raw: FixedDecimal,
  priced_asset_price: FixedDecimal,
  ceiling_multiplier_bps: u64,
) -> Result<BreachEvaluation> {
  let status = ReserveStatus::new(reserve_value, supply_value_raw)?;
  let (floor, ceiling) = price_bounds(
    status.backing_ratio_bps,
    priced_asset_price,
    ceiling_multiplier_bps,
  )?;
  let breach = classify_bps(
    status.backing_ratio_bps,
    ceiling_multiplier_bps,
    floor,
    ceiling,
  );
  Ok(BreachEvaluation {
    status,
    floor,
    ceiling,
    breach,
  })
}

#[cfg(test)]
mod tests {
  use anyhow::Result;
  use proptest::prelude::*;

  use super::*;
  use crate::util::test_fixtures::fd;

  const MULTIPLIER: u64 = 19_000;

  #[test]
  fn backing_ratio_in_bps() -> Result<()> {
    let status = ReserveStatus::new(fd("150"), fd("100"))?;
    assert_eq!(status.backing_ratio_bps, 15_000);
    let status = ReserveStatus::new(fd("2"), fd("3"))?;
    assert_eq!(status.backing_ratio_bps, 6_666);
    Ok(())
  }

  #[test]
  fn zero_supply_is_degenerate() {
    assert_eq!(
      ReserveStatus::new(fd("1"), FixedDecimal::zero()),
      Err(CoreError::DegenerateSupply)
    );
  }

  #[test]
  fn over_collateralized_is_floor_breach() -> Result<()> {
    let price = fd("0.5");
    let eval = classify_breach(fd("150"), fd("100"), price, MULTIPLIER)?;
    assert_eq!(eval.status.backing_ratio_bps, 15_000);
    assert_eq!(eval.floor, fd("0.75"));
    assert_eq!(eval.ceiling, fd("1.425"));
    assert_eq!(eval.breach, BreachState::FloorBreach { floor: fd("0.75") });
    assert_eq!(eval.breach.target_price(), Some(fd("0.75")));
    Ok(())
  }

  #[test]
  fn boundary_assignment() {
    let (floor, ceiling) = (fd("1"), fd("1.9"));
    assert_eq!(
      classify_bps(10_001, MULTIPLIER, floor, ceiling),
      BreachState::FloorBreach { floor }
    );
    assert_eq!(
      classify_bps(10_000, MULTIPLIER, floor, ceiling),
      BreachState::NoBreach
    );
    assert_eq!(
      classify_bps(9_999, MULTIPLIER, floor, ceiling),
      BreachState::NoBreach
    );
    // With a unit multiplier the ceiling coincides with the floor.
    assert_eq!(
      classify_bps(10_000, BPS_SCALE, floor, ceiling),
      BreachState::NoBreach
    );
    assert_eq!(
      classify_bps(9_999, BPS_SCALE, floor, ceiling),
      BreachState::CeilingBreach { ceiling }
    );
  }

  #[test]
  fn ceiling_boundary_for_default_multiplier() {
    let (floor, ceiling) = (fd("1"), fd("1.9"));
    // 5264 * 19000 = 100_016_000 >= 10^8
    assert_eq!(
      classify_bps(5_264, MULTIPLIER, floor, ceiling),
      BreachState::NoBreach
    );
    // 5263 * 19000 = 99_997_000 < 10^8
    assert_eq!(
      classify_bps(5_263, MULTIPLIER, floor, ceiling),
      BreachState::CeilingBreach { ceiling }
    );
  }

  #[test]
  fn price_above_ceiling_is_ceiling_breach() -> Result<()> {
    // reserve 100, supply 100 tokens at $2: ratio 0.5, floor 1, ceiling 1.9
    let eval = classify_breach(fd("100"), fd("200"), fd("2"), MULTIPLIER)?;
    assert_eq!(eval.status.backing_ratio_bps, 5_000);
    assert_eq!(eval.floor, fd("1"));
    assert_eq!(
      eval.breach,
      BreachState::CeilingBreach { ceiling: fd("1.9") }
    );
    Ok(())
  }

  proptest! {
    #[test]
    fn exactly_one_rule_applies(
      bps in 0u64..40_000,
      multiplier in 10_000u64..40_000,
    ) {
      let (floor, ceiling) = price_bounds(bps, fd("1"), multiplier)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
      let state = classify_bps(bps, multiplier, floor, ceiling);
      match state {
        BreachState::FloorBreach { .. } => prop_assert!(bps > BPS_SCALE),
        BreachState::CeilingBreach { .. } => {
          prop_assert!(bps <= BPS_SCALE);
          prop_assert!(bps * multiplier < BPS_SCALE * BPS_SCALE);
        }
        BreachState::NoBreach => {
          prop_assert!(bps <= BPS_SCALE);
          prop_assert!(bps * multiplier >= BPS_SCALE * BPS_SCALE);
        }
      }
      prop_assert!(ceiling >= floor);
    }

    #[test]
    fn floor_breach_means_price_below_floor(
      reserve in 1i64..1_000_000,
      supply in 1i64..1_000_000,
      price_cents in 1i64..1_000,
    ) {
      let price = FixedDecimal::from_parts(i128::from(price_cents), 2)
        .ok_or(TestCaseError::fail("price"))?;
      let supply_value = FixedDecimal::from_int(supply)
        .checked_mul(&price)
        .ok_or(TestCaseError::fail("supply value"))?;
      let eval = classify_breach(
        FixedDecimal::from_int(reserve),
        supply_value,
        price,
        MULTIPLIER,
      ).map_err(|e| TestCaseError::fail(e.to_string()))?;
      if let BreachState::FloorBreach { floor } = eval.breach {
        prop_assert!(price < floor);
      }
    }
  }
}
