use thiserror::Error;

use crate::address::Address;
use crate::fixed_decimal::FixedDecimal;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
  // `fixed_decimal`
  #[error("Square root of a negative number.")]
  InvalidDomain,
  #[error("Cannot parse `{0}` as a fixed-point decimal.")]
  InvalidDecimal(String),
  #[error("Overflow or division by zero while computing {0}.")]
  Arithmetic(&'static str),
  #[error("Negative value where a non-negative one is required: {0}.")]
  Negative(&'static str),
  // `address`
  #[error("Cannot parse `{0}` as an account address.")]
  InvalidAddress(String),
  // `pool`
  #[error("Pool weights or balances unavailable: {0}")]
  PoolDataUnavailable(String),
  #[error("Pool snapshot failed validation: {0}.")]
  InvalidPoolSnapshot(&'static str),
  #[error("Token {0} is not one of the pool assets.")]
  TokenNotInPool(Address),
  // `reserve_invariant` and `rebalance_delta`
  #[error("Reserve token total supply is zero.")]
  DegenerateSupply,
  // prices
  #[error("No price available for `{0}`.")]
  PriceUnavailable(String),
  #[error("Price {0} is too small.")]
  PriceTooSmall(FixedDecimal),
}
