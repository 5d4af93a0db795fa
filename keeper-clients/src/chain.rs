use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use keeper_core::pool::PoolSnapshot;
use keeper_core::{Address, FixedDecimal};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::contracts::ContractRef;

/// 32-byte weighted pool identifier used by the vault.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PoolId([u8; 32]);

impl PoolId {
  #[must_use]
  pub const fn new(bytes: [u8; 32]) -> PoolId {
    PoolId(bytes)
  }

  #[must_use]
  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }
}

impl FromStr for PoolId {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<PoolId> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits)?;
    let id = <[u8; 32]>::try_from(bytes.as_slice())
      .map_err(|_| anyhow!("pool id must be 32 bytes: {s}"))?;
    Ok(PoolId(id))
  }
}

impl Display for PoolId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl Debug for PoolId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Display::fmt(self, f)
  }
}

impl Serialize for PoolId {
  fn serialize<S: Serializer>(
    &self,
    serializer: S,
  ) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for PoolId {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> std::result::Result<PoolId, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
  }
}

/// Read-only contract queries. Token amounts come back as 18-decimal fixed
/// point values.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
  /// Balances and normalized weights of `pool`, read through `vault`.
  async fn pool_snapshot(
    &self,
    vault: &ContractRef,
    pool: &ContractRef,
  ) -> Result<PoolSnapshot>;

  async fn pool_id(&self, pool: &ContractRef) -> Result<PoolId>;

  /// First element of the reserve's status tuple: total reserve value in USD.
  async fn reserve_value(&self, reserve: &ContractRef) -> Result<FixedDecimal>;

  /// Oracle the reserve consults for its own token.
  async fn token_oracle(&self, reserve: &ContractRef) -> Result<Address>;

  /// Oracle the reserve consults for an arbitrary registered token.
  async fn oracle_per_erc20(
    &self,
    reserve: &ContractRef,
    token: Address,
  ) -> Result<Address>;

  async fn total_supply(&self, token: &ContractRef) -> Result<FixedDecimal>;

  async fn balance_of(
    &self,
    token: &ContractRef,
    owner: Address,
  ) -> Result<FixedDecimal>;

  async fn allowance(
    &self,
    token: &ContractRef,
    owner: Address,
    spender: Address,
  ) -> Result<FixedDecimal>;

  /// Ceiling multiplier in basis points.
  async fn ceiling_multiplier_bps(&self, proxy_pool: &ContractRef)
    -> Result<u64>;

  /// Reserve token balance the peg reserve may release.
  async fn unfrozen_balance(
    &self,
    peg_reserve: &ContractRef,
  ) -> Result<FixedDecimal>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pool_id_round_trips_through_hex() -> Result<()> {
    let text =
      "0x00000000000000000000000000000000000000000000000000000000000000ff";
    let id = PoolId::from_str(text)?;
    assert_eq!(id.as_bytes()[31], 0xff);
    assert_eq!(id.to_string(), text);
    Ok(())
  }

  #[test]
  fn pool_id_rejects_short_input() {
    assert!(PoolId::from_str("0x1234").is_err());
  }
}
