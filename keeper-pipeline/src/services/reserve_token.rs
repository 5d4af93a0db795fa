//! Spot price of the reserve token, derived from the weighted pool and
//! published to the reserve's token oracle.

use anyhow::Result;
use keeper_clients::contracts::ContractRole;
use keeper_clients::transaction::{push_report, send};
use keeper_core::pool::compute_spot_price;
use keeper_core::{CoreError, FixedDecimal};
use tracing::info;

use super::Cycle;

pub const SERVICE: &str = "reserve-token-price";

/// Reads a fresh pool snapshot and prices the reserve token in USD.
///
/// # Errors
/// * `PoolDataUnavailable` if the pool cannot be read
/// * Invalid snapshot or pricing failure
pub async fn spot_price(
  cycle: Cycle<'_>,
  reference_price: FixedDecimal,
) -> Result<FixedDecimal> {
  let contracts = cycle.contracts;
  let snapshot = cycle
    .chain
    .pool_snapshot(&contracts.vault, &contracts.reserve_pool)
    .await
    .map_err(|e| CoreError::PoolDataUnavailable(format!("{e:#}")))?
    .validate()?;
  let price =
    compute_spot_price(&snapshot, &contracts.pair(), reference_price)?;
  info!(service = SERVICE, %price, %reference_price, "derived spot price");
  Ok(price)
}

/// Pushes the price to the reserve's token oracle and waits for it to land,
/// so later reads of reserve status see it.
///
/// # Errors
/// * Oracle lookup, submission or confirmation failure
pub async fn publish(cycle: Cycle<'_>, price: FixedDecimal) -> Result<()> {
  let oracle_address =
    cycle.chain.token_oracle(&cycle.contracts.reserve).await?;
  let oracle = cycle.registry.bind(ContractRole::Oracle, oracle_address)?;
  let handle = send(cycle.submitter, push_report(&oracle, price)?).await?;
  info!(service = SERVICE, tx = %handle.hash, "published reserve token price");
  handle
    .wait(cycle.config.reserve_token_oracle_confirmations)
    .await?;
  Ok(())
}
